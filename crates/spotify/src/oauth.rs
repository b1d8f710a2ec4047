//! Authorization-code login.
//!
//! Builds the authorize URL, listens on the redirect URI for the callback,
//! and exchanges the code for tokens.

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use spotctl_core::error::MusicApiError;
use spotctl_core::music::TokenGrant;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::client::SpotifyClient;

/// Scopes requested at login.
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-library-read",
    "user-library-modify",
    "user-follow-read",
    "user-follow-modify",
    "user-top-read",
    "user-read-recently-played",
    "user-read-currently-playing",
];

const SUCCESS_PAGE: &str =
    "<html><body><h1>Authentication successful!</h1><p>You can close this window now.</p></body></html>";

pub fn authorize_url(
    accounts_base: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<reqwest::Url, MusicApiError> {
    reqwest::Url::parse_with_params(
        &format!("{}/authorize", accounts_base.trim_end_matches('/')),
        [
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("scope", &SCOPES.join(" ")),
            ("state", state),
        ],
    )
    .map_err(|e| MusicApiError::MissingCredentials(format!("invalid authorize URL: {e}")))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type CodeSender = Arc<Mutex<Option<oneshot::Sender<Result<String, MusicApiError>>>>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    sender: CodeSender,
}

async fn callback(State(state): State<CallbackState>, Query(params): Query<CallbackParams>) -> Html<String> {
    let outcome = match (params.code, params.error) {
        (_, Some(error)) => Err(MusicApiError::Unauthorized(format!("authorization denied: {error}"))),
        (Some(_), None) if params.state.as_deref() != Some(state.expected_state.as_str()) => {
            Err(MusicApiError::Unauthorized("state mismatch in OAuth callback".into()))
        }
        (Some(code), None) => Ok(code),
        (None, None) => return Html("<html><body>Waiting for authorization code.</body></html>".into()),
    };

    let page = match &outcome {
        Ok(_) => SUCCESS_PAGE.to_string(),
        Err(e) => format!("<html><body><h1>Authentication failed</h1><p>{e}</p></body></html>"),
    };

    if let Some(tx) = state.sender.lock().ok().and_then(|mut guard| guard.take()) {
        let _ = tx.send(outcome);
    }
    Html(page)
}

fn callback_router(path: &str, expected_state: String, sender: CodeSender) -> Router {
    Router::new()
        .route(path, get(callback))
        .with_state(CallbackState { expected_state, sender })
}

/// Serve the redirect URI until the browser delivers a code, or `timeout` elapses.
pub async fn wait_for_code(redirect_uri: &str, expected_state: &str, timeout: Duration) -> Result<String, MusicApiError> {
    let url = reqwest::Url::parse(redirect_uri)
        .map_err(|e| MusicApiError::MissingCredentials(format!("invalid redirect URI '{redirect_uri}': {e}")))?;
    let port = url.port_or_known_default().unwrap_or(3000);
    let host = url.host_str().unwrap_or("127.0.0.1");
    let bind_host = if host == "localhost" { "127.0.0.1" } else { host };

    let (tx, rx) = oneshot::channel();
    let app = callback_router(url.path(), expected_state.to_string(), Arc::new(Mutex::new(Some(tx))));

    let listener = tokio::net::TcpListener::bind((bind_host, port))
        .await
        .map_err(|e| MusicApiError::Network(format!("cannot listen on {bind_host}:{port}: {e}")))?;
    debug!(port, path = url.path(), "Waiting for OAuth callback");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(MusicApiError::Network("callback server stopped".into())),
        Err(_) => Err(MusicApiError::Network(format!(
            "no authorization callback within {}s",
            timeout.as_secs()
        ))),
    };

    let _ = shutdown_tx.send(());
    let _ = server.await;
    outcome
}

impl SpotifyClient {
    /// Exchange an authorization code for tokens and store them on the client.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant, MusicApiError> {
        let grant = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        spotctl_core::MusicService::set_credentials(
            self,
            spotctl_core::Credentials {
                access_token: Some(grant.access_token.clone()),
                refresh_token: grant.refresh_token.clone(),
            },
        );
        info!(expires_in = grant.expires_in, "Authorization code exchanged");
        Ok(grant)
    }
}
