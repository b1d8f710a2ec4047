//! Wiring shared by `run` and `ask`: config → registry → Spotify client →
//! execution engine, plus the session's remote credentials.

use spotctl_config::{AppConfig, StoredCredentials};
use spotctl_core::context::{AIContext, RemoteAuth};
use spotctl_core::music::Credentials;
use spotctl_spotify::SpotifyClient;
use spotctl_tools::{ExecutionConfig, ExecutionEngine, build_registry};
use std::sync::Arc;
use tracing::{info, warn};

pub fn remote_auth(config: &AppConfig) -> RemoteAuth {
    RemoteAuth {
        access_token: config.spotify.access_token.clone(),
        refresh_token: config.spotify.refresh_token.clone(),
        user_id: None,
        is_authenticated: config.spotify.has_tokens(),
    }
}

pub fn engine(config: &AppConfig) -> Result<Arc<ExecutionEngine>, Box<dyn std::error::Error>> {
    let registry = build_registry(config)?;
    let client = SpotifyClient::new(config.spotify.client_id.clone(), config.spotify.client_secret.clone())
        .with_credentials(Credentials {
            access_token: config.spotify.access_token.clone(),
            refresh_token: config.spotify.refresh_token.clone(),
        });
    Ok(Arc::new(ExecutionEngine::new(
        ExecutionConfig::from(config),
        Arc::new(registry),
        Arc::new(client),
    )))
}

/// Bind credentials when the session has them. System actions work without.
pub fn initialize(engine: &ExecutionEngine, context: &AIContext) {
    if !context.remote_auth.is_usable() {
        warn!("No Spotify tokens found; run `spotctl auth` to enable Spotify actions");
        return;
    }
    if let Err(e) = engine.initialize(context) {
        warn!(error = %e, "Engine initialization failed");
    }
}

/// Persist tokens that changed during the session (e.g. `refresh_spotify_token`).
pub fn save_refreshed_tokens(config: &AppConfig, context: &AIContext) -> Result<(), Box<dyn std::error::Error>> {
    let auth = &context.remote_auth;
    if auth.access_token.is_none() || auth.access_token == config.spotify.access_token {
        return Ok(());
    }
    StoredCredentials {
        access_token: auth.access_token.clone(),
        refresh_token: auth.refresh_token.clone().or_else(|| config.spotify.refresh_token.clone()),
    }
    .save_to(&AppConfig::credentials_path())?;
    info!("Saved refreshed Spotify token");
    Ok(())
}
