//! Spotify Web API client.
//!
//! Translates [`ApiCall`]s into HTTP requests. Bodies are returned as raw
//! JSON; shaping them is the handlers' job.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use spotctl_core::error::MusicApiError;
use spotctl_core::music::{ApiCall, Credentials, MusicService, RecommendationQuery, TokenGrant};
use std::sync::RwLock;
use tracing::{debug, warn};

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

/// One resolved HTTP request.
#[derive(Debug, PartialEq)]
pub(crate) struct Endpoint {
    pub method: Method,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl Endpoint {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    fn query_opt(self, key: &'static str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    fn page(self, limit: u32, offset: u32) -> Self {
        self.query("limit", limit).query("offset", offset)
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn for_call(call: &ApiCall) -> Self {
        match call {
            ApiCall::Me => Self::get("/me"),
            ApiCall::CreatePlaylist { name, public, description } => {
                let mut body = json!({ "name": name, "public": public });
                if let Some(d) = description {
                    body["description"] = json!(d);
                }
                Self::new(Method::POST, "/me/playlists").body(body)
            }
            ApiCall::UserPlaylists { limit, offset } => Self::get("/me/playlists").page(*limit, *offset),
            ApiCall::PlaylistTracks { playlist_id, limit, offset } => {
                Self::get(format!("/playlists/{playlist_id}/tracks")).page(*limit, *offset)
            }
            ApiCall::AddTracksToPlaylist { playlist_id, uris } => {
                Self::new(Method::POST, format!("/playlists/{playlist_id}/tracks")).body(json!({ "uris": uris }))
            }
            ApiCall::RemoveTracksFromPlaylist { playlist_id, uris } => {
                let tracks: Vec<Value> = uris.iter().map(|uri| json!({ "uri": uri })).collect();
                Self::new(Method::DELETE, format!("/playlists/{playlist_id}/tracks")).body(json!({ "tracks": tracks }))
            }
            ApiCall::SaveTracks { ids } => Self::new(Method::PUT, "/me/tracks").body(json!({ "ids": ids })),
            ApiCall::RemoveSavedTracks { ids } => Self::new(Method::DELETE, "/me/tracks").body(json!({ "ids": ids })),
            ApiCall::CurrentlyPlaying => Self::get("/me/player/currently-playing"),
            ApiCall::SavedTracks { limit, offset } => Self::get("/me/tracks").page(*limit, *offset),
            ApiCall::Tracks { ids } => Self::get("/tracks").query("ids", ids.join(",")),
            ApiCall::AudioFeatures { ids } => Self::get("/audio-features").query("ids", ids.join(",")),
            ApiCall::Search { query, types, limit, offset, market } => {
                let types: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
                Self::get("/search")
                    .query("q", query)
                    .query("type", types.join(","))
                    .page(*limit, *offset)
                    .query_opt("market", market.as_ref())
            }
            ApiCall::Recommendations(q) => Self::recommendations(q),
            ApiCall::TopItems { kind, time_range, limit, offset } => Self::get(format!("/me/top/{}", kind.as_str()))
                .query("time_range", time_range.as_str())
                .page(*limit, *offset),
            ApiCall::FollowedArtists { limit, after } => Self::get("/me/following")
                .query("type", "artist")
                .query("limit", limit)
                .query_opt("after", after.as_ref()),
            ApiCall::FollowArtists { ids } => Self::new(Method::PUT, "/me/following")
                .query("type", "artist")
                .body(json!({ "ids": ids })),
            ApiCall::UnfollowArtists { ids } => Self::new(Method::DELETE, "/me/following")
                .query("type", "artist")
                .body(json!({ "ids": ids })),
            ApiCall::FollowPlaylist { playlist_id, public } => {
                Self::new(Method::PUT, format!("/playlists/{playlist_id}/followers")).body(json!({ "public": public }))
            }
            ApiCall::UnfollowPlaylist { playlist_id } => {
                Self::new(Method::DELETE, format!("/playlists/{playlist_id}/followers"))
            }
            ApiCall::RecentlyPlayed { limit, after, before } => Self::get("/me/player/recently-played")
                .query("limit", limit)
                .query_opt("after", *after)
                .query_opt("before", *before),
        }
    }

    fn recommendations(q: &RecommendationQuery) -> Self {
        let seeds = |v: &[String]| (!v.is_empty()).then(|| v.join(","));
        Self::get("/recommendations")
            .query_opt("seed_tracks", seeds(&q.seed_tracks))
            .query_opt("seed_artists", seeds(&q.seed_artists))
            .query_opt("seed_genres", seeds(&q.seed_genres))
            .query("limit", q.limit)
            .query_opt("market", q.market.as_ref())
            .query_opt("target_acousticness", q.target_acousticness)
            .query_opt("target_danceability", q.target_danceability)
            .query_opt("target_energy", q.target_energy)
            .query_opt("target_valence", q.target_valence)
    }
}

/// HTTP implementation of [`MusicService`].
pub struct SpotifyClient {
    http: reqwest::Client,
    api_base: String,
    accounts_base: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials: RwLock<Credentials>,
}

impl SpotifyClient {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_base: API_BASE_URL.into(),
            accounts_base: ACCOUNTS_BASE_URL.into(),
            client_id,
            client_secret,
            credentials: RwLock::new(Credentials::default()),
        }
    }

    /// Point the client at different hosts (tests, proxies).
    pub fn with_base_urls(mut self, api_base: impl Into<String>, accounts_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.accounts_base = accounts_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credentials(self, credentials: Credentials) -> Self {
        self.set_credentials(credentials);
        self
    }


    pub(crate) fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_base)
    }

    pub(crate) fn app_credentials(&self) -> Result<(&str, &str), MusicApiError> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(MusicApiError::MissingCredentials(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET are required".into(),
            )),
        }
    }

    /// POST a form to the token endpoint with client basic auth.
    pub(crate) async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, MusicApiError> {
        let (id, secret) = self.app_credentials()?;
        let response = self
            .http
            .post(self.token_url())
            .basic_auth(id, Some(secret))
            .form(form)
            .send()
            .await
            .map_err(|e| MusicApiError::Network(e.to_string()))?;

        let body = decode(response).await?;
        serde_json::from_value(body).map_err(|e| MusicApiError::Decode(e.to_string()))
    }

    fn access_token(&self) -> Result<String, MusicApiError> {
        self.credentials()
            .access_token
            .ok_or_else(|| MusicApiError::MissingCredentials("no access token set".into()))
    }
}

/// Map a response to a body or a typed error.
async fn decode(response: reqwest::Response) -> Result<Value, MusicApiError> {
    let status = response.status();

    if status.is_success() {
        let text = response.text().await.map_err(|e| MusicApiError::Network(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&text).map_err(|e| MusicApiError::Decode(e.to_string()));
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["error_description"].as_str())
                .or_else(|| v["error"].as_str())
                .map(String::from)
        })
        .unwrap_or(text);

    Err(match status.as_u16() {
        401 => MusicApiError::Unauthorized(message),
        429 => MusicApiError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        },
        code => MusicApiError::Api { status: code, message },
    })
}

#[async_trait]
impl MusicService for SpotifyClient {
    fn name(&self) -> &str {
        "spotify"
    }

    fn set_credentials(&self, credentials: Credentials) {
        if let Ok(mut guard) = self.credentials.write() {
            *guard = credentials;
        }
    }

    fn credentials(&self) -> Credentials {
        self.credentials.read().map(|c| c.clone()).unwrap_or_default()
    }

    async fn call(&self, call: ApiCall) -> Result<Value, MusicApiError> {
        let token = self.access_token()?;
        let endpoint = Endpoint::for_call(&call);
        debug!(call = call.label(), method = %endpoint.method, path = %endpoint.path, "Spotify request");

        let mut request = self
            .http
            .request(endpoint.method, format!("{}{}", self.api_base, endpoint.path))
            .bearer_auth(token)
            .query(&endpoint.query);
        if let Some(body) = &endpoint.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MusicApiError::Network(e.to_string()))?;

        decode(response).await.inspect_err(|e| {
            warn!(call = call.label(), error = %e, "Spotify request failed");
        })
    }

    async fn refresh_access_token(&self) -> Result<TokenGrant, MusicApiError> {
        let current = self.credentials();
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or_else(|| MusicApiError::MissingCredentials("no refresh token set".into()))?;

        let grant = self
            .token_request(&[("grant_type", "refresh_token"), ("refresh_token", &refresh_token)])
            .await?;

        self.set_credentials(Credentials {
            access_token: Some(grant.access_token.clone()),
            refresh_token: grant.refresh_token.clone().or(current.refresh_token),
        });
        debug!(expires_in = grant.expires_in, "Refreshed Spotify access token");
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Form;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use spotctl_core::music::{SearchType, TimeRange, TopItemKind};
    use std::collections::HashMap;

    #[test]
    fn playlist_tracks_endpoint_is_paged() {
        let ep = Endpoint::for_call(&ApiCall::PlaylistTracks {
            playlist_id: "pl1".into(),
            limit: 100,
            offset: 200,
        });
        assert_eq!(ep.method, Method::GET);
        assert_eq!(ep.path, "/playlists/pl1/tracks");
        assert_eq!(ep.query, vec![("limit", "100".to_string()), ("offset", "200".to_string())]);
    }

    #[test]
    fn remove_tracks_sends_uri_objects() {
        let ep = Endpoint::for_call(&ApiCall::RemoveTracksFromPlaylist {
            playlist_id: "pl1".into(),
            uris: vec!["spotify:track:a".into()],
        });
        assert_eq!(ep.method, Method::DELETE);
        assert_eq!(ep.body.unwrap(), json!({"tracks": [{"uri": "spotify:track:a"}]}));
    }

    #[test]
    fn search_joins_types_and_skips_missing_market() {
        let ep = Endpoint::for_call(&ApiCall::Search {
            query: "daft punk".into(),
            types: vec![SearchType::Track, SearchType::Artist],
            limit: 20,
            offset: 0,
            market: None,
        });
        assert!(ep.query.contains(&("type", "track,artist".to_string())));
        assert!(!ep.query.iter().any(|(k, _)| *k == "market"));
    }

    #[test]
    fn top_items_and_recommendations() {
        let ep = Endpoint::for_call(&ApiCall::TopItems {
            kind: TopItemKind::Artists,
            time_range: TimeRange::LongTerm,
            limit: 10,
            offset: 0,
        });
        assert_eq!(ep.path, "/me/top/artists");
        assert_eq!(ep.query[0], ("time_range", "long_term".to_string()));

        let ep = Endpoint::for_call(&ApiCall::Recommendations(RecommendationQuery {
            seed_genres: vec!["jazz".into(), "soul".into()],
            limit: 20,
            target_energy: Some(0.4),
            ..Default::default()
        }));
        assert_eq!(
            ep.query,
            vec![
                ("seed_genres", "jazz,soul".to_string()),
                ("limit", "20".to_string()),
                ("target_energy", "0.4".to_string()),
            ]
        );
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn call_sends_bearer_token_and_decodes_body() {
        let router = Router::new()
            .route(
                "/v1/me",
                get(|headers: HeaderMap| async move {
                    let auth = headers["authorization"].to_str().unwrap().to_string();
                    Json(json!({ "id": "u1", "auth": auth }))
                }),
            )
            .route(
                "/v1/me/tracks",
                axum::routing::put(|| async { StatusCode::OK }),
            );
        let base = serve(router).await;
        let client = SpotifyClient::new(None, None)
            .with_base_urls(format!("{base}/v1"), &base)
            .with_credentials(Credentials {
                access_token: Some("tok".into()),
                refresh_token: None,
            });

        let me = client.call(ApiCall::Me).await.unwrap();
        assert_eq!(me["id"], "u1");
        assert_eq!(me["auth"], "Bearer tok");

        let saved = client.call(ApiCall::SaveTracks { ids: vec!["a".into()] }).await.unwrap();
        assert_eq!(saved, Value::Null);
    }

    #[tokio::test]
    async fn error_statuses_map_to_typed_errors() {
        let router = Router::new()
            .route(
                "/v1/me",
                get(|| async {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
                    )
                }),
            )
            .route(
                "/v1/me/tracks",
                get(|| async { (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "7")], "slow down").into_response() }),
            );
        let base = serve(router).await;
        let client = SpotifyClient::new(None, None)
            .with_base_urls(format!("{base}/v1"), &base)
            .with_credentials(Credentials {
                access_token: Some("tok".into()),
                refresh_token: None,
            });

        let err = client.call(ApiCall::Me).await.unwrap_err();
        assert!(matches!(err, MusicApiError::Unauthorized(ref m) if m == "The access token expired"));

        let err = client.call(ApiCall::SavedTracks { limit: 20, offset: 0 }).await.unwrap_err();
        assert!(matches!(err, MusicApiError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn call_without_token_fails_fast() {
        let client = SpotifyClient::new(None, None).with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
        let err = client.call(ApiCall::Me).await.unwrap_err();
        assert!(matches!(err, MusicApiError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn refresh_stores_new_access_token_and_keeps_refresh_token() {
        let router = Router::new().route(
            "/api/token",
            post(|headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                assert!(headers["authorization"].to_str().unwrap().starts_with("Basic "));
                assert_eq!(form["grant_type"], "refresh_token");
                assert_eq!(form["refresh_token"], "r1");
                Json(json!({"access_token": "fresh", "token_type": "Bearer", "expires_in": 3600}))
            }),
        );
        let base = serve(router).await;
        let client = SpotifyClient::new(Some("id".into()), Some("secret".into()))
            .with_base_urls(format!("{base}/v1"), &base)
            .with_credentials(Credentials {
                access_token: Some("stale".into()),
                refresh_token: Some("r1".into()),
            });

        let grant = client.refresh_access_token().await.unwrap();
        assert_eq!(grant.access_token, "fresh");
        assert_eq!(grant.expires_in, 3600);

        let creds = client.credentials();
        assert_eq!(creds.access_token.as_deref(), Some("fresh"));
        assert_eq!(creds.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn refresh_requires_app_credentials() {
        let client = SpotifyClient::new(None, None).with_credentials(Credentials {
            access_token: None,
            refresh_token: Some("r1".into()),
        });
        let err = client.refresh_access_token().await.unwrap_err();
        assert!(matches!(err, MusicApiError::MissingCredentials(_)));
    }
}
