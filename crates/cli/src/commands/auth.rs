//! `spotctl auth`: Authorization-code login.

use spotctl_config::{AppConfig, StoredCredentials};
use spotctl_core::music::{ApiCall, MusicService};
use spotctl_spotify::oauth::{authorize_url, wait_for_code};
use spotctl_spotify::{ACCOUNTS_BASE_URL, SpotifyClient};
use std::time::Duration;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let spotify = &config.spotify;

    let (Some(client_id), Some(_)) = (spotify.client_id.as_deref(), spotify.client_secret.as_deref()) else {
        eprintln!();
        eprintln!("  ERROR: Spotify app credentials are missing!");
        eprintln!();
        eprintln!("  Set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET, or add them to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("Missing Spotify client credentials".into());
    };

    let state = uuid::Uuid::new_v4().simple().to_string();
    let url = authorize_url(ACCOUNTS_BASE_URL, client_id, &spotify.redirect_uri, &state)?;

    println!("Open this URL in your browser to authorize spotctl:");
    println!();
    println!("  {url}");
    println!();
    println!("Waiting for the callback on {} ...", spotify.redirect_uri);

    let code = wait_for_code(&spotify.redirect_uri, &state, CALLBACK_TIMEOUT).await?;

    let client = SpotifyClient::new(spotify.client_id.clone(), spotify.client_secret.clone());
    let grant = client.exchange_code(&code, &spotify.redirect_uri).await?;

    let path = AppConfig::credentials_path();
    StoredCredentials {
        access_token: Some(grant.access_token),
        refresh_token: grant.refresh_token,
    }
    .save_to(&path)?;

    match client.call(ApiCall::Me).await {
        Ok(profile) => {
            let name = profile
                .get("display_name")
                .or_else(|| profile.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown user");
            println!("✅ Logged in as {name}");
        }
        Err(e) => println!("✅ Tokens saved (profile lookup failed: {e})"),
    }
    println!("   Credentials: {}", path.display());
    Ok(())
}
