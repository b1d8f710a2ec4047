//! `spotctl status`: Show configuration and auth status.

use spotctl_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = config.provider_config(&config.default_provider);

    println!("🎧 spotctl Status");
    println!("=================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Contexts:     {}", AppConfig::contexts_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", provider.model.as_deref().unwrap_or("-"));
    println!("  API key:      {}", if provider.api_key.is_some() { "set" } else { "missing" });
    println!("  Max steps:    {}", config.agent.max_steps);
    println!("  Streaming:    {}", if config.agent.enable_streaming { "enabled" } else { "disabled" });
    println!(
        "  Retries:      {} x {}ms",
        config.execution.max_retries, config.execution.retry_delay_ms
    );
    println!(
        "  Rate limits:  {}",
        if config.execution.enable_rate_limit { "enabled" } else { "disabled" }
    );
    println!(
        "  Spotify app:  {}",
        if config.spotify.client_id.is_some() && config.spotify.client_secret.is_some() {
            "configured"
        } else {
            "missing client id/secret"
        }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — using defaults (see `spotctl config`)");
    }
    if config.spotify.has_tokens() {
        println!("  ✅ Spotify tokens present");
    } else {
        println!("  ⚠️  Not logged in to Spotify — run `spotctl auth`");
    }

    Ok(())
}
