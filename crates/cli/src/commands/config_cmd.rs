//! `spotctl config`: Print the config path and a default config.

use spotctl_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("# {}", config_path.display());
    if !config_path.exists() {
        println!("# (file does not exist; defaults shown)");
    }
    println!();
    print!("{}", AppConfig::default_toml());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_parses_back() {
        let parsed: AppConfig = toml::from_str(&AppConfig::default_toml()).unwrap();
        assert_eq!(parsed.agent.max_steps, 5);
        assert_eq!(parsed.execution.max_retries, 3);
    }
}
