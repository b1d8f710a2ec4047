//! Provider router: selects the LLM provider based on config.

use spotctl_config::AppConfig;
use spotctl_core::error::ProviderError;
use spotctl_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::{OPENAI_BASE_URL, OpenAiCompatProvider};

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, (Arc<dyn Provider>, String)>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider together with the model it should be asked for.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>, model: impl Into<String>) {
        self.providers.insert(name.into(), (provider, model.into()));
    }

    /// The default provider and its model.
    pub fn default_provider(&self) -> Result<(Arc<dyn Provider>, String), ProviderError> {
        self.get(&self.default_provider).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "No API key configured for provider '{}'",
                self.default_provider
            ))
        })
    }

    pub fn get(&self, name: &str) -> Option<(Arc<dyn Provider>, String)> {
        self.providers.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration. Providers without an API key are skipped.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for name in ["openai", "anthropic"] {
        let provider_config = config.provider_config(name);
        let Some(api_key) = provider_config.api_key else {
            continue;
        };
        let model = provider_config.model.unwrap_or_default();

        let provider: Arc<dyn Provider> = if name == "anthropic" {
            let mut p = AnthropicProvider::new(api_key);
            if let Some(url) = provider_config.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        } else {
            let base_url = provider_config.api_url.unwrap_or_else(|| OPENAI_BASE_URL.into());
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
        };

        tracing::debug!(provider = name, model = %model, "Registered provider");
        router.register(name, provider, model);
    }

    router
}
