use crate::error::LLMError;
use crate::llm_provider::*;
use gremlin_core::config_manager::LLMConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "anthropic")]
use crate::anthropic_provider::{AnthropicConfig, AnthropicProvider};

#[cfg(feature = "openai-compatible")]
use crate::openai_compatible_provider::{OpenAICompatibleConfig, OpenAICompatibleProvider};

/// Constructor for a named provider
pub type ProviderConstructor =
    Arc<dyn Fn(&LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> + Send + Sync>;

/// Name-to-constructor mapping for reasoning-engine providers.
///
/// New providers are added with [`ProviderRegistry::register`] without touching
/// the pipeline. Names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: BTreeMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every provider compiled into this build
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "anthropic")]
        registry.register("anthropic", LLMProviderFactory::create_anthropic_provider);

        #[cfg(feature = "openai-compatible")]
        {
            registry.register("openai", LLMProviderFactory::create_openai_provider);
            registry.register("ollama", LLMProviderFactory::create_ollama_provider);
            registry.register("lmstudio", LLMProviderFactory::create_lmstudio_provider);
            registry.register(
                "openai-compatible",
                LLMProviderFactory::create_openai_compatible_provider,
            );
        }

        registry
    }

    /// Register (or replace) a provider constructor
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_lowercase(), Arc::new(constructor));
    }

    /// Whether a provider name is known
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_lowercase())
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct the provider named by `config.provider`
    pub fn create(&self, config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let name = config.provider.to_lowercase();
        let constructor =
            self.constructors
                .get(&name)
                .ok_or_else(|| LLMError::UnsupportedProvider {
                    name: config.provider.clone(),
                    available: self.names().join(", "),
                })?;
        let provider = constructor(config)?;
        info!(
            provider = provider.provider_name(),
            model = provider.model_name(),
            "Reasoning engine ready"
        );
        Ok(provider)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

/// Factory for creating LLM providers based on configuration
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration using the built-in registry
    pub fn create_from_config(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        ProviderRegistry::with_builtin().create(config)
    }

    /// Get a list of supported providers (based on enabled features)
    pub fn supported_providers() -> Vec<String> {
        ProviderRegistry::with_builtin()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Create an Anthropic Claude provider
    #[cfg(feature = "anthropic")]
    fn create_anthropic_provider(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                LLMError::configuration(
                    "anthropic",
                    "API key not found. Set 'anthropic_api_key' in config \
                     or ANTHROPIC_API_KEY environment variable",
                )
            })?;

        let mut anthropic_config = AnthropicConfig {
            api_key,
            model: config.resolved_model(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            ..AnthropicConfig::default()
        };
        if let Some(base_url) = &config.base_url {
            anthropic_config.base_url = base_url.clone();
        }

        Ok(Arc::new(AnthropicProvider::new(anthropic_config)?))
    }

    /// Create a provider for the hosted OpenAI API
    #[cfg(feature = "openai-compatible")]
    fn create_openai_provider(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let api_key = config
            .openai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                LLMError::configuration(
                    "openai",
                    "API key not found. Set 'openai_api_key' in config \
                     or OPENAI_API_KEY environment variable",
                )
            })?;

        let mut compat = OpenAICompatibleConfig::openai(config.resolved_model(), api_key);
        if let Some(base_url) = &config.base_url {
            compat.base_url = base_url.clone();
        }
        Self::build_compatible(compat, config)
    }

    /// Create a provider using Ollama's OpenAI-compatible endpoint
    #[cfg(feature = "openai-compatible")]
    fn create_ollama_provider(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let mut compat = OpenAICompatibleConfig::ollama(config.resolved_model());
        if let Some(base_url) = &config.base_url {
            compat.base_url = base_url.clone();
        }
        Self::build_compatible(compat, config)
    }

    /// Create a provider using LM Studio's OpenAI-compatible endpoint
    #[cfg(feature = "openai-compatible")]
    fn create_lmstudio_provider(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let mut compat = OpenAICompatibleConfig::lm_studio(config.resolved_model());
        if let Some(base_url) = &config.base_url {
            compat.base_url = base_url.clone();
        }
        Self::build_compatible(compat, config)
    }

    /// Create a provider for an arbitrary OpenAI-compatible endpoint
    #[cfg(feature = "openai-compatible")]
    fn create_openai_compatible_provider(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let base_url = config.base_url.clone().ok_or_else(|| {
            LLMError::configuration(
                "openai-compatible",
                "base URL not found. Set 'base_url' in config or GREMLIN_API_BASE",
            )
        })?;
        let model = config.model.clone().ok_or_else(|| {
            LLMError::configuration("openai-compatible", "model name is required")
        })?;

        let compat = OpenAICompatibleConfig {
            base_url,
            model,
            api_key: config.openai_api_key.clone(),
            provider_name: "openai-compatible".to_string(),
            ..OpenAICompatibleConfig::default()
        };
        Self::build_compatible(compat, config)
    }

    #[cfg(feature = "openai-compatible")]
    fn build_compatible(
        mut compat: OpenAICompatibleConfig,
        config: &LLMConfig,
    ) -> LLMResult<Arc<dyn LLMProvider>> {
        compat.max_tokens = config.max_tokens;
        compat.temperature = config.temperature;
        compat.timeout_secs = config.timeout_secs;
        compat.max_retries = config.max_retries;
        Ok(Arc::new(OpenAICompatibleProvider::new(compat)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedProvider;

    fn config_for(provider: &str) -> LLMConfig {
        LLMConfig {
            provider: provider.to_string(),
            ..LLMConfig::default()
        }
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let err = LLMProviderFactory::create_from_config(&config_for("carrier-pigeon"))
            .err()
            .unwrap();
        match err {
            LLMError::UnsupportedProvider { name, available } => {
                assert_eq!(name, "carrier-pigeon");
                assert!(available.contains("anthropic"));
                assert!(available.contains("ollama"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_registered_provider_is_used() {
        let mut registry = ProviderRegistry::new();
        registry.register("scripted", |_config| {
            Ok(Arc::new(ScriptedProvider::new(vec!["ok"])) as Arc<dyn LLMProvider>)
        });
        assert!(registry.contains("SCRIPTED"));

        let provider = registry.create(&config_for("Scripted")).unwrap();
        assert_eq!(provider.provider_name(), "scripted");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let provider = LLMProviderFactory::create_from_config(&config_for("ollama")).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "llama3.1");
    }

    #[test]
    fn test_openai_compatible_requires_base_url() {
        let config = LLMConfig {
            model: Some("m".to_string()),
            ..config_for("openai-compatible")
        };
        let err = LLMProviderFactory::create_from_config(&config).err().unwrap();
        assert!(matches!(err, LLMError::Configuration { .. }));
    }

    #[test]
    fn test_supported_providers_sorted() {
        let providers = LLMProviderFactory::supported_providers();
        let mut sorted = providers.clone();
        sorted.sort();
        assert_eq!(providers, sorted);
        assert!(providers.iter().any(|p| p == "lmstudio"));
    }
}
