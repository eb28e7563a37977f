pub mod error;
pub mod llm_factory;
pub mod llm_provider;
pub mod scripted;

#[cfg(feature = "anthropic")]
pub mod anthropic_provider;
#[cfg(feature = "openai-compatible")]
pub mod openai_compatible_provider;

pub use error::LLMError;
pub use llm_factory::{LLMProviderFactory, ProviderConstructor, ProviderRegistry};
pub use llm_provider::*;
pub use scripted::{RecordedCall, ScriptedProvider};

#[cfg(feature = "anthropic")]
pub use anthropic_provider::{AnthropicConfig, AnthropicProvider};
#[cfg(feature = "openai-compatible")]
pub use openai_compatible_provider::{OpenAICompatibleConfig, OpenAICompatibleProvider};
