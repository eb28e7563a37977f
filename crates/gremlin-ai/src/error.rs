use thiserror::Error;

/// Failure of a reasoning-engine call or of provider construction
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("[{provider}] configuration error: {message}")]
    Configuration { provider: String, message: String },

    #[error("[{provider}] request timeout after {timeout_secs}s")]
    Timeout { provider: String, timeout_secs: u64 },

    #[error("[{provider}] HTTP error: {source}")]
    Http {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("[{provider}] API error ({status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("[{provider}] invalid response: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Unsupported provider: {name}. Available providers: {available}")]
    UnsupportedProvider { name: String, available: String },
}

impl LLMError {
    pub fn configuration(provider: &str, message: impl Into<String>) -> Self {
        LLMError::Configuration {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: &str, message: impl Into<String>) -> Self {
        LLMError::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Classify a transport error, separating timeouts from other failures
    pub fn from_reqwest(provider: &str, timeout_secs: u64, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            LLMError::Timeout {
                provider: provider.to_string(),
                timeout_secs,
            }
        } else {
            LLMError::Http {
                provider: provider.to_string(),
                source,
            }
        }
    }

    /// Provider that raised the error, if any
    pub fn provider(&self) -> Option<&str> {
        match self {
            LLMError::Configuration { provider, .. }
            | LLMError::Timeout { provider, .. }
            | LLMError::Http { provider, .. }
            | LLMError::Api { provider, .. }
            | LLMError::InvalidResponse { provider, .. } => Some(provider),
            LLMError::UnsupportedProvider { .. } => None,
        }
    }

    /// Rate limits and 5xx responses are worth retrying by an outer layer
    pub fn is_transient(&self) -> bool {
        match self {
            LLMError::Timeout { .. } | LLMError::Http { .. } => true,
            LLMError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
