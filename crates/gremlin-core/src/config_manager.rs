use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Main configuration for Gremlin
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GremlinConfig {
    /// Reasoning engine configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Analysis defaults (threshold, depth, resource locations)
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM configuration for the rollout and validation calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LLMConfig {
    /// LLM provider: "anthropic", "openai", "ollama", "lmstudio", "openai-compatible"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model identifier. `None` selects the provider default.
    #[serde(default)]
    pub model: Option<String>,

    /// Anthropic API key
    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// OpenAI API key (also used by authenticated OpenAI-compatible endpoints)
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Custom API base URL (self-hosted or proxied endpoints)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport-level retries. The pipeline itself never retries.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            anthropic_api_key: None,
            openai_api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

impl LLMConfig {
    /// Model to use, falling back to the provider default
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| default_model_for(&self.provider).to_string())
    }
}

/// Default model identifier for a provider name
pub fn default_model_for(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "anthropic" => "claude-sonnet-4-20250514",
        "openai" => "gpt-4o",
        "ollama" => "llama3.1",
        "lmstudio" => "local-model",
        _ => "",
    }
}

/// How hard the reasoning engine is asked to dig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    #[default]
    Quick,
    Deep,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Quick => "quick",
            Depth::Deep => "deep",
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Depth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(Depth::Quick),
            "deep" => Ok(Depth::Deep),
            other => Err(ConfigError::ValidationError(format!(
                "Invalid depth: {}. Must be one of: quick, deep",
                other
            ))),
        }
    }
}

/// Analysis defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Confidence threshold 0-100
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    /// Default analysis depth
    #[serde(default)]
    pub depth: Depth,

    /// Directory of pattern YAML files (None = built-in catalog)
    #[serde(default)]
    pub patterns_dir: Option<PathBuf>,

    /// Custom system prompt file (None = built-in prompt)
    #[serde(default)]
    pub system_prompt_path: Option<PathBuf>,

    /// Directory holding persisted stage artifacts
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            depth: Depth::Quick,
            patterns_dir: None,
            system_prompt_path: None,
            run_dir: default_run_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_llm_provider() -> String {
    "anthropic".to_string()
}
fn default_max_tokens() -> usize {
    4096
}
fn default_temperature() -> f32 {
    1.0
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_threshold() -> u8 {
    80
}
fn default_run_dir() -> PathBuf {
    PathBuf::from(".gremlin").join("run")
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered loading
pub struct ConfigManager {
    config: GremlinConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.gremlin.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        info!("Loading Gremlin configuration...");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        if let Some(ref path) = config_path {
            info!(path = %path.display(), "Config file loaded");
        } else {
            info!("No config file found, using defaults");
        }
        info!(
            provider = %config.llm.provider,
            model = %config.llm.resolved_model(),
            threshold = config.analysis.threshold,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load configuration from an explicit file, still honouring env overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::apply_env_overrides(Self::read_toml_file(path)?);
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: GremlinConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".gremlin.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .gremlin.env: {}", e);
                }
            }
        }
    }

    /// Find and load config file
    /// Search order:
    /// 1. ./.gremlin.toml (current directory)
    /// 2. ~/.gremlin/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(GremlinConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".gremlin.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".gremlin").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((GremlinConfig::default(), None))
    }

    /// Read TOML config file
    fn read_toml_file(path: &Path) -> Result<GremlinConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(config: GremlinConfig) -> GremlinConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (env in production, a map in tests)
    pub fn apply_overrides<F>(mut config: GremlinConfig, lookup: F) -> GremlinConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        // LLM configuration
        if let Some(provider) = lookup("GREMLIN_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(model) = lookup("GREMLIN_MODEL") {
            config.llm.model = Some(model);
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            config.llm.anthropic_api_key = Some(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }
        if let Some(base) = lookup("GREMLIN_API_BASE") {
            config.llm.base_url = Some(base);
        }
        if let Some(timeout) = lookup("GREMLIN_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.llm.timeout_secs = secs;
            }
        }
        if let Some(max_tokens) = lookup("GREMLIN_MAX_TOKENS") {
            if let Ok(n) = max_tokens.parse() {
                config.llm.max_tokens = n;
            }
        }

        // Analysis configuration
        if let Some(threshold) = lookup("GREMLIN_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                config.analysis.threshold = t;
            }
        }
        if let Some(depth) = lookup("GREMLIN_DEPTH") {
            match depth.parse() {
                Ok(d) => config.analysis.depth = d,
                Err(e) => warn!("Ignoring GREMLIN_DEPTH: {}", e),
            }
        }
        if let Some(dir) = lookup("GREMLIN_PATTERNS_DIR") {
            config.analysis.patterns_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("GREMLIN_RUN_DIR") {
            config.analysis.run_dir = PathBuf::from(dir);
        }

        // Logging
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }

        config
    }

    /// Validate configuration
    pub fn validate_config(config: &GremlinConfig) -> Result<(), ConfigError> {
        if config.analysis.threshold > 100 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid threshold: {}. Must be between 0 and 100",
                config.analysis.threshold
            )));
        }

        if config.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Invalid timeout: must be at least 1 second".to_string(),
            ));
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            // RUST_LOG may carry a full filter directive such as "gremlin_analysis=debug"
            other if other.contains('=') => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &GremlinConfig {
        &self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = GremlinConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
