// ABOUTME: Orchestrates the Understanding -> Ideation -> Rollout -> Judgment pipeline
// ABOUTME: Each stage consumes the previous immutable artifact and returns a new one embedding it

use crate::error::{AnalysisError, Result, Stage, StageContext};
use crate::inference::infer_domains;
use crate::parser::parse_risks;
use crate::prompts::{build_prompt, load_system_prompt, SYSTEM_PROMPT};
use crate::result::AnalysisResult;
use crate::selector::select_patterns;
use crate::stages::{IdeationResult, JudgmentResult, RolloutResult, UnderstandingResult};
use crate::validator::{self, ValidationOutcome};
use gremlin_ai::{LLMProvider, ProviderRegistry};
use gremlin_core::{ConfigError, Depth, GremlinConfig, LLMConfig, PatternCatalog};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Default confidence threshold, in percent
pub const DEFAULT_THRESHOLD: u8 = 80;

/// Risk-analysis pipeline.
///
/// Cheap to clone; clones share the catalog and, once created, the
/// reasoning-engine client. The client is built on first use, so the
/// Understanding and Ideation stages never need credentials.
#[derive(Clone)]
pub struct Gremlin {
    catalog: Arc<PatternCatalog>,
    domain_keywords: Arc<IndexMap<String, Vec<String>>>,
    system_prompt: Arc<str>,
    threshold: u8,
    llm_config: LLMConfig,
    registry: ProviderRegistry,
    provider: Arc<OnceCell<Arc<dyn LLMProvider>>>,
}

impl std::fmt::Debug for Gremlin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gremlin")
            .field("domains", &self.domain_keywords.len())
            .field("threshold", &self.threshold)
            .field("provider", &self.llm_config.provider)
            .field("provider_ready", &self.provider.get().is_some())
            .finish()
    }
}

/// Builder for [`Gremlin`]
#[derive(Default)]
pub struct GremlinBuilder {
    catalog: Option<PatternCatalog>,
    system_prompt: Option<String>,
    threshold: Option<u8>,
    provider: Option<Arc<dyn LLMProvider>>,
    llm_config: Option<LLMConfig>,
    registry: Option<ProviderRegistry>,
}

impl GremlinBuilder {
    /// Pattern catalog; defaults to the built-in one
    pub fn catalog(mut self, catalog: PatternCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Base instructions for the rollout call; defaults to the built-in prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn threshold(mut self, threshold: u8) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Use an existing client instead of building one from configuration
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn llm_config(mut self, config: LLMConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    /// Registry used to construct the client lazily
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<Gremlin> {
        let threshold = self.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if threshold > 100 {
            return Err(ConfigError::ValidationError(format!(
                "threshold must be between 0 and 100, got {}",
                threshold
            ))
            .into());
        }

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => PatternCatalog::builtin()?,
        };
        let domain_keywords = catalog.domain_keywords();

        let provider = OnceCell::new();
        if let Some(p) = self.provider {
            let _ = provider.set(p);
        }

        Ok(Gremlin {
            catalog: Arc::new(catalog),
            domain_keywords: Arc::new(domain_keywords),
            system_prompt: Arc::from(self.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT)),
            threshold,
            llm_config: self.llm_config.unwrap_or_default(),
            registry: self.registry.unwrap_or_else(ProviderRegistry::with_builtin),
            provider: Arc::new(provider),
        })
    }
}

impl Gremlin {
    pub fn builder() -> GremlinBuilder {
        GremlinBuilder::default()
    }

    /// Pipeline with the built-in catalog, prompt and default configuration
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Build from loaded configuration: catalog directory, prompt file,
    /// threshold and LLM settings
    pub fn from_config(config: &GremlinConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .threshold(config.analysis.threshold)
            .llm_config(config.llm.clone());

        if let Some(dir) = &config.analysis.patterns_dir {
            builder = builder.catalog(PatternCatalog::load_dir(dir)?);
        }
        if let Some(path) = &config.analysis.system_prompt_path {
            builder = builder.system_prompt(load_system_prompt(path)?);
        }
        builder.build()
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The reasoning-engine client, constructing it on first call
    pub fn provider(&self) -> Result<Arc<dyn LLMProvider>> {
        self.provider
            .get_or_try_init(|| self.registry.create(&self.llm_config))
            .cloned()
            .map_err(AnalysisError::from)
    }

    /// Run all four stages in order
    pub async fn analyze(
        &self,
        scope: &str,
        context: Option<&str>,
        depth: Depth,
        validate: bool,
    ) -> Result<AnalysisResult> {
        let start = Instant::now();
        let understanding = self.understand(scope, context, depth)?;
        let ideation = self.ideate(understanding)?;
        let rollout = self.rollout(ideation).await?;
        let judgment = self.judge(rollout, validate).await?;
        let result = AnalysisResult::from_judgment(&judgment);

        info!(
            scope = %result.scope,
            risks = result.risks.len(),
            critical = result.critical_count(),
            high = result.high_count(),
            validated = result.validated,
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(result)
    }

    /// Run the pipeline to completion on a private current-thread runtime.
    ///
    /// For synchronous hosts. Must not be called from inside a Tokio runtime.
    pub fn analyze_blocking(
        &self,
        scope: &str,
        context: Option<&str>,
        depth: Depth,
        validate: bool,
    ) -> Result<AnalysisResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.analyze(scope, context, depth, validate))
    }

    /// Run the pipeline on a Tokio worker task so the caller's event loop is
    /// never blocked. Each call owns its own artifact chain.
    pub fn spawn_analysis(
        &self,
        scope: impl Into<String>,
        context: Option<String>,
        depth: Depth,
        validate: bool,
    ) -> JoinHandle<Result<AnalysisResult>> {
        let gremlin = self.clone();
        let scope = scope.into();
        tokio::spawn(async move {
            gremlin
                .analyze(&scope, context.as_deref(), depth, validate)
                .await
        })
    }

    /// Understanding: infer matched domains. No engine call.
    #[instrument(skip(self, context), fields(stage = "understanding"))]
    pub fn understand(
        &self,
        scope: &str,
        context: Option<&str>,
        depth: Depth,
    ) -> Result<UnderstandingResult> {
        let matched_domains = infer_domains(scope, &self.domain_keywords);
        info!(domains = ?matched_domains, "Understanding complete");

        Ok(UnderstandingResult::new(
            scope,
            matched_domains,
            depth,
            self.threshold,
            context.map(str::to_string),
        ))
    }

    /// Ideation: select patterns for the matched domains. No engine call.
    #[instrument(skip_all, fields(stage = "ideation"))]
    pub fn ideate(&self, understanding: UnderstandingResult) -> Result<IdeationResult> {
        understanding.ensure_supported().in_stage(Stage::Ideation)?;

        let selected = select_patterns(
            &understanding.scope,
            &self.catalog,
            &understanding.matched_domains,
        );
        let ideation = IdeationResult::new(understanding, selected);
        info!(pattern_count = ideation.pattern_count, "Ideation complete");
        Ok(ideation)
    }

    /// Rollout: build the prompt and make exactly one engine call
    #[instrument(skip_all, fields(stage = "rollout"))]
    pub async fn rollout(&self, ideation: IdeationResult) -> Result<RolloutResult> {
        ideation.ensure_supported().in_stage(Stage::Rollout)?;

        let u = &ideation.understanding;
        let (full_system, user_message) = build_prompt(
            &self.system_prompt,
            &ideation.selected_patterns,
            &u.scope,
            u.depth,
            u.threshold,
            u.context.as_deref(),
        )
        .in_stage(Stage::Rollout)?;

        let provider = self.provider().in_stage(Stage::Rollout)?;
        debug!(
            provider = provider.provider_name(),
            model = provider.model_name(),
            system_len = full_system.len(),
            user_len = user_message.len(),
            "Calling reasoning engine"
        );
        let response = provider
            .complete(&full_system, &user_message)
            .await
            .in_stage(Stage::Rollout)?;

        if let Some(usage) = response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Rollout token usage"
            );
        }
        info!(response_len = response.content.len(), "Rollout complete");
        Ok(RolloutResult::new(ideation, response.content))
    }

    /// Judgment: parse the rollout answer, optionally after a validation pass.
    /// A failed validation keeps the first-pass answer.
    #[instrument(skip_all, fields(stage = "judgment", validate = validate))]
    pub async fn judge(&self, rollout: RolloutResult, validate: bool) -> Result<JudgmentResult> {
        rollout.ensure_supported().in_stage(Stage::Judgment)?;

        let (response_text, validation_summary, validated) = if validate {
            match self.validation_outcome(&rollout).await {
                ValidationOutcome::Applied { response, summary } => (response, summary, true),
                ValidationOutcome::Skipped { reason } => {
                    warn!(%reason, "Validation skipped, using unvalidated risks");
                    (rollout.raw_response.clone(), None, false)
                }
            }
        } else {
            (rollout.raw_response.clone(), None, false)
        };

        let risks = parse_risks(&response_text, &rollout.understanding().matched_domains);
        info!(risks = risks.len(), validated, "Judgment complete");
        Ok(JudgmentResult::new(
            rollout,
            risks,
            validation_summary,
            validated,
        ))
    }

    async fn validation_outcome(&self, rollout: &RolloutResult) -> ValidationOutcome {
        let provider = match self.provider() {
            Ok(provider) => provider,
            Err(e) => {
                return ValidationOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };
        validator::validate(
            provider.as_ref(),
            &rollout.understanding().scope,
            &rollout.raw_response,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_ai::{LLMError, ScriptedProvider};

    const RESPONSE: &str = "
### 🔴 CRITICAL (95%)

**Payment Race Condition**

> What if payment succeeds but order creation fails?

- **Impact:** Customer charged but receives no order confirmation
- **Domain:** payments

### 🟠 HIGH (85%)

**Session Timeout**

> What if user session expires during checkout?

- **Impact:** Lost cart data and poor user experience
- **Domain:** auth
";

    fn gremlin_with(provider: Arc<ScriptedProvider>) -> Gremlin {
        Gremlin::builder().provider(provider).build().unwrap()
    }

    #[test]
    fn test_threshold_above_100_rejected() {
        let err = Gremlin::builder().threshold(101).build().unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn test_pure_stages_need_no_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register("anthropic", |_config| {
            Err(LLMError::configuration("anthropic", "no key"))
        });
        let gremlin = Gremlin::builder().registry(registry).build().unwrap();

        let u = gremlin.understand("checkout flow", None, Depth::Quick).unwrap();
        assert_eq!(u.matched_domains, vec!["payments"]);
        let i = gremlin.ideate(u).unwrap();
        assert!(i.pattern_count > 0);
        assert!(i.selected_patterns.domain.contains_key("payments"));
    }

    #[tokio::test]
    async fn test_rollout_calls_provider_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![RESPONSE]));
        let gremlin = gremlin_with(provider.clone());

        let u = gremlin
            .understand("checkout flow", Some("fn pay()"), Depth::Deep)
            .unwrap();
        let r = gremlin.rollout(gremlin.ideate(u).unwrap()).await.unwrap();
        assert_eq!(r.raw_response, RESPONSE);
        assert_eq!(provider.call_count(), 1);

        let call = &provider.calls()[0];
        assert!(call
            .system_prompt
            .as_deref()
            .unwrap()
            .contains("## Available Breaking Patterns"));
        assert!(call.user_message.contains("Depth: deep"));
        assert!(call.user_message.contains("fn pay()"));
    }

    #[tokio::test]
    async fn test_rollout_failure_is_tagged() {
        let provider = Arc::new(ScriptedProvider::failing("quota exceeded"));
        let gremlin = gremlin_with(provider);
        let err = gremlin
            .analyze("checkout", None, Depth::Quick, false)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Rollout));
        assert!(err.to_string().starts_with("[rollout stage]"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_missing_credentials_surface_in_rollout() {
        let mut registry = ProviderRegistry::new();
        registry.register("anthropic", |_config| {
            Err(LLMError::configuration("anthropic", "API key not found"))
        });
        let gremlin = Gremlin::builder().registry(registry).build().unwrap();
        let err = gremlin
            .analyze("checkout", None, Depth::Quick, false)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Rollout));
        assert!(matches!(
            err.root(),
            AnalysisError::Provider(LLMError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_judge_rejects_future_schema() {
        let gremlin = gremlin_with(Arc::new(ScriptedProvider::new(vec![RESPONSE])));
        let u = gremlin.understand("checkout", None, Depth::Quick).unwrap();
        let mut r = gremlin.rollout(gremlin.ideate(u).unwrap()).await.unwrap();
        r.version = "9".to_string();

        let err = gremlin.judge(r, false).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Judgment));
        assert!(matches!(err.root(), AnalysisError::UnsupportedSchema { .. }));
    }

    #[tokio::test]
    async fn test_validation_without_provider_falls_back() {
        let mut registry = ProviderRegistry::new();
        registry.register("anthropic", |_config| {
            Err(LLMError::configuration("anthropic", "no key"))
        });
        let gremlin = Gremlin::builder().registry(registry).build().unwrap();

        let u = gremlin.understand("checkout", None, Depth::Quick).unwrap();
        let i = gremlin.ideate(u).unwrap();
        let rollout = RolloutResult::new(i, RESPONSE);
        let judgment = gremlin.judge(rollout, true).await.unwrap();
        assert!(!judgment.validated);
        assert_eq!(judgment.risks.len(), 2);
    }

    #[test]
    fn test_analyze_blocking() {
        let gremlin = gremlin_with(Arc::new(ScriptedProvider::new(vec![RESPONSE])));
        let result = gremlin
            .analyze_blocking("checkout flow", None, Depth::Quick, false)
            .unwrap();
        assert_eq!(result.risks.len(), 2);
    }

    #[tokio::test]
    async fn test_spawned_analyses_are_independent() {
        let a = gremlin_with(Arc::new(ScriptedProvider::new(vec![RESPONSE])));
        let b = gremlin_with(Arc::new(ScriptedProvider::new(vec!["no risks here"])));

        let ha = a.spawn_analysis("checkout", None, Depth::Quick, false);
        let hb = b.spawn_analysis("login page", None, Depth::Quick, false);
        let (ra, rb) = (ha.await.unwrap().unwrap(), hb.await.unwrap().unwrap());

        assert_eq!(ra.risks.len(), 2);
        assert!(rb.risks.is_empty());
        assert_eq!(rb.matched_domains, vec!["auth"]);
    }
}
