//! Risk-analysis pipeline.
//!
//! A scope description flows through four stages, each producing an
//! immutable, JSON-serializable artifact:
//!
//! 1. **Understanding** infers the domains the scope touches.
//! 2. **Ideation** selects universal and domain breaking patterns.
//! 3. **Rollout** prompts the reasoning engine once.
//! 4. **Judgment** parses the answer into [`Risk`]s, optionally after a
//!    validation pass that falls back silently on failure.
//!
//! ```no_run
//! # async fn run() -> gremlin_analysis::Result<()> {
//! use gremlin_analysis::Gremlin;
//! use gremlin_core::Depth;
//!
//! let gremlin = Gremlin::new()?;
//! let result = gremlin
//!     .analyze("checkout flow with Stripe", None, Depth::Quick, false)
//!     .await?;
//! println!("{}", result.format_for_llm());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod inference;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod result;
pub mod risk;
pub mod run_dir;
pub mod selector;
pub mod stages;
pub mod validator;

pub use error::{AnalysisError, Result, Stage, StageContext};
pub use inference::infer_domains;
pub use parser::parse_risks;
pub use pipeline::{Gremlin, GremlinBuilder, DEFAULT_THRESHOLD};
pub use prompts::{build_prompt, SYSTEM_PROMPT};
pub use result::{AnalysisResult, RiskSummary};
pub use risk::{Risk, Severity};
pub use run_dir::RunDir;
pub use selector::{select_patterns, SelectedPatterns};
pub use stages::{IdeationResult, JudgmentResult, RolloutResult, UnderstandingResult, SCHEMA_VERSION};
pub use validator::{build_validation_prompt, ValidationOutcome, VALIDATION_SYSTEM_PROMPT};
