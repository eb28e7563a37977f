//! Stage artifacts of the analysis pipeline.
//!
//! Each stage produces an immutable record that owns a copy of the record it
//! was built from, so any artifact reconstructs the full run history on its
//! own. Every record carries a schema version so artifacts written to disk stay
//! interpretable.

use crate::error::{AnalysisError, Result};
use crate::risk::Risk;
use crate::selector::SelectedPatterns;
use gremlin_core::Depth;
use serde::{Deserialize, Serialize};

/// Current artifact schema version
pub const SCHEMA_VERSION: &str = "1";

fn schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_threshold() -> u8 {
    80
}

fn check_version(version: &str) -> Result<()> {
    if version == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(AnalysisError::UnsupportedSchema {
            found: version.to_string(),
        })
    }
}

/// Output of Understanding: scope, matched domains and run parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderstandingResult {
    #[serde(default = "schema_version")]
    pub version: String,
    pub scope: String,
    #[serde(default)]
    pub matched_domains: Vec<String>,
    #[serde(default)]
    pub depth: Depth,
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default)]
    pub context: Option<String>,
}

impl UnderstandingResult {
    pub fn new(
        scope: impl Into<String>,
        matched_domains: Vec<String>,
        depth: Depth,
        threshold: u8,
        context: Option<String>,
    ) -> Self {
        Self {
            version: schema_version(),
            scope: scope.into(),
            matched_domains,
            depth,
            threshold,
            context,
        }
    }

    pub fn ensure_supported(&self) -> Result<()> {
        check_version(&self.version)
    }
}

/// Output of Ideation: the patterns selected for the matched domains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeationResult {
    #[serde(default = "schema_version")]
    pub version: String,
    pub understanding: UnderstandingResult,
    #[serde(default)]
    pub selected_patterns: SelectedPatterns,
    #[serde(default)]
    pub pattern_count: usize,
}

impl IdeationResult {
    pub fn new(understanding: UnderstandingResult, selected_patterns: SelectedPatterns) -> Self {
        let pattern_count = selected_patterns.pattern_count();
        Self {
            version: schema_version(),
            understanding,
            selected_patterns,
            pattern_count,
        }
    }

    pub fn ensure_supported(&self) -> Result<()> {
        check_version(&self.version)?;
        self.understanding.ensure_supported()
    }
}

/// Output of Rollout: the engine's unparsed answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutResult {
    #[serde(default = "schema_version")]
    pub version: String,
    pub ideation: IdeationResult,
    #[serde(default)]
    pub raw_response: String,
}

impl RolloutResult {
    pub fn new(ideation: IdeationResult, raw_response: impl Into<String>) -> Self {
        Self {
            version: schema_version(),
            ideation,
            raw_response: raw_response.into(),
        }
    }

    pub fn understanding(&self) -> &UnderstandingResult {
        &self.ideation.understanding
    }

    pub fn ensure_supported(&self) -> Result<()> {
        check_version(&self.version)?;
        self.ideation.ensure_supported()
    }
}

/// Output of Judgment: parsed (and possibly validated) risks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentResult {
    #[serde(default = "schema_version")]
    pub version: String,
    pub rollout: RolloutResult,
    /// Final [`Risk`] records. Judgment is the last stage, so the artifact
    /// stores the report type directly instead of a stage-local copy.
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub validation_summary: Option<String>,
    #[serde(default)]
    pub validated: bool,
}

impl JudgmentResult {
    pub fn new(
        rollout: RolloutResult,
        risks: Vec<Risk>,
        validation_summary: Option<String>,
        validated: bool,
    ) -> Self {
        Self {
            version: schema_version(),
            rollout,
            risks,
            validation_summary,
            validated,
        }
    }

    pub fn ensure_supported(&self) -> Result<()> {
        check_version(&self.version)?;
        self.rollout.ensure_supported()
    }

    pub fn understanding(&self) -> &UnderstandingResult {
        self.rollout.understanding()
    }

    pub fn scope(&self) -> &str {
        &self.understanding().scope
    }

    pub fn matched_domains(&self) -> &[String] {
        &self.understanding().matched_domains
    }

    pub fn depth(&self) -> Depth {
        self.understanding().depth
    }

    pub fn threshold(&self) -> u8 {
        self.understanding().threshold
    }

    pub fn context(&self) -> Option<&str> {
        self.understanding().context.as_deref()
    }

    pub fn pattern_count(&self) -> usize {
        self.rollout.ideation.pattern_count
    }

    pub fn raw_response(&self) -> &str {
        &self.rollout.raw_response
    }
}
