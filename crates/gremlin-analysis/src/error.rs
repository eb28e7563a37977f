use gremlin_ai::LLMError;
use gremlin_core::ConfigError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage identifiers, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Understanding,
    Ideation,
    Rollout,
    Judgment,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Understanding,
        Stage::Ideation,
        Stage::Rollout,
        Stage::Judgment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Understanding => "understanding",
            Stage::Ideation => "ideation",
            Stage::Rollout => "rollout",
            Stage::Judgment => "judgment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("[{stage} stage] {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<AnalysisError>,
    },

    #[error(transparent)]
    Provider(#[from] LLMError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("Unsupported artifact schema version: {found}")]
    UnsupportedSchema { found: String },

    #[error("No reasoning engine configured")]
    MissingProvider,

    #[error("Background analysis task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AnalysisError {
    /// Tag an error with the stage that produced it. Errors already tagged by
    /// a nested stage are returned unchanged.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            tagged @ AnalysisError::Stage { .. } => tagged,
            other => AnalysisError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage that failed, if the error has been tagged
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AnalysisError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The untagged cause
    pub fn root(&self) -> &AnalysisError {
        match self {
            AnalysisError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension for tagging `Result`s with a stage
pub trait StageContext<T> {
    fn in_stage(self, stage: Stage) -> Result<T>;
}

impl<T, E> StageContext<T> for std::result::Result<T, E>
where
    E: Into<AnalysisError>,
{
    fn in_stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| {
            let err: AnalysisError = e.into();
            err.in_stage(stage)
        })
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
