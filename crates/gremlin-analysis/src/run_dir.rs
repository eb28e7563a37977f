use crate::error::{AnalysisError, Result};
use crate::stages::{IdeationResult, JudgmentResult, RolloutResult, UnderstandingResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const UNDERSTANDING_FILE: &str = "understanding.json";
pub const IDEATION_FILE: &str = "scenarios.json";
pub const ROLLOUT_FILE: &str = "results.json";
pub const JUDGMENT_FILE: &str = "scores.json";

/// Directory holding one run's stage artifacts as pretty JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn understanding_path(&self) -> PathBuf {
        self.root.join(UNDERSTANDING_FILE)
    }

    pub fn ideation_path(&self) -> PathBuf {
        self.root.join(IDEATION_FILE)
    }

    pub fn rollout_path(&self) -> PathBuf {
        self.root.join(ROLLOUT_FILE)
    }

    pub fn judgment_path(&self) -> PathBuf {
        self.root.join(JUDGMENT_FILE)
    }

    pub fn save_understanding(&self, artifact: &UnderstandingResult) -> Result<PathBuf> {
        self.write(UNDERSTANDING_FILE, artifact)
    }

    pub fn save_ideation(&self, artifact: &IdeationResult) -> Result<PathBuf> {
        self.write(IDEATION_FILE, artifact)
    }

    pub fn save_rollout(&self, artifact: &RolloutResult) -> Result<PathBuf> {
        self.write(ROLLOUT_FILE, artifact)
    }

    pub fn save_judgment(&self, artifact: &JudgmentResult) -> Result<PathBuf> {
        self.write(JUDGMENT_FILE, artifact)
    }

    pub fn load_understanding(&self) -> Result<UnderstandingResult> {
        let artifact: UnderstandingResult = self.read(UNDERSTANDING_FILE)?;
        self.checked(UNDERSTANDING_FILE, artifact.ensure_supported())?;
        Ok(artifact)
    }

    pub fn load_ideation(&self) -> Result<IdeationResult> {
        let artifact: IdeationResult = self.read(IDEATION_FILE)?;
        self.checked(IDEATION_FILE, artifact.ensure_supported())?;
        Ok(artifact)
    }

    pub fn load_rollout(&self) -> Result<RolloutResult> {
        let artifact: RolloutResult = self.read(ROLLOUT_FILE)?;
        self.checked(ROLLOUT_FILE, artifact.ensure_supported())?;
        Ok(artifact)
    }

    pub fn load_judgment(&self) -> Result<JudgmentResult> {
        let artifact: JudgmentResult = self.read(JUDGMENT_FILE)?;
        self.checked(JUDGMENT_FILE, artifact.ensure_supported())?;
        Ok(artifact)
    }

    fn write<T: Serialize>(&self, file: &str, artifact: &T) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join(file);
        let json = serde_json::to_string_pretty(artifact)?;
        std::fs::write(&path, json)?;
        debug!(path = %path.display(), "Saved stage artifact");
        Ok(path)
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.root.join(file);
        if !path.exists() {
            return Err(AnalysisError::Artifact {
                path,
                reason: "not found".to_string(),
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|e| AnalysisError::Artifact {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| AnalysisError::Artifact {
            path,
            reason: format!("invalid JSON: {}", e),
        })
    }

    /// Attach the file name to a schema-version rejection
    fn checked(&self, file: &str, check: Result<()>) -> Result<()> {
        check.map_err(|e| AnalysisError::Artifact {
            path: self.root.join(file),
            reason: e.to_string(),
        })
    }
}
