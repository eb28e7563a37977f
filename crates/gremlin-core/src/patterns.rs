//! Breaking-pattern catalog.
//!
//! A catalog holds universal pattern categories (applied to every analysis)
//! and domain-specific pattern sets keyed by domain name, each with the
//! trigger keywords used by domain inference. Catalogs are read from YAML and
//! several files can be merged into one session catalog.

use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const BUILTIN_PATTERNS: &str = include_str!("../patterns/breaking.yaml");
const PRIMARY_FILE: &str = "breaking.yaml";

/// A named group of universal patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCategory {
    pub category: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Trigger keywords and patterns for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DomainPatterns {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// The full set of breaking patterns available to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PatternCatalog {
    #[serde(default)]
    pub universal: Vec<PatternCategory>,
    /// Insertion-ordered: inference reports domains in this order.
    #[serde(default)]
    pub domain_specific: IndexMap<String, DomainPatterns>,
}

impl PatternCatalog {
    /// Parse a catalog from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_yaml(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn parse_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// The catalog shipped with the binary
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml_str(BUILTIN_PATTERNS)
    }

    /// Load a single catalog file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::parse_yaml(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Load and merge every pattern file in a directory.
    ///
    /// `breaking.yaml` is applied first, then the remaining `*.yaml`/`*.yml`
    /// files of the directory and of its `domains/` subdirectory in file-name
    /// order.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        if !dir.is_dir() {
            return Err(ConfigError::NotFound(dir.display().to_string()));
        }

        let mut files = Vec::new();
        let primary = dir.join(PRIMARY_FILE);
        if primary.is_file() {
            files.push(primary.clone());
        }
        files.extend(yaml_files_in(dir)?.into_iter().filter(|p| *p != primary));
        let domains_dir = dir.join("domains");
        if domains_dir.is_dir() {
            files.extend(yaml_files_in(&domains_dir)?);
        }

        if files.is_empty() {
            return Err(ConfigError::NotFound(format!(
                "no pattern files in {}",
                dir.display()
            )));
        }

        let mut catalog = Self::default();
        for file in &files {
            debug!(file = %file.display(), "Merging pattern file");
            catalog.merge(Self::load(file)?);
        }
        Ok(catalog)
    }

    /// Merge another catalog into this one.
    ///
    /// Categories and domains with the same name are unioned (order-preserving,
    /// duplicates dropped); new ones are appended.
    pub fn merge(&mut self, other: PatternCatalog) {
        for incoming in other.universal {
            match self
                .universal
                .iter_mut()
                .find(|c| c.category == incoming.category)
            {
                Some(existing) => extend_unique(&mut existing.patterns, incoming.patterns),
                None => self.universal.push(incoming),
            }
        }

        for (name, incoming) in other.domain_specific {
            match self.domain_specific.get_mut(&name) {
                Some(existing) => {
                    extend_unique(&mut existing.keywords, incoming.keywords);
                    extend_unique(&mut existing.patterns, incoming.patterns);
                }
                None => {
                    self.domain_specific.insert(name, incoming);
                }
            }
        }
    }

    /// Domain name to trigger keywords, in catalog order
    pub fn domain_keywords(&self) -> IndexMap<String, Vec<String>> {
        self.domain_specific
            .iter()
            .map(|(domain, cfg)| (domain.clone(), cfg.keywords.clone()))
            .collect()
    }

    pub fn domain(&self, name: &str) -> Option<&DomainPatterns> {
        self.domain_specific.get(name)
    }

    /// Look up a universal category by name, ignoring case and accepting
    /// `snake_case` spellings ("error_paths", "state_and_timing").
    pub fn universal_category(&self, name: &str) -> Option<&PatternCategory> {
        let wanted = name.to_lowercase();
        self.universal.iter().find(|c| {
            let lower = c.category.to_lowercase();
            lower == wanted || normalize_category(&c.category) == wanted
        })
    }

    /// Number of individual universal patterns across all categories
    pub fn universal_pattern_count(&self) -> usize {
        self.universal.iter().map(|c| c.patterns.len()).sum()
    }

    /// Number of individual patterns in the whole catalog
    pub fn total_pattern_count(&self) -> usize {
        self.universal_pattern_count()
            + self
                .domain_specific
                .values()
                .map(|d| d.patterns.len())
                .sum::<usize>()
    }
}

/// "State & Timing" -> "state_and_timing"
pub fn normalize_category(category: &str) -> String {
    category.to_lowercase().replace('&', "and").replace(' ', "_").replace("__", "_")
}

fn extend_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

fn yaml_files_in(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ConfigError::ReadError(format!("{}: {}", dir.display(), e)))?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    files.sort();
    Ok(files)
}
