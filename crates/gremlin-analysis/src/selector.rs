use gremlin_core::{PatternCatalog, PatternCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Patterns chosen for one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SelectedPatterns {
    /// Every universal category, unconditionally
    #[serde(default)]
    pub universal: Vec<PatternCategory>,
    /// Domain name to its patterns, for matched domains present in the catalog
    #[serde(default)]
    pub domain: BTreeMap<String, Vec<String>>,
}

impl SelectedPatterns {
    /// Individual universal patterns across all categories
    pub fn universal_count(&self) -> usize {
        self.universal.iter().map(|c| c.patterns.len()).sum()
    }

    pub fn domain_count(&self) -> usize {
        self.domain.values().map(Vec::len).sum()
    }

    /// Total number of pattern statements handed to the engine
    pub fn pattern_count(&self) -> usize {
        self.universal_count() + self.domain_count()
    }

    /// Serialize as YAML with keys in a stable order
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Select the patterns relevant to an analysis.
///
/// `scope` is accepted for future filtering and currently unused. Matched
/// domains missing from the catalog are skipped.
pub fn select_patterns(
    _scope: &str,
    catalog: &PatternCatalog,
    matched_domains: &[String],
) -> SelectedPatterns {
    let mut domain = BTreeMap::new();
    for name in matched_domains {
        match catalog.domain(name) {
            Some(patterns) => {
                domain.insert(name.clone(), patterns.patterns.clone());
            }
            None => debug!(domain = %name, "Matched domain has no catalog entry"),
        }
    }

    SelectedPatterns {
        universal: catalog.universal.clone(),
        domain,
    }
}
