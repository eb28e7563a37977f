use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity buckets a risk can fall into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Case-insensitive parse of a severity word
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CRITICAL" => Some(Severity::Critical),
            "HIGH" => Some(Severity::High),
            "MEDIUM" => Some(Severity::Medium),
            "LOW" => Some(Severity::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    /// CRITICAL and HIGH fail a CI gate
    pub fn is_high_severity(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::parse(s).ok_or_else(|| format!("unknown severity: {s}"))
    }
}

/// A single failure scenario extracted from the engine's output.
///
/// `severity` keeps the upper-cased word the engine used; words outside the
/// four known buckets survive parsing but count toward none of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub severity: String,
    pub confidence: u32,
    pub scenario: String,
    pub impact: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub title: String,
}

impl Risk {
    pub fn new(
        severity: impl Into<String>,
        confidence: u32,
        scenario: impl Into<String>,
        impact: impl Into<String>,
    ) -> Self {
        Self {
            severity: severity.into().to_uppercase(),
            confidence,
            scenario: scenario.into(),
            impact: impact.into(),
            domains: Vec::new(),
            title: String::new(),
        }
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn severity_level(&self) -> Option<Severity> {
        Severity::parse(&self.severity)
    }

    pub fn is_critical(&self) -> bool {
        self.severity_level() == Some(Severity::Critical)
    }

    pub fn is_high_severity(&self) -> bool {
        self.severity_level()
            .map(|s| s.is_high_severity())
            .unwrap_or(false)
    }
}
