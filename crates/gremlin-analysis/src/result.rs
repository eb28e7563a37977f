use crate::risk::{Risk, Severity};
use crate::stages::JudgmentResult;
use gremlin_core::Depth;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Terminal output of one pipeline run.
///
/// Severity counts are derived from `risks` on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub scope: String,
    pub risks: Vec<Risk>,
    pub matched_domains: Vec<String>,
    pub pattern_count: usize,
    pub raw_response: String,
    pub depth: Depth,
    pub threshold: u8,
    pub validated: bool,
    pub validation_summary: Option<String>,
}

/// Counts block included in the JSON rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub total_risks: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Serialize)]
struct AnalysisReport<'a> {
    scope: &'a str,
    risks: &'a [Risk],
    matched_domains: &'a [String],
    pattern_count: usize,
    depth: Depth,
    threshold: u8,
    validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_summary: Option<&'a str>,
    summary: RiskSummary,
}

impl AnalysisResult {
    pub fn new(
        scope: impl Into<String>,
        risks: Vec<Risk>,
        matched_domains: Vec<String>,
        pattern_count: usize,
    ) -> Self {
        Self {
            scope: scope.into(),
            risks,
            matched_domains,
            pattern_count,
            raw_response: String::new(),
            depth: Depth::default(),
            threshold: 80,
            validated: false,
            validation_summary: None,
        }
    }

    /// Assemble the public result from a finished Judgment artifact
    pub fn from_judgment(judgment: &JudgmentResult) -> Self {
        Self {
            scope: judgment.scope().to_string(),
            risks: judgment.risks.clone(),
            matched_domains: judgment.matched_domains().to_vec(),
            pattern_count: judgment.pattern_count(),
            raw_response: judgment.raw_response().to_string(),
            depth: judgment.depth(),
            threshold: judgment.threshold(),
            validated: judgment.validated,
            validation_summary: judgment.validation_summary.clone(),
        }
    }

    fn count(&self, severity: Severity) -> usize {
        self.risks
            .iter()
            .filter(|r| r.severity_level() == Some(severity))
            .count()
    }

    pub fn critical_count(&self) -> usize {
        self.count(Severity::Critical)
    }

    pub fn high_count(&self) -> usize {
        self.count(Severity::High)
    }

    pub fn medium_count(&self) -> usize {
        self.count(Severity::Medium)
    }

    pub fn low_count(&self) -> usize {
        self.count(Severity::Low)
    }

    pub fn has_critical_risks(&self) -> bool {
        self.risks.iter().any(Risk::is_critical)
    }

    pub fn has_high_severity_risks(&self) -> bool {
        self.risks.iter().any(Risk::is_high_severity)
    }

    pub fn summary(&self) -> RiskSummary {
        RiskSummary {
            total_risks: self.risks.len(),
            critical: self.critical_count(),
            high: self.high_count(),
            medium: self.medium_count(),
            low: self.low_count(),
        }
    }

    fn report(&self) -> AnalysisReport<'_> {
        AnalysisReport {
            scope: &self.scope,
            risks: &self.risks,
            matched_domains: &self.matched_domains,
            pattern_count: self.pattern_count,
            depth: self.depth,
            threshold: self.threshold,
            validated: self.validated,
            validation_summary: self.validation_summary.as_deref(),
            summary: self.summary(),
        }
    }

    /// JSON summary: scope, risks, run parameters and severity counts
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self.report()).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report())
    }

    /// JUnit XML: one test case per risk; CRITICAL and HIGH become failures
    pub fn to_junit(&self) -> String {
        let failures = self.risks.iter().filter(|r| r.is_high_severity()).count();
        let classname = format!("gremlin.{}", self.scope.replace(' ', "_"));

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            xml,
            "<testsuite name=\"Gremlin QA Analysis\" tests=\"{}\" failures=\"{}\">",
            self.risks.len(),
            failures
        );

        for (i, risk) in self.risks.iter().enumerate() {
            let name = if risk.title.is_empty() {
                format!("risk_{}", i + 1)
            } else {
                risk.title.clone()
            };
            let _ = writeln!(
                xml,
                "  <testcase classname=\"{}\" name=\"{}\">",
                xml_escape(&classname),
                xml_escape(&name)
            );

            if risk.is_high_severity() {
                let _ = writeln!(
                    xml,
                    "    <failure message=\"{}\">",
                    xml_escape(&format!("{}: {}", risk.severity, risk.scenario))
                );
                let _ = writeln!(xml, "Severity: {}", xml_escape(&risk.severity));
                let _ = writeln!(xml, "Confidence: {}%", risk.confidence);
                let _ = writeln!(xml, "Impact: {}", xml_escape(&risk.impact));
                let _ = writeln!(xml, "Domains: {}", xml_escape(&risk.domains.join(", ")));
                xml.push_str("    </failure>\n");
            } else {
                xml.push_str("    <system-out>\n");
                let _ = writeln!(
                    xml,
                    "{} ({}%): {}",
                    xml_escape(&risk.severity),
                    risk.confidence,
                    xml_escape(&risk.scenario)
                );
                let _ = writeln!(xml, "Impact: {}", xml_escape(&risk.impact));
                xml.push_str("    </system-out>\n");
            }
            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>");
        xml
    }

    /// Compact digest for agent context windows
    pub fn format_for_llm(&self) -> String {
        if self.risks.is_empty() {
            return format!("No significant risks found for: {}", self.scope);
        }

        let mut parts = vec![
            format!("Risk Analysis for: {}", self.scope),
            format!(
                "Found {} risks ({} critical, {} high)",
                self.risks.len(),
                self.critical_count(),
                self.high_count()
            ),
            String::new(),
        ];

        for risk in &self.risks {
            parts.push(format!("[{}] {}", risk.severity, risk.scenario));
            parts.push(format!("  Impact: {}", risk.impact));
            if !risk.domains.is_empty() {
                parts.push(format!("  Domains: {}", risk.domains.join(", ")));
            }
            parts.push(String::new());
        }

        parts.join("\n")
    }

    /// Markdown report in the same section shape the parser reads
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Risk Analysis: {}\n", self.scope);

        let domains = if self.matched_domains.is_empty() {
            "none".to_string()
        } else {
            self.matched_domains.join(", ")
        };
        let _ = writeln!(
            md,
            "**Domains:** {} | **Patterns:** {} | **Depth:** {} | **Threshold:** {}%\n",
            domains, self.pattern_count, self.depth, self.threshold
        );

        if self.risks.is_empty() {
            md.push_str("No significant risks found.\n");
        }

        for risk in &self.risks {
            let _ = writeln!(
                md,
                "### {} {} ({}%)\n",
                severity_marker(risk),
                risk.severity,
                risk.confidence
            );
            if !risk.title.is_empty() {
                let _ = writeln!(md, "**{}**\n", risk.title);
            }
            let _ = writeln!(md, "> {}\n", risk.scenario);
            let _ = writeln!(md, "- **Impact:** {}", risk.impact);
            if !risk.domains.is_empty() {
                let _ = writeln!(md, "- **Domain:** {}", risk.domains.join(", "));
            }
            md.push('\n');
        }

        if let Some(summary) = &self.validation_summary {
            let _ = writeln!(md, "---\n\n_Validation:_ {}", summary);
        }

        md
    }
}

fn severity_marker(risk: &Risk) -> &'static str {
    match risk.severity_level() {
        Some(Severity::Critical) => "🔴",
        Some(Severity::High) => "🟠",
        Some(Severity::Medium) => "🟡",
        Some(Severity::Low) => "🟢",
        None => "⚪",
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
