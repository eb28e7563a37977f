use colored::{ColoredString, Colorize};
use gremlin_analysis::{AnalysisResult, Risk, Severity};
use gremlin_core::PatternCatalog;

fn severity_label(risk: &Risk) -> ColoredString {
    let label = format!("{} ({}%)", risk.severity, risk.confidence);
    match risk.severity_level() {
        Some(Severity::Critical) => label.red().bold(),
        Some(Severity::High) => label.yellow().bold(),
        Some(Severity::Medium) => label.blue(),
        Some(Severity::Low) => label.green(),
        None => label.normal(),
    }
}

/// Colored terminal report
pub fn render_rich(result: &AnalysisResult) -> String {
    let mut out = Vec::new();
    out.push(String::new());
    out.push(format!("{} {}", "Risk Scenarios for:".bold(), result.scope));

    let domains = if result.matched_domains.is_empty() {
        "none".to_string()
    } else {
        result.matched_domains.join(", ")
    };
    out.push(
        format!(
            "Domains: {} | Patterns: {} | Depth: {} | Threshold: {}%",
            domains, result.pattern_count, result.depth, result.threshold
        )
        .dimmed()
        .to_string(),
    );
    out.push(String::new());

    if result.risks.is_empty() {
        out.push("No significant risks found.".green().to_string());
    }

    for (i, risk) in result.risks.iter().enumerate() {
        let title = if risk.title.is_empty() {
            String::new()
        } else {
            format!(" {}", risk.title.bold())
        };
        out.push(format!("{:>2}. {}{}", i + 1, severity_label(risk), title));
        out.push(format!("    {}", risk.scenario.italic()));
        out.push(format!("    {} {}", "Impact:".bold(), risk.impact));
        if !risk.domains.is_empty() {
            out.push(format!("    {}", format!("Domains: {}", risk.domains.join(", ")).dimmed()));
        }
        out.push(String::new());
    }

    let summary = result.summary();
    out.push(format!(
        "{} {} risks: {} critical, {} high, {} medium, {} low",
        "Summary:".bold(),
        summary.total_risks,
        summary.critical.to_string().red(),
        summary.high.to_string().yellow(),
        summary.medium,
        summary.low
    ));
    if result.validated {
        let note = result
            .validation_summary
            .as_deref()
            .unwrap_or("risks reviewed for relevance, specificity and duplicates");
        out.push(format!("{} {}", "Validated:".cyan(), note));
    }
    out.join("\n")
}

/// Universal categories and domains with their pattern counts
pub fn render_pattern_list(catalog: &PatternCatalog) -> String {
    let mut out = Vec::new();
    out.push(String::new());
    out.push("Universal Patterns".cyan().bold().to_string());
    out.push("Applied to every analysis".dimmed().to_string());
    out.push(String::new());
    out.push(format!("{:<28} {:>8}", "Category".bold(), "Patterns".bold()));
    for category in &catalog.universal {
        out.push(format!(
            "{:<28} {:>8}",
            category.category.cyan(),
            category.patterns.len()
        ));
    }

    out.push(String::new());
    out.push("Domain-Specific Patterns".green().bold().to_string());
    out.push("Applied when domain is detected in scope".dimmed().to_string());
    out.push(String::new());
    out.push(format!(
        "{:<20} {:>8}  {}",
        "Domain".bold(),
        "Patterns".bold(),
        "Keywords".bold()
    ));
    for (name, domain) in &catalog.domain_specific {
        let mut keywords = domain
            .keywords
            .iter()
            .take(4)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if domain.keywords.len() > 4 {
            keywords.push_str("...");
        }
        out.push(format!(
            "{:<20} {:>8}  {}",
            name.green(),
            domain.patterns.len(),
            keywords.dimmed()
        ));
    }
    out.push(String::new());
    out.push(
        "Use 'gremlin patterns show <domain>' for details"
            .dimmed()
            .to_string(),
    );
    out.join("\n")
}

/// Patterns of one universal category or domain; `None` when unknown
pub fn render_pattern_detail(catalog: &PatternCatalog, name: &str) -> Option<String> {
    let mut out = Vec::new();
    if let Some(category) = catalog.universal_category(name) {
        out.push(String::new());
        out.push(format!("Universal: {}", category.category).cyan().bold().to_string());
        out.push(String::new());
        for (i, pattern) in category.patterns.iter().enumerate() {
            out.push(format!("  {}. {}", i + 1, pattern));
        }
        return Some(out.join("\n"));
    }

    let domain = catalog.domain(name)?;
    out.push(String::new());
    out.push(name.to_uppercase().green().bold().to_string());
    out.push(
        format!("Keywords: {}", domain.keywords.join(", "))
            .dimmed()
            .to_string(),
    );
    out.push(String::new());
    for (i, pattern) in domain.patterns.iter().enumerate() {
        out.push(format!("  {}. {}", i + 1, pattern));
    }
    Some(out.join("\n"))
}

/// Names accepted by `patterns show`
pub fn available_pattern_names(catalog: &PatternCatalog) -> Vec<String> {
    catalog
        .domain_specific
        .keys()
        .cloned()
        .chain(
            catalog
                .universal
                .iter()
                .map(|c| gremlin_core::normalize_category(&c.category)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_pattern_list_truncates_keywords() {
        plain();
        let catalog = PatternCatalog::builtin().unwrap();
        let listing = render_pattern_list(&catalog);
        assert!(listing.contains("Universal Patterns"));
        assert!(listing.contains("payments"));
        assert!(listing.contains("..."));
    }

    #[test]
    fn test_pattern_detail_by_category_or_domain() {
        plain();
        let catalog = PatternCatalog::builtin().unwrap();
        assert!(render_pattern_detail(&catalog, "payments")
            .unwrap()
            .contains("PAYMENTS"));
        assert!(render_pattern_detail(&catalog, "input_validation")
            .unwrap()
            .contains("Universal: Input Validation"));
        assert!(render_pattern_detail(&catalog, "quantum").is_none());
        assert!(available_pattern_names(&catalog).contains(&"state_and_timing".to_string()));
    }

    #[test]
    fn test_rich_report_lists_risks() {
        plain();
        let risks = vec![Risk::new("CRITICAL", 95, "What if x?", "Bad").with_title("X")];
        let result = AnalysisResult::new("checkout", risks, vec!["payments".into()], 5);
        let text = render_rich(&result);
        assert!(text.contains("Risk Scenarios for: checkout"));
        assert!(text.contains(" 1. CRITICAL (95%) X"));
        assert!(text.contains("Summary: 1 risks: 1 critical"));
    }
}
