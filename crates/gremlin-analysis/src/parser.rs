// Parser for the engine's markdown risk report.
//
// Each section is run through independent extraction passes
// (header, title, scenario, impact, domains); a missing field skips
// silently and only the scenario/impact pair is mandatory.

use crate::risk::Risk;
use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n#{2,3}\s+").expect("valid section regex"));

static HEADER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:🔴|🟠|🟡|🟢)?\s*(?:\[)?(\w+)(?:\])?\s*\((\d+)%?\)")
        .expect("valid header regex")
});

static INLINE_BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));

static IMPACT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)-?\s*\*\*Impact:?\*\*\s*(.+)").expect("valid impact regex"));

static DOMAIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)-?\s*\*\*Domain:?\*\*\s*(.+)").expect("valid domain regex"));

/// Confidence used when the header number does not fit
pub const DEFAULT_CONFIDENCE: u32 = 50;

/// Lines after the heading searched for a title
const TITLE_SCAN_LINES: usize = 4;

/// Severity word and confidence from a section heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub severity: String,
    pub confidence: u32,
}

/// Split a response into heading-delimited sections, dropping the preamble
/// before the first `##`/`###` heading and any blank sections.
pub fn split_sections(response: &str) -> Vec<&str> {
    // A leading newline lets a heading on the very first line split too.
    // Offsets in `padded` are one past the matching offset in `response`.
    let padded = format!("\n{response}");
    let mut sections = Vec::new();
    let mut section_start = None;

    for m in SECTION_SPLIT.find_iter(&padded) {
        if let Some(start) = section_start {
            push_section(&mut sections, response, start, m.start() - 1);
        }
        section_start = Some(m.end() - 1);
    }
    if let Some(start) = section_start {
        push_section(&mut sections, response, start, response.len());
    }
    sections
}

fn push_section<'a>(sections: &mut Vec<&'a str>, response: &'a str, start: usize, end: usize) {
    let section = response[start..end].trim();
    if !section.is_empty() {
        sections.push(section);
    }
}

/// Parse a heading such as `🔴 CRITICAL (95%)` or `[HIGH] (85%)`
pub fn parse_header(line: &str) -> Option<SectionHeader> {
    let caps = HEADER_PATTERN.captures(line)?;
    let severity = caps.get(1)?.as_str().to_uppercase();
    let confidence = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .min(100);
    Some(SectionHeader {
        severity,
        confidence,
    })
}

/// First bold text in the few lines after the heading. Labeled
/// `**Impact:**`/`**Domain:**` bullets are not titles.
pub fn extract_title(body: &[&str]) -> Option<String> {
    for line in body.iter().take(TITLE_SCAN_LINES) {
        let line = line.trim();
        // Keeps untitled sections untitled so `to_markdown` output re-parses unchanged.
        if IMPACT_PATTERN.is_match(line) || DOMAIN_PATTERN.is_match(line) {
            continue;
        }
        if line.len() >= 4 && line.starts_with("**") && line.ends_with("**") {
            return Some(line.trim_matches('*').trim().to_string());
        }
        if let Some(caps) = INLINE_BOLD.captures(line) {
            return Some(caps[1].trim().to_string());
        }
    }
    None
}

/// First blockquote line, or failing that the first line opening with "what if"
pub fn extract_scenario(lines: &[&str]) -> Option<String> {
    lines.iter().find_map(|line| {
        let line = line.trim();
        if let Some(quoted) = line.strip_prefix('>') {
            Some(quoted.trim().to_string())
        } else if line.to_lowercase().starts_with("what if") {
            Some(line.to_string())
        } else {
            None
        }
    })
}

/// Remainder of the first `**Impact:**` line
pub fn extract_impact(lines: &[&str]) -> Option<String> {
    lines.iter().find_map(|line| {
        IMPACT_PATTERN
            .captures(line)
            .map(|caps| caps[1].trim().to_string())
    })
}

/// Comma-separated values of the first `**Domain:**` line
pub fn extract_domains(lines: &[&str]) -> Option<Vec<String>> {
    lines.iter().find_map(|line| {
        DOMAIN_PATTERN.captures(line).map(|caps| {
            caps[1]
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        })
    })
}

/// Parse one section. `None` when the heading is not a risk heading or the
/// scenario or impact is missing.
pub fn parse_section(section: &str, fallback_domains: &[String]) -> Option<Risk> {
    let lines: Vec<&str> = section.lines().collect();
    let (first, body) = lines.split_first()?;
    let header = parse_header(first)?;

    let scenario = extract_scenario(&lines).filter(|s| !s.is_empty())?;
    let impact = extract_impact(&lines).filter(|s| !s.is_empty())?;
    let domains = extract_domains(&lines)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| fallback_domains.to_vec());

    Some(Risk {
        severity: header.severity,
        confidence: header.confidence,
        scenario,
        impact,
        domains,
        title: extract_title(body).unwrap_or_default(),
    })
}

/// Parse an engine response into risks, in document order. Never fails;
/// malformed sections contribute nothing.
pub fn parse_risks(response: &str, fallback_domains: &[String]) -> Vec<Risk> {
    split_sections(response)
        .into_iter()
        .filter_map(|section| parse_section(section, fallback_domains))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "
## 🔴 CRITICAL (95%)

**Payment Race Condition**

> What if payment succeeds but order fails?

- **Impact:** Customer charged twice
- **Domain:** payments

### 🟠 HIGH (85%)

**Session Timeout**

> What if user session expires during checkout?

- **Impact:** Lost cart data
- **Domain:** auth, payments
";

    fn domains(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_well_formed_section() {
        let risks = parse_risks(SAMPLE, &[]);
        assert_eq!(risks.len(), 2);
        assert_eq!(
            risks[0],
            Risk {
                severity: "CRITICAL".to_string(),
                confidence: 95,
                scenario: "What if payment succeeds but order fails?".to_string(),
                impact: "Customer charged twice".to_string(),
                domains: domains(&["payments"]),
                title: "Payment Race Condition".to_string(),
            }
        );
        assert_eq!(risks[1].severity, "HIGH");
        assert_eq!(risks[1].domains, domains(&["auth", "payments"]));
    }

    #[test]
    fn test_split_handles_heading_on_first_line() {
        let text = "## HIGH (80%)\n> What if x?\n- **Impact:** y";
        assert_eq!(split_sections(text), vec!["HIGH (80%)\n> What if x?\n- **Impact:** y"]);
    }

    #[test]
    fn test_split_drops_preamble_and_level_one_headings() {
        let text = "# Report\nIntro text\n## LOW (10%)\nbody\n#### not a split\n";
        let sections = split_sections(text);
        assert_eq!(sections, vec!["LOW (10%)\nbody\n#### not a split"]);
    }

    #[test]
    fn test_header_variants() {
        let cases = [
            ("🔴 CRITICAL (95%)", "CRITICAL", 95),
            ("[HIGH] (85%)", "HIGH", 85),
            ("medium (70)", "MEDIUM", 70),
            ("  🟢 [Low] (5%) trailing", "LOW", 5),
        ];
        for (line, severity, confidence) in cases {
            let header = parse_header(line).unwrap_or_else(|| panic!("no match: {line}"));
            assert_eq!(header.severity, severity);
            assert_eq!(header.confidence, confidence);
        }
    }

    #[test]
    fn test_header_rejects_plain_headings() {
        assert!(parse_header("Summary").is_none());
        assert!(parse_header("Risks found").is_none());
        assert!(parse_header("CRITICAL 95%").is_none());
    }

    #[test]
    fn test_oversized_confidence_falls_back() {
        let header = parse_header("HIGH (99999999999999999999%)").unwrap();
        assert_eq!(header.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_title_variants() {
        assert_eq!(
            extract_title(&["", "**Full Bold**"]),
            Some("Full Bold".to_string())
        );
        assert_eq!(
            extract_title(&["Title: **Inline** rest"]),
            Some("Inline".to_string())
        );
        assert_eq!(extract_title(&["", "", "", "", "**Too Late**"]), None);
        assert_eq!(extract_title(&["plain"]), None);
        assert_eq!(extract_title(&["> What if?", "- **Impact:** bad"]), None);
    }

    #[test]
    fn test_scenario_prefers_first_match() {
        let lines = ["What if alpha?", "> What if beta?"];
        assert_eq!(extract_scenario(&lines), Some("What if alpha?".to_string()));

        let lines = ["intro", ">  What if quoted?  "];
        assert_eq!(extract_scenario(&lines), Some("What if quoted?".to_string()));

        assert_eq!(extract_scenario(&["no question here"]), None);
    }

    #[test]
    fn test_impact_and_domain_label_variants() {
        let lines = ["**impact** Plain label", "* **Domain:** a, b ,, c"];
        assert_eq!(extract_impact(&lines), Some("Plain label".to_string()));
        assert_eq!(extract_domains(&lines), Some(domains(&["a", "b", "c"])));
    }

    #[test]
    fn test_missing_domain_falls_back() {
        let text = "### [HIGH] (85%)\n> What if another scenario?\n- **Impact:** another impact";
        let risks = parse_risks(text, &domains(&["auth"]));
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].severity, "HIGH");
        assert_eq!(risks[0].domains, domains(&["auth"]));
    }

    #[test]
    fn test_section_without_scenario_or_impact_dropped() {
        let text = "## CRITICAL (90%)\n**Title**\nSome prose without the required fields.";
        assert!(parse_risks(text, &[]).is_empty());

        let no_impact = "## CRITICAL (90%)\n> What if x?\n- Impact: not bold";
        assert!(parse_risks(no_impact, &[]).is_empty());
    }

    #[test]
    fn test_plain_text_yields_nothing() {
        assert!(parse_risks("This is just plain text with no risk format.", &[]).is_empty());
        assert!(parse_risks("", &[]).is_empty());
        assert!(parse_risks("##\n###\n## \n", &[]).is_empty());
    }

    #[test]
    fn test_non_risk_sections_skipped() {
        let text = format!("## Summary\nNothing to see\n{SAMPLE}\n---\nValidated 2 of 2.");
        assert_eq!(parse_risks(&text, &[]).len(), 2);
    }
}
