use crate::error::Result;
use crate::selector::SelectedPatterns;
use gremlin_core::Depth;
use std::path::Path;

/// Built-in base instructions for the rollout call
pub const SYSTEM_PROMPT: &str = include_str!("../prompts/system.md");

/// Read a base system prompt from disk
pub fn load_system_prompt(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// Compose the rollout prompt pair `(full_system, user_message)`.
///
/// Deterministic: identical inputs always produce identical prompts.
pub fn build_prompt(
    system_prompt: &str,
    selected: &SelectedPatterns,
    scope: &str,
    depth: Depth,
    threshold: u8,
    context: Option<&str>,
) -> Result<(String, String)> {
    let patterns_yaml = selected.to_yaml()?;

    let full_system = format!(
        "{system_prompt}\n\n## Available Breaking Patterns\n\n{patterns_yaml}\n"
    );

    let mut user_message = format!(
        "Analyze this scope for risks: **{scope}**\n\
         \n\
         Depth: {depth}\n\
         Confidence threshold: Only include scenarios where you're >{threshold}% confident this could actually happen.\n\
         \n\
         Apply the breaking patterns above. For each risk scenario:\n\
         1. State the \"what if?\" question\n\
         2. Explain the potential impact\n\
         3. Rate severity (critical/high/medium/low)\n\
         4. Provide your confidence percentage\n\
         \n\
         Focus on non-obvious risks. Skip generic advice."
    );

    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        user_message.push_str("\n\n## Additional Context\n\n");
        user_message.push_str(context);
    }

    Ok((full_system, user_message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::select_patterns;
    use gremlin_core::PatternCatalog;

    fn selected() -> SelectedPatterns {
        let catalog = PatternCatalog::builtin().unwrap();
        select_patterns("checkout", &catalog, &["payments".to_string()])
    }

    #[test]
    fn test_system_prompt_embeds_patterns() {
        let (system, _) =
            build_prompt("BASE", &selected(), "checkout", Depth::Quick, 80, None).unwrap();
        assert!(system.starts_with("BASE\n\n## Available Breaking Patterns\n\n"));
        assert!(system.contains("universal:"));
        assert!(system.contains("payments:"));
        assert!(system.contains("Input Validation"));
    }

    #[test]
    fn test_user_message_directives() {
        let (_, user) =
            build_prompt("BASE", &selected(), "checkout flow", Depth::Deep, 65, None).unwrap();
        assert!(user.starts_with("Analyze this scope for risks: **checkout flow**"));
        assert!(user.contains("Depth: deep"));
        assert!(user.contains(">65% confident"));
        assert!(user.contains("1. State the \"what if?\" question"));
        assert!(user.contains("4. Provide your confidence percentage"));
        assert!(user.ends_with("Skip generic advice."));
    }

    #[test]
    fn test_context_is_labeled() {
        let (_, user) = build_prompt(
            "BASE",
            &selected(),
            "checkout",
            Depth::Quick,
            80,
            Some("fn charge() {}"),
        )
        .unwrap();
        assert!(user.contains("## Additional Context\n\nfn charge() {}"));

        let (_, blank) =
            build_prompt("BASE", &selected(), "checkout", Depth::Quick, 80, Some("  ")).unwrap();
        assert!(!blank.contains("Additional Context"));
    }

    #[test]
    fn test_deterministic() {
        let a = build_prompt("BASE", &selected(), "s", Depth::Quick, 80, Some("c")).unwrap();
        let b = build_prompt("BASE", &selected(), "s", Depth::Quick, 80, Some("c")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_builtin_prompt_describes_format() {
        assert!(SYSTEM_PROMPT.contains("**Impact:**"));
        assert!(SYSTEM_PROMPT.contains("**Domain:**"));
    }
}
