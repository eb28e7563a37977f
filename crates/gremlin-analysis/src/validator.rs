use crate::parser::parse_risks;
use gremlin_ai::LLMProvider;
use tracing::{debug, warn};

/// Instructions for the second-pass review call
pub const VALIDATION_SYSTEM_PROMPT: &str = "\
You are a senior QA reviewer auditing a list of risk scenarios produced by another analyst.

Check every risk against three quality gates:

1. Relevance: the risk must plausibly apply to the stated scope and its domains. \
Reject risks about components or technologies the scope never touches.
2. Specificity: the risk must name a concrete trigger and a concrete consequence for this feature. \
Reject generic or boilerplate risks that would apply to any software (\"what if the server crashes?\").
3. Duplicates: when two risks describe the same underlying failure, keep the stronger one and reject the duplicate.

Do not invent new risks and do not rewrite the ones you keep beyond fixing obvious formatting.

Output format: return the surviving risks in exactly the same markdown format you received \
(heading with severity and confidence, bold title, blockquoted \"What if\" question, \
**Impact:** and **Domain:** bullets). After the last risk, add a line containing only `---` \
followed by a one-paragraph validation summary stating how many risks were kept and why any were rejected.";

/// Build the user message for the validation call
pub fn build_validation_prompt(scope: &str, raw_response: &str) -> String {
    format!(
        "Validate the following risk analysis for the scope: **{scope}**\n\
         \n\
         Review each risk for relevance, specificity and duplication, then return only the risks \
         that pass, followed by the validation summary.\n\
         \n\
         ## Risks to review\n\
         \n\
         {raw_response}"
    )
}

/// Result of the optional second pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The reviewer answered; `response` replaces the first-pass text
    Applied {
        response: String,
        summary: Option<String>,
    },
    /// The reviewer failed; the first-pass text stands
    Skipped { reason: String },
}

impl ValidationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ValidationOutcome::Applied { .. })
    }
}

/// Text after the last `---` delimiter, if any
pub fn extract_summary(response: &str) -> Option<String> {
    response
        .rfind("---")
        .map(|idx| response[idx + 3..].trim().to_string())
        .filter(|summary| !summary.is_empty())
}

/// Run the review call. Never fails: a provider error, an empty reply or a
/// reply with no parseable risks and no summary becomes
/// [`ValidationOutcome::Skipped`].
pub async fn validate(provider: &dyn LLMProvider, scope: &str, raw_response: &str) -> ValidationOutcome {
    let prompt = build_validation_prompt(scope, raw_response);
    match provider.complete(VALIDATION_SYSTEM_PROMPT, &prompt).await {
        Ok(response) if response.content.trim().is_empty() => ValidationOutcome::Skipped {
            reason: "validator returned an empty response".to_string(),
        },
        Ok(response) => {
            let summary = extract_summary(&response.content);
            // A reply with neither risks nor a summary is a refusal or off-format
            // answer, not a review that rejected everything.
            if summary.is_none() && parse_risks(&response.content, &[]).is_empty() {
                debug!("Validator reply has no risks and no summary");
                return ValidationOutcome::Skipped {
                    reason: "validator returned no parseable risks".to_string(),
                };
            }
            debug!(has_summary = summary.is_some(), "Validation pass applied");
            ValidationOutcome::Applied {
                response: response.content,
                summary,
            }
        }
        Err(e) => {
            warn!(error = %e, "Validation failed, keeping unvalidated risks");
            ValidationOutcome::Skipped {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_ai::ScriptedProvider;

    #[test]
    fn test_system_prompt_covers_quality_gates() {
        let prompt = VALIDATION_SYSTEM_PROMPT.to_lowercase();
        assert!(prompt.len() > 100);
        for needle in ["relevan", "specific", "duplicate", "reject", "format", "return"] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_validation_prompt_includes_scope_and_risks() {
        let risks = "🔴 CRITICAL (95%)\nWhat if the JWT token is not validated on the server?";
        let prompt = build_validation_prompt("checkout flow with Stripe", risks);
        assert!(prompt.contains("checkout flow with Stripe"));
        assert!(prompt.contains("JWT token"));
        assert!(prompt.contains("Validate"));
        assert!(prompt.to_lowercase().contains("review"));
    }

    #[test]
    fn test_extract_summary_uses_last_delimiter() {
        assert_eq!(
            extract_summary("a\n---\nb\n---\nKept 1 of 2."),
            Some("Kept 1 of 2.".to_string())
        );
        assert_eq!(extract_summary("no delimiter"), None);
        assert_eq!(extract_summary("trailing ---   "), None);
    }

    #[tokio::test]
    async fn test_validate_applied() {
        let provider = ScriptedProvider::new(vec!["## HIGH (90%)\n> What if?\n---\nKept 1."]);
        let outcome = validate(&provider, "auth system", "raw").await;
        match outcome {
            ValidationOutcome::Applied { response, summary } => {
                assert!(response.starts_with("## HIGH"));
                assert_eq!(summary.as_deref(), Some("Kept 1."));
            }
            other => panic!("expected applied, got {other:?}"),
        }
        let call = &provider.calls()[0];
        assert_eq!(call.system_prompt.as_deref(), Some(VALIDATION_SYSTEM_PROMPT));
        assert!(call.user_message.contains("auth system"));
    }

    #[tokio::test]
    async fn test_validate_skipped_on_unparseable_reply() {
        let provider = ScriptedProvider::new(vec!["I'm sorry, I can't review these."]);
        let outcome = validate(&provider, "checkout", "raw").await;
        assert_eq!(
            outcome,
            ValidationOutcome::Skipped {
                reason: "validator returned no parseable risks".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_validate_all_rejected_is_applied() {
        let provider = ScriptedProvider::new(vec!["---\nRejected all 2 risks as generic."]);
        let outcome = validate(&provider, "checkout", "raw").await;
        match outcome {
            ValidationOutcome::Applied { summary, .. } => {
                assert_eq!(summary.as_deref(), Some("Rejected all 2 risks as generic."))
            }
            other => panic!("expected applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_skipped_on_error() {
        let provider = ScriptedProvider::failing("API rate limit");
        let outcome = validate(&provider, "checkout", "raw").await;
        assert!(!outcome.is_applied());
        match outcome {
            ValidationOutcome::Skipped { reason } => assert!(reason.contains("API rate limit")),
            other => panic!("expected skipped, got {other:?}"),
        }
    }
}
