use gremlin_ai::{LLMError, ScriptedProvider};
use gremlin_analysis::{Gremlin, RunDir, Stage, VALIDATION_SYSTEM_PROMPT};
use gremlin_core::Depth;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

const TWO_RISKS: &str = "
## 🔴 CRITICAL (95%)

**Payment Race Condition**

> What if payment succeeds but order fails?

- **Impact:** Customer charged twice
- **Domain:** payments

### 🟠 HIGH (85%)

**Webhook Replay**

> What if Stripe delivers the same webhook twice?

- **Impact:** Order fulfilled twice
- **Domain:** payments
";

const ONE_RISK_VALIDATED: &str = "
### 🔴 CRITICAL (95%)

**Payment Race Condition**

> What if payment succeeds but order fails?

- **Impact:** Customer charged twice
- **Domain:** payments

---
Kept 1 of 2 risks; the webhook risk duplicated the race condition.
";

fn gremlin(provider: &Arc<ScriptedProvider>) -> Gremlin {
    Gremlin::builder()
        .provider(provider.clone())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_checkout_end_to_end() {
    let provider = Arc::new(ScriptedProvider::new(vec![TWO_RISKS]));
    let result = gremlin(&provider)
        .analyze("checkout flow with Stripe", None, Depth::Quick, false)
        .await
        .unwrap();

    assert_eq!(result.risks.len(), 2);
    assert_eq!(result.critical_count(), 1);
    assert_eq!(result.high_count(), 1);
    assert!(result.matched_domains.contains(&"payments".to_string()));
    assert!(!result.validated);
    assert_eq!(result.raw_response, TWO_RISKS);
    assert_eq!(provider.call_count(), 1);

    let xml = result.to_junit();
    assert!(xml.contains("tests=\"2\" failures=\"2\""));
}

#[tokio::test]
async fn test_validation_replaces_first_pass() {
    let provider = Arc::new(ScriptedProvider::new(vec![TWO_RISKS, ONE_RISK_VALIDATED]));
    let result = gremlin(&provider)
        .analyze("checkout flow with Stripe", None, Depth::Quick, true)
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 2);
    assert_eq!(result.risks.len(), 1);
    assert!(result.validated);
    assert_eq!(
        result.validation_summary.as_deref(),
        Some("Kept 1 of 2 risks; the webhook risk duplicated the race condition.")
    );

    let calls = provider.calls();
    assert_eq!(calls[1].system_prompt.as_deref(), Some(VALIDATION_SYSTEM_PROMPT));
    assert!(calls[1].user_message.contains("checkout flow with Stripe"));
    assert!(calls[1].user_message.contains("Webhook Replay"));
}

#[tokio::test]
async fn test_validation_failure_matches_unvalidated_run() {
    let plain = Arc::new(ScriptedProvider::new(vec![TWO_RISKS]));
    let unvalidated = gremlin(&plain)
        .analyze("checkout", None, Depth::Quick, false)
        .await
        .unwrap();

    let failing = Arc::new(ScriptedProvider::from_results(vec![
        Ok(TWO_RISKS.to_string()),
        Err(LLMError::Api {
            provider: "scripted".to_string(),
            status: 429,
            body: "API rate limit".to_string(),
        }),
    ]));
    let degraded = gremlin(&failing)
        .analyze("checkout", None, Depth::Quick, true)
        .await
        .unwrap();

    assert_eq!(failing.call_count(), 2);
    assert!(!degraded.validated);
    assert_eq!(degraded, unvalidated);
}

#[tokio::test]
async fn test_unparseable_validation_reply_keeps_first_pass() {
    let plain = Arc::new(ScriptedProvider::new(vec![TWO_RISKS]));
    let unvalidated = gremlin(&plain)
        .analyze("checkout flow with Stripe", None, Depth::Quick, false)
        .await
        .unwrap();

    let refusing = Arc::new(ScriptedProvider::new(vec![
        TWO_RISKS,
        "I'm sorry, I can't review these.",
    ]));
    let result = gremlin(&refusing)
        .analyze("checkout flow with Stripe", None, Depth::Quick, true)
        .await
        .unwrap();

    assert_eq!(refusing.call_count(), 2);
    assert!(!result.validated);
    assert_eq!(result.risks.len(), 2);
    assert_eq!(result, unvalidated);
}

#[tokio::test]
async fn test_stage_by_stage_through_run_dir() {
    let dir = TempDir::new().unwrap();
    let run = RunDir::new(dir.path().join("run"));
    let provider = Arc::new(ScriptedProvider::new(vec![TWO_RISKS]));
    let gremlin = gremlin(&provider);

    let understanding = gremlin
        .understand("checkout flow with Stripe", Some("POST /charge"), Depth::Deep)
        .unwrap();
    run.save_understanding(&understanding).unwrap();

    let ideation = gremlin.ideate(run.load_understanding().unwrap()).unwrap();
    run.save_ideation(&ideation).unwrap();

    let rollout = gremlin.rollout(run.load_ideation().unwrap()).await.unwrap();
    run.save_rollout(&rollout).unwrap();

    let judgment = gremlin.judge(run.load_rollout().unwrap(), false).await.unwrap();
    run.save_judgment(&judgment).unwrap();

    let reloaded = run.load_judgment().unwrap();
    assert_eq!(reloaded, judgment);
    assert_eq!(reloaded.scope(), "checkout flow with Stripe");
    assert_eq!(reloaded.context(), Some("POST /charge"));
    assert_eq!(reloaded.depth(), Depth::Deep);
    assert_eq!(reloaded.risks.len(), 2);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_rollout_without_upstream_artifact() {
    let dir = TempDir::new().unwrap();
    let run = RunDir::new(dir.path());
    assert!(run.load_ideation().is_err());

    let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
    let err = gremlin(&provider)
        .analyze("checkout", None, Depth::Quick, false)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Rollout));
}
