//! Circuit breaker behaviour seen through dispatch.

use larder_core::CallerIdentity;
use larder_mcp::ErrorKind;
use larder_resilience::CircuitState;
use serde_json::json;
use std::time::Duration;

use crate::common::TestHarness;

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_after_three_failures_then_probes_once() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher();
    let caller = CallerIdentity::demo("guest");
    let args = json!({"text": "oats"});

    harness.ai.set_failing(true);
    for _ in 0..3 {
        let result = dispatcher
            .dispatch("nutrition.ai.summarize", args.clone(), &caller)
            .await;
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(!err.message.contains("503"));
    }
    assert_eq!(harness.ai.calls(), 3);
    assert_eq!(harness.breakers.state("ai"), CircuitState::Open);

    // Fourth call is rejected without touching the service.
    let fourth = dispatcher
        .dispatch("nutrition.ai.summarize", args.clone(), &caller)
        .await;
    let err = fourth.error().unwrap();
    assert_eq!(err.kind, ErrorKind::CircuitOpen);
    assert!(err.retryable);
    assert_eq!(err.retry_after_ms, Some(30_000));
    assert_eq!(harness.ai.calls(), 3);

    // After the cool-down exactly one trial call runs and closes the breaker.
    tokio::time::advance(Duration::from_secs(30)).await;
    harness.ai.set_failing(false);
    let trial = dispatcher
        .dispatch("nutrition.ai.summarize", args.clone(), &caller)
        .await;
    assert_eq!(trial.data(), Some(&json!("summary of oats")));
    assert_eq!(harness.ai.calls(), 4);
    assert_eq!(harness.breakers.state("ai"), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_reopens_breaker() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher();
    let caller = CallerIdentity::demo("guest");
    let args = json!({"text": "milk"});

    harness.ai.set_failing(true);
    for _ in 0..3 {
        dispatcher
            .dispatch("nutrition.ai.summarize", args.clone(), &caller)
            .await;
    }

    tokio::time::advance(Duration::from_secs(30)).await;
    let trial = dispatcher
        .dispatch("nutrition.ai.summarize", args.clone(), &caller)
        .await;
    assert_eq!(trial.error_kind(), Some(&ErrorKind::Internal));
    assert_eq!(harness.ai.calls(), 4);

    let next = dispatcher
        .dispatch("nutrition.ai.summarize", args, &caller)
        .await;
    assert_eq!(next.error_kind(), Some(&ErrorKind::CircuitOpen));
    assert_eq!(harness.ai.calls(), 4);
}
