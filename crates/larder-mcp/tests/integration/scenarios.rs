//! End-to-end dispatch scenarios.

use larder_core::CallerIdentity;
use larder_mcp::{DispatchStatus, ErrorKind, Store};
use larder_resilience::{Limit, RateLimitConfig};
use serde_json::{Value, json};
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::common::TestHarness;

fn demo() -> CallerIdentity {
    CallerIdentity::demo("guest")
}

#[tokio::test]
async fn test_read_as_demo_succeeds_and_write_as_demo_is_denied() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher();

    let a = dispatcher.dispatch("a", Value::Null, &demo()).await;
    assert_eq!(a.data(), Some(&json!("a-ok")));

    let b = dispatcher.dispatch("b", json!({"name": "rice"}), &demo()).await;
    let err = b.error().expect("write as demo must fail");
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
    assert!(!err.retryable);
    assert_eq!(harness.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_write_as_authenticated_reaches_store() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher();

    let result = dispatcher
        .dispatch(
            "b",
            json!({"name": "rice"}),
            &CallerIdentity::authenticated("alice"),
        )
        .await;
    assert_eq!(result.data(), Some(&json!({"stored": "rice"})));
    assert_eq!(
        harness.store.get("items", "rice").await.unwrap(),
        Some(json!({"owner": "alice"}))
    );
}

#[tokio::test]
async fn test_write_as_demo_denied_regardless_of_arguments() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher();

    for args in [
        json!({"name": "rice"}),
        json!({}),
        json!({"name": 7, "extra": true}),
        json!("not an object"),
        Value::Null,
    ] {
        let result = dispatcher.dispatch("b", args, &demo()).await;
        assert_eq!(result.error_kind(), Some(&ErrorKind::PermissionDenied));
    }
}

#[tokio::test]
async fn test_rate_limit_two_per_window() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher_with_limit(
        RateLimitConfig::new(60, Duration::from_secs(60))
            .with_override("x", Limit::new(2, Duration::from_secs(60))),
    );
    let caller = demo();

    assert!(dispatcher.dispatch("x", Value::Null, &caller).await.is_success());
    assert!(dispatcher.dispatch("x", Value::Null, &caller).await.is_success());

    let third = dispatcher.dispatch("x", Value::Null, &caller).await;
    let err = third.error().expect("third call must be limited");
    assert_eq!(err.kind, ErrorKind::RateLimited);
    assert!(err.retryable);
    assert!(err.retry_after_ms.unwrap() > 0);

    // Other callers and other operations are unaffected.
    assert!(
        dispatcher
            .dispatch("x", Value::Null, &CallerIdentity::demo("other"))
            .await
            .is_success()
    );
    assert!(dispatcher.dispatch("a", Value::Null, &caller).await.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_window_reopens() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher_with_limit(RateLimitConfig::new(1, Duration::from_secs(10)));
    let caller = demo();

    assert!(dispatcher.dispatch("x", Value::Null, &caller).await.is_success());
    assert!(!dispatcher.dispatch("x", Value::Null, &caller).await.is_success());

    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(dispatcher.dispatch("x", Value::Null, &caller).await.is_success());
}

#[tokio::test]
async fn test_unknown_operation_counts_nothing_and_is_recorded() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher_with_limit(RateLimitConfig::new(5, Duration::from_secs(60)));

    let result = dispatcher.dispatch("z.y.x", json!({"q": 1}), &demo()).await;
    let err = result.error().expect("unknown operation must fail");
    assert_eq!(err.kind, ErrorKind::UnknownOperation);
    assert!(!err.retryable);

    let limiter = dispatcher.rate_limiter().unwrap();
    assert_eq!(limiter.current_count("guest", "z.y.x"), 0);
    assert_eq!(limiter.tracked_keys(), 0);

    let records = harness.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, "z.y.x");
    assert_eq!(records[0].status, DispatchStatus::Error);
    assert_eq!(records[0].error_kind, Some(ErrorKind::UnknownOperation));
}

#[tokio::test]
async fn test_every_dispatch_emits_one_record() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher();
    let caller = demo();

    dispatcher.dispatch("a", Value::Null, &caller).await;
    dispatcher.dispatch("b", Value::Null, &caller).await;
    dispatcher.dispatch("x", json!({"unexpected": 1}), &caller).await;
    dispatcher.dispatch("missing", Value::Null, &caller).await;

    let statuses: Vec<_> = harness.sink.records().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [
            DispatchStatus::Ok,
            DispatchStatus::Error,
            DispatchStatus::Error,
            DispatchStatus::Error
        ]
    );
}

#[tokio::test]
async fn test_list_operations_idempotent_and_ordered() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher();

    let first = dispatcher.list_operations();
    let second = dispatcher.list_operations();
    assert_eq!(first, second);

    let names: Vec<_> = first.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "x", "nutrition.ai.summarize"]);
    assert_eq!(first[1].argument_schema["required"], json!(["name"]));
}
