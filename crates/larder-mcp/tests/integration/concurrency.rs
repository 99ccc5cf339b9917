//! Concurrent dispatch.

use larder_core::CallerIdentity;
use larder_mcp::ErrorKind;
use larder_resilience::RateLimitConfig;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::common::TestHarness;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch_never_overshoots_limit() {
    let harness = TestHarness::new();
    let dispatcher = Arc::new(
        harness.dispatcher_with_limit(RateLimitConfig::new(25, Duration::from_secs(3600))),
    );

    let mut handles = Vec::new();
    for _ in 0..100 {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            dispatcher
                .dispatch("x", Value::Null, &CallerIdentity::demo("guest"))
                .await
        }));
    }

    let mut admitted = 0;
    let mut limited = 0;
    for handle in handles {
        let result = handle.await.unwrap();
        match result.error_kind() {
            None => admitted += 1,
            Some(ErrorKind::RateLimited) => limited += 1,
            Some(other) => panic!("unexpected error kind {other}"),
        }
    }
    assert_eq!(admitted, 25);
    assert_eq!(limited, 75);
    assert_eq!(harness.sink.len(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_from_many_callers() {
    let harness = TestHarness::new();
    let dispatcher = Arc::new(harness.dispatcher());

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let caller = CallerIdentity::authenticated(format!("user-{i}"));
                dispatcher
                    .dispatch("b", serde_json::json!({"name": format!("item-{i}")}), &caller)
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_success());
    }
    assert_eq!(harness.store.len("items"), 20);
}
