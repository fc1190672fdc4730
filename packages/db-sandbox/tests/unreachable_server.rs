//! Setup against a server that never answers.
//!
//! These run without a database: nothing listens on port 1.

mod common;

use std::time::{Duration, Instant};

use db_sandbox::{ProbePolicy, SandboxError};

#[tokio::test]
async fn small_probe_budget_fails_with_failed_to_connect() {
    let err = common::unreachable_builder()
        .probe_policy(ProbePolicy {
            max_attempts: 3,
            interval: Duration::from_millis(100),
            attempt_timeout: Duration::from_millis(100),
        })
        .setup()
        .await
        .unwrap_err();

    match &err {
        SandboxError::Unavailable { attempts, .. } => assert_eq!(*attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("failed to connect"), "{msg}");
    // the last driver error is kept, not replaced by a pool timeout
    assert!(msg.to_lowercase().contains("refused"), "{msg}");
}

#[tokio::test]
async fn default_probe_budget_is_bounded_in_time() {
    let started = Instant::now();
    let err = common::unreachable_builder().setup().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, SandboxError::Unavailable { attempts: 20, .. }), "{err}");
    // 20 attempts spaced 500ms apart: neither instant nor unbounded
    assert!(elapsed >= Duration::from_secs(8), "gave up too early: {elapsed:?}");
    assert!(elapsed <= Duration::from_secs(30), "took too long: {elapsed:?}");
}

#[tokio::test]
async fn invalid_port_fails_before_connecting() {
    let started = Instant::now();
    let err = db_sandbox::Sandbox::builder()
        .env_lookup(|name| (name == "MYSQL_PORT").then(|| "70000".to_string()))
        .setup()
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::Config { .. }), "{err}");
    assert!(started.elapsed() < Duration::from_secs(1));
}
