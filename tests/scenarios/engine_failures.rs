//! Test: engine-reported and transport failures

use crate::helpers::*;
use serde_json::json;
use snowflow::core::{NodeRunState, RunState};
use snowflow::engine::RunResult;
use snowflow::execution::{CoordinatorConfig, ExecutionCoordinator, RunError, RunEvent};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

async fn run_failing(script: Vec<Chunk>) -> (RunError, snowflow::core::RunSnapshot, bool) {
    let graph = shared_revenue();
    let coordinator = coordinator(graph.clone(), MockEngine::new(script));
    let err = coordinator.start(None).await.unwrap_err();
    let locked = graph.read().await.is_read_only();
    (err, coordinator.snapshot().await, locked)
}

fn data(event: serde_json::Value) -> Chunk {
    Chunk::Data(frame(&event).into_bytes())
}

/// Flagged auth failures keep completed nodes and carry remediation
#[tokio::test]
async fn test_auth_error_event() {
    let (err, snapshot, locked) = run_failing(vec![
        data(executing("n1")),
        data(json!({
            "type": "error",
            "error": "Session token expired",
            "auth_error": true,
            "node_id": "n2"
        })),
    ])
    .await;

    match &err {
        RunError::Auth { message, node_id } => {
            assert_eq!(message, "Session token expired");
            assert_eq!(node_id.as_deref(), Some("n2"));
        }
        other => panic!("Expected auth error, got {:?}", other),
    }
    assert!(err.remediation().is_some());
    assert_eq!(snapshot.state, RunState::Error);
    assert_eq!(snapshot.node_state("n1"), Some(NodeRunState::Completed));
    assert_eq!(snapshot.node_state("n2"), Some(NodeRunState::Unvisited));
    assert!(!locked);
}

/// Unflagged errors mentioning authentication are still auth errors
#[tokio::test]
async fn test_auth_detected_from_text() {
    let (err, _, _) = run_failing(vec![data(json!({
        "type": "error",
        "message": "Authentication token is invalid"
    }))])
    .await;
    assert!(matches!(err, RunError::Auth { node_id: None, .. }));
}

/// Other engine errors are reported verbatim
#[tokio::test]
async fn test_engine_error_event() {
    let (err, snapshot, _) = run_failing(vec![
        data(executing("n1")),
        data(executing("n2")),
        data(json!({"type": "error", "error": "Warehouse query failed", "node_id": "n3"})),
    ])
    .await;

    assert_eq!(
        err.to_string(),
        "Engine error: Warehouse query failed"
    );
    assert_eq!(err.node_id(), Some("n3"));
    assert_eq!(nodes_in(&snapshot, NodeRunState::Completed), vec!["n1", "n2"]);
    assert_eq!(snapshot.active_count(), 0);
}

/// A broken connection mid-stream is a transport error
#[tokio::test]
async fn test_stream_failure() {
    let (err, snapshot, locked) = run_failing(vec![
        data(executing("n1")),
        Chunk::Fail("connection reset by peer".to_string()),
    ])
    .await;

    assert!(matches!(err, RunError::Transport { .. }));
    assert_eq!(snapshot.state, RunState::Error);
    assert_eq!(snapshot.node_state("n1"), Some(NodeRunState::Completed));
    assert!(!locked);
}

/// The stream closing without a terminal event is a transport error
#[tokio::test]
async fn test_stream_ends_early() {
    let (err, snapshot, _) = run_failing(vec![data(executing("n1")), data(executing("n2"))]).await;

    assert!(matches!(err, RunError::Transport { .. }));
    assert_eq!(nodes_in(&snapshot, NodeRunState::Completed), vec!["n1", "n2"]);
}

/// A trailing partial frame is not silently dropped
#[tokio::test]
async fn test_stream_ends_mid_frame() {
    let (err, _, _) = run_failing(vec![
        data(executing("n1")),
        Chunk::Data(b"data: {\"type\": \"comp".to_vec()),
    ])
    .await;

    match err {
        RunError::Transport { message } => assert!(message.contains("middle")),
        other => panic!("Expected transport error, got {:?}", other),
    }
}

/// A frame that is not valid JSON fails the run
#[tokio::test]
async fn test_malformed_frame() {
    let (err, snapshot, _) = run_failing(vec![
        data(executing("n1")),
        Chunk::Data(b"data: {not json}\n\n".to_vec()),
        data(complete(json!({"agent_response": "never seen"}), &["n1"])),
    ])
    .await;

    assert!(matches!(err, RunError::Transport { .. }));
    assert_eq!(snapshot.state, RunState::Error);
}

/// A failed health check changes nothing
#[tokio::test]
async fn test_health_failure_changes_nothing() {
    let graph = shared_revenue();
    let engine = MockEngine::unhealthy();
    let calls = engine.calls();
    let requests = engine.requests();
    let coordinator = coordinator(graph.clone(), engine);
    let recorder = Recorder::attach(&coordinator).await;

    let err = coordinator.start(None).await.unwrap_err();

    assert!(matches!(err, RunError::Transport { .. }));
    assert_eq!(coordinator.state().await, RunState::Idle);
    assert!(recorder.events().is_empty());
    assert!(!graph.read().await.is_read_only());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(requests.lock().unwrap().is_empty());
}

/// A failed blocking response maps to an engine error
#[tokio::test]
async fn test_blocking_failure() {
    let engine = MockEngine::new(Vec::new()).with_blocking_result(RunResult {
        success: false,
        error: Some("Agent failed to respond".to_string()),
        ..Default::default()
    });
    let coordinator = coordinator(shared_revenue(), engine);
    let recorder = Recorder::attach(&coordinator).await;

    let err = coordinator.run_blocking(None).await.unwrap_err();

    assert!(matches!(err, RunError::Engine { .. }));
    assert_eq!(coordinator.state().await, RunState::Error);
    match recorder.events().last() {
        Some(RunEvent::Finished { error: Some(e), .. }) => assert_eq!(e.to_string(), err.to_string()),
        other => panic!("Expected finished event, got {:?}", other),
    }
}

/// An engine that stops sending mid-run times out as a transport error
#[tokio::test]
async fn test_stalled_stream_times_out() {
    let graph = shared_revenue();
    let engine = MockEngine::new(vec![data(executing("n1"))]).stalling();
    let coordinator = ExecutionCoordinator::new(
        graph.clone(),
        Arc::new(engine),
        CoordinatorConfig::new()
            .with_settle_delay(Duration::from_millis(1))
            .with_idle_timeout(Duration::from_millis(50)),
    );

    let err = coordinator.start(None).await.unwrap_err();

    match &err {
        RunError::Transport { message } => assert!(message.starts_with("Engine sent nothing")),
        other => panic!("Expected transport error, got {:?}", other),
    }
    let snapshot = coordinator.snapshot().await;
    assert_eq!(snapshot.state, RunState::Error);
    assert_eq!(snapshot.node_state("n1"), Some(NodeRunState::Completed));
    assert!(!graph.read().await.is_read_only());
}

/// The blocking endpoint's auth flag is honoured
#[tokio::test]
async fn test_blocking_auth_failure() {
    let engine = MockEngine::new(Vec::new()).with_blocking_result(RunResult {
        success: false,
        error: Some("Agent failed to respond".to_string()),
        auth_error: true,
        ..Default::default()
    });
    let coordinator = coordinator(shared_revenue(), engine);

    let err = coordinator.run_blocking(None).await.unwrap_err();

    assert!(matches!(err, RunError::Auth { .. }));
    assert!(err.remediation().is_some());
    assert_eq!(coordinator.state().await, RunState::Error);
}
