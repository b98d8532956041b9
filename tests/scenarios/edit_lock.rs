//! Test: the pipeline is read-only while a run is in flight

use crate::helpers::*;
use serde_json::json;
use snowflow::core::{Node, Position, RunState, StepType};
use snowflow::execution::{RunError, RunEvent, CONTENT_KEY};
use snowflow::graph::GraphError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Structural edits fail during a run, data patches and later edits succeed
#[tokio::test]
async fn test_structure_locked_during_run() {
    let graph = shared_revenue();
    let coordinator = coordinator(graph.clone(), MockEngine::streaming(&revenue_stream()));

    let attempts: Arc<Mutex<Vec<Result<(), GraphError>>>> = Arc::default();
    let handler_graph = graph.clone();
    let handler_attempts = attempts.clone();
    coordinator
        .add_event_handler(move |event| {
            if let RunEvent::NodeActive { node_id, .. } = event {
                if node_id != "n2" {
                    return;
                }
                let mut store = handler_graph.try_write().unwrap();
                let mut results = handler_attempts.lock().unwrap();
                results.push(store.add_node(Node::new("late", StepType::Router, Position::default())));
                results.push(store.remove_edge("e-n1-n2"));
                results.push(
                    store.update_node_data("n3", json!({"note": "edited"}).as_object().cloned().unwrap()),
                );
            }
        })
        .await;

    coordinator.start(None).await.unwrap();

    let attempts = attempts.lock().unwrap().clone();
    assert_eq!(attempts, vec![Err(GraphError::Locked), Err(GraphError::Locked), Ok(())]);

    let mut store = graph.write().await;
    assert!(!store.is_read_only());
    assert!(store.node("late").is_none());
    assert_eq!(store.node("n3").unwrap().data.get("note"), Some(&json!("edited")));
    assert!(store.node("n4").unwrap().data.contains_key(CONTENT_KEY));
    store
        .add_node(Node::new("late", StepType::Router, Position::default()))
        .unwrap();
}

/// The pipeline unlocks after a failed run too
#[tokio::test]
async fn test_unlocked_after_failure() {
    let graph = shared_revenue();
    let stream = vec![executing("n1"), json!({"type": "error", "error": "boom"})];
    let coordinator = coordinator(graph.clone(), MockEngine::streaming(&stream));

    coordinator.start(None).await.unwrap_err();

    assert!(!graph.read().await.is_read_only());
    graph.write().await.remove_edge("e-n1-n2").unwrap();
}

/// A second start while one is in flight is refused
#[tokio::test]
async fn test_concurrent_start_is_busy() {
    let coordinator = coordinator(shared_revenue(), MockEngine::streaming(&revenue_stream()));

    let (first, second) = tokio::join!(coordinator.start(None), coordinator.start(None));

    assert!(first.is_ok());
    assert!(matches!(second, Err(RunError::Busy)));

    // the flag is released once the first run ends
    coordinator.start(None).await.unwrap();
}

/// Edits made while the engine is being checked are validated before the lock
#[tokio::test]
async fn test_breaking_edit_during_health_check() {
    let graph = shared_revenue();
    let hook_graph = graph.clone();
    let engine = MockEngine::streaming(&revenue_stream()).on_health(move || {
        let orphan = Node::new("orphan_out", StepType::TerminalOutput, Position::default());
        hook_graph.try_write().unwrap().add_node(orphan).unwrap();
    });
    let requests = engine.requests();
    let coordinator = coordinator(graph.clone(), engine);

    let err = coordinator.start(None).await.unwrap_err();

    match err {
        RunError::Validation(report) => {
            assert_eq!(report.errors[0].code, "OUTPUT_DISCONNECTED");
            assert_eq!(report.errors[0].node_id.as_deref(), Some("orphan_out"));
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert!(requests.lock().unwrap().is_empty());
    assert_eq!(coordinator.state().await, RunState::Idle);
    assert!(!graph.read().await.is_read_only());
}

/// The dispatched pipeline is the one that was locked, not the one first checked
#[tokio::test]
async fn test_edit_during_health_check_is_dispatched() {
    let graph = shared_revenue();
    let hook_graph = graph.clone();
    let engine = MockEngine::streaming(&revenue_stream()).on_health(move || {
        let patch = json!({"model": "mistral-large"}).as_object().cloned().unwrap();
        hook_graph.try_write().unwrap().update_node_data("n3", patch).unwrap();
    });
    let requests = engine.requests();
    let coordinator = coordinator(graph.clone(), engine);

    coordinator.start(None).await.unwrap();

    let requests = requests.lock().unwrap();
    let agent = requests[0].nodes.iter().find(|n| n.id == "n3").unwrap();
    assert_eq!(agent.data.get("model"), Some(&json!("mistral-large")));
}

/// Dropping a run mid-stream fails it and unlocks the pipeline
#[tokio::test]
async fn test_abandoned_run_unlocks() {
    let graph = shared_revenue();
    let engine = MockEngine::new(vec![Chunk::Data(frame(&executing("n1")).into_bytes())]).stalling();
    let coordinator = coordinator(graph.clone(), engine);

    let abandoned = tokio::time::timeout(Duration::from_millis(50), coordinator.start(None)).await;
    assert!(abandoned.is_err());

    assert_eq!(coordinator.state().await, RunState::Error);
    assert!(!graph.read().await.is_read_only());
    graph.write().await.remove_edge("e-n1-n2").unwrap();
}
