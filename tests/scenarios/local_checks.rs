//! Test: pre-flight and prompt checks that never reach the engine

use crate::helpers::*;
use snowflow::core::{Node, Position, RunState, StepType};
use snowflow::execution::{RunError, RunEvent};
use snowflow::graph::{self, GraphStore};
use std::sync::atomic::Ordering;

/// An empty pipeline fails validation with zero network calls
#[tokio::test]
async fn test_empty_pipeline_rejected() {
    let engine = MockEngine::streaming(&revenue_stream());
    let calls = engine.calls();
    let coordinator = coordinator(graph::shared(GraphStore::new("empty")), engine);
    let recorder = Recorder::attach(&coordinator).await;

    let err = coordinator.start(Some("What were sales last quarter?")).await.unwrap_err();

    match err {
        RunError::Validation(report) => assert_eq!(report.errors[0].code, "EMPTY_GRAPH"),
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.state().await, RunState::Idle);
    assert!(recorder.events().is_empty());
    assert!(coordinator.history().await.is_empty());
}

/// An output with nothing feeding it blocks the run
#[tokio::test]
async fn test_disconnected_output_rejected() {
    let graph = shared_revenue();
    graph.write().await.remove_edge("e-n3-n4").unwrap();
    let engine = MockEngine::streaming(&revenue_stream());
    let calls = engine.calls();
    let coordinator = coordinator(graph, engine);

    let err = coordinator.start(None).await.unwrap_err();

    match err {
        RunError::Validation(report) => {
            assert!(report.errors.iter().any(|i| i.code == "OUTPUT_DISCONNECTED"));
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Shell commands are refused before anything is sent
#[tokio::test]
async fn test_shell_prompt_rejected() {
    let engine = MockEngine::streaming(&revenue_stream());
    let calls = engine.calls();
    let coordinator = coordinator(shared_revenue(), engine);

    let err = coordinator.start(Some("rm -rf / && echo done")).await.unwrap_err();

    assert!(matches!(err, RunError::InputRejected { .. }));
    assert!(err.is_local());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.state().await, RunState::Idle);
    assert!(coordinator.history().await.is_empty());
}

/// Too-short prompts are refused before anything is sent
#[tokio::test]
async fn test_short_prompt_rejected() {
    let engine = MockEngine::streaming(&revenue_stream());
    let calls = engine.calls();
    let coordinator = coordinator(shared_revenue(), engine);

    let err = coordinator.start(Some("hi")).await.unwrap_err();

    assert!(matches!(err, RunError::InputRejected { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// A blank prompt means "no prompt", not a rejection
#[tokio::test]
async fn test_blank_prompt_is_absent() {
    let engine = MockEngine::streaming(&revenue_stream());
    let requests = engine.requests();
    let coordinator = coordinator(shared_revenue(), engine);

    coordinator.start(Some("   ")).await.unwrap();

    assert_eq!(requests.lock().unwrap()[0].prompt, None);
    assert!(coordinator.history().await.is_empty());
}

/// Accepted prompts are trimmed and kept in history, oldest first
#[tokio::test]
async fn test_prompt_history() {
    let coordinator = coordinator(shared_revenue(), MockEngine::streaming(&revenue_stream()));

    coordinator.start(Some("  What were sales last quarter?  ")).await.unwrap();
    coordinator.start(Some("Which region grew fastest?")).await.unwrap();

    assert_eq!(
        coordinator.history().await,
        vec!["What were sales last quarter?", "Which region grew fastest?"]
    );
}

/// Warnings are published with the start event and do not block the run
#[tokio::test]
async fn test_warnings_do_not_block() {
    let graph = shared_revenue();
    graph
        .write()
        .await
        .add_node(Node::new("n9", StepType::CompletionFunction, Position::new(0.0, 300.0)))
        .unwrap();
    let coordinator = coordinator(graph, MockEngine::streaming(&revenue_stream()));
    let recorder = Recorder::attach(&coordinator).await;

    let summary = coordinator.start(None).await.unwrap();

    assert!(summary.warnings.iter().any(|i| i.code == "ORPHAN_NODE"));
    match recorder.events().first() {
        Some(RunEvent::Started { warnings, .. }) => {
            assert!(warnings.iter().any(|i| i.node_id.as_deref() == Some("n9")));
        }
        other => panic!("Expected started event, got {:?}", other),
    }
    assert_eq!(coordinator.state().await, RunState::Success);
}
