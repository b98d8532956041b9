//! Test: successful runs - progress, content and reruns

use crate::helpers::*;
use serde_json::json;
use snowflow::core::{Node, NodeRunState, Position, RunState, StepType};
use snowflow::engine::RunResult;
use snowflow::execution::{RunEvent, CONTENT_KEY};
use snowflow::graph::{self, GraphStore};
use std::sync::atomic::Ordering;

/// Linear revenue pipeline: every streamed node completes and the output gets the answer
#[tokio::test]
async fn test_revenue_run_succeeds() {
    let graph = shared_revenue();
    let engine = MockEngine::streaming(&revenue_stream());
    let requests = engine.requests();
    let coordinator = coordinator(graph.clone(), engine);

    let summary = coordinator
        .start(Some("What were sales last quarter?"))
        .await
        .unwrap();

    assert_eq!(coordinator.state().await, RunState::Success);
    let snapshot = coordinator.snapshot().await;
    assert_eq!(nodes_in(&snapshot, NodeRunState::Completed), vec!["n1", "n2", "n3"]);
    assert_eq!(snapshot.node_state("n4"), Some(NodeRunState::Unvisited));

    let store = graph.read().await;
    assert!(!store.is_read_only());
    assert_eq!(
        store.node("n4").unwrap().data.get(CONTENT_KEY),
        Some(&json!("Revenue rose 8%."))
    );
    assert_eq!(summary.patched_nodes, vec!["n4"]);
    assert_eq!(summary.executed_nodes, vec!["n1", "n2", "n3", "n4"]);
    assert_eq!(summary.messages, vec!["Workflow executed"]);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt.as_deref(), Some("What were sales last quarter?"));
    assert_eq!(requests[0].nodes.len(), 4);
    assert_eq!(coordinator.history().await, vec!["What were sales last quarter?"]);
}

/// Building the four-step pipeline edge by edge and asking for a revenue summary
#[tokio::test]
async fn test_summarize_revenue() {
    let mut store = GraphStore::new("Revenue summary");
    for (id, step_type, x) in [
        ("n1", StepType::Source, 0.0),
        ("n2", StepType::SemanticLayer, 200.0),
        ("n3", StepType::CompletionAgent, 400.0),
        ("n4", StepType::TerminalOutput, 600.0),
    ] {
        store.add_node(Node::new(id, step_type, Position::new(x, 0.0))).unwrap();
    }
    for (source, target) in [("n1", "n2"), ("n2", "n3"), ("n3", "n4")] {
        assert!(store.connect_nodes(source, target, None, None).is_ok(), "{} -> {}", source, target);
    }

    let graph = graph::shared(store);
    let engine = MockEngine::streaming(&[
        executing("n1"),
        executing("n2"),
        executing("n3"),
        complete(json!({"agent_response": "Revenue rose 8%."}), &["n1", "n2", "n3", "n4"]),
    ]);
    let requests = engine.requests();
    let coordinator = coordinator(graph.clone(), engine);

    coordinator.start(Some("Summarize revenue")).await.unwrap();

    let snapshot = coordinator.snapshot().await;
    assert_eq!(snapshot.state, RunState::Success);
    assert_eq!(nodes_in(&snapshot, NodeRunState::Completed), vec!["n1", "n2", "n3"]);
    assert_eq!(
        graph.read().await.node("n4").unwrap().data.get(CONTENT_KEY),
        Some(&json!("Revenue rose 8%."))
    );
    assert_eq!(requests.lock().unwrap()[0].prompt.as_deref(), Some("Summarize revenue"));
}

/// Every published snapshot has at most one active node, activated in stream order
#[tokio::test]
async fn test_single_active_node() {
    let coordinator = coordinator(shared_revenue(), MockEngine::streaming(&revenue_stream()));
    let recorder = Recorder::attach(&coordinator).await;

    coordinator.start(None).await.unwrap();

    for snapshot in recorder.snapshots() {
        assert!(snapshot.active_count() <= 1, "more than one active node: {:?}", snapshot);
    }
    assert_eq!(recorder.activation_order(), vec!["n1", "n2", "n3"]);

    let events = recorder.events();
    assert!(matches!(events.first(), Some(RunEvent::Started { .. })));
    assert!(matches!(events.last(), Some(RunEvent::Finished { error: None, .. })));
}

/// A second run starts from a clean slate and ends in the same state
#[tokio::test]
async fn test_rerun_resets_progress() {
    let graph = shared_revenue();
    let coordinator = coordinator(graph.clone(), MockEngine::streaming(&revenue_stream()));
    let recorder = Recorder::attach(&coordinator).await;

    coordinator.start(None).await.unwrap();
    let first = coordinator.snapshot().await;
    let first_data = graph.read().await.node("n4").unwrap().data.clone();

    coordinator.start(None).await.unwrap();
    let second = coordinator.snapshot().await;

    let started: Vec<_> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            RunEvent::Started { snapshot, .. } => Some(snapshot),
            _ => None,
        })
        .collect();
    assert_eq!(started.len(), 2);
    assert!(started[1].nodes.values().all(|s| *s == NodeRunState::Unvisited));
    assert_ne!(started[0].run_id, started[1].run_id);

    assert_eq!(first.nodes, second.nodes);
    assert_eq!(graph.read().await.node("n4").unwrap().data, first_data);
}

/// Higher-priority result keys win over the agent response
#[tokio::test]
async fn test_output_content_preferred() {
    let graph = shared_revenue();
    let stream = vec![
        executing("n1"),
        complete(
            json!({"agent_response": "raw answer", "output_content": "Formatted report"}),
            &["n1"],
        ),
    ];
    let coordinator = coordinator(graph.clone(), MockEngine::streaming(&stream));

    coordinator.start(None).await.unwrap();

    let store = graph.read().await;
    assert_eq!(
        store.node("n4").unwrap().data.get(CONTENT_KEY),
        Some(&json!("Formatted report"))
    );
}

/// Nodes the engine ran in demo mode are marked simulated
#[tokio::test]
async fn test_simulated_nodes_marked() {
    let mut done = complete(json!({"agent_response": "demo"}), &["n1", "n2", "n3"]);
    done["simulated_nodes"] = json!(["n3", "ghost"]);
    let stream = vec![executing("n1"), executing("n2"), done];
    let coordinator = coordinator(shared_revenue(), MockEngine::streaming(&stream));

    let summary = coordinator.start(None).await.unwrap();

    let snapshot = coordinator.snapshot().await;
    assert_eq!(snapshot.node_state("n3"), Some(NodeRunState::Simulated));
    assert_eq!(snapshot.node_state("n2"), Some(NodeRunState::Completed));
    assert_eq!(snapshot.node_state("ghost"), None);
    assert_eq!(summary.simulated_nodes, vec!["n3", "ghost"]);
}

/// Frames split across arbitrary chunk boundaries decode the same way
#[tokio::test]
async fn test_chunked_stream() {
    let body: String = revenue_stream().iter().map(frame).collect();
    let chunks = body
        .as_bytes()
        .chunks(7)
        .map(|c| Chunk::Data(c.to_vec()))
        .collect();
    let graph = shared_revenue();
    let coordinator = coordinator(graph.clone(), MockEngine::new(chunks));

    coordinator.start(None).await.unwrap();

    let snapshot = coordinator.snapshot().await;
    assert_eq!(nodes_in(&snapshot, NodeRunState::Completed), vec!["n1", "n2", "n3"]);
    assert!(graph.read().await.node("n4").unwrap().data.contains_key(CONTENT_KEY));
}

/// Node ids the pipeline does not contain are skipped
#[tokio::test]
async fn test_unknown_node_ignored() {
    let stream = vec![
        executing("n1"),
        executing("not-in-graph"),
        complete(json!({"agent_response": "ok"}), &["n1"]),
    ];
    let coordinator = coordinator(shared_revenue(), MockEngine::streaming(&stream));
    let recorder = Recorder::attach(&coordinator).await;

    coordinator.start(None).await.unwrap();

    assert_eq!(recorder.activation_order(), vec!["n1"]);
    assert_eq!(coordinator.state().await, RunState::Success);
}

/// The blocking endpoint patches content without per-node progress
#[tokio::test]
async fn test_blocking_run() {
    let graph = shared_revenue();
    let engine = MockEngine::new(Vec::new()).with_blocking_result(RunResult {
        success: true,
        error: Some(String::new()),
        auth_error: false,
        messages: vec!["Workflow executed".to_string()],
        results: json!({"agent_response": "Revenue rose 8%."})
            .as_object()
            .cloned()
            .unwrap(),
        executed_nodes: vec!["n1".into(), "n2".into(), "n3".into(), "n4".into()],
        simulated_nodes: Vec::new(),
    });
    let calls = engine.calls();
    let coordinator = coordinator(graph.clone(), engine);
    let recorder = Recorder::attach(&coordinator).await;

    let summary = coordinator.run_blocking(Some("What were sales last quarter?")).await.unwrap();

    assert_eq!(summary.patched_nodes, vec!["n4"]);
    assert!(recorder.activation_order().is_empty());
    assert_eq!(coordinator.state().await, RunState::Success);
    // health + run
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        graph.read().await.node("n4").unwrap().data.get(CONTENT_KEY),
        Some(&json!("Revenue rose 8%."))
    );
}
