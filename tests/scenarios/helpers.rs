//! Test utility functions for snowflow run scenarios
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use snowflow::core::{Node, NodeRunState, Position, RunSnapshot, StepType};
use snowflow::engine::{ByteStream, EngineClient, EngineError, RunRequest, RunResult};
use snowflow::execution::{CoordinatorConfig, ExecutionCoordinator, RunEvent};
use snowflow::graph::{self, GraphStore, SharedGraph};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One piece of a scripted response body
#[derive(Debug, Clone)]
pub enum Chunk {
    Data(Vec<u8>),
    Fail(String),
}

/// Runs while the engine answers a health check
pub type HealthHook = Arc<dyn Fn() + Send + Sync>;

/// Engine that replays a scripted stream and counts network calls
pub struct MockEngine {
    healthy: bool,
    on_health: Option<HealthHook>,
    script: Vec<Chunk>,
    stall: bool,
    blocking: Option<RunResult>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RunRequest>>>,
}

impl MockEngine {
    pub fn new(script: Vec<Chunk>) -> Self {
        Self {
            healthy: true,
            on_health: None,
            script,
            stall: false,
            blocking: None,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Engine whose whole stream arrives as one chunk per frame
    pub fn streaming(frames: &[Value]) -> Self {
        Self::new(frames.iter().map(|f| Chunk::Data(frame(f).into_bytes())).collect())
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new(Vec::new())
        }
    }

    /// Call `hook` during every health check
    pub fn on_health(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_health = Some(Arc::new(hook));
        self
    }

    /// Keep the stream open after the script runs out, sending nothing
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn with_blocking_result(mut self, result: RunResult) -> Self {
        self.blocking = Some(result);
        self
    }

    /// Shared counter of health, run and stream calls
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Shared log of run requests received
    pub fn requests(&self) -> Arc<Mutex<Vec<RunRequest>>> {
        self.requests.clone()
    }

    fn record(&self, request: &RunRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn health(&self) -> Result<(), EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_health {
            hook();
        }
        if self.healthy {
            Ok(())
        } else {
            Err(EngineError::Unreachable {
                endpoint: "mock://engine".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    async fn run(&self, request: &RunRequest) -> Result<RunResult, EngineError> {
        self.record(request);
        self.blocking
            .clone()
            .ok_or_else(|| EngineError::InvalidResponse("no blocking result scripted".to_string()))
    }

    async fn run_stream(&self, request: &RunRequest) -> Result<ByteStream, EngineError> {
        self.record(request);
        let items: Vec<Result<Bytes, EngineError>> = self
            .script
            .iter()
            .map(|chunk| match chunk {
                Chunk::Data(bytes) => Ok(Bytes::from(bytes.clone())),
                Chunk::Fail(message) => Err(EngineError::Stream(message.clone())),
            })
            .collect();
        let script = futures::stream::iter(items);
        if self.stall {
            Ok(script.chain(futures::stream::pending()).boxed())
        } else {
            Ok(script.boxed())
        }
    }
}

/// Encode one engine event as a stream frame
pub fn frame(event: &Value) -> String {
    format!("data: {}\n\n", event)
}

pub fn executing(node_id: &str) -> Value {
    json!({"type": "node_executing", "node_id": node_id})
}

pub fn complete(results: Value, executed: &[&str]) -> Value {
    json!({
        "type": "complete",
        "success": true,
        "messages": ["Workflow executed"],
        "results": results,
        "executed_nodes": executed,
    })
}

/// Source -> semantic model -> agent -> output
pub fn revenue_store() -> GraphStore {
    let mut store = GraphStore::new("Revenue Q&A");
    store
        .add_node(Node::new("n1", StepType::Source, Position::new(0.0, 0.0)).with_data("objectName", "ORDERS"))
        .unwrap();
    store
        .add_node(Node::new("n2", StepType::SemanticLayer, Position::new(200.0, 0.0)))
        .unwrap();
    store
        .add_node(
            Node::new("n3", StepType::CompletionAgent, Position::new(400.0, 0.0))
                .with_data("model", "llama3.1-70b"),
        )
        .unwrap();
    store
        .add_node(Node::new("n4", StepType::TerminalOutput, Position::new(600.0, 0.0)))
        .unwrap();
    store.connect_nodes("n1", "n2", None, None).unwrap();
    store.connect_nodes("n2", "n3", None, None).unwrap();
    store.connect_nodes("n3", "n4", None, None).unwrap();
    store
}

/// The happy-path stream for [`revenue_store`]
pub fn revenue_stream() -> Vec<Value> {
    vec![
        json!({"type": "start", "message": "Starting workflow execution..."}),
        executing("n1"),
        executing("n2"),
        json!({"type": "heartbeat", "elapsed": 3}),
        executing("n3"),
        complete(json!({"agent_response": "Revenue rose 8%."}), &["n1", "n2", "n3", "n4"]),
    ]
}

/// Coordinator with a tiny settle delay
pub fn coordinator(graph: SharedGraph, engine: MockEngine) -> ExecutionCoordinator {
    ExecutionCoordinator::new(
        graph,
        Arc::new(engine),
        CoordinatorConfig::new().with_settle_delay(Duration::from_millis(1)),
    )
}

pub fn shared_revenue() -> SharedGraph {
    graph::shared(revenue_store())
}

/// Records every snapshot published by a coordinator
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<RunEvent>>>,
}

impl Recorder {
    pub async fn attach(coordinator: &ExecutionCoordinator) -> Self {
        let recorder = Self::default();
        let events = recorder.events.clone();
        coordinator
            .add_event_handler(move |event| {
                events.lock().unwrap().push(event.clone());
            })
            .await;
        recorder
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn snapshots(&self) -> Vec<RunSnapshot> {
        self.events().iter().map(|e| e.snapshot().clone()).collect()
    }

    /// Node ids in the order they became active
    pub fn activation_order(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::NodeActive { node_id, .. } => Some(node_id),
                _ => None,
            })
            .collect()
    }
}

/// Node ids in a given state, sorted
pub fn nodes_in(snapshot: &RunSnapshot, wanted: NodeRunState) -> Vec<String> {
    snapshot
        .nodes
        .iter()
        .filter(|(_, state)| **state == wanted)
        .map(|(id, _)| id.clone())
        .collect()
}
