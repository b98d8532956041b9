//! Run coordinator - drives a single pipeline run against the engine

use crate::{
    core::{Pipeline, RunSnapshot, RunState, RunTracker},
    engine::{CompletePayload, EngineClient, EngineEvent, ErrorPayload, FrameDecoder, RunRequest},
    execution::{
        reconciler::NodeContentReconciler,
        sanitizer::{PromptGuard, PromptHistory, DEFAULT_HISTORY_CAPACITY},
        RunError,
    },
    graph::{preflight, GraphStore, Issue, SharedGraph},
};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pause between marking a node active and marking it completed
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Longest wait for the next piece of a streamed run
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub settle_delay: Duration,
    pub history_capacity: usize,
    pub idle_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_history_capacity(mut self, history_capacity: usize) -> Self {
        self.history_capacity = history_capacity;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

/// Progress notifications published while a run is in flight
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        snapshot: RunSnapshot,
        warnings: Vec<Issue>,
    },
    NodeActive {
        node_id: String,
        snapshot: RunSnapshot,
    },
    NodeCompleted {
        node_id: String,
        snapshot: RunSnapshot,
    },
    Finished {
        snapshot: RunSnapshot,
        error: Option<RunError>,
    },
}

impl RunEvent {
    pub fn snapshot(&self) -> &RunSnapshot {
        match self {
            RunEvent::Started { snapshot, .. }
            | RunEvent::NodeActive { snapshot, .. }
            | RunEvent::NodeCompleted { snapshot, .. }
            | RunEvent::Finished { snapshot, .. } => snapshot,
        }
    }
}

/// Type for run event handlers
pub type RunEventHandler = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// What a successful run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub messages: Vec<String>,
    pub results: Map<String, Value>,
    pub executed_nodes: Vec<String>,
    pub simulated_nodes: Vec<String>,
    /// Output nodes that received generated content
    pub patched_nodes: Vec<String>,
    /// Non-blocking pre-flight findings
    pub warnings: Vec<Issue>,
}

/// Releases the in-flight flag when a run attempt ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fails the run and unlocks the pipeline if a run is dropped before `finish`
struct RunGuard {
    tracker: Arc<Mutex<RunTracker>>,
    graph: SharedGraph,
    run_id: Uuid,
    armed: bool,
}

impl RunGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Run {} was abandoned, releasing the pipeline", self.run_id);

        if let (Ok(mut tracker), Ok(mut graph)) = (self.tracker.try_lock(), self.graph.try_write()) {
            abandon(&mut tracker, &mut graph, self.run_id);
            return;
        }

        let tracker = self.tracker.clone();
        let graph = self.graph.clone();
        let run_id = self.run_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut tracker = tracker.lock().await;
                    let mut graph = graph.write().await;
                    abandon(&mut tracker, &mut graph, run_id);
                });
            }
            Err(_) => warn!("No runtime to release run {}; pipeline stays read-only", run_id),
        }
    }
}

/// Fail `run_id` and unlock, unless a newer run has already begun
fn abandon(tracker: &mut RunTracker, graph: &mut GraphStore, run_id: Uuid) {
    if tracker.run_id != run_id {
        return;
    }
    if tracker.state == RunState::Running {
        tracker.fail();
    }
    graph.set_read_only(false);
}

/// A locked run, ready to dispatch
struct Prepared {
    pipeline: Pipeline,
    prompt: Option<String>,
    warnings: Vec<Issue>,
}

/// Drives runs of the shared pipeline against an execution engine
pub struct ExecutionCoordinator {
    graph: SharedGraph,
    engine: Arc<dyn EngineClient>,
    config: CoordinatorConfig,
    tracker: Arc<Mutex<RunTracker>>,
    history: Mutex<PromptHistory>,
    event_handlers: Mutex<Vec<RunEventHandler>>,
    in_flight: AtomicBool,
}

impl ExecutionCoordinator {
    pub fn new(graph: SharedGraph, engine: Arc<dyn EngineClient>, config: CoordinatorConfig) -> Self {
        let history = PromptHistory::new(config.history_capacity);
        Self {
            graph,
            engine,
            config,
            tracker: Arc::new(Mutex::new(RunTracker::new())),
            history: Mutex::new(history),
            event_handlers: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: RunEvent) {
        let handlers = self.event_handlers.lock().await.clone();
        for handler in handlers.iter() {
            handler(&event);
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub async fn state(&self) -> RunState {
        self.tracker.lock().await.state
    }

    pub async fn snapshot(&self) -> RunSnapshot {
        self.tracker.lock().await.snapshot()
    }

    /// Accepted prompts, oldest first
    pub async fn history(&self) -> Vec<String> {
        self.history.lock().await.entries()
    }

    fn claim(&self) -> Result<InFlight<'_>, RunError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.in_flight))
            .map_err(|_| RunError::Busy)
    }

    /// Run the pipeline, streaming progress from the engine
    pub async fn start(&self, prompt: Option<&str>) -> Result<RunSummary, RunError> {
        let _in_flight = self.claim()?;
        let prompt = self.prepare(prompt).await?;
        let (prepared, guard) = self.begin(prompt).await?;

        let request = RunRequest::new(prepared.pipeline, prepared.prompt);
        let outcome = self.stream_run(&request, prepared.warnings).await;
        self.finish(outcome, guard).await
    }

    /// Run the pipeline through the blocking endpoint
    ///
    /// Node progress is not reported; the response is handled like a single
    /// terminal stream event.
    pub async fn run_blocking(&self, prompt: Option<&str>) -> Result<RunSummary, RunError> {
        let _in_flight = self.claim()?;
        let prompt = self.prepare(prompt).await?;
        let (prepared, guard) = self.begin(prompt).await?;

        let request = RunRequest::new(prepared.pipeline, prepared.prompt);
        let outcome = match self.engine.run(&request).await {
            Ok(result) => match self.handle_event(result.into_event(), &prepared.warnings).await {
                Ok(Some(summary)) => Ok(summary),
                Ok(None) => Err(RunError::transport("Engine returned no terminal result")),
                Err(e) => Err(e),
            },
            Err(e) => Err(e.into()),
        };
        self.finish(outcome, guard).await
    }

    /// Local checks and the health check; no state changes
    ///
    /// Returns the accepted prompt, if any.
    async fn prepare(&self, prompt: Option<&str>) -> Result<Option<String>, RunError> {
        let report = preflight(&self.graph.read().await.pipeline());
        if !report.is_valid() {
            warn!("Pre-flight failed: {}", report.summary());
            return Err(RunError::Validation(report));
        }

        let prompt = match prompt.filter(|p| !p.trim().is_empty()) {
            Some(raw) => {
                let accepted = PromptGuard::check(raw).map_err(|rejection| RunError::InputRejected {
                    reason: rejection.reason().to_string(),
                })?;
                self.history.lock().await.push(accepted.clone());
                Some(accepted)
            }
            None => None,
        };

        if let Err(e) = self.engine.health().await {
            warn!("Engine health check failed: {}", e);
            return Err(e.into());
        }
        Ok(prompt)
    }

    /// Lock the pipeline, re-check the snapshot to dispatch, reset node states
    /// and enter `Running`
    ///
    /// The snapshot is taken under the same write guard that sets the lock, so
    /// edits made during the health check are checked too.
    async fn begin(&self, prompt: Option<String>) -> Result<(Prepared, RunGuard), RunError> {
        let (prepared, snapshot) = {
            let mut tracker = self.tracker.lock().await;
            let mut graph = self.graph.write().await;

            let pipeline = graph.pipeline();
            let report = preflight(&pipeline);
            if !report.is_valid() {
                warn!("Pipeline changed before dispatch: {}", report.summary());
                return Err(RunError::Validation(report));
            }
            for issue in &report.warnings {
                warn!("{}: {}", issue.code, issue.message);
            }

            graph.set_read_only(true);
            tracker.begin(pipeline.nodes.iter().map(|n| n.id.as_str()));
            let prepared = Prepared {
                pipeline,
                prompt,
                warnings: report.warnings,
            };
            (prepared, tracker.snapshot())
        };
        let guard = RunGuard {
            tracker: self.tracker.clone(),
            graph: self.graph.clone(),
            run_id: snapshot.run_id,
            armed: true,
        };

        info!(
            "Starting run {} of '{}' ({} nodes)",
            snapshot.run_id,
            prepared.pipeline.name,
            prepared.pipeline.nodes.len()
        );
        self.emit_event(RunEvent::Started {
            snapshot,
            warnings: prepared.warnings.clone(),
        })
        .await;
        Ok((prepared, guard))
    }

    async fn stream_run(&self, request: &RunRequest, warnings: Vec<Issue>) -> Result<RunSummary, RunError> {
        let idle = self.config.idle_timeout;
        let stalled = || RunError::transport(format!("Engine sent nothing for {:?}", idle));

        let mut stream = tokio::time::timeout(idle, self.engine.run_stream(request))
            .await
            .map_err(|_| stalled())??;
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = tokio::time::timeout(idle, stream.next())
            .await
            .map_err(|_| stalled())?
        {
            let chunk = chunk?;
            for event in decoder.feed(&chunk) {
                if let Some(summary) = self.handle_event(event?, &warnings).await? {
                    return Ok(summary);
                }
            }
        }

        if !decoder.is_idle() {
            return Err(RunError::transport("Stream ended in the middle of an event"));
        }
        Err(RunError::transport("Stream ended before the run completed"))
    }

    /// Apply one engine event; `Some` once the run has succeeded
    async fn handle_event(&self, event: EngineEvent, warnings: &[Issue]) -> Result<Option<RunSummary>, RunError> {
        match event {
            EngineEvent::NodeExecuting { node_id } => {
                self.settle(node_id).await;
                Ok(None)
            }
            EngineEvent::Complete(payload) => self.complete(payload, warnings).await.map(Some),
            EngineEvent::Error(payload) => Err(classify(payload)),
            other => {
                debug!("Ignoring engine event: {:?}", other);
                Ok(None)
            }
        }
    }

    /// Active, settle delay, Completed; the next event waits for this
    async fn settle(&self, node_id: String) {
        let snapshot = {
            let mut tracker = self.tracker.lock().await;
            if !tracker.activate(&node_id) {
                warn!("Engine reported unknown node '{}', skipping", node_id);
                return;
            }
            tracker.snapshot()
        };
        debug!("Node {} active", node_id);
        self.emit_event(RunEvent::NodeActive {
            node_id: node_id.clone(),
            snapshot,
        })
        .await;

        tokio::time::sleep(self.config.settle_delay).await;

        let snapshot = {
            let mut tracker = self.tracker.lock().await;
            tracker.complete(&node_id);
            tracker.snapshot()
        };
        self.emit_event(RunEvent::NodeCompleted { node_id, snapshot }).await;
    }

    async fn complete(&self, payload: CompletePayload, warnings: &[Issue]) -> Result<RunSummary, RunError> {
        let patched = {
            let mut graph = self.graph.write().await;
            NodeContentReconciler::reconcile(&mut graph, &payload)
        };

        let run_id = {
            let mut tracker = self.tracker.lock().await;
            tracker.clear_active();
            for id in &payload.simulated_nodes {
                if !tracker.simulate(id) {
                    warn!("Engine reported unknown simulated node '{}'", id);
                }
            }
            tracker.run_id
        };

        Ok(RunSummary {
            run_id,
            messages: payload.messages,
            results: payload.results,
            executed_nodes: payload.executed_nodes,
            simulated_nodes: payload.simulated_nodes,
            patched_nodes: patched,
            warnings: warnings.to_vec(),
        })
    }

    /// Enter the terminal state, unlock the pipeline and notify
    async fn finish(&self, outcome: Result<RunSummary, RunError>, guard: RunGuard) -> Result<RunSummary, RunError> {
        let snapshot = {
            let mut tracker = self.tracker.lock().await;
            match &outcome {
                Ok(_) => tracker.succeed(),
                Err(_) => tracker.fail(),
            }
            tracker.snapshot()
        };
        self.graph.write().await.set_read_only(false);
        guard.disarm();

        match &outcome {
            Ok(summary) => info!(
                "Run {} succeeded ({} nodes executed)",
                snapshot.run_id,
                summary.executed_nodes.len()
            ),
            Err(e) => warn!("Run {} failed: {}", snapshot.run_id, e),
        }

        self.emit_event(RunEvent::Finished {
            snapshot,
            error: outcome.as_ref().err().cloned(),
        })
        .await;
        outcome
    }
}

/// Split engine-reported failures into auth and generic errors
fn classify(payload: ErrorPayload) -> RunError {
    let message = payload.text();
    if payload.is_auth() {
        RunError::Auth {
            message,
            node_id: payload.node_id,
        }
    } else {
        RunError::Engine {
            message,
            node_id: payload.node_id,
        }
    }
}
