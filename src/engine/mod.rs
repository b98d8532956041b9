//! Execution engine client for dispatching pipelines

pub mod client;
pub mod decoder;
pub mod events;
pub mod http_client;
pub mod response;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use client::EngineClientConfig;
pub use decoder::{decode, DecodeError, FrameDecoder};
pub use events::{CompletePayload, EngineEvent, ErrorPayload, RunRequest};
pub use http_client::HttpEngineClient;
pub use response::{EngineError, RunResult};

/// Raw response body of a streaming run
pub type ByteStream = BoxStream<'static, Result<Bytes, EngineError>>;

/// Trait for engine access - allows for different implementations
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Liveness check; any error means the engine is not usable
    async fn health(&self) -> Result<(), EngineError>;

    /// Run a pipeline and wait for the final result
    async fn run(&self, request: &RunRequest) -> Result<RunResult, EngineError>;

    /// Run a pipeline and stream its progress frames
    async fn run_stream(&self, request: &RunRequest) -> Result<ByteStream, EngineError>;
}
