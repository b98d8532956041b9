//! HTTP implementation of [`EngineClient`]

use crate::engine::{
    ByteStream, EngineClient, EngineClientConfig, EngineError, RunRequest, RunResult,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

/// Engine client speaking HTTP to `/health`, `/run` and `/run/stream`
#[derive(Debug, Clone)]
pub struct HttpEngineClient {
    http: reqwest::Client,
    config: EngineClientConfig,
}

impl HttpEngineClient {
    /// Create a new HTTP engine client
    pub fn new(config: EngineClientConfig) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| EngineError::Unreachable {
                endpoint: config.base_url().to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &EngineClientConfig {
        &self.config
    }

    fn map_error(&self, e: reqwest::Error, timeout_secs: u64) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout(timeout_secs)
        } else if e.is_connect() || e.is_request() {
            EngineError::Unreachable {
                endpoint: self.config.base_url().to_string(),
                message: e.to_string(),
            }
        } else {
            EngineError::Stream(e.to_string())
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("Engine returned HTTP {}: {}", status, body);
        Err(EngineError::Status { status, body })
    }
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    async fn health(&self) -> Result<(), EngineError> {
        let url = self.config.url("/health");
        debug!("Probing engine at {}", url);
        let response = self
            .http
            .get(&url)
            .timeout(self.config.connect_timeout())
            .send()
            .await
            .map_err(|e| self.map_error(e, self.config.connect_timeout_secs))?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> Result<RunResult, EngineError> {
        let url = self.config.url("/run");
        debug!("Dispatching blocking run with {} nodes to {}", request.nodes.len(), url);
        let response = self
            .http
            .post(&url)
            .timeout(self.config.timeout())
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_error(e, self.config.timeout_secs))?;
        let response = Self::ensure_success(response).await?;
        response
            .json::<RunResult>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }

    async fn run_stream(&self, request: &RunRequest) -> Result<ByteStream, EngineError> {
        let url = self.config.url("/run/stream");
        debug!("Dispatching streaming run with {} nodes to {}", request.nodes.len(), url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_error(e, self.config.connect_timeout_secs))?;
        let response = Self::ensure_success(response).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| EngineError::Stream(e.to_string())));
        Ok(Box::pin(stream))
    }
}
