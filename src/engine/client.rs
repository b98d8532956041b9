//! Engine client configuration

use std::time::Duration;

/// Engine address used when none is configured
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Configuration for the execution engine client
#[derive(Debug, Clone)]
pub struct EngineClientConfig {
    /// Base URL of the engine, e.g. `http://localhost:8000`
    ///
    /// If not provided, defaults to [`DEFAULT_ENDPOINT`].
    pub endpoint: Option<String>,

    /// Timeout for blocking runs in seconds
    pub timeout_secs: u64,

    /// Timeout for the health check and connection setup in seconds
    pub connect_timeout_secs: u64,
}

impl Default for EngineClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 600,
            connect_timeout_secs: 5,
        }
    }
}

impl EngineClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout_secs: u64) -> Self {
        self.connect_timeout_secs = connect_timeout_secs;
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
    }

    /// Full URL for an engine path such as `/run/stream`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
