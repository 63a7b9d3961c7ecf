//! Failure taxonomy for the telemetry pipeline.
//!
//! Helpers return these; `Reporter::init` / `Reporter::send` are terminal
//! catch points that log and convert them into outcome enums, so nothing in
//! this module ever crosses the public delivery boundary as an `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The request never produced a response (connect failure, timeout,
    /// protocol error). Retried by the backoff executor up to its ceiling.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-success status after backoff was
    /// exhausted (or returned a non-retryable status immediately).
    #[error("server returned status {0}")]
    Status(u16),

    /// Local key-value store access or (de)serialization failed. Callers
    /// log this and continue without caching.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A capability the enrichment step needs is unavailable, e.g. no
    /// browser descriptor source.
    #[error("couldn't retrieve {0}")]
    Capability(&'static str),
}

impl TelemetryError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for TelemetryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
