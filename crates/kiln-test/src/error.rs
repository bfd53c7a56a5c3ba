//! Test error types.

use thiserror::Error;

/// Errors that can occur while driving an app under test.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be built.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// The response body is not what the caller asked for.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The handler took over the transport without sending anything.
    #[error("the handler took over the transport but sent no response")]
    NoResponse,
}
