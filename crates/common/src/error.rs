//! Unified error type for the race-weather service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad race-window input. Surfaced synchronously to the caller, never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Provider call failed: transport error, timeout, non-2xx, or undecodable
    /// payload. Aborts the current sync pass; the next scheduled pass retries.
    #[error("forecast fetch failed: {0}")]
    Fetch(String),

    /// Storage read or write failed. Aborts the current pass or fails the
    /// single-race reconciliation call.
    #[error("storage error: {0}")]
    Persistence(String),

    /// Reference to a race or forecast that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
