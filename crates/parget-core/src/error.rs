//! Error types for the parget download engine

use reqwest::StatusCode;
use thiserror::Error;

/// Terminal errors surfaced by the engine.
///
/// Transient network faults never appear here directly; a worker
/// absorbs them into its retry loop and only escalates once its
/// budget is exhausted.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("metadata probe for {url} failed: {reason}")]
    Metadata { url: String, reason: String },

    #[error("range {index} (bytes {start}-{end}) failed after {attempts} attempts: {source}")]
    RangeExhausted {
        index: u32,
        start: u64,
        end: u64,
        attempts: u32,
        source: FetchError,
    },

    #[error("output file write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),

    #[error("range worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("download cancelled")]
    Cancelled,
}

/// Faults a worker treats as transient and retries from the byte
/// offset already committed to the file.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("server ignored the range request")]
    RangeNotHonored,

    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: u64, got: u64 },
}
