//! parget-core - multi-connection download engine
//!
//! Probes a URL for size and range support, splits the resource into
//! byte ranges, fetches the ranges concurrently into one pre-sized
//! output file, and retries transient faults per range without
//! restarting the whole transfer.

mod engine;
mod error;
mod metadata;
mod plan;
mod progress;

pub use engine::*;
pub use error::*;
pub use metadata::*;
pub use plan::*;
pub use progress::*;

pub use tokio_util::sync::CancellationToken;
