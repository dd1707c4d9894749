//! Download coordinator - plans ranges, fans out workers, aggregates
//! results
//!
//! The coordinator owns nothing across calls: metadata and the range
//! plan live only for the duration of one `download` invocation.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use url::Url;

use crate::engine::range_worker::{RangeOutcome, RangeWorker};
use crate::error::DownloadError;
use crate::metadata::{self, ResourceMetadata};
use crate::plan::plan;
use crate::progress::{spawn_reporter, ProgressUpdate};

const USER_AGENT: &str = concat!("parget/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Caller-supplied parameters for one transfer. Read-only to the
/// engine; the file handle is cloned per worker so cursors never race.
pub struct DownloadConfig {
    pub metadata: ResourceMetadata,
    /// Requested part count; the effective count after planning may be
    /// lower (1 when ranges are unsupported or the size is unknown).
    pub parts: u32,
    /// Additional attempts each range may spend on transient faults.
    pub retry_limit: u32,
    pub verbose: bool,
    /// Open, writable handle the transfer writes into.
    pub output: std::fs::File,
    /// Observed at read and backoff suspension points.
    pub cancel: CancellationToken,
}

/// Terminal result of a successful transfer.
#[derive(Debug)]
pub struct TransferOutcome {
    pub total_bytes: u64,
    pub elapsed: Duration,
    /// Per-range completion reports, ordered by range index.
    pub ranges: Vec<RangeOutcome>,
}

/// The download engine. Owns the HTTP client and the progress channel;
/// everything per-transfer arrives through [`DownloadConfig`].
pub struct Downloader {
    client: Client,
    progress_tx: broadcast::Sender<ProgressUpdate>,
}

impl Downloader {
    pub fn new() -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(DownloadError::Client)?;
        let (progress_tx, _) = broadcast::channel(64);
        Ok(Self {
            client,
            progress_tx,
        })
    }

    /// Subscribe to progress updates for verbose transfers.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.progress_tx.subscribe()
    }

    /// Probe `url` for size, range support, and a file name.
    pub async fn probe(&self, url: &Url) -> Result<ResourceMetadata, DownloadError> {
        metadata::probe(&self.client, url).await
    }

    /// Run one transfer: plan ranges, pre-size the output, fan out one
    /// worker per range, and join them all before returning.
    ///
    /// Any worker exhausting its retry budget fails the whole transfer;
    /// bytes already written are left in place as a diagnostic artifact
    /// rather than rolled back.
    pub async fn download(
        &self,
        config: DownloadConfig,
    ) -> Result<TransferOutcome, DownloadError> {
        let started = Instant::now();

        // A reported length of zero is treated as unknown: compliant
        // servers answer an explicit range on an empty resource with
        // 416, so it must go down the plain single-stream path.
        let size = config.metadata.size.filter(|&s| s > 0);

        // No range support or unknown size degrades to a single stream,
        // still routed through the same worker path.
        let use_ranges = config.metadata.accepts_ranges && size.is_some();
        let ranges = if use_ranges {
            plan(size, config.parts)
        } else {
            plan(size, 1)
        };

        info!(
            url = %config.metadata.url,
            parts = ranges.len(),
            ?size,
            "starting download"
        );

        // Pre-size so concurrent writers never race on file growth.
        if let Some(size) = size {
            config.output.set_len(size)?;
        }

        // Child of the caller's token: a failing range must stop its
        // siblings without cancelling the caller's other transfers.
        let cancel = config.cancel.child_token();

        let counter = Arc::new(AtomicU64::new(0));
        let reporter = config.verbose.then(|| {
            let stop = cancel.child_token();
            let handle = spawn_reporter(
                counter.clone(),
                size,
                self.progress_tx.clone(),
                stop.clone(),
            );
            (handle, stop)
        });

        let mut tasks = JoinSet::new();
        for range in ranges {
            let file = config.output.try_clone().map(tokio::fs::File::from_std)?;
            let worker = RangeWorker::new(
                range,
                config.metadata.url.as_str().to_string(),
                file,
                self.client.clone(),
                use_ranges,
                config.retry_limit,
                counter.clone(),
                cancel.clone(),
            );
            tasks.spawn(worker.run());
        }

        // Unordered join: completion order carries no meaning, only
        // disjoint write spans do. The first terminal error cancels the
        // siblings, and every task is drained before returning.
        let mut outcomes: Vec<RangeOutcome> = Vec::new();
        let mut failure: Option<DownloadError> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(DownloadError::Cancelled)) => {
                    if failure.is_none() {
                        failure = Some(DownloadError::Cancelled);
                    }
                }
                Ok(Err(e)) => {
                    error!(error = %e, "range worker failed, aborting transfer");
                    cancel.cancel();
                    if matches!(failure, None | Some(DownloadError::Cancelled)) {
                        failure = Some(e);
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "range worker panicked");
                    cancel.cancel();
                    if matches!(failure, None | Some(DownloadError::Cancelled)) {
                        failure = Some(DownloadError::Join(join_err));
                    }
                }
            }
        }

        if let Some((handle, stop)) = reporter {
            stop.cancel();
            let _ = handle.await;
        }

        if let Some(err) = failure {
            return Err(err);
        }

        outcomes.sort_by_key(|o| o.range.index);
        let total_bytes = outcomes.iter().map(|o| o.bytes_written).sum();
        let elapsed = started.elapsed();
        info!(total_bytes, ?elapsed, "download complete");

        Ok(TransferOutcome {
            total_bytes,
            elapsed,
            ranges: outcomes,
        })
    }
}
