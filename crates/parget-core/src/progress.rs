//! Periodic progress reporting off a shared byte counter

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
const SMOOTHING: f64 = 0.3;

/// A point-in-time progress sample published to subscribers.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub downloaded: u64,
    pub total: Option<u64>,
    /// Smoothed bytes-per-second estimate.
    pub speed: u64,
}

/// Sample `counter` every 500ms and publish smoothed updates until
/// `stop` fires. Workers only ever touch the atomic, so reporting can
/// never block the write path.
pub(crate) fn spawn_reporter(
    counter: Arc<AtomicU64>,
    total: Option<u64>,
    tx: broadcast::Sender<ProgressUpdate>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_downloaded = counter.load(Ordering::Acquire);
        let mut last_time = Instant::now();
        let mut smoothed: f64 = 0.0;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(SAMPLE_INTERVAL) => {}
            }

            let now = Instant::now();
            let downloaded = counter.load(Ordering::Acquire);
            let elapsed = now.duration_since(last_time).as_secs_f64();
            let instant = if elapsed > 0.0 {
                downloaded.saturating_sub(last_downloaded) as f64 / elapsed
            } else {
                0.0
            };
            smoothed = SMOOTHING * instant + (1.0 - SMOOTHING) * smoothed;

            let _ = tx.send(ProgressUpdate {
                downloaded,
                total,
                speed: smoothed as u64,
            });

            last_downloaded = downloaded;
            last_time = now;
        }

        // Final sample so subscribers see the terminal byte count.
        let _ = tx.send(ProgressUpdate {
            downloaded: counter.load(Ordering::Acquire),
            total,
            speed: 0,
        });
    })
}
