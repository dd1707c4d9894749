//! Transport worker - fetches one byte range into its slice of the
//! output file
//!
//! Each worker owns a cloned file handle, so seeking never races a
//! sibling's cursor. Writes stay strictly inside the worker's span.

use std::io::SeekFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{DownloadError, FetchError};
use crate::plan::ByteRange;

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Completion report for one range.
#[derive(Debug)]
pub struct RangeOutcome {
    pub range: ByteRange,
    pub bytes_written: u64,
    pub attempts: u32,
}

enum AttemptError {
    /// Eligible for retry from the committed offset.
    Transient(FetchError),
    /// Local write failure or cancellation; never retried.
    Fatal(DownloadError),
}

/// Downloads one byte range, retrying transient faults from the byte
/// offset already committed to the file.
pub(crate) struct RangeWorker {
    range: ByteRange,
    url: String,
    file: File,
    client: Client,
    /// Whether the server honors Range headers. Without range support
    /// a retry cannot resume mid-span and restarts from the beginning.
    use_ranges: bool,
    retry_limit: u32,
    counter: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl RangeWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        range: ByteRange,
        url: String,
        file: File,
        client: Client,
        use_ranges: bool,
        retry_limit: u32,
        counter: Arc<AtomicU64>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            range,
            url,
            file,
            client,
            use_ranges,
            retry_limit,
            counter,
            cancel,
        }
    }

    /// Run the attempt loop until the span is fully written or the
    /// retry budget (`retry_limit` additional attempts) runs out.
    pub(crate) async fn run(mut self) -> Result<RangeOutcome, DownloadError> {
        let mut written: u64 = 0;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.attempt(&mut written).await {
                Ok(()) => {
                    info!(
                        range = self.range.index,
                        bytes = written,
                        attempts,
                        "range complete"
                    );
                    return Ok(RangeOutcome {
                        range: self.range,
                        bytes_written: written,
                        attempts,
                    });
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(fault)) => {
                    if attempts > self.retry_limit {
                        return Err(DownloadError::RangeExhausted {
                            index: self.range.index,
                            start: self.range.start,
                            end: self.range.end,
                            attempts,
                            source: fault,
                        });
                    }
                    let delay = backoff(attempts);
                    warn!(
                        range = self.range.index,
                        attempt = attempts,
                        error = %fault,
                        ?delay,
                        "range attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(DownloadError::Cancelled)
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn attempt(&mut self, written: &mut u64) -> Result<(), AttemptError> {
        if self.cancel.is_cancelled() {
            return Err(AttemptError::Fatal(DownloadError::Cancelled));
        }

        if !self.use_ranges && *written > 0 {
            // Full-stream restart: give back the bytes we counted so
            // the progress total stays truthful.
            self.counter.fetch_sub(*written, Ordering::AcqRel);
            *written = 0;
        }

        let offset = self.range.start + *written;
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| AttemptError::Fatal(DownloadError::Write(e)))?;

        let mut request = self.client.get(&self.url);
        let expect_partial = if self.use_ranges {
            let header = if self.range.is_open_ended() {
                format!("bytes={offset}-")
            } else {
                format!("bytes={}-{}", offset, self.range.end)
            };
            debug!(range = self.range.index, header = %header, "requesting");
            request = request.header(RANGE, header);
            true
        } else {
            false
        };

        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Transient(FetchError::Network(e)))?;

        let status = response.status();
        if expect_partial {
            if status != StatusCode::PARTIAL_CONTENT {
                // A 200 here means the server ignored the Range header;
                // writing a full body at this offset would corrupt the
                // file, so the attempt is abandoned before any write.
                let fault = if status == StatusCode::OK {
                    FetchError::RangeNotHonored
                } else {
                    FetchError::Status(status)
                };
                return Err(AttemptError::Transient(fault));
            }
        } else if !status.is_success() {
            return Err(AttemptError::Transient(FetchError::Status(status)));
        }

        let expected = (!self.range.is_open_ended()).then(|| self.range.size());
        let mut stream = response.bytes_stream();
        loop {
            let mut chunk = tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(AttemptError::Fatal(DownloadError::Cancelled))
                }
                next = stream.next() => match next {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        return Err(AttemptError::Transient(FetchError::Network(e)))
                    }
                    None => break,
                },
            };

            // A 206 body must never spill past the requested span: a
            // misbehaving server could otherwise overwrite a sibling's
            // bytes. Keep the in-span prefix, drop the rest.
            if let Some(expected) = expected {
                let remaining = expected.saturating_sub(*written);
                if chunk.len() as u64 > remaining {
                    warn!(
                        range = self.range.index,
                        "response body overruns the requested span, truncating"
                    );
                    chunk.truncate(remaining as usize);
                }
            }

            if !chunk.is_empty() {
                self.file
                    .write_all(&chunk)
                    .await
                    .map_err(|e| AttemptError::Fatal(DownloadError::Write(e)))?;

                *written += chunk.len() as u64;
                self.counter.fetch_add(chunk.len() as u64, Ordering::AcqRel);
            }

            if expected.is_some_and(|e| *written >= e) {
                break;
            }
        }

        self.file
            .flush()
            .await
            .map_err(|e| AttemptError::Fatal(DownloadError::Write(e)))?;

        if let Some(expected) = expected {
            if *written < expected {
                return Err(AttemptError::Transient(FetchError::ShortRead {
                    expected,
                    got: *written,
                }));
            }
        }

        Ok(())
    }
}

fn backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(5);
    (BACKOFF_BASE * 2u32.saturating_pow(exp)).min(BACKOFF_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(2));
        assert_eq!(backoff(20), BACKOFF_CAP);
    }
}
