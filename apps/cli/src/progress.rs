//! Progress bar plumbing for verbose downloads

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use parget_core::ProgressUpdate;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Drive an indicatif bar from the engine's progress channel. The
/// returned handle is aborted by the caller once the transfer ends.
pub fn spawn_bar(
    mut rx: broadcast::Receiver<ProgressUpdate>,
    total: Option<u64>,
) -> (ProgressBar, JoinHandle<()>) {
    let bar = match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                    .unwrap()
                    .progress_chars("█▓▒░  "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap(),
            );
            pb
        }
    };

    let handle = tokio::spawn({
        let bar = bar.clone();
        async move {
            loop {
                match rx.recv().await {
                    Ok(update) => {
                        if let Some(total) = update.total {
                            bar.set_length(total);
                        }
                        bar.set_position(update.downloaded);
                        if update.total.is_none() {
                            bar.set_message(format!(
                                "{} ({}/s)",
                                HumanBytes(update.downloaded),
                                HumanBytes(update.speed)
                            ));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    (bar, handle)
}
