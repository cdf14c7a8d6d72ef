//! Waiting between cycles.

use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

const STEP: Duration = Duration::from_secs(1);

/// Why the wait between cycles ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The check interval elapsed.
    Interval,
    /// The trigger file appeared and was consumed.
    Trigger,
    /// Shutdown was requested.
    Shutdown,
}

/// Sleeps in one-second steps for `interval`.
///
/// Ends early when the trigger file appears (it is deleted) or when
/// `shutdown` turns true.
pub async fn wait_for_next_cycle(
    trigger: &Path,
    interval: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Wake {
    let steps = interval.as_secs().max(1);
    for _ in 0..steps {
        if *shutdown.borrow() {
            return Wake::Shutdown;
        }
        if take_trigger(trigger).await {
            return Wake::Trigger;
        }

        tokio::select! {
            () = tokio::time::sleep(STEP) => {}
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Wake::Shutdown;
                }
            }
        }
    }
    Wake::Interval
}

/// Returns true if the trigger file existed. Deletion failure is only logged.
async fn take_trigger(path: &Path) -> bool {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return false;
    }

    info!("Trigger file found, starting a new cycle");
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to delete trigger file {}: {e}", path.display());
    }
    true
}
