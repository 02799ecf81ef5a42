//! Periodic eviction of idle sessions.
//!
//! Bounds store growth when participants never explicitly end their
//! conversation. Fires on wall-clock cadence while the process runs;
//! missed ticks are skipped, not replayed.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::session::SessionStore;

/// Handle to the background expiry sweep, owned by the process lifecycle.
#[derive(Debug)]
pub struct SweepTask {
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Spawn the sweep, evicting sessions idle longer than `max_age`
    /// every `interval`.
    pub fn spawn(store: SessionStore, interval: Duration, max_age: chrono::Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; skip it so the sweep
            // only runs on cadence.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = store.sweep_expired(max_age).await;
                if removed > 0 {
                    tracing::info!(removed, "Cleaned up expired conversation sessions");
                } else {
                    tracing::debug!("Expiry sweep found nothing to remove");
                }
            }
        });

        Self { handle }
    }

    /// Cancel the sweep.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}
