//! Poll loop and task wiring
//!
//! Two independent triggers feed [`Dashboard::refresh`]: a fixed-cadence
//! timer and refresh requests raised by stream events, selection changes and
//! review operations. Both run until the cancellation token fires.

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dashboard::Dashboard;

impl Dashboard {
    /// Run the poll loop and the event stream consumer until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting dashboard sync (poll every {}ms, feed of {})",
            self.inner.config.poll_interval_ms, self.inner.config.feed_capacity
        );
        tokio::join!(self.run_poller(cancel.clone()), self.run_stream(cancel));
        info!("Dashboard sync stopped");
    }

    /// Refresh on every tick and on every refresh request
    pub async fn run_poller(&self, cancel: CancellationToken) {
        let mut timer = interval(self.inner.config.poll_interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
                _ = self.inner.refresh_requested.notified() => {
                    debug!("Out-of-cycle refresh requested");
                }
            }

            // Failures are logged inside refresh; the next trigger retries
            let _ = self.refresh().await;
        }
    }
}
