//! Event stream consumer
//!
//! Keeps one connection to the backend's event stream. Events are hints:
//! a new scan goes into the feed, everything else only asks for a refresh.
//! A dropped connection delays visibility until the next poll or reconnect
//! and never corrupts the mirror.

use chrono::Utc;
use futures::StreamExt;
use isa_common::events::{IsaEvent, ServerEvent};
use isa_common::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dashboard::Dashboard;

/// Exponential reconnect delay, doubling up to a ceiling
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

impl Dashboard {
    /// Consume the event stream, reconnecting until cancelled
    pub async fn run_stream(&self, cancel: CancellationToken) {
        let config = &self.inner.config;
        let mut backoff = Backoff::new(
            Duration::from_millis(config.reconnect_initial_ms),
            Duration::from_millis(config.reconnect_max_ms),
        );

        loop {
            let reason = match self.inner.backend.open_event_stream().await {
                Ok(mut events) => {
                    backoff.reset();
                    self.set_stream_connected(true).await;
                    info!("Event stream connected");
                    self.inner.events.emit_lossy(IsaEvent::StreamConnected { timestamp: Utc::now() });
                    // Catch up on anything missed while disconnected
                    self.request_refresh();

                    let reason = loop {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                self.set_stream_connected(false).await;
                                return;
                            }
                            next = events.next() => match next {
                                Some(Ok(event)) => self.handle_event(event).await,
                                Some(Err(Error::Decode(msg))) => {
                                    warn!("Skipping malformed event: {}", msg);
                                }
                                Some(Err(e)) => break e.to_string(),
                                None => break "closed by server".to_string(),
                            }
                        }
                    };
                    self.set_stream_connected(false).await;
                    reason
                }
                Err(e) => {
                    if e.is_auth_failure() {
                        error!("Event stream rejected the token: {}", e);
                    } else if !e.is_transient() {
                        error!("Event stream refused: {}", e);
                    }
                    e.to_string()
                }
            };

            if cancel.is_cancelled() {
                return;
            }

            let delay = backoff.next_delay();
            warn!(
                retry_in_ms = delay.as_millis() as u64,
                "Event stream disconnected: {}", reason
            );
            self.inner.events.emit_lossy(IsaEvent::StreamDisconnected {
                reason,
                retry_in_ms: delay.as_millis() as u64,
                timestamp: Utc::now(),
            });

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Apply one server event to the mirror
    pub async fn handle_event(&self, event: ServerEvent) {
        let refresh = event.invalidates_views();
        match event {
            ServerEvent::Scan { record, .. } => {
                let record_id = record.id;
                let feed_len = {
                    let mut state = self.inner.state.write().await;
                    state.feed_mut().push(record);
                    state.feed().len()
                };
                debug!(record_id, feed_len, "Scan added to feed");
                self.inner.events.emit_lossy(IsaEvent::FeedUpdated {
                    record_id,
                    feed_len,
                    timestamp: Utc::now(),
                });
            }
            ServerEvent::SessionDeleted { session_id } => {
                if self.inner.state.write().await.clear_if_selected(session_id) {
                    info!(session_id, "Selected session was deleted");
                }
            }
            ServerEvent::RecordUpdated { .. } | ServerEvent::RecordDeleted { .. } => {}
            ServerEvent::Ping => {}
            ServerEvent::Unknown => debug!("Ignoring unknown event type"),
        }
        if refresh {
            self.request_refresh();
        }
    }

    async fn set_stream_connected(&self, connected: bool) {
        self.inner.state.write().await.set_stream_connected(connected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_initial_above_ceiling_is_clamped() {
        let mut backoff = Backoff::new(Duration::from_secs(60), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }
}
