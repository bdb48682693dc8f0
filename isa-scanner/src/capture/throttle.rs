//! Recognized-text throttling
//!
//! The recognizer reports text many times per second. Only the first frame
//! of each window reaches extraction; frames inside the window are dropped,
//! not queued, and do not extend the window.

use std::time::Duration;
use tracing::debug;

use super::RecognizedText;

/// Forwards at most one frame per `min_interval`
#[derive(Debug)]
pub struct TextThrottler {
    min_interval: Duration,
    last_forwarded: Option<std::time::Instant>,
}

impl TextThrottler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_forwarded: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Offer a frame; returns it back when it should be processed
    ///
    /// Elapsed time is measured between frame timestamps. A frame stamped
    /// before the last forwarded one counts as zero elapsed.
    pub fn offer(&mut self, frame: RecognizedText) -> Option<RecognizedText> {
        if let Some(last) = self.last_forwarded {
            let elapsed = frame.captured_at.saturating_duration_since(last);
            if elapsed < self.min_interval {
                debug!(
                    "Throttling frame ({}ms since last forwarded < {}ms)",
                    elapsed.as_millis(),
                    self.min_interval.as_millis()
                );
                return None;
            }
        }

        self.last_forwarded = Some(frame.captured_at);
        Some(frame)
    }

    /// Forget the window so the next frame is forwarded
    pub fn reset(&mut self) {
        self.last_forwarded = None;
    }
}
