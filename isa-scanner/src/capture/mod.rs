//! Capture pipeline: recognized text → throttle → extraction → preview
//!
//! The pipeline never touches the batch. It keeps the most recent non-empty
//! extraction as a preview; the operator's capture action turns that
//! preview into a batch.

mod extractor;
mod throttle;

pub use extractor::CandidateExtractor;
pub use throttle::TextThrottler;

use isa_common::config::ScannerConfig;
use serde::Serialize;
use std::time::Instant;

/// One snapshot from the text recognizer
#[derive(Debug, Clone)]
pub struct RecognizedText {
    pub text: String,
    pub captured_at: Instant,
}

impl RecognizedText {
    /// Snapshot stamped with the current instant
    pub fn now(text: impl Into<String>) -> Self {
        Self::at(text, Instant::now())
    }

    pub fn at(text: impl Into<String>, captured_at: Instant) -> Self {
        Self {
            text: text.into(),
            captured_at,
        }
    }
}

/// Output of one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Candidates {
    pub identifiers: Vec<String>,
    pub po_numbers: Vec<String>,
}

impl Candidates {
    /// No identifiers were found (PO numbers alone do not make a batch)
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Identifier/PO pairs used to seed a batch
    ///
    /// PO numbers are attached by position only when both lists have the
    /// same length; otherwise no item gets a PO number.
    pub fn pairs(&self) -> Vec<(String, Option<String>)> {
        let aligned = self.identifiers.len() == self.po_numbers.len();
        self.identifiers
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let po = if aligned { self.po_numbers.get(i).cloned() } else { None };
                (id.clone(), po)
            })
            .collect()
    }
}

/// Throttled extraction with a latest-candidates preview
#[derive(Debug)]
pub struct CapturePipeline {
    throttler: TextThrottler,
    extractor: CandidateExtractor,
    preview: Option<Candidates>,
}

impl CapturePipeline {
    pub fn new(throttler: TextThrottler, extractor: CandidateExtractor) -> Self {
        Self {
            throttler,
            extractor,
            preview: None,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(
            TextThrottler::new(config.throttle_interval()),
            CandidateExtractor::new(config.batch_cap),
        )
    }

    pub fn extractor(&self) -> &CandidateExtractor {
        &self.extractor
    }

    /// Process one recognizer frame
    ///
    /// Returns the new candidates when the frame passed the throttle and
    /// produced at least one identifier. Empty extractions leave the
    /// previous preview in place.
    pub fn process(&mut self, frame: RecognizedText) -> Option<Candidates> {
        let frame = self.throttler.offer(frame)?;
        let candidates = self.extractor.extract(&frame.text);
        if candidates.is_empty() {
            return None;
        }
        self.preview = Some(candidates.clone());
        Some(candidates)
    }

    pub fn preview(&self) -> Option<&Candidates> {
        self.preview.as_ref()
    }

    /// Take the preview, leaving none
    pub fn take_preview(&mut self) -> Option<Candidates> {
        self.preview.take()
    }

    pub fn clear_preview(&mut self) {
        self.preview = None;
    }
}
