//! # ISA Scanner
//!
//! Field-side core of the inventory scanner:
//! - Capture pipeline: throttled recognized text → candidate identifiers
//! - Candidate batch with per-item lifecycle
//! - Per-item submission and compensating deletion
//! - Session discovery, resume, end
//!
//! [`ScannerController`] ties these together behind one command surface.

pub mod batch;
pub mod capture;
pub mod controller;
pub mod error;
pub mod session;
pub mod submission;

pub use batch::{CandidateBatch, CapturedItem, ItemKey, ItemLifecycle, Reconciliation};
pub use capture::{CandidateExtractor, Candidates, CapturePipeline, RecognizedText, TextThrottler};
pub use controller::ScannerController;
pub use error::{Result, ScannerError};
pub use session::{Discovery, SessionEngine, SessionState};
pub use submission::{SubmissionCoordinator, SubmissionHistory};
