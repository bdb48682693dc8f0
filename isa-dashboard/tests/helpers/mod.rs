//! Test helpers for dashboard integration tests
//!
//! - MockBackend: in-memory backend with scripted event streams and a gate
//!   that holds detail fetches in flight
//! - Fixtures for overview, summaries and records

pub mod mock_backend;

pub use mock_backend::{overview_with_active, record, MockBackend, StreamScript};
