//! Test helpers for scanner integration tests
//!
//! - MockBackend: in-memory inventory backend with call counters, failure
//!   switches and a gate that holds record creation in flight

pub mod mock_backend;

pub use mock_backend::{session, MockBackend};
