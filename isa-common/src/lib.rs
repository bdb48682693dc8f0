//! # ISA Common Library
//!
//! Shared code for the inventory scanner and the supervisor dashboard:
//! - Backend models (sessions, records, overview projections)
//! - Backend client (`InventoryBackend` trait + HTTP implementation)
//! - Server event stream decoding
//! - Local event bus for UI layers
//! - Configuration loading and logging setup
//! - Time parsing/formatting helpers

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod logging;
pub mod models;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
