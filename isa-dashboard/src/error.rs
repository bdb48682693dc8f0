//! Error types for the dashboard synchronizer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Quantity must be a positive number, got {0}")]
    InvalidQuantity(f64),

    #[error(transparent)]
    Backend(#[from] isa_common::Error),
}

impl DashboardError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, DashboardError::Backend(e) if e.is_auth_failure())
    }
}
