//! Error types for Barnyard
//!
//! Provides a unified error type for all Barnyard operations.

use crate::types::{AnimalId, BarnId};
use thiserror::Error;

/// Result type alias for Barnyard operations
pub type Result<T> = std::result::Result<T, FarmError>;

/// Unified error type for Barnyard
#[derive(Error, Debug)]
pub enum FarmError {
    // ===== Lookup Errors =====
    #[error("Animal not found: {0}")]
    AnimalNotFound(AnimalId),

    #[error("Barn not found: {0}")]
    BarnNotFound(BarnId),

    // ===== Balancing Errors =====
    /// A partition reached a state the balancing algorithm must never produce.
    /// Fatal for the current unit of work.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ===== Storage Errors =====
    #[error("Storage error: {0}")]
    Storage(String),
}

impl FarmError {
    /// True for the not-found family of errors
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AnimalNotFound(_) | Self::BarnNotFound(_))
    }
}
