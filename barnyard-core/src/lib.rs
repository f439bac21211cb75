//! Barnyard Core Library
//!
//! Core abstractions for keeping animals housed in balanced barns.
//! This crate provides:
//! - Domain records (`Animal`, `Barn`) and the `Color` partition key
//! - Occupancy statistics and the balance predicate
//! - Pure redistribution planning (dissolve + equalize)
//! - Common error handling

pub mod balance;
pub mod error;
pub mod plan;
pub mod types;

pub use balance::{BarnLoad, PartitionStats};
pub use error::{FarmError, Result};
pub use plan::{plan_redistribution, Dissolution, RedistributionStep, Transfer};
pub use types::{Animal, AnimalId, Barn, BarnId, Color};

/// Default number of animals a barn can hold.
///
/// Override at runtime via the BARNYARD_BARN_CAPACITY env var.
pub const DEFAULT_BARN_CAPACITY: u32 = 20;

/// Default upper bound on redistribution steps within one unit of work.
pub const DEFAULT_MAX_REDISTRIBUTION_STEPS: usize = 1024;

/// Name given to barns created on demand for a color
pub fn barn_name_for(color: Color) -> String {
    format!("Barn - {}", color)
}
