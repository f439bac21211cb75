//! Barnyard Balancer Library
//!
//! Keeps the barns of every color partition balanced as animals are added
//! and removed:
//! - Placement (least-occupied barn with room, or a new barn)
//! - Removal with cleanup of emptied barns
//! - Redistribution (dissolve surplus barns, equalize occupancy)
//! - Per-color locking and atomic commits through a unit of work

pub mod balancer;
pub mod config;
pub mod locks;
pub mod operations;
pub mod report;

// Re-export main types
pub use balancer::Balancer;
pub use config::{BalancerConfig, ConfigError};
pub use locks::PartitionLocks;
pub use report::{BarnSummary, PartitionReport};
