//! Barnyard Storage
//!
//! Provides the record store the balancer runs against:
//! - `PartitionStore` trait for pluggable stores
//! - `MemoryStore` for tests, demos and embedding
//! - `UnitOfWork` overlay that stages one partition's writes and commits
//!   them atomically

pub mod memory;
pub mod store;
pub mod unit_of_work;

pub use memory::{MemoryStore, StoreStats};
pub use store::{Change, PartitionStore};
pub use unit_of_work::UnitOfWork;
