//! Per-partition locking
//!
//! One async mutex per color. Holding a color's guard gives exclusive
//! logical access to that partition for the duration of an operation;
//! different colors never contend.

use barnyard_core::types::Color;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lazily populated table of partition locks
#[derive(Default)]
pub struct PartitionLocks {
    locks: Mutex<HashMap<Color, Arc<AsyncMutex<()>>>>,
}

impl PartitionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a partition
    pub async fn acquire(&self, color: Color) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .entry(color)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Acquire without waiting, `None` if the partition is busy
    pub fn try_acquire(&self, color: Color) -> Option<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .lock()
            .entry(color)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        lock.try_lock_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_color_is_exclusive() {
        let locks = PartitionLocks::new();
        let guard = locks.acquire(Color::Red).await;
        assert!(locks.try_acquire(Color::Red).is_none());
        drop(guard);
        assert!(locks.try_acquire(Color::Red).is_some());
    }

    #[tokio::test]
    async fn test_colors_are_independent() {
        let locks = PartitionLocks::new();
        let _red = locks.acquire(Color::Red).await;
        assert!(locks.try_acquire(Color::Blue).is_some());
    }
}
