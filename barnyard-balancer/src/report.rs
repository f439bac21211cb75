//! Partition reports
//!
//! Read-only view of one color's barns, for logging and the demo binary.

use barnyard_core::balance::PartitionStats;
use barnyard_core::error::Result;
use barnyard_core::types::{Animal, Barn, BarnId, Color};
use serde::Serialize;

/// Occupancy of one barn
#[derive(Debug, Clone, Serialize)]
pub struct BarnSummary {
    pub id: BarnId,
    pub name: String,
    pub capacity: u32,
    pub occupancy: u32,
}

/// Snapshot of a color partition
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub color: Color,
    pub barns: Vec<BarnSummary>,
    pub animal_count: usize,
    pub total_capacity: u64,
    pub total_unused: i64,
    pub balanced: bool,
}

impl PartitionReport {
    /// Build a report from a partition's records
    pub fn from_records(color: Color, barns: &[Barn], animals: &[Animal]) -> Result<Self> {
        let stats = PartitionStats::compute(barns, animals)?;

        let summaries = barns
            .iter()
            .zip(stats.loads())
            .map(|(barn, load)| BarnSummary {
                id: barn.id,
                name: barn.name.clone(),
                capacity: load.capacity,
                occupancy: load.occupancy,
            })
            .collect();

        Ok(Self {
            color,
            barns: summaries,
            animal_count: stats.animal_count(),
            total_capacity: barns.iter().map(|b| u64::from(b.capacity)).sum(),
            total_unused: stats.total_unused(),
            balanced: stats.is_balanced(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.animal_count == 0 && self.barns.is_empty()
    }

    /// Occupancy of every barn, in barn order
    pub fn occupancies(&self) -> Vec<u32> {
        self.barns.iter().map(|b| b.occupancy).collect()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{}: {} animals in {} barns, {} of {} places free, {}",
            self.color,
            self.animal_count,
            self.barns.len(),
            self.total_unused,
            self.total_capacity,
            if self.balanced { "balanced" } else { "unbalanced" }
        )
    }
}
