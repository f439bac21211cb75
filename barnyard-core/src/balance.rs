//! Partition occupancy statistics
//!
//! A partition is every barn and animal sharing one color. Its stats are
//! built in a single pass over the animal list and drive the balance
//! predicate, placement and redistribution planning.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{FarmError, Result};
use crate::types::{Animal, Barn, BarnId};

/// Occupancy of a single barn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarnLoad {
    pub barn: BarnId,
    pub capacity: u32,
    pub occupancy: u32,
}

impl BarnLoad {
    /// Spare room. Negative only for an over-capacity barn.
    pub fn unused(&self) -> i64 {
        i64::from(self.capacity) - i64::from(self.occupancy)
    }

    pub fn has_room(&self) -> bool {
        self.occupancy < self.capacity
    }
}

/// Occupancy snapshot of one partition
#[derive(Debug, Clone, Default)]
pub struct PartitionStats {
    /// One entry per barn, in barn order
    loads: Vec<BarnLoad>,
    animal_count: usize,
}

impl PartitionStats {
    /// Build stats for one partition.
    ///
    /// `barns` and `animals` must belong to the same color. Animals that are
    /// not placed yet are counted as members but occupy no barn. An animal
    /// pointing at a barn outside `barns`, or at a barn of another color, is
    /// an invariant violation.
    pub fn compute(barns: &[Barn], animals: &[Animal]) -> Result<Self> {
        let mut index: HashMap<BarnId, usize> = HashMap::with_capacity(barns.len());
        let mut loads = Vec::with_capacity(barns.len());

        for barn in barns {
            index.insert(barn.id, loads.len());
            loads.push(BarnLoad {
                barn: barn.id,
                capacity: barn.capacity,
                occupancy: 0,
            });
        }

        for animal in animals {
            let Some(barn_id) = animal.barn else {
                continue;
            };

            let slot = *index.get(&barn_id).ok_or_else(|| {
                FarmError::InvariantViolation(format!(
                    "animal {} references barn {} outside its partition",
                    animal.id, barn_id
                ))
            })?;

            if barns[slot].color != animal.favorite_color {
                return Err(FarmError::InvariantViolation(format!(
                    "animal {} ({}) housed in barn {} ({})",
                    animal.id, animal.favorite_color, barn_id, barns[slot].color
                )));
            }

            loads[slot].occupancy += 1;
        }

        Ok(Self {
            loads,
            animal_count: animals.len(),
        })
    }

    pub fn loads(&self) -> &[BarnLoad] {
        &self.loads
    }

    pub fn load(&self, barn: BarnId) -> Option<&BarnLoad> {
        self.loads.iter().find(|l| l.barn == barn)
    }

    pub fn animal_count(&self) -> usize {
        self.animal_count
    }

    pub fn barn_count(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animal_count == 0 || self.loads.is_empty()
    }

    /// Sum of spare room over every barn
    pub fn total_unused(&self) -> i64 {
        self.loads.iter().map(BarnLoad::unused).sum()
    }

    /// Smallest barn capacity in the partition
    pub fn min_capacity(&self) -> Option<u32> {
        self.loads.iter().map(|l| l.capacity).min()
    }

    /// Difference between the largest and smallest spare room
    pub fn unused_spread(&self) -> i64 {
        let max = self.loads.iter().map(BarnLoad::unused).max();
        let min = self.loads.iter().map(BarnLoad::unused).min();
        match (max, min) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        }
    }

    /// Balance predicate.
    ///
    /// Balanced iff the smallest barn could not be emptied into the spare
    /// room of the others (`min_cap > total_unused`) and spare room differs
    /// by at most one between any two barns. An empty partition is balanced.
    pub fn is_balanced(&self) -> bool {
        if self.is_empty() {
            return true;
        }

        let min_cap = self.min_capacity().map(i64::from).unwrap_or(0);
        min_cap > self.total_unused() && self.unused_spread() <= 1
    }

    /// True when the spare room could absorb the smallest barn entirely
    pub fn should_dissolve(&self) -> bool {
        match self.min_capacity() {
            Some(min_cap) => self.total_unused() >= i64::from(min_cap),
            None => false,
        }
    }

    /// Barn that should receive the next animal: the fewest occupants among
    /// barns with spare room, first in barn order on ties. `None` when every
    /// barn is full (or there are no barns) and a new barn is needed.
    pub fn placement_target(&self) -> Option<BarnId> {
        self.loads
            .iter()
            .filter(|l| l.has_room())
            .min_by_key(|l| l.occupancy)
            .map(|l| l.barn)
    }

    /// Fail if any barn holds more animals than it can
    pub fn check_capacity(&self) -> Result<()> {
        match self.loads.iter().find(|l| l.occupancy > l.capacity) {
            Some(l) => Err(FarmError::InvariantViolation(format!(
                "barn {} holds {} animals, capacity {}",
                l.barn, l.occupancy, l.capacity
            ))),
            None => Ok(()),
        }
    }
}
