//! Redistribution Planner
//!
//! Computes one corrective step for an unbalanced partition:
//! - Dissolve: if the spare room could absorb the smallest barn, drain it
//!   into the others and delete it
//! - Equalize: move one animal from the fullest barn to the emptiest
//!
//! Planning is pure. Applying the step to a store is the caller's job, and
//! the caller loops until the balance predicate holds.

use std::cmp::Reverse;

use crate::balance::PartitionStats;
use crate::error::{FarmError, Result};
use crate::types::{Animal, AnimalId, Barn, BarnId};

/// Move of one animal between two barns of the same partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub animal: AnimalId,
    pub from: BarnId,
    pub to: BarnId,
}

/// Barn to delete once its occupants have been moved out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dissolution {
    pub barn: BarnId,
    pub transfers: Vec<Transfer>,
}

/// One redistribution step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedistributionStep {
    pub dissolution: Option<Dissolution>,
    pub equalize: Option<Transfer>,
    /// Source barn left empty by the equalize move
    pub emptied: Option<BarnId>,
}

impl RedistributionStep {
    /// True if applying the step changes nothing
    pub fn is_noop(&self) -> bool {
        self.dissolution.is_none() && self.equalize.is_none()
    }

    /// Every animal move in application order
    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.dissolution
            .iter()
            .flat_map(|d| d.transfers.iter())
            .chain(self.equalize.iter())
    }

    /// Barns the step deletes
    pub fn removed_barns(&self) -> Vec<BarnId> {
        self.dissolution
            .iter()
            .map(|d| d.barn)
            .chain(self.emptied)
            .collect()
    }
}

/// Plan a single redistribution step for one partition.
///
/// `barns` and `animals` are the partition's records in store order; "first"
/// always means first in that order.
pub fn plan_redistribution(barns: &[Barn], animals: &[Animal]) -> Result<RedistributionStep> {
    let stats = PartitionStats::compute(barns, animals)?;
    let mut step = RedistributionStep::default();

    let capacity: Vec<u32> = stats.loads().iter().map(|l| l.capacity).collect();
    let mut occupancy: Vec<u32> = stats.loads().iter().map(|l| l.occupancy).collect();
    let mut live: Vec<bool> = vec![true; barns.len()];

    // Working copy of every placement, updated as moves are planned
    let mut housing: Vec<(AnimalId, Option<BarnId>)> =
        animals.iter().map(|a| (a.id, a.barn)).collect();

    if stats.should_dissolve() {
        let victim = (0..barns.len())
            .min_by_key(|&i| capacity[i])
            .ok_or_else(|| FarmError::InvariantViolation("dissolve without barns".into()))?;
        let victim_id = barns[victim].id;

        let mut queue: std::collections::VecDeque<usize> = housing
            .iter()
            .enumerate()
            .filter(|(_, (_, barn))| *barn == Some(victim_id))
            .map(|(i, _)| i)
            .collect();

        let mut transfers = Vec::with_capacity(queue.len());

        for target in (0..barns.len()).filter(|&i| i != victim) {
            let spare = capacity[target].saturating_sub(occupancy[target]);
            for _ in 0..spare {
                let Some(slot) = queue.pop_front() else {
                    break;
                };
                transfers.push(Transfer {
                    animal: housing[slot].0,
                    from: victim_id,
                    to: barns[target].id,
                });
                housing[slot].1 = Some(barns[target].id);
                occupancy[target] += 1;
                occupancy[victim] -= 1;
            }
        }

        if !queue.is_empty() {
            return Err(FarmError::InvariantViolation(format!(
                "{} animals left homeless dissolving barn {}",
                queue.len(),
                victim_id
            )));
        }

        live[victim] = false;
        step.dissolution = Some(Dissolution {
            barn: victim_id,
            transfers,
        });
    }

    let unused = |i: usize, occupancy: &[u32]| i64::from(capacity[i]) - i64::from(occupancy[i]);
    let remaining: Vec<usize> = (0..barns.len()).filter(|&i| live[i]).collect();

    // Most spare room receives, least spare room gives; first wins ties
    let target = remaining
        .iter()
        .copied()
        .min_by_key(|&i| Reverse(unused(i, &occupancy)));
    let source = target.and_then(|t| {
        remaining
            .iter()
            .copied()
            .filter(|&i| i != t)
            .min_by_key(|&i| unused(i, &occupancy))
    });

    if let (Some(target), Some(source)) = (target, source) {
        let gap = unused(target, &occupancy) - unused(source, &occupancy);
        if gap >= 2 && occupancy[target] < capacity[target] && occupancy[source] > 0 {
            let source_id = barns[source].id;
            let animal = housing
                .iter()
                .find(|(_, barn)| *barn == Some(source_id))
                .map(|(id, _)| *id)
                .ok_or_else(|| {
                    FarmError::InvariantViolation(format!("barn {} has no occupant", source_id))
                })?;

            step.equalize = Some(Transfer {
                animal,
                from: source_id,
                to: barns[target].id,
            });
            occupancy[source] -= 1;
            occupancy[target] += 1;

            if occupancy[source] == 0 {
                step.emptied = Some(source_id);
            }
        }
    }

    Ok(step)
}
