//! Balancing operations
//!
//! Placement, removal, the balance check and the redistribution step, written
//! against any [`PartitionStore`]. State is read fresh from the store on every
//! call. These functions assume the caller already holds exclusive access to
//! the partition; [`crate::Balancer`] runs them inside a unit of work.

use barnyard_core::balance::PartitionStats;
use barnyard_core::barn_name_for;
use barnyard_core::error::{FarmError, Result};
use barnyard_core::plan::{plan_redistribution, Transfer};
use barnyard_core::types::{Animal, AnimalId, Barn, Color};
use barnyard_storage::PartitionStore;
use tracing::{debug, info, warn};

/// Check the balance predicate for a color
pub async fn is_balanced<S>(store: &S, color: Color) -> Result<bool>
where
    S: PartitionStore + ?Sized,
{
    let animals = store.find_animals_by_color(color).await?;
    let barns = store.find_barns_by_color(color).await?;

    if animals.is_empty() || barns.is_empty() {
        return Ok(true);
    }

    Ok(PartitionStats::compute(&barns, &animals)?.is_balanced())
}

/// Place an animal in a barn of its color, then rebalance the partition.
pub async fn place<S>(
    store: &S,
    mut animal: Animal,
    barn_capacity: u32,
    max_steps: usize,
) -> Result<Animal>
where
    S: PartitionStore + ?Sized,
{
    let color = animal.favorite_color;
    let barns = store.find_barns_by_color(color).await?;

    if barns.is_empty() {
        let barn = Barn::new(barn_name_for(color), color, barn_capacity);
        store.save_barn(&barn).await?;
        info!(barn = %barn.id, color = %color, "Created first barn for color");

        animal.barn = Some(barn.id);
        store.save_animal(&animal).await?;
        return Ok(animal);
    }

    // A re-placed animal must not count against its old barn
    let mut animals = store.find_animals_by_color(color).await?;
    animals.retain(|a| a.id != animal.id);

    let stats = PartitionStats::compute(&barns, &animals)?;
    let barn_id = match stats.placement_target() {
        Some(id) => id,
        None => {
            let barn = Barn::new(barn_name_for(color), color, barn_capacity);
            store.save_barn(&barn).await?;
            info!(
                barn = %barn.id,
                color = %color,
                barns = barns.len() + 1,
                "All barns full, created new barn"
            );
            barn.id
        }
    };

    animal.barn = Some(barn_id);
    store.save_animal(&animal).await?;
    debug!(animal = %animal.id, barn = %barn_id, "Animal placed");

    restore_balance(store, color, max_steps).await?;

    // Redistribution may have moved the newcomer
    store
        .find_animal(animal.id)
        .await?
        .ok_or(FarmError::AnimalNotFound(animal.id))
}

/// Remove an animal, delete its barn if left empty, then rebalance.
pub async fn remove<S>(store: &S, id: AnimalId, max_steps: usize) -> Result<()>
where
    S: PartitionStore + ?Sized,
{
    let animal = store
        .find_animal(id)
        .await?
        .ok_or(FarmError::AnimalNotFound(id))?;
    let color = animal.favorite_color;

    store.delete_animal(id).await?;
    debug!(animal = %id, color = %color, "Animal removed");

    if let Some(barn) = animal.barn {
        if store.find_first_animal_by_barn(barn).await?.is_none() {
            store.delete_barn(barn).await?;
            info!(barn = %barn, color = %color, "Deleted empty barn");
        }
    }

    restore_balance(store, color, max_steps).await?;
    Ok(())
}

/// Run redistribution steps until the partition is balanced.
///
/// Returns the number of steps taken. Stops early if a step changes nothing.
/// Needing more than `max_steps` steps is an invariant violation.
pub async fn restore_balance<S>(store: &S, color: Color, max_steps: usize) -> Result<usize>
where
    S: PartitionStore + ?Sized,
{
    let mut steps = 0;

    while !is_balanced(store, color).await? {
        if steps >= max_steps {
            warn!(color = %color, steps, "Redistribution step cap reached");
            return Err(FarmError::InvariantViolation(format!(
                "{} partition still unbalanced after {} redistribution steps",
                color, steps
            )));
        }

        let changed = redistribute_one_step(store, color).await?;
        steps += 1;

        if !changed {
            warn!(color = %color, steps, "Redistribution made no progress");
            break;
        }
    }

    if steps > 0 {
        debug!(color = %color, steps, "Partition rebalanced");
    }
    Ok(steps)
}

/// Perform one dissolve-then-equalize step. Returns whether anything moved.
///
/// Not idempotent: the caller loops until the balance predicate holds.
pub async fn redistribute_one_step<S>(store: &S, color: Color) -> Result<bool>
where
    S: PartitionStore + ?Sized,
{
    let barns = store.find_barns_by_color(color).await?;
    let animals = store.find_animals_by_color(color).await?;
    let step = plan_redistribution(&barns, &animals)?;

    if let Some(dissolution) = &step.dissolution {
        for transfer in &dissolution.transfers {
            move_animal(store, transfer).await?;
        }

        if let Some(left) = store.find_first_animal_by_barn(dissolution.barn).await? {
            return Err(FarmError::InvariantViolation(format!(
                "animal {} left behind in dissolved barn {}",
                left.id, dissolution.barn
            )));
        }

        store.delete_barn(dissolution.barn).await?;
        info!(
            barn = %dissolution.barn,
            color = %color,
            moved = dissolution.transfers.len(),
            "Dissolved barn"
        );
    }

    if let Some(transfer) = &step.equalize {
        move_animal(store, transfer).await?;
    }

    if let Some(barn) = step.emptied {
        store.delete_barn(barn).await?;
        info!(barn = %barn, color = %color, "Deleted barn emptied by equalize");
    }

    Ok(!step.is_noop())
}

async fn move_animal<S>(store: &S, transfer: &Transfer) -> Result<()>
where
    S: PartitionStore + ?Sized,
{
    let mut animal = store
        .find_animal(transfer.animal)
        .await?
        .ok_or(FarmError::AnimalNotFound(transfer.animal))?;

    if animal.barn != Some(transfer.from) {
        return Err(FarmError::InvariantViolation(format!(
            "animal {} expected in barn {}",
            animal.id, transfer.from
        )));
    }

    animal.barn = Some(transfer.to);
    store.save_animal(&animal).await?;
    debug!(
        animal = %animal.id,
        from = %transfer.from,
        to = %transfer.to,
        "Moved animal"
    );
    Ok(())
}
