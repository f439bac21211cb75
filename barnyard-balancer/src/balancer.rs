//! Barn Balancer
//!
//! Public entry point for every farm mutation. Each operation:
//! 1. Takes the lock of the affected color partition
//! 2. Opens a unit of work over the store
//! 3. Runs placement or removal plus the redistribution loop
//! 4. Commits all writes in one batch
//!
//! An error anywhere before the commit leaves the store untouched.

use std::sync::Arc;

use barnyard_core::error::{FarmError, Result};
use barnyard_core::types::{Animal, AnimalId, Color};
use barnyard_storage::{PartitionStore, UnitOfWork};
use tracing::{info, instrument};

use crate::config::BalancerConfig;
use crate::locks::PartitionLocks;
use crate::operations;
use crate::report::PartitionReport;

/// Keeps every color's barns balanced as animals come and go
pub struct Balancer<S: PartitionStore + ?Sized> {
    store: Arc<S>,
    config: BalancerConfig,
    locks: PartitionLocks,
}

impl<S: PartitionStore + ?Sized> Balancer<S> {
    /// Create a balancer over a store
    pub fn new(store: Arc<S>, config: BalancerConfig) -> Self {
        Self {
            store,
            config,
            locks: PartitionLocks::new(),
        }
    }

    /// Get the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Place an animal in a barn of its favorite color.
    ///
    /// Returns the animal with its barn set. Other animals of the same color
    /// may be moved to keep the barns balanced. An animal already on the
    /// farm under another color is taken out of its old partition first.
    #[instrument(skip(self, animal), fields(animal = %animal.id, color = %animal.favorite_color))]
    pub async fn add_to_farm(&self, animal: Animal) -> Result<Animal> {
        let color = animal.favorite_color;

        if let Some(existing) = self.store.find_animal(animal.id).await? {
            if existing.favorite_color != color {
                return self.relocate(animal, existing.favorite_color).await;
            }
        }

        let _guard = self.locks.acquire(color).await;

        let uow = UnitOfWork::begin(self.store.as_ref(), color).await?;
        let placed = operations::place(
            &uow,
            animal,
            self.config.barn_capacity,
            self.config.max_redistribution_steps,
        )
        .await?;
        uow.commit().await?;

        Ok(placed)
    }

    /// Remove an animal from `previous` and place it under its new color.
    ///
    /// Both partitions are locked and both change logs are applied as a
    /// single batch.
    async fn relocate(&self, animal: Animal, previous: Color) -> Result<Animal> {
        let color = animal.favorite_color;
        let max_steps = self.config.max_redistribution_steps;

        // Same order as delete_all
        let (first, second) = if previous < color {
            (previous, color)
        } else {
            (color, previous)
        };
        let _first = self.locks.acquire(first).await;
        let _second = self.locks.acquire(second).await;

        let old = UnitOfWork::begin(self.store.as_ref(), previous).await?;
        operations::remove(&old, animal.id, max_steps).await?;

        let new = UnitOfWork::begin(self.store.as_ref(), color).await?;
        new.admit(animal.id);
        let placed = operations::place(&new, animal, self.config.barn_capacity, max_steps).await?;

        let mut changes = old.into_changes()?;
        changes.extend(new.into_changes()?);
        self.store.apply(changes).await?;

        info!(animal = %placed.id, from = %previous, to = %color, "Animal changed color");
        Ok(placed)
    }

    /// Add animals one at a time, in the given order.
    ///
    /// Each animal is its own unit of work; the first failure stops the batch.
    pub async fn add_all_to_farm(&self, animals: Vec<Animal>) -> Result<Vec<Animal>> {
        let mut placed = Vec::with_capacity(animals.len());
        for animal in animals {
            placed.push(self.add_to_farm(animal).await?);
        }
        info!(count = placed.len(), "Added animals to farm");
        Ok(placed)
    }

    /// Remove an animal and rebalance its color.
    ///
    /// The animal is looked up fresh by id; its current barn is whatever the
    /// store says, not what the caller's copy says.
    pub async fn remove_from_farm(&self, animal: &Animal) -> Result<()> {
        self.remove_by_id(animal.id).await
    }

    /// Remove an animal by id and rebalance its color
    #[instrument(skip(self))]
    pub async fn remove_by_id(&self, id: AnimalId) -> Result<()> {
        let color = self
            .store
            .find_animal(id)
            .await?
            .ok_or(FarmError::AnimalNotFound(id))?
            .favorite_color;
        let _guard = self.locks.acquire(color).await;

        // Re-read under the lock: a concurrent removal turns into NotFound
        let uow = UnitOfWork::begin(self.store.as_ref(), color).await?;
        operations::remove(&uow, id, self.config.max_redistribution_steps).await?;
        uow.commit().await?;

        Ok(())
    }

    /// Remove animals one at a time, in the given order
    pub async fn remove_all_from_farm(&self, animals: &[Animal]) -> Result<()> {
        for animal in animals {
            self.remove_by_id(animal.id).await?;
        }
        info!(count = animals.len(), "Removed animals from farm");
        Ok(())
    }

    /// Whether the barns of a color currently satisfy the balance predicate
    pub async fn is_barns_balanced(&self, color: Color) -> Result<bool> {
        let _guard = self.locks.acquire(color).await;
        operations::is_balanced(self.store.as_ref(), color).await
    }

    /// Every animal on the farm
    pub async fn find_all(&self) -> Result<Vec<Animal>> {
        self.store.find_all_animals().await
    }

    /// Remove every animal and barn
    pub async fn delete_all(&self) -> Result<()> {
        // Fixed order so two callers never wait on each other
        let mut guards = Vec::with_capacity(Color::ALL.len());
        for color in Color::ALL {
            guards.push(self.locks.acquire(color).await);
        }

        self.store.delete_all().await?;
        info!("Farm cleared");
        Ok(())
    }

    /// Occupancy report for one color
    pub async fn partition_report(&self, color: Color) -> Result<PartitionReport> {
        let _guard = self.locks.acquire(color).await;
        let barns = self.store.find_barns_by_color(color).await?;
        let animals = self.store.find_animals_by_color(color).await?;
        PartitionReport::from_records(color, &barns, &animals)
    }
}
