//! Partition store trait
//!
//! Defines the interface that every record store must follow. Each write
//! commits immediately from the caller's point of view; grouping writes into
//! one atomic unit is done with [`crate::UnitOfWork`] and [`PartitionStore::apply`].

use async_trait::async_trait;
use barnyard_core::error::Result;
use barnyard_core::types::{Animal, AnimalId, Barn, BarnId, Color};

/// A single buffered write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    SaveBarn(Barn),
    DeleteBarn(BarnId),
    SaveAnimal(Animal),
    DeleteAnimal(AnimalId),
}

/// Async store of animal and barn records
///
/// Listings are ordered: barns in creation order, animals in insertion
/// order. Saving an existing record keeps its position.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// All barns serving a color
    async fn find_barns_by_color(&self, color: Color) -> Result<Vec<Barn>>;

    /// All animals whose favorite color is `color`
    async fn find_animals_by_color(&self, color: Color) -> Result<Vec<Animal>>;

    /// All animals housed in a barn
    async fn find_animals_by_barn(&self, barn: BarnId) -> Result<Vec<Animal>>;

    /// First animal housed in a barn
    async fn find_first_animal_by_barn(&self, barn: BarnId) -> Result<Option<Animal>> {
        Ok(self.find_animals_by_barn(barn).await?.into_iter().next())
    }

    async fn find_animal(&self, id: AnimalId) -> Result<Option<Animal>>;

    async fn find_barn(&self, id: BarnId) -> Result<Option<Barn>>;

    /// Every animal, any color
    async fn find_all_animals(&self) -> Result<Vec<Animal>>;

    /// Insert or update a barn
    async fn save_barn(&self, barn: &Barn) -> Result<()>;

    /// Delete a barn, returning whether it existed
    async fn delete_barn(&self, id: BarnId) -> Result<bool>;

    /// Insert or update an animal
    async fn save_animal(&self, animal: &Animal) -> Result<()>;

    /// Delete an animal, returning whether it existed
    async fn delete_animal(&self, id: AnimalId) -> Result<bool>;

    /// Remove every record
    async fn delete_all(&self) -> Result<()>;

    /// Apply buffered writes in order.
    ///
    /// The default replays them one by one. Stores that can do better
    /// should apply the whole batch atomically.
    async fn apply(&self, changes: Vec<Change>) -> Result<()> {
        for change in changes {
            match change {
                Change::SaveBarn(barn) => self.save_barn(&barn).await?,
                Change::DeleteBarn(id) => {
                    self.delete_barn(id).await?;
                }
                Change::SaveAnimal(animal) => self.save_animal(&animal).await?,
                Change::DeleteAnimal(id) => {
                    self.delete_animal(id).await?;
                }
            }
        }
        Ok(())
    }
}
