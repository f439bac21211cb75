//! Unit of work
//!
//! Snapshot of one color partition taken from a backing store. Reads are
//! served from the snapshot, writes are applied to it and recorded in an
//! ordered change log. Nothing reaches the backing store until `commit`,
//! which hands the whole log to [`PartitionStore::apply`]. Dropping an
//! uncommitted unit of work discards its writes.
//!
//! Writes are confined to the partition's color and checked for orphaned
//! barn references as they happen; capacity is checked at commit.

use std::collections::HashSet;

use async_trait::async_trait;
use barnyard_core::balance::PartitionStats;
use barnyard_core::error::{FarmError, Result};
use barnyard_core::types::{Animal, AnimalId, Barn, BarnId, Color};
use parking_lot::Mutex;
use tracing::debug;

use crate::store::{Change, PartitionStore};

#[derive(Default)]
struct Snapshot {
    barns: Vec<Barn>,
    animals: Vec<Animal>,
    deleted_barns: HashSet<BarnId>,
    deleted_animals: HashSet<AnimalId>,
    /// Animals moving in from another color within the same batch
    admitted: HashSet<AnimalId>,
    changes: Vec<Change>,
}

impl Snapshot {
    fn has_barn(&self, id: BarnId) -> bool {
        self.barns.iter().any(|b| b.id == id)
    }

    fn knows_animal(&self, id: AnimalId) -> bool {
        self.animals.iter().any(|a| a.id == id)
            || self.deleted_animals.contains(&id)
            || self.admitted.contains(&id)
    }
}

/// Staged writes for one color partition
pub struct UnitOfWork<'a, S: PartitionStore + ?Sized> {
    backing: &'a S,
    color: Color,
    state: Mutex<Snapshot>,
}

impl<'a, S: PartitionStore + ?Sized> UnitOfWork<'a, S> {
    /// Load a partition and start staging writes against it
    pub async fn begin(backing: &'a S, color: Color) -> Result<UnitOfWork<'a, S>> {
        let barns = backing.find_barns_by_color(color).await?;
        let animals = backing.find_animals_by_color(color).await?;

        debug!(
            color = %color,
            barns = barns.len(),
            animals = animals.len(),
            "Unit of work started"
        );

        Ok(Self {
            backing,
            color,
            state: Mutex::new(Snapshot {
                barns,
                animals,
                ..Default::default()
            }),
        })
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Number of writes staged so far
    pub fn pending_changes(&self) -> usize {
        self.state.lock().changes.len()
    }

    /// Accept an animal still recorded under another color.
    ///
    /// The caller must remove it from its old partition in the same batch
    /// (see [`UnitOfWork::into_changes`]).
    pub fn admit(&self, id: AnimalId) {
        self.state.lock().admitted.insert(id);
    }

    /// Verify the staged partition and return its change log without
    /// applying it, for callers that batch several partitions together.
    pub fn into_changes(self) -> Result<Vec<Change>> {
        let snapshot = self.state.into_inner();
        PartitionStats::compute(&snapshot.barns, &snapshot.animals)?.check_capacity()?;
        Ok(snapshot.changes)
    }

    /// Verify the staged partition and apply every staged write to the
    /// backing store in one batch. Returns the number of writes applied.
    pub async fn commit(self) -> Result<usize> {
        let backing = self.backing;
        let color = self.color;
        let changes = self.into_changes()?;

        let count = changes.len();
        if count > 0 {
            backing.apply(changes).await?;
        }

        debug!(color = %color, changes = count, "Unit of work committed");
        Ok(count)
    }

    fn ensure_color(&self, color: Color, what: &str) -> Result<()> {
        if color != self.color {
            return Err(FarmError::InvariantViolation(format!(
                "unit of work for {} cannot write {} {}",
                self.color, color, what
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<'a, S: PartitionStore + ?Sized> PartitionStore for UnitOfWork<'a, S> {
    async fn find_barns_by_color(&self, color: Color) -> Result<Vec<Barn>> {
        if color == self.color {
            return Ok(self.state.lock().barns.clone());
        }
        self.backing.find_barns_by_color(color).await
    }

    async fn find_animals_by_color(&self, color: Color) -> Result<Vec<Animal>> {
        if color == self.color {
            return Ok(self.state.lock().animals.clone());
        }
        self.backing.find_animals_by_color(color).await
    }

    async fn find_animals_by_barn(&self, barn: BarnId) -> Result<Vec<Animal>> {
        {
            let state = self.state.lock();
            if state.has_barn(barn) || state.deleted_barns.contains(&barn) {
                return Ok(state
                    .animals
                    .iter()
                    .filter(|a| a.barn == Some(barn))
                    .cloned()
                    .collect());
            }
        }
        self.backing.find_animals_by_barn(barn).await
    }

    async fn find_first_animal_by_barn(&self, barn: BarnId) -> Result<Option<Animal>> {
        {
            let state = self.state.lock();
            if state.has_barn(barn) || state.deleted_barns.contains(&barn) {
                return Ok(state.animals.iter().find(|a| a.barn == Some(barn)).cloned());
            }
        }
        self.backing.find_first_animal_by_barn(barn).await
    }

    async fn find_animal(&self, id: AnimalId) -> Result<Option<Animal>> {
        {
            let state = self.state.lock();
            if let Some(animal) = state.animals.iter().find(|a| a.id == id) {
                return Ok(Some(animal.clone()));
            }
            if state.deleted_animals.contains(&id) {
                return Ok(None);
            }
        }
        // Anything of our color was loaded at begin
        Ok(self
            .backing
            .find_animal(id)
            .await?
            .filter(|a| a.favorite_color != self.color))
    }

    async fn find_barn(&self, id: BarnId) -> Result<Option<Barn>> {
        {
            let state = self.state.lock();
            if let Some(barn) = state.barns.iter().find(|b| b.id == id) {
                return Ok(Some(barn.clone()));
            }
            if state.deleted_barns.contains(&id) {
                return Ok(None);
            }
        }
        Ok(self
            .backing
            .find_barn(id)
            .await?
            .filter(|b| b.color != self.color))
    }

    async fn find_all_animals(&self) -> Result<Vec<Animal>> {
        let mut all: Vec<Animal> = self
            .backing
            .find_all_animals()
            .await?
            .into_iter()
            .filter(|a| a.favorite_color != self.color)
            .collect();
        all.extend(self.state.lock().animals.iter().cloned());
        Ok(all)
    }

    async fn save_barn(&self, barn: &Barn) -> Result<()> {
        self.ensure_color(barn.color, "barn")?;
        if barn.capacity == 0 {
            return Err(FarmError::InvariantViolation(format!(
                "barn {} has zero capacity",
                barn.id
            )));
        }

        let mut state = self.state.lock();
        match state.barns.iter_mut().find(|b| b.id == barn.id) {
            Some(existing) => *existing = barn.clone(),
            None => state.barns.push(barn.clone()),
        }
        state.deleted_barns.remove(&barn.id);
        state.changes.push(Change::SaveBarn(barn.clone()));
        Ok(())
    }

    async fn delete_barn(&self, id: BarnId) -> Result<bool> {
        let mut state = self.state.lock();

        if state.animals.iter().any(|a| a.barn == Some(id)) {
            return Err(FarmError::InvariantViolation(format!(
                "barn {} deleted while still housing animals",
                id
            )));
        }

        let before = state.barns.len();
        state.barns.retain(|b| b.id != id);
        let existed = state.barns.len() != before;

        if existed {
            state.deleted_barns.insert(id);
            state.changes.push(Change::DeleteBarn(id));
        }
        Ok(existed)
    }

    async fn save_animal(&self, animal: &Animal) -> Result<()> {
        self.ensure_color(animal.favorite_color, "animal")?;

        // An id we have never seen may still live in another partition
        let known = self.state.lock().knows_animal(animal.id);
        if !known {
            if let Some(existing) = self.backing.find_animal(animal.id).await? {
                if existing.favorite_color != self.color {
                    return Err(FarmError::InvariantViolation(format!(
                        "animal {} is recorded as {}, cannot save it as {}",
                        animal.id, existing.favorite_color, self.color
                    )));
                }
            }
        }

        let mut state = self.state.lock();

        if let Some(barn) = animal.barn {
            if !state.has_barn(barn) {
                return Err(FarmError::InvariantViolation(format!(
                    "animal {} assigned to unknown {} barn {}",
                    animal.id, self.color, barn
                )));
            }
        }

        match state.animals.iter_mut().find(|a| a.id == animal.id) {
            Some(existing) => *existing = animal.clone(),
            None => state.animals.push(animal.clone()),
        }
        state.deleted_animals.remove(&animal.id);
        state.changes.push(Change::SaveAnimal(animal.clone()));
        Ok(())
    }

    async fn delete_animal(&self, id: AnimalId) -> Result<bool> {
        let mut state = self.state.lock();

        let before = state.animals.len();
        state.animals.retain(|a| a.id != id);
        let existed = state.animals.len() != before;

        if existed {
            state.deleted_animals.insert(id);
            state.changes.push(Change::DeleteAnimal(id));
        }
        Ok(existed)
    }

    async fn delete_all(&self) -> Result<()> {
        Err(FarmError::InvariantViolation(format!(
            "unit of work for {} cannot delete every record",
            self.color
        )))
    }
}
