//! In-memory partition store
//!
//! Used for testing, the demo binary and embedding. Not persistent.

use crate::store::{Change, PartitionStore};
use async_trait::async_trait;
use barnyard_core::error::Result;
use barnyard_core::types::{Animal, AnimalId, Barn, BarnId, Color};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub barn_count: u64,
    pub animal_count: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
    /// Batches committed through `apply`
    pub batches: u64,
}

/// Records tagged with their insertion sequence
#[derive(Default)]
struct Tables {
    barns: HashMap<BarnId, (u64, Barn)>,
    animals: HashMap<AnimalId, (u64, Animal)>,
    next_seq: u64,
}

impl Tables {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn put_barn(&mut self, barn: Barn) {
        let seq = match self.barns.get(&barn.id) {
            Some((seq, _)) => *seq,
            None => self.seq(),
        };
        self.barns.insert(barn.id, (seq, barn));
    }

    fn put_animal(&mut self, animal: Animal) {
        let seq = match self.animals.get(&animal.id) {
            Some((seq, _)) => *seq,
            None => self.seq(),
        };
        self.animals.insert(animal.id, (seq, animal));
    }

    fn barns_where(&self, pred: impl Fn(&Barn) -> bool) -> Vec<Barn> {
        let mut found: Vec<&(u64, Barn)> = self.barns.values().filter(|(_, b)| pred(b)).collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, b)| b.clone()).collect()
    }

    fn animals_where(&self, pred: impl Fn(&Animal) -> bool) -> Vec<Animal> {
        let mut found: Vec<&(u64, Animal)> =
            self.animals.values().filter(|(_, a)| pred(a)).collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, a)| a.clone()).collect()
    }
}

/// In-memory partition store
pub struct MemoryStore {
    tables: RwLock<Tables>,

    /// Operation counters
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    batches: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        }
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        let tables = self.tables.read();
        StoreStats {
            barn_count: tables.barns.len() as u64,
            animal_count: tables.animals.len() as u64,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    async fn find_barns_by_color(&self, color: Color) -> Result<Vec<Barn>> {
        self.count_read();
        Ok(self.tables.read().barns_where(|b| b.color == color))
    }

    async fn find_animals_by_color(&self, color: Color) -> Result<Vec<Animal>> {
        self.count_read();
        Ok(self.tables.read().animals_where(|a| a.favorite_color == color))
    }

    async fn find_animals_by_barn(&self, barn: BarnId) -> Result<Vec<Animal>> {
        self.count_read();
        Ok(self.tables.read().animals_where(|a| a.barn == Some(barn)))
    }

    async fn find_animal(&self, id: AnimalId) -> Result<Option<Animal>> {
        self.count_read();
        Ok(self.tables.read().animals.get(&id).map(|(_, a)| a.clone()))
    }

    async fn find_barn(&self, id: BarnId) -> Result<Option<Barn>> {
        self.count_read();
        Ok(self.tables.read().barns.get(&id).map(|(_, b)| b.clone()))
    }

    async fn find_all_animals(&self) -> Result<Vec<Animal>> {
        self.count_read();
        Ok(self.tables.read().animals_where(|_| true))
    }

    async fn save_barn(&self, barn: &Barn) -> Result<()> {
        self.tables.write().put_barn(barn.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete_barn(&self, id: BarnId) -> Result<bool> {
        let existed = self.tables.write().barns.remove(&id).is_some();
        if existed {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(existed)
    }

    async fn save_animal(&self, animal: &Animal) -> Result<()> {
        self.tables.write().put_animal(animal.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete_animal(&self, id: AnimalId) -> Result<bool> {
        let existed = self.tables.write().animals.remove(&id).is_some();
        if existed {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(existed)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut tables = self.tables.write();
        let removed = tables.barns.len() + tables.animals.len();
        tables.barns.clear();
        tables.animals.clear();
        self.deletes.fetch_add(removed as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Applies the whole batch under one write lock
    async fn apply(&self, changes: Vec<Change>) -> Result<()> {
        let mut tables = self.tables.write();
        let count = changes.len();

        for change in changes {
            match change {
                Change::SaveBarn(barn) => {
                    tables.put_barn(barn);
                    self.writes.fetch_add(1, Ordering::Relaxed);
                }
                Change::DeleteBarn(id) => {
                    if tables.barns.remove(&id).is_some() {
                        self.deletes.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Change::SaveAnimal(animal) => {
                    tables.put_animal(animal);
                    self.writes.fetch_add(1, Ordering::Relaxed);
                }
                Change::DeleteAnimal(id) => {
                    if tables.animals.remove(&id).is_some() {
                        self.deletes.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        self.batches.fetch_add(1, Ordering::Relaxed);
        debug!(changes = count, "Applied change batch");
        Ok(())
    }
}
