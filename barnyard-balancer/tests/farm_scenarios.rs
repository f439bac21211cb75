//! Farm integration tests
//!
//! Drives the balancer through add/remove sequences on a memory store and
//! checks the farm-wide invariants after every operation.
//!
//! Run with: cargo test -p barnyard-balancer --test farm_scenarios

use async_trait::async_trait;
use barnyard_balancer::{Balancer, BalancerConfig};
use barnyard_core::error::{FarmError, Result};
use barnyard_core::types::{Animal, AnimalId, Barn, BarnId, Color};
use barnyard_storage::{Change, MemoryStore, PartitionStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn balancer_with(store: Arc<MemoryStore>, capacity: u32) -> Balancer<MemoryStore> {
    Balancer::new(store, BalancerConfig::default().with_barn_capacity(capacity))
}

/// Seed barns of one color with the given (capacity, occupancy) layout
async fn seed(
    store: &MemoryStore,
    color: Color,
    layout: &[(u32, u32)],
) -> Vec<(Barn, Vec<Animal>)> {
    let mut seeded = Vec::new();
    for (i, &(capacity, occupancy)) in layout.iter().enumerate() {
        let barn = Barn::new(format!("Barn {} - {}", i, color), color, capacity);
        store.save_barn(&barn).await.unwrap();

        let mut animals = Vec::new();
        for j in 0..occupancy {
            let animal = Animal::new(format!("{}-{}-{}", color, i, j), color).with_barn(barn.id);
            store.save_animal(&animal).await.unwrap();
            animals.push(animal);
        }
        seeded.push((barn, animals));
    }
    seeded
}

/// Capacity, no orphans, no empty barns, for every color
async fn assert_farm_invariants<S: PartitionStore + ?Sized>(store: &S) {
    for color in Color::ALL {
        let barns = store.find_barns_by_color(color).await.unwrap();
        let animals = store.find_animals_by_color(color).await.unwrap();

        let mut occupancy: HashMap<BarnId, u32> = barns.iter().map(|b| (b.id, 0)).collect();
        for animal in &animals {
            let barn = animal.barn.expect("animal without a barn");
            let count = occupancy
                .get_mut(&barn)
                .unwrap_or_else(|| panic!("animal {} references missing barn {}", animal.id, barn));
            *count += 1;
        }

        for barn in &barns {
            assert_eq!(barn.color, color);
            let count = occupancy[&barn.id];
            assert!(count <= barn.capacity, "barn {} over capacity", barn.id);
            assert!(count > 0, "empty barn {} left behind", barn.id);
        }
    }
}

async fn occupancies(balancer: &Balancer<MemoryStore>, color: Color) -> Vec<u32> {
    balancer
        .partition_report(color)
        .await
        .unwrap()
        .occupancies()
}

#[tokio::test]
async fn test_fill_then_overflow() {
    let store = Arc::new(MemoryStore::new());
    let balancer = balancer_with(store.clone(), 4);

    let mut placed = Vec::new();
    for i in 0..4 {
        placed.push(
            balancer
                .add_to_farm(Animal::new(format!("Ruby {}", i), Color::Red))
                .await
                .unwrap(),
        );
    }

    let first_barn = placed[0].barn.unwrap();
    assert!(placed.iter().all(|a| a.barn == Some(first_barn)));
    assert_eq!(occupancies(&balancer, Color::Red).await, vec![4]);

    balancer
        .add_to_farm(Animal::new("Ruby 4", Color::Red))
        .await
        .unwrap();

    let barns = store.find_barns_by_color(Color::Red).await.unwrap();
    assert_eq!(barns.len(), 2);
    assert!(balancer.is_barns_balanced(Color::Red).await.unwrap());
    assert_eq!(occupancies(&balancer, Color::Red).await, vec![3, 2]);
    assert_farm_invariants(store.as_ref()).await;
}

#[tokio::test]
async fn test_drain_first_barn() {
    let store = Arc::new(MemoryStore::new());
    let seeded = seed(&store, Color::Red, &[(4, 4), (4, 1)]).await;
    let balancer = balancer_with(store.clone(), 4);

    let (first_barn, first_animals) = &seeded[0];
    for animal in first_animals {
        balancer.remove_from_farm(animal).await.unwrap();
        assert!(balancer.is_barns_balanced(Color::Red).await.unwrap());
        assert_farm_invariants(store.as_ref()).await;
    }

    let barns = store.find_barns_by_color(Color::Red).await.unwrap();
    assert_eq!(barns.len(), 1);
    assert!(store.find_barn(first_barn.id).await.unwrap().is_none());

    let animals = store.find_animals_by_color(Color::Red).await.unwrap();
    assert_eq!(animals.len(), 1);
    assert_eq!(animals[0].id, seeded[1].1[0].id);
}

#[tokio::test]
async fn test_last_occupant_removed() {
    let store = Arc::new(MemoryStore::new());
    let seeded = seed(&store, Color::Red, &[(4, 4), (4, 4), (4, 1)]).await;
    let balancer = balancer_with(store.clone(), 4);

    let (lonely_barn, lonely) = &seeded[2];
    balancer.remove_from_farm(&lonely[0]).await.unwrap();

    assert!(store.find_barn(lonely_barn.id).await.unwrap().is_none());
    assert_eq!(occupancies(&balancer, Color::Red).await, vec![4, 4]);
    assert!(balancer.is_barns_balanced(Color::Red).await.unwrap());
    assert_farm_invariants(store.as_ref()).await;
}

#[tokio::test]
async fn test_first_animal_of_new_color() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, Color::Red, &[(4, 2)]).await;
    let balancer = balancer_with(store.clone(), 4);

    let placed = balancer
        .add_to_farm(Animal::new("Indy", Color::Indigo))
        .await
        .unwrap();

    let barns = store.find_barns_by_color(Color::Indigo).await.unwrap();
    assert_eq!(barns.len(), 1);
    assert_eq!(barns[0].name, "Barn - INDIGO");
    assert_eq!(placed.barn, Some(barns[0].id));
    assert!(balancer.is_barns_balanced(Color::Indigo).await.unwrap());
}

#[tokio::test]
async fn test_re_add_same_color() {
    let store = Arc::new(MemoryStore::new());
    let balancer = balancer_with(store.clone(), 4);

    let animals: Vec<Animal> = (0..5)
        .map(|i| Animal::new(format!("Hen {}", i), Color::Red))
        .collect();
    let placed = balancer.add_all_to_farm(animals).await.unwrap();

    let again = balancer.add_to_farm(placed[0].clone()).await.unwrap();
    assert_eq!(again.id, placed[0].id);
    assert!(again.is_placed());

    assert_eq!(balancer.find_all().await.unwrap().len(), 5);
    assert!(balancer.is_barns_balanced(Color::Red).await.unwrap());
    assert_farm_invariants(store.as_ref()).await;
}

#[tokio::test]
async fn test_re_add_after_color_change() {
    let store = Arc::new(MemoryStore::new());
    let balancer = balancer_with(store.clone(), 4);

    // Single animal: its old barn must not be left empty
    let mut lone = balancer
        .add_to_farm(Animal::new("Lone", Color::Red))
        .await
        .unwrap();
    lone.favorite_color = Color::Blue;
    let moved = balancer.add_to_farm(lone).await.unwrap();

    assert!(store.find_barns_by_color(Color::Red).await.unwrap().is_empty());
    assert!(store.find_animals_by_color(Color::Red).await.unwrap().is_empty());
    let blue_barns = store.find_barns_by_color(Color::Blue).await.unwrap();
    assert_eq!(blue_barns.len(), 1);
    assert_eq!(moved.barn, Some(blue_barns[0].id));
    assert_farm_invariants(store.as_ref()).await;

    balancer.remove_from_farm(&moved).await.unwrap();

    // Old partition must be rebalanced after losing animals
    let animals: Vec<Animal> = (0..5)
        .map(|i| Animal::new(format!("Rooster {}", i), Color::Red))
        .collect();
    let placed = balancer.add_all_to_farm(animals).await.unwrap();
    for animal in &placed[..3] {
        let mut repainted = animal.clone();
        repainted.favorite_color = Color::Blue;
        balancer.add_to_farm(repainted).await.unwrap();

        assert!(balancer.is_barns_balanced(Color::Red).await.unwrap());
        assert!(balancer.is_barns_balanced(Color::Blue).await.unwrap());
        assert_farm_invariants(store.as_ref()).await;
    }

    assert_eq!(occupancies(&balancer, Color::Red).await, vec![2]);
    assert_eq!(occupancies(&balancer, Color::Blue).await, vec![3]);
    assert_eq!(balancer.find_all().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_balance_check_is_repeatable() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, Color::Blue, &[(4, 4), (4, 1)]).await;
    let balancer = balancer_with(store, 4);

    let first = balancer.is_barns_balanced(Color::Blue).await.unwrap();
    let second = balancer.is_barns_balanced(Color::Blue).await.unwrap();
    assert!(!first);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_dissolve_keeps_every_animal() {
    let store = Arc::new(MemoryStore::new());
    let seeded = seed(&store, Color::Green, &[(4, 3), (4, 3), (4, 2)]).await;
    let balancer = balancer_with(store.clone(), 4);

    // 3,3,1 after this: total unused 5 >= 4, one barn must go
    let victim = seeded[2].1[0].clone();
    balancer.remove_from_farm(&victim).await.unwrap();

    let animals = store.find_animals_by_color(Color::Green).await.unwrap();
    assert_eq!(animals.len(), 7);
    assert_eq!(store.find_barns_by_color(Color::Green).await.unwrap().len(), 2);
    assert!(balancer.is_barns_balanced(Color::Green).await.unwrap());
    assert_farm_invariants(store.as_ref()).await;

    let expected: Vec<AnimalId> = seeded
        .iter()
        .flat_map(|(_, animals)| animals.iter().map(|a| a.id))
        .filter(|id| *id != victim.id)
        .collect();
    for id in expected {
        assert!(animals.iter().any(|a| a.id == id), "animal {} dropped", id);
    }
}

#[tokio::test]
async fn test_many_additions_stay_balanced() {
    let store = Arc::new(MemoryStore::new());
    let balancer = balancer_with(store.clone(), 5);

    for i in 0..53 {
        balancer
            .add_to_farm(Animal::new(format!("Cow {}", i), Color::Yellow))
            .await
            .unwrap();
        assert!(balancer.is_barns_balanced(Color::Yellow).await.unwrap());
    }

    let report = balancer.partition_report(Color::Yellow).await.unwrap();
    assert_eq!(report.animal_count, 53);
    assert_eq!(report.barns.len(), 11);
    assert_farm_invariants(store.as_ref()).await;
}

#[tokio::test]
async fn test_remove_everything() {
    let store = Arc::new(MemoryStore::new());
    let balancer = balancer_with(store.clone(), 3);

    let animals: Vec<Animal> = (0..10)
        .map(|i| Animal::new(format!("Pig {}", i), Color::Orange))
        .collect();
    let placed = balancer.add_all_to_farm(animals).await.unwrap();

    balancer.remove_all_from_farm(&placed).await.unwrap();
    assert!(store.find_barns_by_color(Color::Orange).await.unwrap().is_empty());
    assert!(balancer.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_step_cap_aborts_unit_of_work() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, Color::Red, &[(4, 4), (4, 4), (4, 1), (4, 1), (4, 1)]).await;
    let balancer = Balancer::new(
        store.clone(),
        BalancerConfig::default()
            .with_barn_capacity(4)
            .with_max_redistribution_steps(1),
    );

    let before = store.stats();
    let err = balancer
        .add_to_farm(Animal::new("Straw", Color::Red))
        .await
        .unwrap_err();
    assert!(matches!(err, FarmError::InvariantViolation(_)));

    let after = store.stats();
    assert_eq!(after.animal_count, before.animal_count);
    assert_eq!(after.barn_count, before.barn_count);
    assert_eq!(after.batches, before.batches);
}

#[tokio::test]
async fn test_concurrent_colors() {
    let store = Arc::new(MemoryStore::new());
    let balancer = Arc::new(balancer_with(store.clone(), 4));

    let mut handles = Vec::new();
    for color in Color::ALL {
        for worker in 0..3 {
            let balancer = balancer.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    balancer
                        .add_to_farm(Animal::new(format!("{}-{}-{}", color, worker, i), color))
                        .await
                        .unwrap();
                }
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for color in Color::ALL {
        let report = balancer.partition_report(color).await.unwrap();
        assert_eq!(report.animal_count, 30);
        assert!(report.balanced, "{}", report.summary());
    }
    assert_farm_invariants(store.as_ref()).await;
}

// =============================================================================
// STORAGE FAILURES
// =============================================================================

/// Memory store whose batch commits can be made to fail
struct FlakyStore {
    inner: MemoryStore,
    fail_commits: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_commits: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PartitionStore for FlakyStore {
    async fn find_barns_by_color(&self, color: Color) -> Result<Vec<Barn>> {
        self.inner.find_barns_by_color(color).await
    }

    async fn find_animals_by_color(&self, color: Color) -> Result<Vec<Animal>> {
        self.inner.find_animals_by_color(color).await
    }

    async fn find_animals_by_barn(&self, barn: BarnId) -> Result<Vec<Animal>> {
        self.inner.find_animals_by_barn(barn).await
    }

    async fn find_animal(&self, id: AnimalId) -> Result<Option<Animal>> {
        self.inner.find_animal(id).await
    }

    async fn find_barn(&self, id: BarnId) -> Result<Option<Barn>> {
        self.inner.find_barn(id).await
    }

    async fn find_all_animals(&self) -> Result<Vec<Animal>> {
        self.inner.find_all_animals().await
    }

    async fn save_barn(&self, barn: &Barn) -> Result<()> {
        self.inner.save_barn(barn).await
    }

    async fn delete_barn(&self, id: BarnId) -> Result<bool> {
        self.inner.delete_barn(id).await
    }

    async fn save_animal(&self, animal: &Animal) -> Result<()> {
        self.inner.save_animal(animal).await
    }

    async fn delete_animal(&self, id: AnimalId) -> Result<bool> {
        self.inner.delete_animal(id).await
    }

    async fn delete_all(&self) -> Result<()> {
        self.inner.delete_all().await
    }

    async fn apply(&self, changes: Vec<Change>) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(FarmError::Storage("connection reset".to_string()));
        }
        self.inner.apply(changes).await
    }
}

#[tokio::test]
async fn test_storage_failure_propagates() {
    let store = Arc::new(FlakyStore::new());
    let balancer = Balancer::new(store.clone(), BalancerConfig::default().with_barn_capacity(4));

    let kept = balancer
        .add_to_farm(Animal::new("Kept", Color::Violet))
        .await
        .unwrap();

    store.fail_commits.store(true, Ordering::SeqCst);

    let err = balancer
        .add_to_farm(Animal::new("Lost", Color::Violet))
        .await
        .unwrap_err();
    assert!(matches!(err, FarmError::Storage(_)));

    let err = balancer.remove_from_farm(&kept).await.unwrap_err();
    assert!(matches!(err, FarmError::Storage(_)));

    // Nothing from the failed units of work reached the store
    let animals = store.find_animals_by_color(Color::Violet).await.unwrap();
    assert_eq!(animals, vec![kept]);
    assert_farm_invariants(store.as_ref()).await;
}

#[tokio::test]
async fn test_dyn_store() {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryStore::new());
    let balancer = Balancer::new(store, BalancerConfig::default().with_barn_capacity(2));

    for i in 0..5 {
        balancer
            .add_to_farm(Animal::new(format!("Duck {}", i), Color::Blue))
            .await
            .unwrap();
    }
    assert!(balancer.is_barns_balanced(Color::Blue).await.unwrap());
    assert_farm_invariants(balancer.store()).await;
}
