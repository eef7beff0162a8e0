//! In-process stores.
//!
//! Backs `STORE_BACKEND=memory` deployments and the test suite. Each store can be told to fail so abort paths
//! are reachable without a broken Redis.
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bank::catalog::Restaurant;
use parking_lot::{Mutex, RwLock};
use tokio::time::sleep;

use super::{
    AccumulationStore, CatalogStore, CurrentGeneration, RecommendationStore, StoreError,
    StoreResult, UserStore,
};
use crate::recommend::RankedItem;

#[derive(Default)]
pub struct MemoryAccumulation {
    deltas: Mutex<HashMap<String, HashMap<String, f64>>>,
}

#[async_trait]
impl AccumulationStore for MemoryAccumulation {
    async fn increment(&self, uid: &str, deltas: &[(&str, f64)]) -> StoreResult<()> {
        let mut guard = self.deltas.lock();
        let entry = guard.entry(uid.to_string()).or_default();

        for (tag, delta) in deltas {
            *entry.entry(tag.to_string()).or_insert(0.0) += delta;
        }

        Ok(())
    }

    async fn drain(&self, uid: &str) -> StoreResult<HashMap<String, f64>> {
        Ok(self.deltas.lock().remove(uid).unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    preferences: RwLock<HashMap<String, Vec<f64>>>,
    fail_writes: AtomicBool,
}

impl MemoryUsers {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn get_preference(&self, uid: &str) -> StoreResult<Option<Vec<f64>>> {
        Ok(self.preferences.read().get(uid).cloned())
    }

    async fn set_preference(&self, uid: &str, weights: &[f64]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("user store rejected write".into()));
        }

        self.preferences
            .write()
            .insert(uid.to_string(), weights.to_vec());

        Ok(())
    }
}

pub struct MemoryCatalog {
    restaurants: RwLock<Vec<Restaurant>>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryCatalog {
    pub fn new(restaurants: Vec<Restaurant>) -> Self {
        Self {
            restaurants: RwLock::new(restaurants),
            unavailable: AtomicBool::new(false),
            latency: Mutex::new(None),
        }
    }

    pub fn replace(&self, restaurants: Vec<Restaurant>) {
        *self.restaurants.write() = restaurants;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every listing, emulating a slow index.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn list_all(&self) -> StoreResult<Vec<Restaurant>> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("catalog offline".into()));
        }

        Ok(self.restaurants.read().clone())
    }
}

#[derive(Default)]
pub struct MemoryRecommendations {
    pages: RwLock<HashMap<(String, u64, u32), Vec<RankedItem>>>,
    generations: Mutex<HashMap<String, u64>>,
    current: RwLock<HashMap<String, CurrentGeneration>>,
    page_writes: AtomicUsize,
    fail_after: Mutex<Option<usize>>,
    write_latency: Mutex<Option<Duration>>,
}

impl MemoryRecommendations {
    /// Lets `writes` more page writes through, then fails every following one. `None` heals the store.
    pub fn fail_after(&self, writes: Option<usize>) {
        self.page_writes.store(0, Ordering::SeqCst);
        *self.fail_after.lock() = writes;
    }

    /// Delays every page write, holding runs in `Committing`.
    pub fn set_write_latency(&self, latency: Option<Duration>) {
        *self.write_latency.lock() = latency;
    }

    /// Every stored page of one generation, in page order.
    pub fn generation_pages(&self, uid: &str, generation: u64) -> Vec<(u32, Vec<RankedItem>)> {
        let mut pages: Vec<(u32, Vec<RankedItem>)> = self
            .pages
            .read()
            .iter()
            .filter(|((owner, stored, _), _)| owner == uid && *stored == generation)
            .map(|((_, _, page), items)| (*page, items.clone()))
            .collect();

        pages.sort_by_key(|(page, _)| *page);
        pages
    }

    pub fn stored_generations(&self, uid: &str) -> Vec<u64> {
        let mut generations: Vec<u64> = self
            .pages
            .read()
            .keys()
            .filter(|(owner, _, _)| owner == uid)
            .map(|(_, generation, _)| *generation)
            .collect();

        generations.sort_unstable();
        generations.dedup();
        generations
    }
}

#[async_trait]
impl RecommendationStore for MemoryRecommendations {
    async fn next_generation(&self, uid: &str) -> StoreResult<u64> {
        let mut guard = self.generations.lock();
        let generation = guard.entry(uid.to_string()).or_insert(0);
        *generation += 1;

        Ok(*generation)
    }

    async fn replace_page(
        &self,
        uid: &str,
        page: u32,
        generation: u64,
        items: &[RankedItem],
    ) -> StoreResult<()> {
        let latency = *self.write_latency.lock();
        if let Some(latency) = latency {
            sleep(latency).await;
        }

        if let Some(limit) = *self.fail_after.lock() {
            if self.page_writes.fetch_add(1, Ordering::SeqCst) >= limit {
                return Err(StoreError::Unavailable("page write rejected".into()));
            }
        }

        self.pages
            .write()
            .insert((uid.to_string(), generation, page), items.to_vec());

        Ok(())
    }

    async fn get_page(
        &self,
        uid: &str,
        page: u32,
        generation: u64,
    ) -> StoreResult<Option<Vec<RankedItem>>> {
        Ok(self
            .pages
            .read()
            .get(&(uid.to_string(), generation, page))
            .cloned())
    }

    async fn current_generation(&self, uid: &str) -> StoreResult<Option<CurrentGeneration>> {
        Ok(self.current.read().get(uid).copied())
    }

    async fn publish(&self, uid: &str, current: CurrentGeneration) -> StoreResult<bool> {
        let mut guard = self.current.write();

        match guard.get(uid) {
            Some(existing) if existing.generation >= current.generation => Ok(false),
            _ => {
                guard.insert(uid.to_string(), current);
                Ok(true)
            }
        }
    }

    async fn prune(&self, uid: &str, keep: u64) -> StoreResult<usize> {
        let mut guard = self.pages.write();
        let before = guard.len();

        guard.retain(|(owner, generation, _), _| owner != uid || *generation >= keep);

        Ok(before - guard.len())
    }
}
