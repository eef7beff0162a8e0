//! # Stores
//!
//! Collaborators the recommendation core reads from and writes to.
//!
//! | trait | redis backend | memory backend |
//! |---|---|---|
//! | [`AccumulationStore`] | hash `accumulate:<uid>`, tag -> float | [`MemoryAccumulation`] |
//! | [`UserStore`] | hash `users:preference`, uid -> `Preference` | [`MemoryUsers`] |
//! | [`CatalogStore`] | Meilisearch `restaurants` index | [`MemoryCatalog`] |
//! | [`RecommendationStore`] | hash `recommend:<uid>`, `<generation>:<page>` -> `StoredPage` | [`MemoryRecommendations`] |
//!
//! Only the coordinator writes durable preferences and recommendation pages.
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bank::catalog::Restaurant;
use thiserror::Error;

pub mod memory;

pub use memory::{MemoryAccumulation, MemoryCatalog, MemoryRecommendations, MemoryUsers};

use crate::recommend::RankedItem;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Meilisearch error: {0}")]
    Meili(#[from] meilisearch_sdk::errors::Error),

    #[error("Malformed stored value: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Malformed stored value: {0}")]
    Malformed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Ephemeral per-user tag deltas.
#[async_trait]
pub trait AccumulationStore: Send + Sync {
    /// Adds each amount to its tag. Creates the user's entry if missing.
    async fn increment(&self, uid: &str, deltas: &[(&str, f64)]) -> StoreResult<()>;

    /// Reads every tag delta and clears them in one atomic step.
    async fn drain(&self, uid: &str) -> StoreResult<HashMap<String, f64>>;
}

/// Durable preference vectors.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_preference(&self, uid: &str) -> StoreResult<Option<Vec<f64>>>;

    async fn set_preference(&self, uid: &str, weights: &[f64]) -> StoreResult<()>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_all(&self) -> StoreResult<Vec<Restaurant>>;
}

/// The generation readers are served from, with how many pages it committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentGeneration {
    pub generation: u64,
    pub pages: u32,
}

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Allocates the next generation for the user. Never hands out the same value twice.
    async fn next_generation(&self, uid: &str) -> StoreResult<u64>;

    /// Replaces the contents of `(uid, page, generation)`.
    async fn replace_page(
        &self,
        uid: &str,
        page: u32,
        generation: u64,
        items: &[RankedItem],
    ) -> StoreResult<()>;

    async fn get_page(
        &self,
        uid: &str,
        page: u32,
        generation: u64,
    ) -> StoreResult<Option<Vec<RankedItem>>>;

    async fn current_generation(&self, uid: &str) -> StoreResult<Option<CurrentGeneration>>;

    /// Points readers at `current`. Returns false, leaving the pointer alone, unless
    /// `current.generation` is newer than what is already published.
    async fn publish(&self, uid: &str, current: CurrentGeneration) -> StoreResult<bool>;

    /// Deletes pages of every generation older than `keep`, returning how many were removed.
    async fn prune(&self, uid: &str, keep: u64) -> StoreResult<usize>;
}

/// One handle per collaborator, shared by the coordinator and the routes.
#[derive(Clone)]
pub struct Stores {
    pub accumulation: Arc<dyn AccumulationStore>,
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub recommendations: Arc<dyn RecommendationStore>,
}

impl Stores {
    pub fn memory(restaurants: Vec<Restaurant>) -> Self {
        Self {
            accumulation: Arc::new(MemoryAccumulation::default()),
            users: Arc::new(MemoryUsers::default()),
            catalog: Arc::new(MemoryCatalog::new(restaurants)),
            recommendations: Arc::new(MemoryRecommendations::default()),
        }
    }
}
