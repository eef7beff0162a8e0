//! # Recompute coordinator
//!
//! Owns every run of the pipeline and is the only writer of durable preferences and recommendation pages.
//!
//! ## Run slots
//!
//! One slot per user in a [`DashMap`], created when a trigger finds the user idle and removed when the run
//! finishes with nothing queued. State changes happen under the map's shard lock and never across an await,
//! so two runs for one user cannot overlap while different users run fully in parallel.
//!
//! ```text
//! Idle -> Running -> Committing -> Idle
//!            |            |
//!            +--> Aborted <+--> Idle
//! ```
//!
//! | trigger arrives while | result |
//! |---|---|
//! | `Idle` | starts a run, caller gets its outcome |
//! | `Running` | `Coalesced`, the in-flight run already drained the accumulator |
//! | `Committing` / `Aborted` | `Queued`, a fresh run starts right after the current one |
//!
//! Explicit preference submissions are never coalesced away: their vector waits in the slot for the next run.
//!
//! ## Ordering inside a run
//!
//! 1. allocate a generation
//! 2. apply a queued explicit vector, drain the accumulator, persist the merged durable vector
//! 3. snapshot, rank, paginate
//! 4. write every page, then publish the generation
//! 5. prune pages of older generations
//!
//! Runs execute on their own task, so a caller that stops waiting never leaves a slot behind. A run that panics
//! frees its slot while unwinding.
//!
//! The durable vector is persisted before the catalog is touched, so a failed ranking never loses a preference
//! update. Pages of a failed commit stay unpublished and are pruned once a newer generation is published.
use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{
    CLICK_STEP, CatalogVectorizer, PageOrder, PreferenceAccumulator, PreferenceVector,
    RecommendError, RecommendationPage, RecommendationPager, Vocabulary, rank,
};
use crate::store::{Stores, UserStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Committing,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Completed { generation: u64, pages: u32 },
    Coalesced,
    Queued,
}

struct RunSlot {
    state: RunState,
    pending: bool,
    explicit: Option<PreferenceVector>,
}

/// Frees the slot if a run unwinds.
struct SlotGuard<'a> {
    slots: &'a DashMap<String, RunSlot>,
    uid: &'a str,
    armed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.slots.remove(self.uid);
            error!(uid = self.uid, "Recompute unwound, slot released");
        }
    }
}

enum Claim {
    Run(Option<PreferenceVector>),
    Coalesced,
    Queued,
}

pub struct RecomputeCoordinator {
    vocabulary: Arc<Vocabulary>,
    accumulator: PreferenceAccumulator,
    vectorizer: CatalogVectorizer,
    pager: RecommendationPager,
    users: Arc<dyn UserStore>,
    slots: DashMap<String, RunSlot>,
}

impl RecomputeCoordinator {
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        stores: Stores,
        page_size: usize,
        order: PageOrder,
    ) -> Self {
        Self {
            accumulator: PreferenceAccumulator::new(
                vocabulary.clone(),
                stores.accumulation,
                stores.users.clone(),
            ),
            vectorizer: CatalogVectorizer::new(vocabulary.clone(), stores.catalog),
            pager: RecommendationPager::new(stores.recommendations, page_size, order),
            users: stores.users,
            slots: DashMap::new(),
            vocabulary,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn state(&self, uid: &str) -> RunState {
        self.slots
            .get(uid)
            .map_or(RunState::Idle, |slot| slot.state)
    }

    /// Recomputes `uid`'s recommendations, or joins the run already in flight.
    pub async fn trigger(self: &Arc<Self>, uid: &str) -> Result<TriggerOutcome, RecommendError> {
        match self.claim(uid, None) {
            Claim::Run(explicit) => self.drive_detached(uid, explicit).await,
            Claim::Coalesced => {
                debug!(uid, "Coalesced trigger into running computation");
                Ok(TriggerOutcome::Coalesced)
            }
            Claim::Queued => {
                debug!(uid, "Queued trigger behind committing computation");
                Ok(TriggerOutcome::Queued)
            }
        }
    }

    /// Fire-and-forget [`trigger`](Self::trigger). Failures are logged, never returned.
    pub fn spawn_trigger(self: &Arc<Self>, uid: String) {
        let coordinator = self.clone();

        tokio::spawn(async move {
            if let Err(e) = coordinator.trigger(&uid).await {
                error!(uid = %uid, "Background recompute failed: {e}");
            }
        });
    }

    /// Replaces the user's durable vector with an explicit submission and recomputes.
    pub async fn submit_preferences(
        self: &Arc<Self>,
        uid: &str,
        weights: Vec<f64>,
    ) -> Result<TriggerOutcome, RecommendError> {
        let vector = PreferenceVector::from_weights(&self.vocabulary, weights)?;

        match self.claim(uid, Some(vector)) {
            Claim::Run(explicit) => self.drive_detached(uid, explicit).await,
            Claim::Coalesced | Claim::Queued => Ok(TriggerOutcome::Queued),
        }
    }

    /// Records an implicit click on a restaurant carrying `tags`.
    pub async fn record_click<S: AsRef<str>>(
        &self,
        uid: &str,
        tags: &[S],
    ) -> Result<usize, RecommendError> {
        self.accumulator.increment(uid, tags, CLICK_STEP).await
    }

    pub async fn recommendation_page(
        &self,
        uid: &str,
        page: u32,
    ) -> Result<RecommendationPage, RecommendError> {
        self.pager.read(uid, page).await
    }

    fn claim(&self, uid: &str, explicit: Option<PreferenceVector>) -> Claim {
        match self.slots.entry(uid.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(RunSlot {
                    state: RunState::Running,
                    pending: false,
                    explicit: None,
                });
                Claim::Run(explicit)
            }
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();

                if explicit.is_some() {
                    slot.explicit = explicit;
                    slot.pending = true;
                    return Claim::Queued;
                }

                match slot.state {
                    RunState::Running | RunState::Idle => Claim::Coalesced,
                    RunState::Committing | RunState::Aborted => {
                        slot.pending = true;
                        Claim::Queued
                    }
                }
            }
        }
    }

    /// Hands the slot to a queued run, or frees it.
    fn release(&self, uid: &str) -> Option<Option<PreferenceVector>> {
        match self.slots.entry(uid.to_string()) {
            Entry::Occupied(mut entry) if entry.get().pending => {
                let slot = entry.get_mut();
                slot.pending = false;
                slot.state = RunState::Running;
                Some(slot.explicit.take())
            }
            Entry::Occupied(entry) => {
                entry.remove();
                None
            }
            Entry::Vacant(_) => None,
        }
    }

    fn set_state(&self, uid: &str, state: RunState) {
        if let Some(mut slot) = self.slots.get_mut(uid) {
            slot.state = state;
        }
    }

    /// Drives the claimed slot on its own task. Dropping the returned future leaves the run going.
    async fn drive_detached(
        self: &Arc<Self>,
        uid: &str,
        explicit: Option<PreferenceVector>,
    ) -> Result<TriggerOutcome, RecommendError> {
        let coordinator = self.clone();
        let uid = uid.to_string();

        tokio::spawn(async move { coordinator.drive(&uid, explicit).await }).await?
    }

    /// Runs until the slot has nothing queued. The caller gets the first run's result; queued runs log their own.
    async fn drive(
        &self,
        uid: &str,
        explicit: Option<PreferenceVector>,
    ) -> Result<TriggerOutcome, RecommendError> {
        let mut guard = SlotGuard {
            slots: &self.slots,
            uid,
            armed: true,
        };

        let outcome = self.run(uid, explicit).await;

        while let Some(explicit) = self.release(uid) {
            if let Err(e) = self.run(uid, explicit).await {
                warn!(uid, "Queued recompute failed: {e}");
            }
        }

        guard.armed = false;
        outcome
    }

    async fn run(
        &self,
        uid: &str,
        explicit: Option<PreferenceVector>,
    ) -> Result<TriggerOutcome, RecommendError> {
        let generation = match self.pager.allocate(uid).await {
            Ok(generation) => generation,
            Err(e) => {
                self.set_state(uid, RunState::Aborted);
                error!(uid, "Failed to allocate generation: {e}");
                return Err(e);
            }
        };

        info!(uid, generation, "Recompute started");

        match self.compute(uid, generation, explicit).await {
            Ok(pages) => {
                info!(uid, generation, pages, "Recompute committed");
                Ok(TriggerOutcome::Completed { generation, pages })
            }
            Err(e) => {
                self.set_state(uid, RunState::Aborted);
                error!(uid, generation, "Recompute aborted: {e}");
                Err(e)
            }
        }
    }

    async fn compute(
        &self,
        uid: &str,
        generation: u64,
        explicit: Option<PreferenceVector>,
    ) -> Result<u32, RecommendError> {
        let preference = self.update_preference(uid, explicit).await?;

        let snapshot = self.vectorizer.snapshot().await?;
        let ranked = rank(snapshot, &preference);
        let pages = self.pager.paginate(uid, generation, ranked);
        let count = pages.len() as u32;

        self.set_state(uid, RunState::Committing);
        self.pager.commit(uid, generation, &pages).await?;

        if self.pager.publish(uid, generation, count).await? {
            self.pager.prune(uid, generation).await;
        } else {
            warn!(uid, generation, "Newer generation already published");
        }

        Ok(count)
    }

    /// Merges drained clicks into the durable vector and persists it.
    async fn update_preference(
        &self,
        uid: &str,
        explicit: Option<PreferenceVector>,
    ) -> Result<PreferenceVector, RecommendError> {
        let (durable, persisted) = match explicit {
            Some(vector) => {
                let vector = self
                    .accumulator
                    .set_explicit(uid, vector.into_weights())
                    .await?;
                (vector, true)
            }
            None => {
                let stored = self.users.get_preference(uid).await?;
                let persisted = stored
                    .as_ref()
                    .is_some_and(|weights| weights.len() == self.vocabulary.len());
                (
                    PreferenceVector::from_stored(&self.vocabulary, uid, stored),
                    persisted,
                )
            }
        };

        let delta = self.accumulator.drain_and_reset(uid).await?;
        if delta.is_zero() && persisted {
            return Ok(durable);
        }

        let merged = durable.merge(&delta);

        if let Err(e) = self.users.set_preference(uid, merged.weights()).await {
            if let Err(restore) = self.accumulator.restore(uid, &delta).await {
                error!(uid, "Lost accumulated clicks: {restore}");
            }
            return Err(e.into());
        }

        Ok(merged)
    }
}
