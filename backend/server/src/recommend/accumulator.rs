use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, warn};

use super::{PreferenceVector, RecommendError, Vocabulary};
use crate::store::{AccumulationStore, UserStore};

/// Weight added to each of a restaurant's tags when the user opens it.
pub const CLICK_STEP: f64 = 0.1;

/// Collects implicit signals between recompute runs.
///
/// Deltas live in the accumulation store, never in the durable user record, until a run drains them.
pub struct PreferenceAccumulator {
    vocabulary: Arc<Vocabulary>,
    accumulation: Arc<dyn AccumulationStore>,
    users: Arc<dyn UserStore>,
}

impl PreferenceAccumulator {
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        accumulation: Arc<dyn AccumulationStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            vocabulary,
            accumulation,
            users,
        }
    }

    /// Adds `step` once per distinct vocabulary tag in `tags`. Returns how many tags counted.
    pub async fn increment<S: AsRef<str>>(
        &self,
        uid: &str,
        tags: &[S],
        step: f64,
    ) -> Result<usize, RecommendError> {
        let mut known = BTreeSet::new();

        for tag in tags {
            let tag = tag.as_ref();
            match self.vocabulary.position(tag) {
                Some(_) => {
                    known.insert(tag);
                }
                None => warn!(uid, tag, "Ignoring click tag outside vocabulary"),
            }
        }

        if known.is_empty() {
            return Ok(0);
        }

        let deltas: Vec<(&str, f64)> = known.iter().map(|tag| (*tag, step)).collect();
        self.accumulation.increment(uid, &deltas).await?;

        debug!(uid, tags = deltas.len(), "Accumulated click");
        Ok(deltas.len())
    }

    /// Takes everything accumulated so far. The next drain only sees increments that land afterwards.
    pub async fn drain_and_reset(&self, uid: &str) -> Result<PreferenceVector, RecommendError> {
        let deltas = self.accumulation.drain(uid).await?;

        Ok(PreferenceVector::from_tags(&self.vocabulary, &deltas))
    }

    /// Puts a drained delta back so a failed run does not lose it.
    pub async fn restore(&self, uid: &str, delta: &PreferenceVector) -> Result<(), RecommendError> {
        let deltas: Vec<(&str, f64)> = delta.nonzero(&self.vocabulary).collect();

        if !deltas.is_empty() {
            self.accumulation.increment(uid, &deltas).await?;
        }

        Ok(())
    }

    /// Overwrites the durable vector. Nothing is written when validation fails.
    pub async fn set_explicit(
        &self,
        uid: &str,
        weights: Vec<f64>,
    ) -> Result<PreferenceVector, RecommendError> {
        let vector = PreferenceVector::from_weights(&self.vocabulary, weights)?;
        self.users.set_preference(uid, vector.weights()).await?;

        Ok(vector)
    }
}
