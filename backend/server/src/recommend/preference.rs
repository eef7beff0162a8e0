use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use super::{RecommendError, Vocabulary};

/// Per-tag affinity weights, always exactly one per vocabulary tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PreferenceVector(Vec<f64>);

impl PreferenceVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    /// Validates an explicit submission.
    pub fn from_weights(vocabulary: &Vocabulary, weights: Vec<f64>) -> Result<Self, RecommendError> {
        if weights.len() != vocabulary.len() {
            return Err(RecommendError::InvalidVectorLength {
                expected: vocabulary.len(),
                found: weights.len(),
            });
        }

        if let Some((index, &value)) = weights
            .iter()
            .enumerate()
            .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
        {
            return Err(RecommendError::InvalidWeight { index, value });
        }

        Ok(Self(weights))
    }

    /// Reads a durable vector back. Users without one start at zero; vectors written under a different
    /// vocabulary size are padded or truncated.
    pub fn from_stored(vocabulary: &Vocabulary, uid: &str, stored: Option<Vec<f64>>) -> Self {
        let Some(mut weights) = stored else {
            return Self::zeros(vocabulary.len());
        };

        if weights.len() != vocabulary.len() {
            warn!(
                uid,
                stored = weights.len(),
                expected = vocabulary.len(),
                "Resizing stored preference vector"
            );
            weights.resize(vocabulary.len(), 0.0);
        }

        for weight in weights.iter_mut() {
            if !weight.is_finite() || *weight < 0.0 {
                *weight = 0.0;
            }
        }

        Self(weights)
    }

    /// Collects tag-keyed deltas. Tags outside the vocabulary are dropped.
    pub fn from_tags(vocabulary: &Vocabulary, deltas: &HashMap<String, f64>) -> Self {
        let mut vector = Self::zeros(vocabulary.len());

        for (tag, delta) in deltas {
            match vocabulary.position(tag) {
                Some(index) => vector.0[index] += delta,
                None => warn!(tag = %tag, "Ignoring accumulated tag outside vocabulary"),
            }
        }

        vector
    }

    /// Vector addition clamped at zero.
    pub fn merge(&self, delta: &Self) -> Self {
        Self(
            self.0
                .iter()
                .zip(delta.0.iter().chain(std::iter::repeat(&0.0)))
                .map(|(weight, delta)| (weight + delta).max(0.0))
                .collect(),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|weight| *weight == 0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.0
    }

    pub fn into_weights(self) -> Vec<f64> {
        self.0
    }

    /// `(tag, weight)` for every non-zero weight.
    pub fn nonzero<'a>(&'a self, vocabulary: &'a Vocabulary) -> impl Iterator<Item = (&'a str, f64)> {
        vocabulary
            .tags()
            .iter()
            .zip(self.0.iter())
            .filter(|(_, weight)| **weight != 0.0)
            .map(|(tag, weight)| (tag.as_str(), *weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Vocabulary {
        Vocabulary::new(["A", "B", "C"])
    }

    #[test]
    fn wrong_length_is_rejected() {
        let result = PreferenceVector::from_weights(&abc(), vec![1.0, 2.0]);

        assert!(matches!(
            result,
            Err(RecommendError::InvalidVectorLength {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn negative_and_nan_weights_are_rejected() {
        assert!(matches!(
            PreferenceVector::from_weights(&abc(), vec![1.0, -0.5, 0.0]),
            Err(RecommendError::InvalidWeight { index: 1, .. })
        ));
        assert!(matches!(
            PreferenceVector::from_weights(&abc(), vec![f64::NAN, 0.0, 0.0]),
            Err(RecommendError::InvalidWeight { index: 0, .. })
        ));
    }

    #[test]
    fn missing_user_starts_at_zero() {
        let vector = PreferenceVector::from_stored(&abc(), "u1", None);

        assert_eq!(vector.weights(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn legacy_vectors_are_resized() {
        let short = PreferenceVector::from_stored(&abc(), "u1", Some(vec![0.4]));
        let long = PreferenceVector::from_stored(&abc(), "u1", Some(vec![1.0, 2.0, 3.0, 4.0]));

        assert_eq!(short.weights(), [0.4, 0.0, 0.0]);
        assert_eq!(long.weights(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn merge_clamps_at_zero() {
        let durable = PreferenceVector(vec![1.0, 0.2, 0.0]);
        let delta = PreferenceVector(vec![0.5, -1.0, 0.1]);

        assert_eq!(durable.merge(&delta).weights(), [1.5, 0.0, 0.1]);
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let deltas = HashMap::from([("A".to_string(), 0.3), ("Z".to_string(), 9.0)]);
        let vector = PreferenceVector::from_tags(&abc(), &deltas);

        assert_eq!(vector.weights(), [0.3, 0.0, 0.0]);
    }
}
