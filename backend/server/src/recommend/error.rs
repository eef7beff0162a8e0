use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("Preference vector has {found} weights, expected {expected}")]
    InvalidVectorLength { expected: usize, found: usize },

    #[error("Preference weight {value} at position {index} must be finite and non-negative")]
    InvalidWeight { index: usize, value: f64 },

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(#[source] StoreError),

    #[error("Failed to persist page {page} of generation {generation}: {source}")]
    PersistenceFailure {
        generation: u64,
        page: u32,
        source: StoreError,
    },

    #[error("Recommendation page {page} not found")]
    NotFound { page: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Recompute task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
