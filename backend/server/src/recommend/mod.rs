//! # Recommendations
//!
//! Turns a user's tag preferences and the restaurant catalog into a paginated ranking.
//!
//! ```text
//! trigger(uid)
//!   -> PreferenceAccumulator::drain_and_reset   clicks since the last run
//!   -> UserStore::set_preference                durable vector, clamped at zero
//!   -> CatalogVectorizer::snapshot              items + tag bitmaps
//!   -> rank                                     dot product, ties by id
//!   -> RecommendationPager::paginate / commit   pages of one generation
//!   -> RecommendationPager::publish             readers switch over
//! ```
//!
//! ## Sizes
//! - 18 food types, so a tag row fits in 3 bytes
//! - Catalog of a few thousand restaurants, ranking is linear in its size
//! - 100 restaurants per page, the app asks for at most 10 pages
pub mod accumulator;
pub mod coordinator;
pub mod error;
pub mod pager;
pub mod preference;
pub mod ranker;
pub mod vectorizer;
pub mod vocabulary;

pub use accumulator::{CLICK_STEP, PreferenceAccumulator};
pub use coordinator::{RecomputeCoordinator, RunState, TriggerOutcome};
pub use error::RecommendError;
pub use pager::{PAGE_SIZE, PageOrder, RecommendationPage, RecommendationPager};
pub use preference::PreferenceVector;
pub use ranker::{RankedItem, rank, score};
pub use vectorizer::{CatalogSnapshot, CatalogVectorizer, TagMatrix, vectorize};
pub use vocabulary::Vocabulary;
