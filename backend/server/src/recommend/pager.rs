use std::{
    fmt::{self, Display},
    hash::{DefaultHasher, Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::Serialize;
use tracing::{debug, warn};

use super::{RankedItem, RecommendError};
use crate::store::{CurrentGeneration, RecommendationStore};

pub const PAGE_SIZE: usize = 100;

/// Order of items inside one page. Pages themselves always follow rank order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageOrder {
    Ranked,
    /// Shuffled with a seed derived from `(uid, generation, page)`, so a retried commit writes the same pages.
    #[default]
    Shuffled,
}

impl FromStr for PageOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ranked" => Ok(Self::Ranked),
            "shuffled" => Ok(Self::Shuffled),
            other => Err(format!("unknown page order '{other}'")),
        }
    }
}

impl Display for PageOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ranked => f.write_str("ranked"),
            Self::Shuffled => f.write_str("shuffled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationPage {
    pub uid: String,
    pub page: u32,
    pub generation: u64,
    pub recommendation: Vec<RankedItem>,
}

pub struct RecommendationPager {
    store: Arc<dyn RecommendationStore>,
    page_size: usize,
    order: PageOrder,
}

impl RecommendationPager {
    pub fn new(store: Arc<dyn RecommendationStore>, page_size: usize, order: PageOrder) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            order,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn allocate(&self, uid: &str) -> Result<u64, RecommendError> {
        Ok(self.store.next_generation(uid).await?)
    }

    /// Contiguous chunks of `page_size`, numbered from 1. Only the last page may be short.
    pub fn paginate(
        &self,
        uid: &str,
        generation: u64,
        ranked: Vec<RankedItem>,
    ) -> Vec<RecommendationPage> {
        let mut pages = Vec::with_capacity(ranked.len().div_ceil(self.page_size));
        let mut items = ranked.into_iter().peekable();
        let mut page = 1;

        while items.peek().is_some() {
            let mut recommendation: Vec<RankedItem> = items.by_ref().take(self.page_size).collect();

            if self.order == PageOrder::Shuffled {
                recommendation.shuffle(&mut page_rng(uid, generation, page));
            }

            pages.push(RecommendationPage {
                uid: uid.to_string(),
                page,
                generation,
                recommendation,
            });
            page += 1;
        }

        pages
    }

    /// Replaces every page of `generation`. Safe to repeat: each write overwrites `(uid, page, generation)`.
    pub async fn commit(
        &self,
        uid: &str,
        generation: u64,
        pages: &[RecommendationPage],
    ) -> Result<(), RecommendError> {
        for page in pages {
            debug_assert_eq!(page.generation, generation);

            self.store
                .replace_page(uid, page.page, generation, &page.recommendation)
                .await
                .map_err(|source| RecommendError::PersistenceFailure {
                    generation,
                    page: page.page,
                    source,
                })?;
        }

        Ok(())
    }

    /// Makes `generation` the one readers see.
    pub async fn publish(
        &self,
        uid: &str,
        generation: u64,
        pages: u32,
    ) -> Result<bool, RecommendError> {
        let current = CurrentGeneration { generation, pages };

        Ok(self.store.publish(uid, current).await?)
    }

    /// Reads `page` of the published generation.
    ///
    /// A reader racing a publish may find its generation already pruned; it retries once against the new pointer.
    pub async fn read(&self, uid: &str, page: u32) -> Result<RecommendationPage, RecommendError> {
        let current = self.current(uid, page).await?;

        if let Some(recommendation) = self.store.get_page(uid, page, current.generation).await? {
            return Ok(RecommendationPage {
                uid: uid.to_string(),
                page,
                generation: current.generation,
                recommendation,
            });
        }

        let latest = self.current(uid, page).await?;
        if latest.generation == current.generation {
            return Err(RecommendError::NotFound { page });
        }

        debug!(uid, page, generation = latest.generation, "Page moved to newer generation");

        let recommendation = self
            .store
            .get_page(uid, page, latest.generation)
            .await?
            .ok_or(RecommendError::NotFound { page })?;

        Ok(RecommendationPage {
            uid: uid.to_string(),
            page,
            generation: latest.generation,
            recommendation,
        })
    }

    async fn current(&self, uid: &str, page: u32) -> Result<CurrentGeneration, RecommendError> {
        match self.store.current_generation(uid).await? {
            Some(current) if page >= 1 && page <= current.pages => Ok(current),
            _ => Err(RecommendError::NotFound { page }),
        }
    }

    /// Drops pages of every generation older than `published`, including partial ones from aborted runs.
    pub async fn prune(&self, uid: &str, published: u64) {
        match self.store.prune(uid, published).await {
            Ok(0) => {}
            Ok(removed) => debug!(uid, generation = published, removed, "Pruned stale pages"),
            Err(e) => warn!(uid, generation = published, "Failed to prune stale pages: {e}"),
        }
    }
}

fn page_rng(uid: &str, generation: u64, page: u32) -> StdRng {
    let mut hasher = DefaultHasher::new();
    (uid, generation, page).hash(&mut hasher);

    StdRng::seed_from_u64(hasher.finish())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicBool, Ordering},
    };

    use async_trait::async_trait;
    use bank::catalog::Restaurant;

    use super::*;
    use crate::store::{MemoryRecommendations, StoreResult};

    fn ranked(count: usize) -> Vec<RankedItem> {
        (0..count)
            .map(|i| RankedItem {
                restaurant: Restaurant {
                    id: format!("r{i}"),
                    ..Default::default()
                },
                score: (count - i) as f64,
            })
            .collect()
    }

    fn pager(page_size: usize, order: PageOrder) -> (RecommendationPager, Arc<MemoryRecommendations>) {
        let store = Arc::new(MemoryRecommendations::default());

        (RecommendationPager::new(store.clone(), page_size, order), store)
    }

    fn page_ids(page: &RecommendationPage) -> Vec<String> {
        page.recommendation
            .iter()
            .map(|item| item.restaurant.id.clone())
            .collect()
    }

    #[test]
    fn five_items_in_pages_of_two() {
        let (pager, _) = pager(2, PageOrder::Ranked);
        let pages = pager.paginate("u1", 1, ranked(5));

        assert_eq!(pages.iter().map(|p| p.page).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(page_ids(&pages[0]), ["r0", "r1"]);
        assert_eq!(page_ids(&pages[1]), ["r2", "r3"]);
        assert_eq!(page_ids(&pages[2]), ["r4"]);
    }

    #[test]
    fn empty_ranking_has_no_pages() {
        let (pager, _) = pager(2, PageOrder::Ranked);

        assert!(pager.paginate("u1", 1, Vec::new()).is_empty());
    }

    #[test]
    fn shuffle_stays_within_pages_and_is_reproducible() {
        let (pager, _) = pager(10, PageOrder::Shuffled);
        let first = pager.paginate("u1", 4, ranked(25));
        let again = pager.paginate("u1", 4, ranked(25));

        assert_eq!(first, again);
        assert_eq!(first.len(), 3);

        for (index, page) in first.iter().enumerate() {
            let mut ids = page_ids(page);
            ids.sort();
            let mut expected: Vec<String> = (index * 10..(index * 10 + 10).min(25))
                .map(|i| format!("r{i}"))
                .collect();
            expected.sort();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn page_order_parses() {
        assert_eq!("Ranked".parse::<PageOrder>(), Ok(PageOrder::Ranked));
        assert_eq!(" shuffled ".parse::<PageOrder>(), Ok(PageOrder::Shuffled));
        assert!("random".parse::<PageOrder>().is_err());
    }

    #[tokio::test]
    async fn commit_twice_stores_the_same_pages() {
        let (pager, store) = pager(2, PageOrder::Ranked);
        let pages = pager.paginate("u1", 1, ranked(5));

        pager.commit("u1", 1, &pages).await.unwrap();
        let once = store.generation_pages("u1", 1);
        pager.commit("u1", 1, &pages).await.unwrap();
        let twice = store.generation_pages("u1", 1);

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 3);

        let ids: Vec<String> = twice
            .iter()
            .flat_map(|(_, items)| items.iter().map(|item| item.restaurant.id.clone()))
            .collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(unique.len(), 5);
    }

    #[tokio::test]
    async fn reads_only_see_published_generation() {
        let (pager, _) = pager(2, PageOrder::Ranked);

        let first = pager.paginate("u1", 1, ranked(3));
        pager.commit("u1", 1, &first).await.unwrap();
        assert!(matches!(
            pager.read("u1", 1).await,
            Err(RecommendError::NotFound { page: 1 })
        ));

        pager.publish("u1", 1, first.len() as u32).await.unwrap();
        assert_eq!(pager.read("u1", 2).await.unwrap().recommendation.len(), 1);
        assert!(matches!(
            pager.read("u1", 3).await,
            Err(RecommendError::NotFound { page: 3 })
        ));

        let unpublished = pager.paginate("u1", 2, ranked(6));
        pager.commit("u1", 2, &unpublished).await.unwrap();
        let page = pager.read("u1", 1).await.unwrap();
        assert_eq!(page.generation, 1);
        assert!(pager.read("u1", 3).await.is_err());
    }

    #[tokio::test]
    async fn failed_write_names_generation_and_page() {
        let (pager, store) = pager(1, PageOrder::Ranked);
        store.fail_after(Some(1));
        let pages = pager.paginate("u1", 7, ranked(3));

        let result = pager.commit("u1", 7, &pages).await;

        assert!(matches!(
            result,
            Err(RecommendError::PersistenceFailure {
                generation: 7,
                page: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn prune_keeps_only_published_generation() {
        let (pager, store) = pager(2, PageOrder::Ranked);

        for generation in 1..=3 {
            let pages = pager.paginate("u1", generation, ranked(4));
            pager.commit("u1", generation, &pages).await.unwrap();
        }
        pager.publish("u1", 2, 2).await.unwrap();
        assert_eq!(store.stored_generations("u1"), [1, 2, 3]);

        pager.prune("u1", 2).await;

        assert_eq!(store.stored_generations("u1"), [2, 3]);
        assert_eq!(pager.read("u1", 1).await.unwrap().generation, 2);
    }

    /// Publishes and prunes a newer generation between a reader's pointer lookup and its page fetch.
    struct RacingStore {
        inner: MemoryRecommendations,
        raced: AtomicBool,
    }

    #[async_trait]
    impl RecommendationStore for RacingStore {
        async fn next_generation(&self, uid: &str) -> StoreResult<u64> {
            self.inner.next_generation(uid).await
        }

        async fn replace_page(
            &self,
            uid: &str,
            page: u32,
            generation: u64,
            items: &[RankedItem],
        ) -> StoreResult<()> {
            self.inner.replace_page(uid, page, generation, items).await
        }

        async fn get_page(
            &self,
            uid: &str,
            page: u32,
            generation: u64,
        ) -> StoreResult<Option<Vec<RankedItem>>> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let newer = CurrentGeneration {
                    generation: generation + 1,
                    pages: 2,
                };
                self.inner.publish(uid, newer).await?;
                self.inner.prune(uid, generation + 1).await?;
            }
            self.inner.get_page(uid, page, generation).await
        }

        async fn current_generation(&self, uid: &str) -> StoreResult<Option<CurrentGeneration>> {
            self.inner.current_generation(uid).await
        }

        async fn publish(&self, uid: &str, current: CurrentGeneration) -> StoreResult<bool> {
            self.inner.publish(uid, current).await
        }

        async fn prune(&self, uid: &str, keep: u64) -> StoreResult<usize> {
            self.inner.prune(uid, keep).await
        }
    }

    #[tokio::test]
    async fn read_follows_generation_pruned_mid_read() {
        let store = Arc::new(RacingStore {
            inner: MemoryRecommendations::default(),
            raced: AtomicBool::new(false),
        });
        let pager = RecommendationPager::new(store.clone(), 2, PageOrder::Ranked);

        for generation in 1..=2 {
            let pages = pager.paginate("u1", generation, ranked(4));
            pager.commit("u1", generation, &pages).await.unwrap();
        }
        pager.publish("u1", 1, 2).await.unwrap();

        let page = pager.read("u1", 1).await.unwrap();

        assert_eq!(page.generation, 2);
        assert_eq!(page_ids(&page), ["r0", "r1"]);
        assert_eq!(store.inner.stored_generations("u1"), [2]);
    }
}
