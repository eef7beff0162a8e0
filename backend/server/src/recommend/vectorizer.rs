use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use bank::catalog::Restaurant;
use tracing::{debug, warn};

use super::{RecommendError, Vocabulary};
use crate::store::CatalogStore;

/// One bitmap row per catalog item, one bit per vocabulary tag.
///
/// Bits run right to left inside a byte: column `j` is bit `j % 8` of byte `j / 8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatrix {
    width: usize,
    stride: usize,
    bits: Vec<u8>,
}

impl TagMatrix {
    pub fn new(rows: usize, width: usize) -> Self {
        let stride = width.div_ceil(8);

        Self {
            width,
            stride,
            bits: vec![0; rows * stride],
        }
    }

    pub fn rows(&self) -> usize {
        self.bits.len().checked_div(self.stride).unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, column: usize) -> bool {
        if column >= self.width {
            return false;
        }

        let byte = self.bits[row * self.stride + column / 8];
        (byte >> (column % 8)) & 1 == 1
    }

    fn set(&mut self, row: usize, column: usize) {
        self.bits[row * self.stride + column / 8] |= 1 << (column % 8);
    }

    /// Columns set in `row`, ascending.
    pub fn columns(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.width).filter(move |column| self.get(row, *column))
    }
}

/// Point-in-time catalog copy. `matrix` row `i` describes `items[i]`.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub items: Vec<Restaurant>,
    pub matrix: TagMatrix,
}

pub struct CatalogVectorizer {
    vocabulary: Arc<Vocabulary>,
    catalog: Arc<dyn CatalogStore>,
}

impl CatalogVectorizer {
    pub fn new(vocabulary: Arc<Vocabulary>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            vocabulary,
            catalog,
        }
    }

    pub async fn snapshot(&self) -> Result<CatalogSnapshot, RecommendError> {
        let restaurants = self
            .catalog
            .list_all()
            .await
            .map_err(RecommendError::CatalogUnavailable)?;

        Ok(vectorize(&self.vocabulary, restaurants))
    }
}

/// Builds the tag matrix. Repeated ids keep their first occurrence; unknown tags are logged once per snapshot.
pub fn vectorize(vocabulary: &Vocabulary, restaurants: Vec<Restaurant>) -> CatalogSnapshot {
    let mut seen = HashSet::with_capacity(restaurants.len());
    let items: Vec<Restaurant> = restaurants
        .into_iter()
        .filter(|restaurant| {
            let fresh = seen.insert(restaurant.id.clone());
            if !fresh {
                warn!(id = %restaurant.id, "Dropping duplicate catalog entry");
            }
            fresh
        })
        .collect();

    let mut matrix = TagMatrix::new(items.len(), vocabulary.len());
    let mut unknown: BTreeMap<&str, usize> = BTreeMap::new();

    for (row, restaurant) in items.iter().enumerate() {
        for tag in &restaurant.tags {
            match vocabulary.position(tag) {
                Some(column) => matrix.set(row, column),
                None => *unknown.entry(tag.as_str()).or_insert(0) += 1,
            }
        }
    }

    for (tag, restaurants) in unknown {
        warn!(tag, restaurants, "Ignoring catalog tag outside vocabulary");
    }

    debug!(items = items.len(), "Vectorized catalog");

    CatalogSnapshot { items, matrix }
}
