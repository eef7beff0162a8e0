use std::collections::HashMap;

use bank::vocabulary::FOOD_TYPES;

/// Ordered tag names. A tag's position is its feature index in every preference vector and tag matrix.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tags: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocabulary = Self {
            tags: Vec::new(),
            positions: HashMap::new(),
        };

        for tag in tags {
            let tag = tag.into();
            if vocabulary.positions.contains_key(&tag) {
                continue;
            }

            vocabulary
                .positions
                .insert(tag.clone(), vocabulary.tags.len());
            vocabulary.tags.push(tag);
        }

        vocabulary
    }

    pub fn food_types() -> Self {
        Self::new(FOOD_TYPES)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn position(&self, tag: &str) -> Option<usize> {
        self.positions.get(tag).copied()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}
