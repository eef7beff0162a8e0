use std::cmp::Ordering;

use bank::catalog::Restaurant;
use serde::Serialize;

use super::{CatalogSnapshot, PreferenceVector, TagMatrix};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub score: f64,
}

/// Raw dot product of a binary row with the preference vector.
pub fn score(matrix: &TagMatrix, row: usize, preference: &PreferenceVector) -> f64 {
    matrix
        .columns(row)
        .filter_map(|column| preference.weights().get(column))
        .sum()
}

/// Highest score first, ties by ascending id. Unnormalized on purpose: callers compare raw affinity.
pub fn rank(snapshot: CatalogSnapshot, preference: &PreferenceVector) -> Vec<RankedItem> {
    let CatalogSnapshot { items, matrix } = snapshot;

    let mut ranked: Vec<RankedItem> = items
        .into_iter()
        .enumerate()
        .map(|(row, restaurant)| RankedItem {
            score: score(&matrix, row, preference),
            restaurant,
        })
        .collect();

    ranked.sort_by(compare);
    ranked
}

fn compare(a: &RankedItem, b: &RankedItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.restaurant.id.cmp(&b.restaurant.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::{Vocabulary, vectorize};

    fn restaurant(id: &str, tags: &[&str]) -> Restaurant {
        Restaurant {
            id: id.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            ..Default::default()
        }
    }

    fn ids(ranked: &[RankedItem]) -> Vec<&str> {
        ranked.iter().map(|item| item.restaurant.id.as_str()).collect()
    }

    #[test]
    fn scores_and_tie_break() {
        let vocabulary = Vocabulary::new(["A", "B", "C"]);
        let preference = PreferenceVector::from_weights(&vocabulary, vec![1.0, 0.0, 2.0]).unwrap();
        let snapshot = vectorize(
            &vocabulary,
            vec![
                restaurant("item3", &[]),
                restaurant("item2", &["B"]),
                restaurant("item1", &["A", "C"]),
            ],
        );

        let ranked = rank(snapshot, &preference);

        assert_eq!(ids(&ranked), ["item1", "item2", "item3"]);
        assert_eq!(ranked[0].score, 3.0);
        assert_eq!(ranked[1].score, 0.0);
        assert_eq!(ranked[2].score, 0.0);
    }

    #[test]
    fn identical_input_gives_identical_order() {
        let vocabulary = Vocabulary::new(["A", "B"]);
        let preference = PreferenceVector::from_weights(&vocabulary, vec![0.5, 0.5]).unwrap();
        let catalog: Vec<Restaurant> = (0..50)
            .map(|i| {
                let tags: &[&str] = match i % 3 {
                    0 => &["A"],
                    1 => &["B"],
                    _ => &["A", "B"],
                };
                restaurant(&format!("r{i:02}"), tags)
            })
            .collect();

        let reversed: Vec<Restaurant> = catalog.iter().rev().cloned().collect();
        let first = rank(vectorize(&vocabulary, catalog.clone()), &preference);
        let second = rank(vectorize(&vocabulary, catalog), &preference);
        let third = rank(vectorize(&vocabulary, reversed), &preference);

        assert_eq!(first, second);
        assert_eq!(ids(&first), ids(&third));
        assert_eq!(first[0].restaurant.id, "r02");
        assert_eq!(first[0].score, 1.0);
    }

    #[test]
    fn zero_preference_orders_by_id() {
        let vocabulary = Vocabulary::new(["A"]);
        let preference = PreferenceVector::zeros(1);
        let snapshot = vectorize(
            &vocabulary,
            vec![restaurant("b", &["A"]), restaurant("a", &[]), restaurant("c", &["A"])],
        );

        assert_eq!(ids(&rank(snapshot, &preference)), ["a", "b", "c"]);
    }
}
