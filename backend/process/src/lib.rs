//! # Catalog Processing
//!
//! Builds the catalog bank (`catalog.bin`) the server seeds its restaurant index from.
//!
//! ## Input
//! A JSON array of restaurants as exported from the restaurant database, read from a local path or an
//! `http(s)` URL.
//! - `_id` is either a string or `{"$oid": "..."}`
//! - List fields may be missing or `null`
//! - `tags` are free text written by whoever added the restaurant
//!
//! ## Steps
//! 1. Fetch and parse the export.
//!
//! 2. Sanitize every tag (lowercase, underscores to spaces, punctuation stripped) and match it against the
//!    sanitized food types. Matches are replaced by the canonical spelling, everything else is dropped and
//!    reported so the vocabulary or the data can be fixed.
//!
//! 3. Drop restaurants with a blank id and every repeat of an id already seen. First one wins.
//!
//! 4. Stamp the export time and write the bank.
//!
//! ## Notes
//! - The vocabulary is append only. New food types go at the end of `bank::vocabulary::FOOD_TYPES`, never
//!   in the middle, or every stored preference vector shifts.
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;

pub mod models;
pub mod utils;

use bank::{catalog::Catalog, write_catalog};
use models::RawRestaurant;
use utils::{TagMatcher, convert, exported_at};

#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub imported: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub unknown_tags: BTreeMap<String, usize>,
}

pub async fn load_restaurants(source: &str, output: &Path) -> Result<Summary> {
    let export = fetch_export(source).await?;
    let raw: Vec<RawRestaurant> =
        serde_json::from_str(&export).context("Export is not a JSON array of restaurants")?;

    println!("Loaded Restaurants: {}\n", raw.len());

    let pb = ProgressBar::new(raw.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let (catalog, summary) = build_catalog(raw, exported_at(), &pb);
    pb.finish_with_message("Done");

    println!("Imported: {}", summary.imported);
    println!("Duplicate Ids: {}", summary.duplicates);
    println!("Skipped: {}", summary.skipped);

    if !summary.unknown_tags.is_empty() {
        println!("\nUnknown Tags:");
        for (tag, count) in &summary.unknown_tags {
            println!("  {tag}: {count}");
        }
    }

    write_catalog(output, &catalog)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("\nWrote {}", output.display());

    Ok(summary)
}

pub fn build_catalog(
    raw: Vec<RawRestaurant>,
    exported_at: String,
    pb: &ProgressBar,
) -> (Catalog, Summary) {
    let matcher = TagMatcher::food_types();
    let mut summary = Summary::default();
    let mut seen = HashSet::new();
    let mut restaurants = Vec::with_capacity(raw.len());

    for item in raw {
        pb.inc(1);

        let Some(restaurant) = convert(item, &matcher, &mut summary.unknown_tags) else {
            summary.skipped += 1;
            continue;
        };

        if !seen.insert(restaurant.id.clone()) {
            #[cfg(feature = "verbose")]
            println!("Duplicate id! {}", restaurant.id);

            summary.duplicates += 1;
            continue;
        }

        pb.set_message(restaurant.name.clone());
        restaurants.push(restaurant);
    }

    summary.imported = restaurants.len();

    (
        Catalog {
            restaurants,
            exported_at,
        },
        summary,
    )
}

async fn fetch_export(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let res = Client::new()
            .get(source)
            .send()
            .await?
            .error_for_status()?;

        #[cfg(feature = "verbose")]
        println!("Status: {}\n", res.status());

        return Ok(res.text().await?);
    }

    fs::read_to_string(source).with_context(|| format!("Failed to read {source}"))
}

#[cfg(test)]
mod tests {
    use std::env::temp_dir;

    use bank::get_catalog;

    use super::*;

    const EXPORT: &str = r#"[
        {"_id": {"$oid": "a1"}, "name": "Pho 99", "tags": ["soup", "Street_Foods", "noodles"], "star": 4.2},
        {"_id": "b2", "name": "Slice", "tags": ["PIZZA"], "open_hour": null},
        {"_id": "a1", "name": "Pho 99 again", "tags": ["Soup"]},
        {"_id": "", "name": "Nameless"}
    ]"#;

    #[test]
    fn test_build_catalog() {
        let raw: Vec<RawRestaurant> = serde_json::from_str(EXPORT).unwrap();
        let (catalog, summary) = build_catalog(raw, "2026-01-01T00:00:00Z".into(), &ProgressBar::hidden());

        let ids: Vec<&str> = catalog.restaurants.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
        assert_eq!(catalog.restaurants[0].name, "Pho 99");
        assert_eq!(catalog.restaurants[0].tags, vec!["Soup", "Street Foods"]);
        assert_eq!(catalog.exported_at, "2026-01-01T00:00:00Z");

        assert_eq!(summary.imported, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.unknown_tags.get("noodles"), Some(&1));
    }

    #[tokio::test]
    async fn test_load_restaurants_from_file() {
        let dir = temp_dir();
        let source = dir.join("process-test-export.json");
        let output = dir.join("process-test-catalog.bin");
        fs::write(&source, EXPORT).unwrap();

        let summary = load_restaurants(source.to_str().unwrap(), &output)
            .await
            .unwrap();
        let catalog = get_catalog(&output).unwrap();

        assert_eq!(summary.imported, 2);
        assert_eq!(catalog.restaurants.len(), 2);
        assert!(!catalog.exported_at.is_empty());

        fs::remove_file(source).ok();
        fs::remove_file(output).ok();
    }

    #[tokio::test]
    async fn test_missing_source() {
        let output = temp_dir().join("process-test-never-written.bin");

        assert!(load_restaurants("/definitely/not/here.json", &output).await.is_err());
        assert!(!output.exists());
    }
}
