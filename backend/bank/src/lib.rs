//! # Bank
//!
//! Shared data for the recommendation backend.
//!
//! - [`vocabulary`]: the fixed list of food types every preference vector and tag matrix is aligned to
//! - [`catalog`]: the restaurant catalog, as written by the `process` tool and read back by the server
//! - [`payloads`]: binary values the server keeps in Redis
//!
//! The catalog travels as a protobuf blob (`catalog.bin`). Only repeated fields preserve ordering, so the
//! restaurants list keeps whatever order the import produced.
use std::{fs, path::Path};

use anyhow::Error;
use prost::Message;
use reqwest::get;

pub mod catalog;
pub mod payloads;
pub mod vocabulary;

use catalog::Catalog;

pub const CATALOG_PATH: &str = "../catalog.bin";

pub fn get_catalog(path: impl AsRef<Path>) -> Result<Catalog, Error> {
    let data = fs::read(path)?;

    Ok(Catalog::decode(&*data)?)
}

pub async fn get_catalog_remote(url: &str) -> Result<Catalog, Error> {
    let response = get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    Ok(Catalog::decode(&*bytes)?)
}

pub fn write_catalog(path: impl AsRef<Path>, catalog: &Catalog) -> Result<(), Error> {
    fs::write(path, catalog.encode_to_vec())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::env::temp_dir;

    use super::*;
    use crate::catalog::Restaurant;

    #[test]
    fn catalog_file_keeps_restaurant_order() {
        let path = temp_dir().join(format!("catalog-{}.bin", std::process::id()));
        let catalog = Catalog {
            restaurants: vec![
                Restaurant {
                    id: "b".into(),
                    name: "Beef Noodles".into(),
                    tags: vec!["Taiwanese Foods".into()],
                    ..Default::default()
                },
                Restaurant {
                    id: "a".into(),
                    name: "Corner Cafe".into(),
                    tags: vec!["Cafe".into(), "Breakfast".into()],
                    ..Default::default()
                },
            ],
            exported_at: "2025-11-14T00:00:00Z".into(),
        };

        write_catalog(&path, &catalog).unwrap();
        let loaded = get_catalog(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let ids: Vec<&str> = loaded.restaurants.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(loaded.restaurants[1].tags, ["Cafe", "Breakfast"]);
    }

    #[test]
    fn missing_catalog_is_an_error() {
        assert!(get_catalog("/definitely/not/here/catalog.bin").is_err());
    }
}
