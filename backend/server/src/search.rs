//! # Meilisearch
//!
//! Holds the live restaurant catalog.
//!
//! Restaurant CRUD and full-text search happen elsewhere against the same index; the recommender only lists it.
//!
//!
//!
//! ## Schema
//! - Index for all restaurants, primary key `id`
//! - Fields: name (**string**), tags (**string list**), star (**float**) and opaque display fields
//! - `tags` is filterable so the app can browse by food type
//!
//!
//!
//! ## Snapshot
//! Every recompute lists the whole index in batches of [`LIST_BATCH`]. Writes landing mid-listing may or may not
//! be included. That is fine: the next recompute picks them up.
//!
//!
//!
//! ## Seeding
//! On start-up the catalog bank (`catalog.bin`, written by the `process` tool) is upserted so a fresh deployment
//! has something to rank. Upserts are keyed by id, re-running them is harmless.
//!
//!
//!
//! ## Commands
//!
//! Grab relevant keys.
//! ```sh
//! curl -H "Authorization: Bearer $(cat /run/secrets/MEILI_MASTER_KEY)" http://localhost:7700/keys
//! ```
use std::sync::Arc;

use async_trait::async_trait;
use bank::catalog::Restaurant;
use meilisearch_sdk::{client::Client, documents::DocumentsQuery, settings::Settings};
use serde::Serialize;
use tracing::info;

use crate::store::{CatalogStore, StoreResult};

pub const RESTAURANT_ID: &str = "id";
pub const RESTAURANT_NAME: &str = "name";
pub const RESTAURANT_TAGS: &str = "tags";
pub const RESTAURANT_STAR: &str = "star";

pub const LIST_BATCH: usize = 1000;

pub async fn init_meilisearch(
    meili_url: &str,
    meili_admin_key: &str,
    index_name: &str,
    seed: &[Restaurant],
) -> StoreResult<Arc<Client>> {
    let meili_client = Arc::new(Client::new(meili_url, Some(meili_admin_key))?);

    meili_client
        .index(index_name)
        .set_settings(&init_settings())
        .await?;

    if !seed.is_empty() {
        upsert_items(meili_client.clone(), index_name, seed, RESTAURANT_ID).await?;
        info!(restaurants = seed.len(), "Seeded restaurant index");
    }

    Ok(meili_client)
}

async fn upsert_items<T>(
    meili_client: Arc<Client>,
    index_name: &str,
    items: &[T],
    id_name: &str,
) -> StoreResult<()>
where
    T: Serialize + Send + Sync,
{
    let _result = meili_client
        .index(index_name)
        .add_or_update(items, Some(id_name))
        .await?
        .wait_for_completion(&meili_client, None, None)
        .await?;

    #[cfg(feature = "verbose")]
    println!("Meili task result: {:?}", _result);

    Ok(())
}

fn init_settings() -> Settings {
    Settings::new()
        .with_filterable_attributes([RESTAURANT_TAGS])
        .with_searchable_attributes([RESTAURANT_NAME, RESTAURANT_TAGS])
        .with_sortable_attributes([RESTAURANT_STAR])
}

pub struct MeiliCatalog {
    client: Arc<Client>,
    index_name: String,
}

impl MeiliCatalog {
    pub fn new(client: Arc<Client>, index_name: impl Into<String>) -> Self {
        Self {
            client,
            index_name: index_name.into(),
        }
    }
}

#[async_trait]
impl CatalogStore for MeiliCatalog {
    async fn list_all(&self) -> StoreResult<Vec<Restaurant>> {
        let index = self.client.index(&self.index_name);
        let mut restaurants = Vec::new();

        loop {
            let mut query = DocumentsQuery::new(&index);
            query.with_limit(LIST_BATCH).with_offset(restaurants.len());

            let batch = query.execute::<Restaurant>().await?;
            let fetched = batch.results.len();
            restaurants.extend(batch.results);

            if fetched < LIST_BATCH {
                break;
            }
        }

        Ok(restaurants)
    }
}
