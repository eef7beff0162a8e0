use std::sync::Arc;

use anyhow::{Context, Result};
use bank::{catalog::Restaurant, get_catalog, get_catalog_remote};
use tracing::{info, warn};

use super::{
    config::{Backend, Config},
    database::{RedisStore, init_redis},
    recommend::{RecomputeCoordinator, Vocabulary},
    search::{MeiliCatalog, init_meilisearch},
    store::{CatalogStore, Stores},
};

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn CatalogStore>,
    pub coordinator: Arc<RecomputeCoordinator>,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>> {
        let config = Config::load()?;
        let seed = load_seed(&config.catalog_path).await;

        let stores = match config.backend {
            Backend::Redis => {
                let connection = init_redis(&config.redis_url)
                    .await
                    .context("Failed to connect to Redis")?;
                let meili_key = config.meili_key.as_deref().unwrap_or_default();
                let meili_client =
                    init_meilisearch(&config.meili_url, meili_key, &config.catalog_index, &seed)
                        .await
                        .context("Failed to initialize Meilisearch")?;

                let redis = Arc::new(RedisStore::new(connection, config.accumulation_ttl));
                Stores {
                    accumulation: redis.clone(),
                    users: redis.clone(),
                    catalog: Arc::new(MeiliCatalog::new(meili_client, &config.catalog_index)),
                    recommendations: redis,
                }
            }
            Backend::Memory => Stores::memory(seed),
        };

        Ok(Arc::new(Self::with_stores(config, stores)))
    }

    pub fn with_stores(config: Config, stores: Stores) -> Self {
        let coordinator = RecomputeCoordinator::new(
            Arc::new(Vocabulary::food_types()),
            stores.clone(),
            config.page_size,
            config.page_order,
        );

        Self {
            catalog: stores.catalog,
            coordinator: Arc::new(coordinator),
            config,
        }
    }
}

/// `CATALOG_PATH` may also point at a published bank over http(s).
async fn load_seed(path: &str) -> Vec<Restaurant> {
    let catalog = if path.starts_with("http://") || path.starts_with("https://") {
        get_catalog_remote(path).await
    } else {
        get_catalog(path)
    };

    match catalog {
        Ok(catalog) => {
            info!(
                restaurants = catalog.restaurants.len(),
                exported_at = %catalog.exported_at,
                "Loaded catalog bank"
            );
            catalog.restaurants
        }
        Err(e) => {
            warn!("No catalog bank at {path}, starting without seed: {e}");
            Vec::new()
        }
    }
}
