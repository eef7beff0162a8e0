use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::recommend::{PAGE_SIZE, PageOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Redis for users and pages, Meilisearch for the catalog.
    Redis,
    /// Everything in process, catalog seeded from the bank file.
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub backend: Backend,
    pub redis_url: String,
    pub meili_url: String,
    pub meili_key: Option<String>,
    pub catalog_path: String,
    pub catalog_index: String,
    pub page_size: usize,
    pub max_page: u32,
    pub page_order: PageOrder,
    pub accumulation_ttl: Duration,
    pub random_sample_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let backend: Backend = try_load("STORE_BACKEND", "redis")?;

        let meili_key = match backend {
            Backend::Redis => Some(read_secret("MEILI_ADMIN_KEY")?),
            Backend::Memory => None,
        };

        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            backend,
            redis_url: try_load("REDIS_URL", "redis://redis:6379")?,
            meili_url: try_load("MEILI_URL", "http://meilisearch:7700")?,
            meili_key,
            catalog_path: try_load("CATALOG_PATH", bank::CATALOG_PATH)?,
            catalog_index: try_load("CATALOG_INDEX", "restaurants")?,
            page_size: try_load("PAGE_SIZE", &PAGE_SIZE.to_string())?,
            max_page: try_load("MAX_PAGE", "10")?,
            page_order: try_load("PAGE_ORDER", "shuffled")?,
            accumulation_ttl: Duration::from_secs(try_load("ACCUMULATION_TTL_SECS", "2592000")?),
            random_sample_size: try_load("RANDOM_SAMPLE_SIZE", "100")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("Environment misconfigured: {key}: {e}")
        })
}

fn read_secret(secret_name: &str) -> Result<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("Secrets misconfigured: failed to read {secret_name}"))
}
