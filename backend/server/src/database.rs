//! # Redis
//!
//! RAM database.
//!
//! Holds everything the recommender writes: click deltas, durable preference vectors and recommendation pages.
//!
//! ## Requirements
//!
//! - Atomic float increments for clicks, possibly several per second per user
//! - Atomic read-and-clear of a user's clicks
//! - Whole-page replacement keyed by generation, never appends
//! - Pointer swap to publish a finished generation
//!
//! ## Implementation
//!
//! - `accumulate:<uid>`: hash, tag -> float, `HINCRBYFLOAT` inside `MULTI`, expires after the configured TTL
//! - `users:preference`: 1 big hash, uid -> protobuf `Preference`
//! - `recommend:<uid>`: hash, `<generation>:<page>` -> protobuf `StoredPage`
//! - `recommend:generations`: hash, uid -> last allocated generation (`HINCRBY`)
//! - `recommend:current`: hash, uid -> `<generation>:<pages>`, only moved forward by a Lua script
//! - Estimated memory usage:
//!   18 doubles (144 bytes + key overhead) per user for preferences, pages dominate at roughly
//!   1000 restaurants × 200 bytes × 2 generations = 400 KB per active user
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bank::payloads::{Preference, Ranked, StoredPage};
use prost::Message;
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

use crate::{
    recommend::RankedItem,
    store::{
        AccumulationStore, CurrentGeneration, RecommendationStore, StoreError, StoreResult,
        UserStore,
    },
};

pub const ACCUMULATE_PREFIX: &str = "accumulate";
pub const USER_PREFERENCES: &str = "users:preference";
pub const RECOMMEND_PREFIX: &str = "recommend";
pub const RECOMMEND_GENERATIONS: &str = "recommend:generations";
pub const RECOMMEND_CURRENT: &str = "recommend:current";

const PUBLISH_SCRIPT: &str = r#"
    local current = redis.call('HGET', KEYS[1], ARGV[1])
    if current then
        local generation = tonumber(string.match(current, '^(%d+):'))
        if generation and generation >= tonumber(ARGV[2]) then
            return 0
        end
    end
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[2] .. ':' .. ARGV[3])
    return 1
"#;

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    accumulation_ttl: Duration,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager, accumulation_ttl: Duration) -> Self {
        Self {
            connection,
            accumulation_ttl,
        }
    }
}

fn accumulate_key(uid: &str) -> String {
    format!("{ACCUMULATE_PREFIX}:{uid}")
}

fn recommend_key(uid: &str) -> String {
    format!("{RECOMMEND_PREFIX}:{uid}")
}

fn page_field(generation: u64, page: u32) -> String {
    format!("{generation}:{page}")
}

fn field_generation(field: &str) -> Option<u64> {
    field.split_once(':')?.0.parse().ok()
}

fn parse_current(value: &str) -> StoreResult<CurrentGeneration> {
    let malformed = || StoreError::Malformed(format!("current generation '{value}'"));
    let (generation, pages) = value.split_once(':').ok_or_else(malformed)?;

    Ok(CurrentGeneration {
        generation: generation.parse().map_err(|_| malformed())?,
        pages: pages.parse().map_err(|_| malformed())?,
    })
}

impl From<&RankedItem> for Ranked {
    fn from(item: &RankedItem) -> Self {
        Self {
            restaurant: Some(item.restaurant.clone()),
            score: item.score,
        }
    }
}

impl From<Ranked> for RankedItem {
    fn from(ranked: Ranked) -> Self {
        Self {
            restaurant: ranked.restaurant.unwrap_or_default(),
            score: ranked.score,
        }
    }
}

#[async_trait]
impl AccumulationStore for RedisStore {
    async fn increment(&self, uid: &str, deltas: &[(&str, f64)]) -> StoreResult<()> {
        if deltas.is_empty() {
            return Ok(());
        }

        let key = accumulate_key(uid);
        let mut pipe = redis::pipe();
        pipe.atomic();

        for (tag, delta) in deltas {
            pipe.hincr(&key, *tag, *delta).ignore();
        }
        pipe.expire(&key, self.accumulation_ttl.as_secs() as i64)
            .ignore();

        let mut connection = self.connection.clone();
        let _: () = pipe.query_async(&mut connection).await?;

        Ok(())
    }

    async fn drain(&self, uid: &str) -> StoreResult<HashMap<String, f64>> {
        let key = accumulate_key(uid);
        let mut connection = self.connection.clone();

        let (deltas, _): (HashMap<String, f64>, i64) = redis::pipe()
            .atomic()
            .hgetall(&key)
            .del(&key)
            .query_async(&mut connection)
            .await?;

        Ok(deltas)
    }
}

#[async_trait]
impl UserStore for RedisStore {
    async fn get_preference(&self, uid: &str) -> StoreResult<Option<Vec<f64>>> {
        let mut connection = self.connection.clone();
        let bytes: Option<Vec<u8>> = connection.hget(USER_PREFERENCES, uid).await?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        Ok(Some(Preference::decode(&*bytes)?.weights))
    }

    async fn set_preference(&self, uid: &str, weights: &[f64]) -> StoreResult<()> {
        let preference = Preference {
            weights: weights.to_vec(),
        };

        let mut connection = self.connection.clone();
        let _: () = connection
            .hset(USER_PREFERENCES, uid, preference.encode_to_vec())
            .await?;

        Ok(())
    }
}

#[async_trait]
impl RecommendationStore for RedisStore {
    async fn next_generation(&self, uid: &str) -> StoreResult<u64> {
        let mut connection = self.connection.clone();

        Ok(connection.hincr(RECOMMEND_GENERATIONS, uid, 1u64).await?)
    }

    async fn replace_page(
        &self,
        uid: &str,
        page: u32,
        generation: u64,
        items: &[RankedItem],
    ) -> StoreResult<()> {
        let stored = StoredPage {
            generation,
            page,
            items: items.iter().map(Ranked::from).collect(),
        };

        let mut connection = self.connection.clone();
        let _: () = connection
            .hset(
                recommend_key(uid),
                page_field(generation, page),
                stored.encode_to_vec(),
            )
            .await?;

        Ok(())
    }

    async fn get_page(
        &self,
        uid: &str,
        page: u32,
        generation: u64,
    ) -> StoreResult<Option<Vec<RankedItem>>> {
        let mut connection = self.connection.clone();
        let bytes: Option<Vec<u8>> = connection
            .hget(recommend_key(uid), page_field(generation, page))
            .await?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        let stored = StoredPage::decode(&*bytes)?;
        Ok(Some(stored.items.into_iter().map(RankedItem::from).collect()))
    }

    async fn current_generation(&self, uid: &str) -> StoreResult<Option<CurrentGeneration>> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.hget(RECOMMEND_CURRENT, uid).await?;

        value.as_deref().map(parse_current).transpose()
    }

    async fn publish(&self, uid: &str, current: CurrentGeneration) -> StoreResult<bool> {
        let mut connection = self.connection.clone();
        let moved: i64 = Script::new(PUBLISH_SCRIPT)
            .key(RECOMMEND_CURRENT)
            .arg(uid)
            .arg(current.generation)
            .arg(current.pages)
            .invoke_async(&mut connection)
            .await?;

        Ok(moved == 1)
    }

    async fn prune(&self, uid: &str, keep: u64) -> StoreResult<usize> {
        let key = recommend_key(uid);
        let mut connection = self.connection.clone();

        let fields: Vec<String> = connection.hkeys(&key).await?;
        let stale: Vec<String> = fields
            .into_iter()
            .filter(|field| field_generation(field).is_some_and(|generation| generation < keep))
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        let removed: usize = connection.hdel(&key, &stale).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_fields_round_trip_generation() {
        assert_eq!(page_field(12, 3), "12:3");
        assert_eq!(field_generation("12:3"), Some(12));
        assert_eq!(field_generation("garbage"), None);
    }

    #[test]
    fn current_pointer_parses() {
        assert_eq!(
            parse_current("7:10").unwrap(),
            CurrentGeneration {
                generation: 7,
                pages: 10
            }
        );
        assert!(parse_current("7").is_err());
        assert!(parse_current("x:1").is_err());
    }

    #[test]
    fn missing_restaurant_decodes_to_default() {
        let item = RankedItem::from(Ranked {
            restaurant: None,
            score: 1.5,
        });

        assert_eq!(item.score, 1.5);
        assert!(item.restaurant.id.is_empty());
    }
}
