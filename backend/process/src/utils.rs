use std::{
    collections::{BTreeMap, HashMap},
    sync::LazyLock,
};

use bank::{catalog::Restaurant, vocabulary::FOOD_TYPES};
use chrono::{SecondsFormat, Utc};
use regex::Regex;

use crate::models::RawRestaurant;

static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_]").unwrap());
static UNWANTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9- ]").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").unwrap());

pub fn sanitize(input: &str) -> String {
    let s = UNDERSCORES.replace_all(input, " ");
    let s = UNWANTED.replace_all(&s, "");

    SPACES.replace_all(s.trim(), " ").to_lowercase()
}

pub fn exported_at() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Maps loosely written tags ("hong_kong style foods!") onto the canonical food types.
pub struct TagMatcher {
    canonical: HashMap<String, &'static str>,
}

impl TagMatcher {
    pub fn food_types() -> Self {
        Self {
            canonical: FOOD_TYPES
                .iter()
                .map(|tag| (sanitize(tag), *tag))
                .collect(),
        }
    }

    pub fn canonical(&self, raw: &str) -> Option<&'static str> {
        self.canonical.get(&sanitize(raw)).copied()
    }
}

/// Converts one exported restaurant. Unknown tags are dropped and counted in `unknown`.
///
/// Returns `None` when the id is blank.
pub fn convert(
    raw: RawRestaurant,
    matcher: &TagMatcher,
    unknown: &mut BTreeMap<String, usize>,
) -> Option<Restaurant> {
    let id = raw.id.into_string().trim().to_string();
    if id.is_empty() {
        return None;
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in raw.tags.unwrap_or_default() {
        match matcher.canonical(&tag) {
            Some(canonical) => {
                if !tags.iter().any(|t| t == canonical) {
                    tags.push(canonical.to_string());
                }
            }
            None => {
                #[cfg(feature = "verbose")]
                println!("Unknown tag '{tag}' on {id}");

                *unknown.entry(tag).or_default() += 1;
            }
        }
    }

    let star = raw.star.filter(|star| star.is_finite()).unwrap_or_default();

    Some(Restaurant {
        id,
        name: raw.name.trim().to_string(),
        tags,
        star: star.max(0.0),
        address: raw.address,
        phone_number: raw.phone_number,
        website: raw.website,
        gmap_url: raw.gmap_url,
        open_hour: raw.open_hour.unwrap_or_default(),
        photos: raw.photos.unwrap_or_default(),
        service: raw.service.unwrap_or_default(),
    })
}
