//! Values stored in Redis.
use prost::Message;

use crate::catalog::Restaurant;

/// Durable preference vector, one weight per vocabulary tag.
#[derive(Clone, PartialEq, Message)]
pub struct Preference {
    #[prost(double, repeated, tag = "1")]
    pub weights: Vec<f64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Ranked {
    #[prost(message, optional, tag = "1")]
    pub restaurant: Option<Restaurant>,
    #[prost(double, tag = "2")]
    pub score: f64,
}

/// One page of one generation.
#[derive(Clone, PartialEq, Message)]
pub struct StoredPage {
    #[prost(uint64, tag = "1")]
    pub generation: u64,
    #[prost(uint32, tag = "2")]
    pub page: u32,
    #[prost(message, repeated, tag = "3")]
    pub items: Vec<Ranked>,
}
