//! Restaurant catalog messages.
//!
//! Display attributes are opaque to the recommender; only `id` and `tags` feed the ranking.
use prost::Message;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Restaurant {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, repeated, tag = "3")]
    pub tags: Vec<String>,
    #[prost(float, tag = "4")]
    pub star: f32,
    #[prost(string, optional, tag = "5")]
    pub address: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub phone_number: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub website: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub gmap_url: Option<String>,
    #[prost(string, repeated, tag = "9")]
    pub open_hour: Vec<String>,
    #[prost(string, repeated, tag = "10")]
    pub photos: Vec<String>,
    #[prost(string, repeated, tag = "11")]
    pub service: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Catalog {
    #[prost(message, repeated, tag = "1")]
    pub restaurants: Vec<Restaurant>,
    #[prost(string, tag = "2")]
    pub exported_at: String,
}
