use serde::Deserialize;

/// Exports carry ids either as plain strings or as `{"$oid": "..."}` objects.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawId {
    Plain(String),
    Object {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

impl RawId {
    pub fn into_string(self) -> String {
        match self {
            Self::Plain(id) => id,
            Self::Object { oid } => oid,
        }
    }
}

/// One restaurant as it appears in an export. Lists may be missing or `null`.
#[derive(Deserialize, Debug)]
pub struct RawRestaurant {
    #[serde(rename = "_id")]
    pub id: RawId,
    pub name: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub star: Option<f32>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub gmap_url: Option<String>,
    #[serde(default)]
    pub open_hour: Option<Vec<String>>,
    #[serde(default)]
    pub photos: Option<Vec<String>>,
    #[serde(default)]
    pub service: Option<Vec<String>>,
}
