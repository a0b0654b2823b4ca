//! The site update document and what becomes of it once committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source recorded for updates that do not name one.
pub const DEFAULT_SOURCE: &str = "site_engineer";

/// A site update, as reconstructed from its chunks.
///
/// Only the fields the server acts on are typed. Anything else the client
/// sends is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteUpdate {
    /// Reported progress of the site, in percent.
    pub slider_value: f64,

    /// A photo of the site as a base64 data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,

    /// Who sent the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Client-side timestamp of the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SiteUpdate {
    pub fn new(slider_value: f64) -> Self {
        Self {
            slider_value,
            image_base64: None,
            source: None,
            timestamp: None,
            extra: Map::new(),
        }
    }
}

/// A site update that has been committed to the central database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedUpdate {
    pub slider_value: f64,

    /// Where the photo ended up, if the update carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// The upload the update arrived through.
    pub upload_id: String,

    pub committed_at: DateTime<Utc>,
}

/// Response of the latest-value endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LatestValue {
    Committed(CommittedUpdate),
    #[serde(rename_all = "camelCase")]
    Empty { slider_value: f64, message: String },
}

impl LatestValue {
    pub fn empty() -> Self {
        Self::Empty {
            slider_value: 0.0,
            message: "No data yet".to_string(),
        }
    }

    pub fn slider_value(&self) -> f64 {
        match self {
            Self::Committed(update) => update.slider_value,
            Self::Empty { slider_value, .. } => *slider_value,
        }
    }
}

/// Response of the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Number of updates the database holds.
    pub count: usize,

    /// The most recent updates, oldest first.
    pub history: Vec<CommittedUpdate>,
}
