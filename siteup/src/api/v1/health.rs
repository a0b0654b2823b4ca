use serde::{Deserialize, Serialize};

/// Response of the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,

    /// Number of uploads currently staged in memory.
    pub active_uploads: usize,

    /// Number of committed updates.
    pub database_entries: usize,

    /// Progress value of the latest committed update.
    pub latest_value: Option<f64>,
}
