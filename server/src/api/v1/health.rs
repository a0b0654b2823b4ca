use axum::extract::{Extension, Json};

use crate::State;
use siteup::api::v1::health::HealthResponse;
use siteup::api::v1::site_update::LatestValue;

#[axum_macros::debug_handler]
pub(crate) async fn health(Extension(state): Extension<State>) -> Json<HealthResponse> {
    let latest_value = match state.database.latest().await {
        LatestValue::Committed(update) => Some(update.slider_value),
        LatestValue::Empty { .. } => None,
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        active_uploads: state.ingest.sessions().len(),
        database_entries: state.database.len().await,
        latest_value,
    })
}
