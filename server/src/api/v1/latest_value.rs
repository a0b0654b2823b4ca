use axum::extract::{Extension, Json};
use tracing::instrument;

use crate::database::HISTORY_PAGE_SIZE;
use crate::State;
use siteup::api::v1::site_update::{HistoryResponse, LatestValue};

/// Returns the most recently committed site update.
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub(crate) async fn latest_value(Extension(state): Extension<State>) -> Json<LatestValue> {
    Json(state.database.latest().await)
}

/// Returns the most recent committed site updates.
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub(crate) async fn history(Extension(state): Extension<State>) -> Json<HistoryResponse> {
    Json(state.database.history(HISTORY_PAGE_SIZE).await)
}
