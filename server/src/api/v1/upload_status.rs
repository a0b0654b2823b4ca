use anyhow::anyhow;
use axum::extract::{rejection::QueryRejection, Extension, Json, Query};
use tracing::instrument;

use crate::error::{ErrorKind, ServerError, ServerResult};
use crate::State;
use siteup::api::v1::upload_status::{UploadStatus, UploadStatusQuery};

/// Returns which chunks of an upload the server holds.
///
/// Unknown uploads are not an error; they report nothing received.
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub(crate) async fn upload_status(
    Extension(state): Extension<State>,
    query: Result<Query<UploadStatusQuery>, QueryRejection>,
) -> ServerResult<Json<UploadStatus>> {
    let Query(query) = query.map_err(ServerError::request_error)?;

    let upload_id = query
        .upload_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ErrorKind::RequestError(anyhow!("uploadId required")))?;

    Ok(Json(state.ingest.status(&upload_id).await))
}
