use axum::extract::{rejection::JsonRejection, Extension, Json};
use tracing::instrument;

use crate::error::{ServerError, ServerResult};
use crate::State;
use siteup::api::v1::upload_chunk::{ApplyChunkResponse, ChunkPacket};

/// Uploads a single chunk of a site update.
///
/// Chunks may arrive in any order and may be resent. The response to the
/// chunk that completes the upload is only sent after the reconstructed
/// update has been committed.
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub(crate) async fn upload_chunk(
    Extension(state): Extension<State>,
    packet: Result<Json<ChunkPacket>, JsonRejection>,
) -> ServerResult<Json<ApplyChunkResponse>> {
    let Json(packet) = packet.map_err(ServerError::request_error)?;

    let response = state.ingest.apply_chunk(packet).await.map_err(|e| {
        tracing::debug!(kind = e.kind(), "Chunk rejected");
        ServerError::from(e)
    })?;

    Ok(Json(response))
}
