mod health;
mod latest_value;
mod upload_chunk;
mod upload_status;

use axum::{
    routing::{get, post},
    Router,
};

pub(crate) fn get_router() -> Router {
    Router::new()
        .route("/_api/v1/upload-chunk", post(upload_chunk::upload_chunk))
        .route("/_api/v1/upload-status", get(upload_status::upload_status))
        .route("/_api/v1/latest-value", get(latest_value::latest_value))
        .route("/_api/v1/history", get(latest_value::history))
        .route("/_api/v1/health", get(health::health))
}
