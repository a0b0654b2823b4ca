//! Error handling.

use std::error::Error as StdError;

use anyhow::Error as AnyError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use displaydoc::Display;
use serde::Serialize;

use crate::ingest::IngestError;
use crate::reconstruct::ReconstructionError;

pub type ServerResult<T> = Result<T, ServerError>;

/// An error.
#[derive(Debug)]
pub struct ServerError {
    /// The kind of the error.
    kind: ErrorKind,
}

/// The kind of an error.
#[derive(Debug, Display)]
pub enum ErrorKind {
    /// The URL you requested was not found.
    NotFound,

    /// Invalid request: {0}
    RequestError(AnyError),

    /// {0}
    ReconstructionError(ReconstructionError),

    /// Commit failed: {0}
    CommitError(AnyError),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
}

impl ServerError {
    pub fn request_error(error: impl StdError + Send + Sync + 'static) -> Self {
        ErrorKind::RequestError(AnyError::new(error)).into()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl From<ErrorKind> for ServerError {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl From<IngestError> for ServerError {
    fn from(error: IngestError) -> Self {
        let kind = match error {
            IngestError::Validation(message) => ErrorKind::RequestError(AnyError::msg(message)),
            IngestError::Reconstruction(e) => ErrorKind::ReconstructionError(e),
            IngestError::Commit(e) => ErrorKind::CommitError(e),
        };

        kind.into()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.kind.http_status_code();

        if status.is_server_error() {
            tracing::error!("{}", self.kind);
        } else {
            tracing::debug!("{}", self.kind);
        }

        let error_response = ErrorResponse {
            code: status.as_u16(),
            message: self.kind.to_string(),
            error: self.kind.name().to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl ErrorKind {
    /// Returns the kind name reported to clients.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RequestError(_) => "validation",
            Self::ReconstructionError(_) => "reconstruction",
            Self::CommitError(_) => "commit",
        }
    }

    fn http_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RequestError(_) => StatusCode::BAD_REQUEST,
            Self::ReconstructionError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CommitError(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
