//! Chunk ingestion.
//!
//! Every chunk is applied under its session's lock. Completion is checked
//! inside that same critical section, and the reconstruction and commit
//! run there too, so for any upload exactly one caller ever sees it
//! complete. Chunks of other uploads proceed meanwhile.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use displaydoc::Display;
use tracing::instrument;

use crate::chunked_session::{SessionEntry, SessionTable, UploadSession};
use crate::commit::CommitSink;
use crate::config::ChunkedUploadConfig;
use crate::reconstruct::{ReconstructionError, Reconstructor};
use siteup::api::v1::site_update::CommittedUpdate;
use siteup::api::v1::upload_chunk::{ApplyChunkResponse, ChunkPacket};
use siteup::api::v1::upload_status::UploadStatus;
use siteup::chunking::validate_upload_id;

/// An error applying a chunk.
#[derive(Debug, Display)]
pub enum IngestError {
    /// {0}
    Validation(String),

    /// {0}
    Reconstruction(ReconstructionError),

    /// Commit failed: {0}
    Commit(anyhow::Error),
}

impl IngestError {
    /// Returns the kind name reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Reconstruction(_) => "reconstruction",
            Self::Commit(_) => "commit",
        }
    }
}

impl std::error::Error for IngestError {}

impl From<ReconstructionError> for IngestError {
    fn from(error: ReconstructionError) -> Self {
        Self::Reconstruction(error)
    }
}

/// A chunk that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedChunk {
    pub upload_id: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub payload: String,
    pub digest: Option<String>,
}

impl TryFrom<ChunkPacket> for ValidatedChunk {
    type Error = IngestError;

    fn try_from(packet: ChunkPacket) -> Result<Self, Self::Error> {
        let upload_id = packet
            .upload_id
            .ok_or_else(|| missing_field("uploadId"))?;
        let chunk_index = packet.chunk_index.ok_or_else(|| missing_field("chunkIndex"))?;
        let total_chunks = packet
            .total_chunks
            .ok_or_else(|| missing_field("totalChunks"))?;
        let payload = packet.payload.ok_or_else(|| missing_field("payload"))?;

        validate_upload_id(&upload_id).map_err(|e| IngestError::Validation(e.to_string()))?;

        let total_chunks = u32::try_from(total_chunks)
            .ok()
            .filter(|total| *total > 0)
            .ok_or_else(|| {
                IngestError::Validation(format!("Invalid totalChunks: {}", total_chunks))
            })?;

        let chunk_index = u32::try_from(chunk_index).map_err(|_| {
            IngestError::Validation(format!("Invalid chunkIndex: {}", chunk_index))
        })?;

        if chunk_index >= total_chunks {
            return Err(IngestError::Validation(format!(
                "chunkIndex {} exceeds totalChunks {}",
                chunk_index, total_chunks
            )));
        }

        Ok(Self {
            upload_id,
            chunk_index,
            total_chunks,
            payload,
            digest: packet.digest,
        })
    }
}

fn missing_field(name: &str) -> IngestError {
    IngestError::Validation(format!("Missing required field: {}", name))
}

/// Applies chunks to staged sessions and commits completed uploads.
#[derive(Debug, Clone)]
pub struct IngestionService {
    sessions: Arc<SessionTable>,
    reconstructor: Reconstructor,
    commit_sink: Arc<dyn CommitSink>,
    commit_timeout: Duration,
}

impl IngestionService {
    pub fn new(
        sessions: Arc<SessionTable>,
        commit_sink: Arc<dyn CommitSink>,
        config: &ChunkedUploadConfig,
    ) -> Self {
        Self {
            sessions,
            reconstructor: Reconstructor::new(config.max_document_size),
            commit_sink,
            commit_timeout: config.commit_timeout,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    /// Validates and applies a chunk packet.
    pub async fn apply_chunk(&self, packet: ChunkPacket) -> Result<ApplyChunkResponse, IngestError> {
        let chunk = ValidatedChunk::try_from(packet)?;
        self.apply(chunk).await
    }

    /// Applies a validated chunk.
    ///
    /// If this chunk completes the upload, the document is reconstructed
    /// and committed before returning, and the session is removed. If
    /// either step fails the session is kept for a retry and the error is
    /// returned to this caller only.
    #[instrument(skip_all, fields(upload_id = %chunk.upload_id, chunk_index = chunk.chunk_index))]
    pub async fn apply(&self, chunk: ValidatedChunk) -> Result<ApplyChunkResponse, IngestError> {
        loop {
            let entry = self
                .sessions
                .get_or_create(&chunk.upload_id, chunk.total_chunks);
            let mut session = entry.lock().await;

            if session.is_retired() {
                // Committed or evicted after we looked it up
                tracing::debug!("Session retired while waiting, retrying");
                continue;
            }

            return self.apply_locked(&entry, &mut session, chunk).await;
        }
    }

    async fn apply_locked(
        &self,
        entry: &Arc<SessionEntry>,
        session: &mut UploadSession,
        chunk: ValidatedChunk,
    ) -> Result<ApplyChunkResponse, IngestError> {
        let total_chunks = session.total_chunks();

        if chunk.total_chunks != total_chunks {
            tracing::debug!(
                "Ignoring totalChunks {} for a session created with {}",
                chunk.total_chunks,
                total_chunks
            );
        }

        if chunk.chunk_index >= total_chunks {
            return Err(IngestError::Validation(format!(
                "chunkIndex {} exceeds totalChunks {} of the existing upload",
                chunk.chunk_index, total_chunks
            )));
        }

        if let Err(e) = self.check_chunk(session, &chunk) {
            // do not leave behind a session this chunk created
            if session.received_count() == 0 {
                self.sessions.remove(entry, session);
            }
            return Err(e);
        }

        entry.touch();
        let accepted = session.insert_chunk(chunk.chunk_index, chunk.payload);

        tracing::debug!(
            "Received chunk {}/{} ({} of {} present)",
            chunk.chunk_index,
            total_chunks - 1,
            session.received_count(),
            total_chunks
        );

        let mut response = ApplyChunkResponse {
            accepted,
            received_count: session.received_count(),
            total_chunks,
            complete: false,
        };

        if !session.mark_complete() {
            return Ok(response);
        }

        tracing::info!(
            "Upload complete ({} bytes in {} chunks), reconstructing",
            session.payload_bytes(),
            total_chunks
        );
        session.begin_reconstruction();

        match self.reconstruct_and_commit(entry.upload_id(), session).await {
            Ok(_) => {
                self.sessions.remove(entry, session);
                response.complete = true;
                Ok(response)
            }
            Err(e) => {
                tracing::warn!("Upload kept for retry: {}", e);
                session.reopen();
                Err(e)
            }
        }
    }

    /// Checks a chunk against what the session already holds.
    fn check_chunk(
        &self,
        session: &mut UploadSession,
        chunk: &ValidatedChunk,
    ) -> Result<(), IngestError> {
        let limit = self.reconstructor.max_document_size();
        let staged = session.payload_bytes_with(chunk.chunk_index, chunk.payload.len());
        if staged > limit {
            return Err(IngestError::Validation(format!(
                "Upload would stage {} bytes, over the document limit of {} bytes",
                staged, limit
            )));
        }

        if !session.match_digest(chunk.digest.as_deref()) {
            return Err(IngestError::Validation(format!(
                "Digest {} does not match the existing upload ({})",
                chunk.digest.as_deref().unwrap_or_default(),
                session.digest().unwrap_or_default()
            )));
        }

        Ok(())
    }

    async fn reconstruct_and_commit(
        &self,
        upload_id: &str,
        session: &UploadSession,
    ) -> Result<CommittedUpdate, IngestError> {
        let payloads = session
            .ordered_payloads()
            .map_err(ReconstructionError::from)?;
        let document = self.reconstructor.build(payloads)?;

        let commit = self.commit_sink.commit(upload_id, document);
        match tokio::time::timeout(self.commit_timeout, commit).await {
            Ok(result) => result.map_err(IngestError::Commit),
            Err(_) => Err(IngestError::Commit(anyhow!(
                "timed out after {}",
                humantime::format_duration(self.commit_timeout)
            ))),
        }
    }

    /// Returns the progress of an upload.
    pub async fn status(&self, upload_id: &str) -> UploadStatus {
        self.sessions.status(upload_id).await
    }
}
