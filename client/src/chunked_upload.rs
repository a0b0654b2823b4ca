//! Resumable chunked upload of site updates.
//!
//! An upload first asks the server which chunks it already holds under the
//! upload ID and sends only the rest, so running the same upload again after
//! a failure picks up where it stopped. Every chunk carries a digest of the
//! whole document, so a resumed run never mixes its chunks with those of a
//! different document. Requests are retried a few times with a linear
//! backoff before the upload gives up.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{ApiClient, ApiError};
use siteup::api::v1::site_update::SiteUpdate;
use siteup::api::v1::upload_chunk::ChunkPacket;
use siteup::api::v1::upload_status::UploadStatus;
use siteup::chunking::{document_digest, split_document, validate_upload_id, DEFAULT_CHUNK_SIZE};

/// Configuration for chunked uploads.
#[derive(Clone, Copy, Debug)]
pub struct UploadConfig {
    /// Maximum size of a chunk in bytes.
    pub chunk_size: usize,

    /// Number of times a request is sent before the upload fails.
    pub max_attempts: u32,

    /// Delay before the first retry. Later retries wait proportionally longer.
    pub retry_delay: Duration,

    /// Whether to show a progress bar.
    pub progress: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            progress: false,
        }
    }
}

/// What an upload did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub upload_id: String,

    /// Number of chunks the document was split into.
    pub total_chunks: u32,

    /// Chunks sent during this run.
    pub sent: u32,

    /// Chunks the server already held.
    pub skipped: u32,

    /// Whether the server reported the update as committed.
    pub committed: bool,
}

/// Uploads site updates in resumable chunks.
#[derive(Debug, Clone)]
pub struct ChunkedUploader {
    api: ApiClient,
    config: UploadConfig,
}

impl ChunkedUploader {
    pub fn new(api: ApiClient, config: UploadConfig) -> Self {
        Self { api, config }
    }

    /// Uploads a site update under `upload_id`.
    pub async fn upload(&self, upload_id: &str, document: &SiteUpdate) -> Result<UploadOutcome> {
        validate_upload_id(upload_id)?;

        let chunks = split_document(document, self.config.chunk_size)?;
        let total_chunks = u32::try_from(chunks.len())?;
        let digest = document_digest(&chunks);

        let status = self
            .with_retry("Status query", || self.api.upload_status(upload_id))
            .await?;

        let status = if status.total_chunks == 0 {
            UploadStatus::unknown(upload_id)
        } else if status.total_chunks != total_chunks {
            return Err(anyhow!(
                "Upload {} is in progress on the server with {} chunks, but the document splits into {}. Use a different upload ID or chunk size.",
                upload_id,
                status.total_chunks,
                total_chunks
            ));
        } else if status.digest.as_deref().is_some_and(|held| held != digest) {
            return Err(anyhow!(
                "Upload {} is in progress on the server with a different document. Use a different upload ID.",
                upload_id
            ));
        } else {
            status
        };

        let mut pending: Vec<u32> = (0..total_chunks)
            .filter(|index| status.is_missing(*index))
            .collect();

        // every chunk is in but the document was rejected; resending one retries it
        if pending.is_empty() {
            pending.push(total_chunks - 1);
        }

        let skipped = total_chunks - pending.len() as u32;
        if skipped > 0 {
            tracing::info!(
                upload_id,
                "Resuming upload, {} of {} chunks already on the server",
                skipped,
                total_chunks
            );
        }

        let pb = self.progress_bar(total_chunks)?;
        pb.set_position(skipped.into());

        let mut committed = false;
        for index in &pending {
            let packet = ChunkPacket::new(upload_id, *index, total_chunks, &chunks[*index as usize])
                .with_digest(&digest);
            let response = self
                .with_retry(&format!("Chunk {}", index), || self.api.upload_chunk(&packet))
                .await?;

            pb.inc(1);
            committed |= response.complete;
        }

        pb.finish();

        Ok(UploadOutcome {
            upload_id: upload_id.to_string(),
            total_chunks,
            sent: pending.len() as u32,
            skipped,
            committed,
        })
    }

    /// Runs a request, retrying failures that may go away.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match request().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.config.max_attempts && is_retryable(&e) => {
                    tracing::warn!("{} failed (attempt {}): {}", what, attempt, e);
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!("{} failed after {} attempts", what, attempt)))
                }
            }
        }
    }

    fn progress_bar(&self, total_chunks: u32) -> Result<ProgressBar> {
        if !self.config.progress {
            return Ok(ProgressBar::hidden());
        }

        let style = ProgressStyle::with_template(
            "{spinner} {bar:40.green/blue} {pos}/{len} chunks ({elapsed})",
        )?
        .tick_chars("🕛🕐🕑🕒🕓🕔🕕🕖🕗🕘🕙🕚✅")
        .progress_chars("██ ");

        let pb = ProgressBar::new(total_chunks.into());
        pb.set_style(style);

        Ok(pb)
    }
}

fn is_retryable(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<ApiError>() {
        Some(api_error) => api_error.is_retryable(),
        // transport errors
        None => true,
    }
}
