//! Staged upload sessions.
//!
//! Each in-flight upload lives in its own [`SessionEntry`] behind its own
//! lock, so uploads with different IDs never wait on each other. The
//! [`SessionTable`] only maps IDs to entries.
//!
//! An entry that has been removed from the table is marked retired while
//! its lock is held. Anyone who fetched the entry before the removal and
//! locks it afterwards sees the mark and goes back to the table.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::chunk_buffer::{ChunkBuffer, IncompleteError};
use siteup::api::v1::upload_status::UploadStatus;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Accepting chunks.
    Open,

    /// Every chunk is present. Only observed inside the critical section
    /// that applied the last one.
    Complete,

    /// The document is being rebuilt and committed.
    Reconstructing,

    /// Removed from the table, either committed or evicted.
    Retired,
}

/// A chunked upload session.
#[derive(Debug)]
pub struct UploadSession {
    /// Total number of chunks expected.
    ///
    /// Set by the first chunk. Later chunks that disagree do not change it.
    total_chunks: u32,

    /// Chunks received so far.
    buffer: ChunkBuffer,

    status: SessionStatus,

    /// Digest of the document, adopted from the first chunk that carries one.
    digest: Option<String>,
}

impl UploadSession {
    fn new(total_chunks: u32) -> Self {
        Self {
            total_chunks,
            buffer: ChunkBuffer::new(),
            status: SessionStatus::Open,
            digest: None,
        }
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Checks a chunk's document digest against the session's.
    ///
    /// The first digest seen is adopted. Returns `false` on a mismatch.
    pub fn match_digest(&mut self, digest: Option<&str>) -> bool {
        match (self.digest.as_deref(), digest) {
            (Some(held), Some(given)) => held == given,
            (None, Some(given)) => {
                self.digest = Some(given.to_string());
                true
            }
            (_, None) => true,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.status == SessionStatus::Retired
    }

    /// Stores a chunk, returning whether it was new.
    pub fn insert_chunk(&mut self, index: u32, payload: String) -> bool {
        debug_assert!(index < self.total_chunks);
        self.buffer.insert(index, payload)
    }

    pub fn received_count(&self) -> u32 {
        self.buffer.received_count()
    }

    /// Checks if all chunks have been received.
    pub fn is_complete(&self) -> bool {
        self.buffer.is_complete(self.total_chunks)
    }

    pub fn received_indices(&self) -> Vec<u32> {
        self.buffer.received_indices()
    }

    pub fn payload_bytes(&self) -> usize {
        self.buffer.payload_bytes()
    }

    /// Returns the staged size if `payload_len` bytes were stored at `index`.
    pub fn payload_bytes_with(&self, index: u32, payload_len: usize) -> usize {
        self.payload_bytes() - self.buffer.payload_len(index) + payload_len
    }

    /// Gets the payloads in index order.
    pub fn ordered_payloads(&self) -> Result<Vec<&str>, IncompleteError> {
        self.buffer.ordered_payloads(self.total_chunks)
    }

    /// Marks an open session complete if every chunk is present.
    pub fn mark_complete(&mut self) -> bool {
        if self.status != SessionStatus::Open || !self.is_complete() {
            return false;
        }

        self.status = SessionStatus::Complete;
        true
    }

    /// Moves a complete session into reconstruction.
    pub fn begin_reconstruction(&mut self) -> bool {
        if self.status != SessionStatus::Complete {
            return false;
        }

        self.status = SessionStatus::Reconstructing;
        true
    }

    /// Returns a session whose reconstruction or commit failed to `Open`.
    pub fn reopen(&mut self) {
        if self.status != SessionStatus::Retired {
            self.status = SessionStatus::Open;
        }
    }

    fn retire(&mut self) {
        self.status = SessionStatus::Retired;
    }

    fn to_status(&self, upload_id: &str) -> UploadStatus {
        UploadStatus {
            upload_id: upload_id.to_string(),
            received_indices: self.received_indices(),
            total_chunks: self.total_chunks,
            complete: self.is_complete(),
            digest: self.digest.clone(),
        }
    }
}

/// A session in the table, with its lock.
#[derive(Debug)]
pub struct SessionEntry {
    upload_id: String,

    /// Milliseconds since the epoch of the last chunk applied.
    ///
    /// Kept outside the lock so the reaper can scan without locking.
    last_activity: AtomicI64,

    session: Mutex<UploadSession>,
}

impl SessionEntry {
    fn new(upload_id: String, total_chunks: u32, now: DateTime<Utc>) -> Self {
        Self {
            upload_id,
            last_activity: AtomicI64::new(now.timestamp_millis()),
            session: Mutex::new(UploadSession::new(total_chunks)),
        }
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    /// Records activity on this session.
    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    pub fn touch_at(&self, now: DateTime<Utc>) {
        self.last_activity
            .fetch_max(now.timestamp_millis(), Ordering::AcqRel);
    }

    /// Locks the session, waiting for whoever holds it.
    pub async fn lock(&self) -> MutexGuard<'_, UploadSession> {
        self.session.lock().await
    }

    /// Locks the session if nobody else holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, UploadSession>> {
        self.session.try_lock().ok()
    }
}

/// Registry of staged uploads by ID.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: DashMap<String, Arc<SessionEntry>>,
}

impl SessionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for an upload, creating it if absent.
    ///
    /// `total_chunks` is only used when creating. An existing session keeps
    /// the total it was created with.
    pub fn get_or_create(&self, upload_id: &str, total_chunks: u32) -> Arc<SessionEntry> {
        if let Some(entry) = self.sessions.get(upload_id) {
            return entry.value().clone();
        }

        self.sessions
            .entry(upload_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(upload_id, total_chunks, "Creating upload session");
                Arc::new(SessionEntry::new(
                    upload_id.to_string(),
                    total_chunks,
                    Utc::now(),
                ))
            })
            .value()
            .clone()
    }

    /// Returns the session for an upload, if any.
    pub fn get(&self, upload_id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.get(upload_id).map(|e| e.value().clone())
    }

    /// Retires a session and removes it from the table.
    ///
    /// Must be called with the session's lock held, passing the guard. Only
    /// the given entry is removed: if the ID has since been taken by a new
    /// session, that session stays. Removing twice is a no-op.
    pub fn remove(&self, entry: &Arc<SessionEntry>, session: &mut UploadSession) -> bool {
        session.retire();

        self.sessions
            .remove_if(entry.upload_id(), |_, current| Arc::ptr_eq(current, entry))
            .is_some()
    }

    /// Returns every session's ID and last activity.
    ///
    /// Takes no session locks.
    pub fn snapshot(&self) -> Vec<(String, DateTime<Utc>)> {
        self.sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().last_activity()))
            .collect()
    }

    /// Returns the progress of an upload.
    ///
    /// Unknown uploads report no chunks and a total of 0.
    pub async fn status(&self, upload_id: &str) -> UploadStatus {
        let Some(entry) = self.get(upload_id) else {
            return UploadStatus::unknown(upload_id);
        };

        let session = entry.lock().await;
        if session.is_retired() {
            return UploadStatus::unknown(upload_id);
        }

        session.to_status(upload_id)
    }

    /// Gets the current number of staged sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
