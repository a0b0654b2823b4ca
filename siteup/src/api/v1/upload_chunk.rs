use serde::{Deserialize, Serialize};

/// A single chunk of a site update document.
///
/// Every field is optional on the wire so the server can tell a missing
/// field apart from an empty one and reject the former with a validation
/// error. The indices are signed for the same reason: a negative index is
/// a request error, not a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPacket {
    /// Client-generated identifier of the logical upload.
    pub upload_id: Option<String>,

    /// Zero-based position of this chunk in the document.
    pub chunk_index: Option<i64>,

    /// Number of chunks the document was split into.
    pub total_chunks: Option<i64>,

    /// The fragment itself. May be empty, but must be present.
    pub payload: Option<String>,

    /// Digest of the whole document, from `chunking::document_digest`.
    ///
    /// Optional. When given, every chunk of the upload must carry the same
    /// one, so fragments of two different documents are never mixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ChunkPacket {
    pub fn new(
        upload_id: impl Into<String>,
        chunk_index: u32,
        total_chunks: u32,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            upload_id: Some(upload_id.into()),
            chunk_index: Some(chunk_index.into()),
            total_chunks: Some(total_chunks.into()),
            payload: Some(payload.into()),
            digest: None,
        }
    }

    /// Attaches the digest of the document this chunk belongs to.
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }
}

/// Response from uploading a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyChunkResponse {
    /// Whether this chunk was new to the session.
    ///
    /// `false` for a resent index.
    pub accepted: bool,

    /// Number of distinct chunks the session holds.
    pub received_count: u32,

    /// Number of chunks the session expects.
    pub total_chunks: u32,

    /// Whether this chunk completed the upload.
    ///
    /// Exactly one response per upload carries `true`; the document has
    /// been reconstructed and committed by the time it is sent.
    pub complete: bool,
}
