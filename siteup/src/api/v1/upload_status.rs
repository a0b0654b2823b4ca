use serde::{Deserialize, Serialize};

/// Query for the progress of an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusQuery {
    pub upload_id: Option<String>,
}

/// Progress of an upload, used by clients to resume.
///
/// An unknown upload (never started, already committed, or evicted after
/// going idle) reports no indices and zero total chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    /// The upload this status is for.
    pub upload_id: String,

    /// Indices the server already holds, ascending.
    pub received_indices: Vec<u32>,

    /// Number of chunks the session expects, or 0 if there is no session.
    pub total_chunks: u32,

    /// Whether every chunk has been received.
    ///
    /// Only observable while a reconstruction or commit has failed and
    /// the session is waiting for a retry.
    pub complete: bool,

    /// Digest of the document the held chunks belong to, if the client
    /// sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl UploadStatus {
    /// Returns the status of an upload the server knows nothing about.
    pub fn unknown(upload_id: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
            ..Default::default()
        }
    }

    /// Returns whether the chunk at `index` still has to be sent.
    pub fn is_missing(&self, index: u32) -> bool {
        self.received_indices.binary_search(&index).is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status() {
        let status = UploadStatus::unknown("u2");
        assert_eq!(status.upload_id, "u2");
        assert!(status.received_indices.is_empty());
        assert_eq!(status.total_chunks, 0);
        assert!(status.is_missing(0));
    }

    #[test]
    fn test_wire_names() {
        let status = UploadStatus {
            upload_id: "u1".to_string(),
            received_indices: vec![0, 2],
            total_chunks: 3,
            complete: false,
            digest: None,
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["receivedIndices"], serde_json::json!([0, 2]));
        assert_eq!(json["totalChunks"], 3);
        assert!(json.get("digest").is_none());
        assert!(!status.is_missing(2));
        assert!(status.is_missing(1));
    }
}
