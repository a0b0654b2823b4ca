//! Client-side chunking.
//!
//! Documents are serialized to JSON and cut into fixed-size string
//! fragments. Boundaries carry no meaning: the server concatenates the
//! fragments back in index order without delimiters, so a cut may fall in
//! the middle of a token. Cuts never fall inside a UTF-8 sequence.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{SiteupError, SiteupResult};

/// Default chunk size: 50 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 50 * 1024;

/// Splits a string into fragments of at most `size` bytes.
///
/// A fragment is only longer than `size` when `size` is smaller than a
/// single character. An empty string yields a single empty fragment.
pub fn chunk_str(s: &str, size: usize) -> SiteupResult<Vec<&str>> {
    if size == 0 {
        return Err(SiteupError::InvalidChunkSize { size });
    }

    if s.is_empty() {
        return Ok(vec![s]);
    }

    let mut chunks = Vec::with_capacity(s.len().div_ceil(size));
    let mut start = 0;

    while start < s.len() {
        let mut end = (start + size).min(s.len());

        while !s.is_char_boundary(end) {
            end -= 1;
        }

        if end == start {
            // `size` is narrower than this character
            end = start + 1;
            while !s.is_char_boundary(end) {
                end += 1;
            }
        }

        chunks.push(&s[start..end]);
        start = end;
    }

    Ok(chunks)
}

/// Serializes a document and splits it into owned fragments.
pub fn split_document<T: Serialize>(document: &T, size: usize) -> SiteupResult<Vec<String>> {
    let json = serde_json::to_string(document)?;
    let chunks = chunk_str(&json, size)?;

    if u32::try_from(chunks.len()).is_err() {
        return Err(SiteupError::TooManyChunks {
            count: chunks.len(),
        });
    }

    Ok(chunks.into_iter().map(str::to_owned).collect())
}

/// Computes the digest of a split document.
///
/// The digest covers the concatenated fragments, so it identifies the
/// document regardless of where it was cut.
pub fn document_digest<S: AsRef<str>>(chunks: &[S]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.as_ref().as_bytes());
    }

    format!("sha256:{:x}", hasher.finalize())
}

/// Generates a fresh upload ID of the form `upload_<millis>_<suffix>`.
pub fn generate_upload_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    let suffix = Uuid::new_v4().simple().to_string();

    format!("upload_{}_{}", millis, &suffix[..9])
}

/// Returns the creation time encoded in an ID from [`generate_upload_id`].
pub fn upload_id_time(upload_id: &str) -> Option<DateTime<Utc>> {
    let millis = upload_id.strip_prefix("upload_")?.split('_').next()?;
    DateTime::from_timestamp_millis(millis.parse().ok()?)
}

/// Checks a caller-supplied upload ID.
pub fn validate_upload_id(upload_id: &str) -> SiteupResult<()> {
    if upload_id.trim().is_empty() {
        return Err(SiteupError::EmptyUploadId);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_str_sizes() {
        let chunks = chunk_str("ABCDEFG", 3).unwrap();
        assert_eq!(chunks, vec!["ABC", "DEF", "G"]);

        let chunks = chunk_str("ABC", 3).unwrap();
        assert_eq!(chunks, vec!["ABC"]);

        let chunks = chunk_str("", 3).unwrap();
        assert_eq!(chunks, vec![""]);
    }

    #[test]
    fn test_chunk_str_respects_char_boundaries() {
        let s = "aé漢字b";
        for size in 1..=s.len() {
            let chunks = chunk_str(s, size).unwrap();
            assert_eq!(chunks.concat(), s, "size {}", size);
            assert!(chunks.iter().all(|c| !c.is_empty()));
        }

        // a 3-byte character cannot be cut below its width
        let chunks = chunk_str("漢", 1).unwrap();
        assert_eq!(chunks, vec!["漢"]);
    }

    #[test]
    fn test_chunk_str_zero_size() {
        assert!(matches!(
            chunk_str("abc", 0),
            Err(SiteupError::InvalidChunkSize { size: 0 })
        ));
    }

    #[test]
    fn test_document_digest() {
        let whole = document_digest(&["{\"sliderValue\":1}"]);
        let cut = document_digest(&["{\"slider", "Value\":1}"]);
        assert_eq!(whole, cut);
        assert!(whole.starts_with("sha256:"));
        assert_eq!(whole.len(), "sha256:".len() + 64);

        let other = document_digest(&["{\"slider", "Value\":2}"]);
        assert_ne!(whole, other);
    }

    #[test]
    fn test_upload_id_time() {
        let time = upload_id_time("upload_1760774900541_a1b2c3d4e").unwrap();
        assert_eq!(time.timestamp_millis(), 1_760_774_900_541);

        assert_eq!(upload_id_time("u1"), None);
        assert_eq!(upload_id_time("upload_soon_a1b2c3d4e"), None);
    }

    #[test]
    fn test_upload_id_shape() {
        let a = generate_upload_id();
        let b = generate_upload_id();

        assert!(a.starts_with("upload_"));
        assert_eq!(a.rsplit('_').next().unwrap().len(), 9);
        assert_ne!(a, b);
        assert!(validate_upload_id(&a).is_ok());
        assert!(upload_id_time(&a).is_some());
        assert!(matches!(
            validate_upload_id("  "),
            Err(SiteupError::EmptyUploadId)
        ));
    }
}
