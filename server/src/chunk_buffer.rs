//! Per-upload chunk storage.

use std::collections::BTreeMap;

use displaydoc::Display;

/// Not all chunks have arrived: {received} of {total}
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteError {
    pub received: u32,
    pub total: u32,
}

impl std::error::Error for IncompleteError {}

/// The chunks received so far for one upload.
///
/// Indices are validated by the caller before they get here.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    /// Payloads keyed by chunk index.
    ///
    /// The number of keys is the received count.
    chunks: BTreeMap<u32, String>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a chunk.
    ///
    /// Returns whether the received count changed. Resending an index
    /// replaces its payload but is not counted again.
    pub fn insert(&mut self, index: u32, payload: String) -> bool {
        self.chunks.insert(index, payload).is_none()
    }

    /// Returns the number of distinct indices held.
    pub fn received_count(&self) -> u32 {
        // indices are u32, so the count fits
        self.chunks.len() as u32
    }

    /// Checks if all `total` chunks have been received.
    pub fn is_complete(&self, total: u32) -> bool {
        self.received_count() == total
    }

    /// Returns the payloads in ascending index order.
    pub fn ordered_payloads(&self, total: u32) -> Result<Vec<&str>, IncompleteError> {
        if !self.is_complete(total) {
            return Err(IncompleteError {
                received: self.received_count(),
                total,
            });
        }

        Ok(self.chunks.values().map(String::as_str).collect())
    }

    /// Returns the indices held, ascending.
    pub fn received_indices(&self) -> Vec<u32> {
        self.chunks.keys().copied().collect()
    }

    /// Returns the size of the payload held at `index`, or 0.
    pub fn payload_len(&self, index: u32) -> usize {
        self.chunks.get(&index).map_or(0, String::len)
    }

    /// Returns the total size of the held payloads in bytes.
    pub fn payload_bytes(&self) -> usize {
        self.chunks.values().map(String::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_is_not_counted() {
        let mut buffer = ChunkBuffer::new();

        assert!(buffer.insert(1, "B".to_string()));
        assert!(!buffer.insert(1, "B".to_string()));
        assert_eq!(buffer.received_count(), 1);
    }

    #[test]
    fn test_resend_replaces_payload() {
        let mut buffer = ChunkBuffer::new();

        buffer.insert(0, "{\"sliderValue\":".to_string());
        buffer.insert(1, "oops".to_string());
        assert!(!buffer.insert(1, "7}".to_string()));

        assert_eq!(
            buffer.ordered_payloads(2).unwrap(),
            vec!["{\"sliderValue\":", "7}"]
        );
    }

    #[test]
    fn test_ordered_payloads() {
        let mut buffer = ChunkBuffer::new();

        buffer.insert(2, "C".to_string());
        buffer.insert(0, "A".to_string());
        assert_eq!(
            buffer.ordered_payloads(3),
            Err(IncompleteError {
                received: 2,
                total: 3
            })
        );
        assert!(!buffer.is_complete(3));

        buffer.insert(1, "B".to_string());
        assert!(buffer.is_complete(3));
        assert_eq!(buffer.ordered_payloads(3).unwrap(), vec!["A", "B", "C"]);
        assert_eq!(buffer.received_indices(), vec![0, 1, 2]);
        assert_eq!(buffer.payload_bytes(), 3);
    }

    #[test]
    fn test_empty_payload_counts() {
        let mut buffer = ChunkBuffer::new();

        assert!(buffer.insert(0, String::new()));
        assert!(buffer.is_complete(1));
        assert_eq!(buffer.ordered_payloads(1).unwrap(), vec![""]);
    }
}
