//! Document reconstruction.
//!
//! Fragments are joined in index order with nothing in between and the
//! result is parsed as a site update. Where the client cut the document is
//! irrelevant to the outcome.

use displaydoc::Display;

use crate::chunk_buffer::IncompleteError;
use siteup::api::v1::site_update::SiteUpdate;

/// An error rebuilding a document from its chunks.
#[derive(Debug, Display)]
pub enum ReconstructionError {
    /// {0}
    Incomplete(IncompleteError),

    /// Reconstructed document is {size} bytes, over the limit of {limit} bytes
    TooLarge { size: usize, limit: usize },

    /// Reconstructed document is not a valid site update: {0}
    Decode(serde_json::Error),
}

impl std::error::Error for ReconstructionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Incomplete(e) => Some(e),
            Self::TooLarge { .. } => None,
            Self::Decode(e) => Some(e),
        }
    }
}

impl From<IncompleteError> for ReconstructionError {
    fn from(error: IncompleteError) -> Self {
        Self::Incomplete(error)
    }
}

/// Rebuilds documents from ordered fragments.
#[derive(Debug, Clone, Copy)]
pub struct Reconstructor {
    max_document_size: usize,
}

impl Reconstructor {
    pub fn new(max_document_size: usize) -> Self {
        Self { max_document_size }
    }

    pub fn max_document_size(&self) -> usize {
        self.max_document_size
    }

    /// Concatenates the fragments and parses the result.
    pub fn build<'a, I>(&self, ordered_payloads: I) -> Result<SiteUpdate, ReconstructionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let document = self.concat(ordered_payloads)?;
        serde_json::from_str(&document).map_err(ReconstructionError::Decode)
    }

    /// Concatenates the fragments without parsing.
    pub fn concat<'a, I>(&self, ordered_payloads: I) -> Result<String, ReconstructionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let payloads: Vec<&str> = ordered_payloads.into_iter().collect();
        let size: usize = payloads.iter().map(|p| p.len()).sum();

        if size > self.max_document_size {
            return Err(ReconstructionError::TooLarge {
                size,
                limit: self.max_document_size,
            });
        }

        Ok(payloads.concat())
    }
}
