//! Hand-off of reconstructed documents.

use anyhow::Result;
use async_trait::async_trait;

use siteup::api::v1::site_update::{CommittedUpdate, SiteUpdate};

/// Destination of reconstructed documents.
///
/// Called once per completed upload, with the session still locked. Any
/// error keeps the session staged so the client can retry.
#[async_trait]
pub trait CommitSink: Send + Sync + std::fmt::Debug {
    async fn commit(&self, upload_id: &str, document: SiteUpdate) -> Result<CommittedUpdate>;
}

/// Hosting for photos embedded in site updates.
#[async_trait]
pub trait ImageHost: Send + Sync + std::fmt::Debug {
    /// Stores an image given as a data URL and returns where it now lives.
    async fn host(&self, data_url: &str) -> Result<String>;
}

/// Keeps images inline, returning the data URL itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineImageHost;

#[async_trait]
impl ImageHost for InlineImageHost {
    async fn host(&self, data_url: &str) -> Result<String> {
        Ok(data_url.to_string())
    }
}
