//! Central database.
//!
//! Committed site updates are kept in memory: the latest one, and a
//! bounded history. Only fully reconstructed documents ever reach it.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::commit::{CommitSink, ImageHost};
use crate::config::DatabaseConfig;
use siteup::api::v1::site_update::{
    CommittedUpdate, HistoryResponse, LatestValue, SiteUpdate, DEFAULT_SOURCE,
};

/// Number of updates the history endpoint returns.
pub const HISTORY_PAGE_SIZE: usize = 50;

/// The central database.
#[derive(Debug)]
pub struct CentralDatabase {
    history: RwLock<VecDeque<CommittedUpdate>>,
    history_limit: usize,
    image_host: Arc<dyn ImageHost>,
}

impl CentralDatabase {
    pub fn new(config: &DatabaseConfig, image_host: Arc<dyn ImageHost>) -> Self {
        Self {
            history: RwLock::new(VecDeque::new()),
            history_limit: config.history_limit,
            image_host,
        }
    }

    /// Returns the most recently committed update.
    pub async fn latest(&self) -> LatestValue {
        let history = self.history.read().await;

        match history.back() {
            Some(update) => LatestValue::Committed(update.clone()),
            None => LatestValue::empty(),
        }
    }

    /// Returns the last `limit` committed updates, oldest first.
    pub async fn history(&self, limit: usize) -> HistoryResponse {
        let history = self.history.read().await;
        let skip = history.len().saturating_sub(limit);

        HistoryResponse {
            count: history.len(),
            history: history.iter().skip(skip).cloned().collect(),
        }
    }

    /// Returns the number of committed updates held.
    pub async fn len(&self) -> usize {
        self.history.read().await.len()
    }

    async fn image_url(&self, upload_id: &str, data_url: &str) -> String {
        match self.image_host.host(data_url).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    upload_id,
                    "Image hosting failed, keeping the image inline: {}",
                    e
                );
                data_url.to_string()
            }
        }
    }
}

#[async_trait]
impl CommitSink for CentralDatabase {
    async fn commit(&self, upload_id: &str, document: SiteUpdate) -> Result<CommittedUpdate> {
        let image_url = match &document.image_base64 {
            Some(data_url) => Some(self.image_url(upload_id, data_url).await),
            None => None,
        };

        let update = CommittedUpdate {
            slider_value: document.slider_value,
            image_url,
            source: document
                .source
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            timestamp: document.timestamp,
            upload_id: upload_id.to_string(),
            committed_at: Utc::now(),
        };

        let mut history = self.history.write().await;
        history.push_back(update.clone());
        while history.len() > self.history_limit {
            history.pop_front();
        }

        tracing::info!(
            upload_id,
            slider_value = update.slider_value,
            "Committed site update"
        );

        Ok(update)
    }
}
