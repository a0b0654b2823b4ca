//! Eviction of abandoned uploads.
//!
//! Clients that give up mid-upload leave their chunks behind. The reaper
//! periodically drops every session that has seen no chunk for longer than
//! the session timeout. Eviction is silent: a client that comes back finds
//! an empty status and starts over.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::chunked_session::SessionTable;
use crate::config::ChunkedUploadConfig;

/// Periodic sweeper of idle sessions.
#[derive(Debug, Clone)]
pub struct Reaper {
    sessions: Arc<SessionTable>,
    session_timeout: Duration,
    interval: Duration,
}

impl Reaper {
    pub fn new(sessions: Arc<SessionTable>, config: &ChunkedUploadConfig) -> Self {
        Self {
            sessions,
            session_timeout: config.session_timeout,
            interval: config.reaper_interval,
        }
    }

    /// Starts sweeping in the background.
    ///
    /// Returns `None` if the interval is zero.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            tracing::info!("Idle session eviction is disabled");
            return None;
        }

        Some(tokio::spawn(self.run()))
    }

    /// Sweeps forever, once per interval.
    pub async fn run(self) {
        tracing::info!(
            "Evicting uploads idle for {} every {}",
            humantime::format_duration(self.session_timeout),
            humantime::format_duration(self.interval)
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.sweep(Utc::now());
        }
    }

    /// Evicts every session idle at `now`, returning how many were removed.
    ///
    /// A session whose lock is held is being worked on and is left alone.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;

        for (upload_id, last_activity) in self.sessions.snapshot() {
            if !self.is_idle(last_activity, now) {
                continue;
            }

            let Some(entry) = self.sessions.get(&upload_id) else {
                continue;
            };

            let Some(mut session) = entry.try_lock() else {
                tracing::debug!(upload_id, "Skipping busy session");
                continue;
            };

            // activity may have landed since the snapshot
            if session.is_retired() || !self.is_idle(entry.last_activity(), now) {
                continue;
            }

            tracing::debug!(
                upload_id,
                received = session.received_count(),
                total = session.total_chunks(),
                "Evicting idle upload"
            );

            if self.sessions.remove(&entry, &mut session) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::info!("Evicted {} idle uploads", evicted);
        }

        evicted
    }

    fn is_idle(&self, last_activity: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - last_activity).to_std() {
            Ok(idle) => idle > self.session_timeout,
            // activity in the future
            Err(_) => false,
        }
    }
}
