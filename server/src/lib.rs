//! Server for resumable chunked site update uploads.
//!
//! Clients split a site update into chunks and upload them in any order,
//! with retries. The server stages chunks in memory per upload, rebuilds
//! the update once every chunk is in, commits it to the central database,
//! and evicts uploads that were abandoned halfway.

#![deny(
    asm_sub_register,
    deprecated,
    missing_abi,
    unsafe_code,
    unused_macros,
    unused_must_use,
    unused_unsafe
)]
#![deny(clippy::from_over_into, clippy::needless_question_mark)]

pub mod api;
pub mod chunk_buffer;
pub mod chunked_session;
pub mod commit;
pub mod config;
pub mod database;
pub mod error;
pub mod ingest;
pub mod reaper;
pub mod reconstruct;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use chunked_session::SessionTable;
use commit::InlineImageHost;
use config::Config;
use database::CentralDatabase;
use error::{ErrorKind, ServerResult};
use ingest::IngestionService;
use reaper::Reaper;

type State = Arc<StateInner>;

/// Global server state.
#[derive(Debug)]
pub struct StateInner {
    /// The server configuration.
    config: Config,

    /// Chunk ingestion over the staged sessions.
    ingest: IngestionService,

    /// Where completed uploads are committed.
    database: Arc<CentralDatabase>,
}

impl StateInner {
    pub fn new(config: Config) -> Arc<Self> {
        let sessions = Arc::new(SessionTable::new());
        let database = Arc::new(CentralDatabase::new(
            &config.database,
            Arc::new(InlineImageHost),
        ));
        let ingest = IngestionService::new(sessions, database.clone(), &config.chunked_upload);

        Arc::new(Self {
            config,
            ingest,
            database,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        self.ingest.sessions()
    }

    pub fn database(&self) -> &Arc<CentralDatabase> {
        &self.database
    }
}

/// The fallback route.
#[axum_macros::debug_handler]
async fn fallback(_: axum::http::Uri) -> ServerResult<()> {
    Err(ErrorKind::NotFound.into())
}

/// Builds the router serving the API.
pub fn build_router(state: Arc<StateInner>) -> Router {
    let max_payload_size = state.config.max_payload_size;

    api::get_router()
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(max_payload_size))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

/// Serves the API on an already bound listener until shutdown.
///
/// The reaper runs for as long as the server does.
pub async fn serve(listener: TcpListener, state: Arc<StateInner>) -> Result<()> {
    let reaper = Reaper::new(state.sessions().clone(), &state.config.chunked_upload).spawn();

    let result = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(reaper) = reaper {
        reaper.abort();
    }

    result?;
    Ok(())
}

/// Runs the API server.
pub async fn run_api_server(cli_listen: Option<SocketAddr>, config: Config) -> Result<()> {
    eprintln!("Starting API server...");

    let listen = cli_listen.unwrap_or(config.listen);
    let state = StateInner::new(config);

    let listener = TcpListener::bind(&listen).await?;
    eprintln!("Listening on {:?}...", listen);

    serve(listener, state).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutting down");
}
