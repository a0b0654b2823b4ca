use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use siteup::api::v1::site_update::LatestValue;
use siteup::chunking::{generate_upload_id, upload_id_time};
use siteup_client::api::ApiClient;
use siteup_client::chunked_upload::{ChunkedUploader, UploadConfig};
use siteup_client::document::build_site_update;
use siteup_client::size_parser::parse_chunk_size;

/// Siteup client.
#[derive(Debug, Parser)]
#[clap(version, author = "Siteup contributors")]
struct Opts {
    /// Base URL of the siteup server.
    #[clap(
        short = 'e',
        long,
        env = "SITEUP_ENDPOINT",
        default_value = "http://localhost:3001"
    )]
    endpoint: String,

    /// Emit logs as JSON.
    #[clap(long, global = true)]
    log_json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a site update.
    Push(Push),

    /// Show which chunks of an upload the server holds.
    Status {
        /// The upload ID.
        upload_id: String,
    },

    /// Show the latest committed update.
    Latest,

    /// Show recently committed updates.
    History,

    /// Show server health.
    Health,
}

#[derive(Debug, clap::Args)]
struct Push {
    /// Progress of the site, in percent.
    slider_value: f64,

    /// Photo of the site to attach.
    #[clap(long)]
    image: Option<PathBuf>,

    /// Who is sending the update.
    #[clap(long)]
    source: Option<String>,

    /// Maximum chunk size, e.g. `50KiB`.
    #[clap(long, value_parser = parse_chunk_size, default_value = "50KiB")]
    chunk_size: usize,

    /// Upload ID to use. Reuse the ID of a failed upload to resume it.
    #[clap(long)]
    upload_id: Option<String>,

    /// Timestamp of the update, in RFC 3339.
    ///
    /// Defaults to the time encoded in the upload ID, or now for IDs that
    /// carry none. A resumed upload must use the same timestamp.
    #[clap(long)]
    timestamp: Option<DateTime<Utc>>,

    /// Show a progress bar.
    #[clap(long)]
    progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();

    init_logging(opts.log_json);

    let api = ApiClient::new(&opts.endpoint)?;

    match opts.command {
        Command::Push(push) => run_push(api, push).await,
        Command::Status { upload_id } => print_json(&api.upload_status(&upload_id).await?),
        Command::Latest => match api.latest_value().await? {
            LatestValue::Empty { message, .. } => {
                eprintln!("{}", message);
                Ok(())
            }
            latest => print_json(&latest),
        },
        Command::History => print_json(&api.history().await?),
        Command::Health => print_json(&api.health().await?),
    }
}

async fn run_push(api: ApiClient, push: Push) -> Result<()> {
    let upload_id = push.upload_id.unwrap_or_else(generate_upload_id);
    let timestamp = push
        .timestamp
        .or_else(|| upload_id_time(&upload_id))
        .unwrap_or_else(Utc::now);

    let document = build_site_update(
        push.slider_value,
        push.image.as_deref(),
        push.source,
        timestamp,
    )
    .await?;

    let uploader = ChunkedUploader::new(
        api,
        UploadConfig {
            chunk_size: push.chunk_size,
            progress: push.progress,
            ..Default::default()
        },
    );

    eprintln!("Uploading as {}", upload_id);
    let outcome = uploader.upload(&upload_id, &document).await.map_err(|e| {
        anyhow!(
            "{:#}\nRerun with --upload-id {} --timestamp {} to resume the upload",
            e,
            upload_id,
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    })?;

    if !outcome.committed {
        return Err(anyhow!(
            "Server did not confirm upload {} ({} chunks sent, {} already present)",
            outcome.upload_id,
            outcome.sent,
            outcome.skipped
        ));
    }

    eprintln!(
        "✅ Committed {} ({} chunks, {} resumed)",
        outcome.upload_id, outcome.total_chunks, outcome.skipped
    );

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
