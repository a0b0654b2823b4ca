//! Uploads against a real server on a loopback listener.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use siteup::api::v1::site_update::{LatestValue, SiteUpdate};
use siteup::api::v1::upload_chunk::ChunkPacket;
use siteup::chunking::{document_digest, generate_upload_id, split_document, upload_id_time};
use siteup_client::api::ApiClient;
use siteup_client::chunked_upload::{ChunkedUploader, UploadConfig};
use siteup_client::document::build_site_update;
use siteup_server::config::Config;
use siteup_server::{build_router, StateInner};

async fn start_server() -> (ApiClient, Arc<StateInner>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve(listener).await
}

async fn serve(listener: TcpListener) -> (ApiClient, Arc<StateInner>) {
    let addr = listener.local_addr().unwrap();
    let state = StateInner::new(Config::default());
    let router = build_router(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let api = ApiClient::new(&format!("http://{}", addr)).unwrap();
    (api, state)
}

fn config(chunk_size: usize) -> UploadConfig {
    UploadConfig {
        chunk_size,
        retry_delay: Duration::from_millis(10),
        ..Default::default()
    }
}

fn document() -> SiteUpdate {
    let mut document = SiteUpdate::new(88.0);
    document.image_base64 = Some(format!("data:image/png;base64,{}", "QUJD".repeat(256)));
    document
}

#[tokio::test]
async fn test_upload_commits() {
    let (api, state) = start_server().await;
    let uploader = ChunkedUploader::new(api.clone(), config(100));

    let upload_id = generate_upload_id();
    let outcome = uploader.upload(&upload_id, &document()).await.unwrap();

    assert!(outcome.committed);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.sent, outcome.total_chunks);
    assert!(outcome.total_chunks > 1);

    match api.latest_value().await.unwrap() {
        LatestValue::Committed(update) => {
            assert_eq!(update.slider_value, 88.0);
            assert_eq!(update.upload_id, upload_id);
        }
        other => panic!("nothing committed: {:?}", other),
    }

    assert_eq!(api.history().await.unwrap().count, 1);
    assert_eq!(api.health().await.unwrap().active_uploads, 0);
    assert!(state.sessions().is_empty());
}

#[tokio::test]
async fn test_upload_resumes() {
    let (api, _state) = start_server().await;
    let document = document();
    let chunks = split_document(&document, 100).unwrap();
    let total = chunks.len() as u32;

    // a previous run got the first two chunks through
    for index in 0..2 {
        api.upload_chunk(&ChunkPacket::new("resume-me", index, total, &chunks[index as usize]))
            .await
            .unwrap();
    }

    let uploader = ChunkedUploader::new(api.clone(), config(100));
    let outcome = uploader.upload("resume-me", &document).await.unwrap();

    assert!(outcome.committed);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.sent, total - 2);
    assert_eq!(api.latest_value().await.unwrap().slider_value(), 88.0);
}

/// Sends the first `count` chunks of a document, as an interrupted run would.
async fn send_head(api: &ApiClient, upload_id: &str, document: &SiteUpdate, count: u32) {
    let chunks = split_document(document, 16).unwrap();
    let digest = document_digest(&chunks);
    let total = chunks.len() as u32;

    for index in 0..count {
        let packet = ChunkPacket::new(upload_id, index, total, &chunks[index as usize])
            .with_digest(&digest);
        api.upload_chunk(&packet).await.unwrap();
    }
}

#[tokio::test]
async fn test_resumed_push_commits_the_original_document() {
    let (api, _state) = start_server().await;
    let upload_id = generate_upload_id();

    let build = || async {
        let timestamp = upload_id_time(&upload_id).unwrap();
        build_site_update(50.0, None, None, timestamp).await.unwrap()
    };

    let interrupted = build().await;
    send_head(&api, &upload_id, &interrupted, 2).await;

    tokio::time::sleep(Duration::from_millis(5)).await;
    let resumed = build().await;

    let uploader = ChunkedUploader::new(api.clone(), config(16));
    let outcome = uploader.upload(&upload_id, &resumed).await.unwrap();
    assert!(outcome.committed);
    assert_eq!(outcome.skipped, 2);

    match api.latest_value().await.unwrap() {
        LatestValue::Committed(update) => {
            assert_eq!(update.timestamp, interrupted.timestamp);
            assert_eq!(update.slider_value, interrupted.slider_value);
        }
        other => panic!("nothing committed: {:?}", other),
    }
    assert_eq!(resumed, interrupted);
}

#[tokio::test]
async fn test_different_document_is_not_spliced() {
    let (api, _state) = start_server().await;

    let now = chrono::Utc::now();
    let interrupted = build_site_update(50.0, None, None, now).await.unwrap();
    send_head(&api, "u1", &interrupted, 2).await;

    let other = build_site_update(50.0, None, None, now + chrono::TimeDelta::milliseconds(7))
        .await
        .unwrap();
    let uploader = ChunkedUploader::new(api.clone(), config(16));
    assert!(uploader.upload("u1", &other).await.is_err());

    // the server refuses a stray chunk of the other document too
    let chunks = split_document(&other, 16).unwrap();
    let total = chunks.len() as u32;
    let stray = ChunkPacket::new("u1", total - 1, total, &chunks[total as usize - 1])
        .with_digest(document_digest(&chunks));
    assert!(api.upload_chunk(&stray).await.is_err());

    assert_eq!(api.upload_status("u1").await.unwrap().received_indices, vec![0, 1]);
    assert_eq!(api.history().await.unwrap().count, 0);
}

#[tokio::test]
async fn test_status_query_is_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = ApiClient::new(&format!("http://{}", addr)).unwrap();
    let uploader = ChunkedUploader::new(
        api.clone(),
        UploadConfig {
            chunk_size: 100,
            retry_delay: Duration::from_millis(200),
            ..Default::default()
        },
    );

    let upload = tokio::spawn(async move { uploader.upload("late", &document()).await });

    // the server comes up while the first attempt is backing off
    tokio::time::sleep(Duration::from_millis(50)).await;
    let listener = TcpListener::bind(addr).await.unwrap();
    serve(listener).await;

    let outcome = upload.await.unwrap().unwrap();
    assert!(outcome.committed);
    assert_eq!(api.latest_value().await.unwrap().slider_value(), 88.0);
}

#[tokio::test]
async fn test_mismatched_resume_is_refused() {
    let (api, _state) = start_server().await;

    api.upload_chunk(&ChunkPacket::new("taken", 0, 1000, "{"))
        .await
        .unwrap();

    let uploader = ChunkedUploader::new(api.clone(), config(100));
    assert!(uploader.upload("taken", &document()).await.is_err());
    assert!(uploader.upload("", &document()).await.is_err());
}

#[tokio::test]
async fn test_unreachable_server_fails_after_retries() {
    // nothing listens on a freshly released port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = ApiClient::new(&format!("http://{}", addr)).unwrap();
    let uploader = ChunkedUploader::new(api, config(100));

    assert!(uploader.upload("u1", &document()).await.is_err());
}
