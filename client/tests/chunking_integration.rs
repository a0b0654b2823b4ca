//! Integration tests for client-side chunking of site updates

use chrono::{TimeDelta, Utc};
use serde_json::json;
use siteup::api::v1::site_update::SiteUpdate;
use siteup::chunking::{document_digest, split_document, DEFAULT_CHUNK_SIZE};
use siteup_client::document::{build_site_update, image_data_url};
use std::path::Path;

fn document_with_image(image_bytes: usize) -> SiteUpdate {
    let mut document = SiteUpdate::new(73.0);
    document.image_base64 = Some(image_data_url(
        Path::new("site.jpg"),
        &vec![0x42u8; image_bytes],
    ));
    document.source = Some("site_engineer".to_string());
    document
}

/// A photo-sized document produces several chunks within the size limit
#[test]
fn test_large_document_is_split() {
    let document = document_with_image(200 * 1024);
    let chunks = split_document(&document, DEFAULT_CHUNK_SIZE).unwrap();

    assert!(chunks.len() > 1, "Should produce multiple chunks");
    assert!(chunks.iter().all(|c| c.len() <= DEFAULT_CHUNK_SIZE));
    assert!(chunks[..chunks.len() - 1]
        .iter()
        .all(|c| c.len() == DEFAULT_CHUNK_SIZE));
}

/// Concatenating the chunks in order gives back the document
#[test]
fn test_chunks_reassemble() {
    let document = document_with_image(10 * 1024);

    for size in [1, 7, 1000, 4096, 1 << 20] {
        let chunks = split_document(&document, size).unwrap();
        let rebuilt: SiteUpdate = serde_json::from_str(&chunks.concat()).unwrap();
        assert_eq!(rebuilt, document, "chunk size {}", size);
    }
}

/// Unknown fields survive the trip
#[test]
fn test_extra_fields_survive() {
    let mut document = SiteUpdate::new(5.0);
    document
        .extra
        .insert("projectId".to_string(), json!("tower-b"));

    let chunks = split_document(&document, 8).unwrap();
    let rebuilt: serde_json::Value = serde_json::from_str(&chunks.concat()).unwrap();

    assert_eq!(rebuilt["projectId"], "tower-b");
    assert_eq!(rebuilt["sliderValue"], 5.0);
}

/// Rebuilding a document from the same inputs gives the same fragments
#[tokio::test]
async fn test_rebuilt_document_splits_identically() {
    let timestamp = Utc::now();
    let build = || build_site_update(50.0, None, Some("site_engineer".to_string()), timestamp);

    let first = split_document(&build().await.unwrap(), 16).unwrap();
    let second = split_document(&build().await.unwrap(), 16).unwrap();
    assert_eq!(first, second);
    assert_eq!(document_digest(&first), document_digest(&second));

    // a different timestamp changes the tail and the digest
    let later = build_site_update(
        50.0,
        None,
        Some("site_engineer".to_string()),
        timestamp + TimeDelta::milliseconds(7),
    )
    .await
    .unwrap();
    let third = split_document(&later, 16).unwrap();
    assert_eq!(first.len(), third.len());
    assert_ne!(document_digest(&first), document_digest(&third));
}
