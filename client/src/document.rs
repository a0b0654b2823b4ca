//! Building site updates from local files.

use std::path::Path;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};

use siteup::api::v1::site_update::SiteUpdate;

/// Returns the MIME type of an image, judged by its extension.
fn image_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Encodes an image as a base64 data URL.
pub fn image_data_url(path: &Path, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        image_mime_type(path),
        STANDARD.encode(data)
    )
}

/// Builds a site update, reading the photo from disk if one is given.
///
/// The same inputs always give the same document, so a resumed upload
/// rebuilds exactly what the interrupted one sent.
pub async fn build_site_update(
    slider_value: f64,
    image: Option<&Path>,
    source: Option<String>,
    timestamp: DateTime<Utc>,
) -> Result<SiteUpdate> {
    if !slider_value.is_finite() {
        return Err(anyhow!("Slider value must be a finite number"));
    }

    let mut update = SiteUpdate::new(slider_value);
    update.source = source;
    update.timestamp = Some(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));

    if let Some(path) = image {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;

        tracing::debug!("Read {} bytes of image from {}", data.len(), path.display());
        update.image_base64 = Some(image_data_url(path, &data));
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_data_url() {
        assert_eq!(
            image_data_url(Path::new("site.PNG"), b"ABC"),
            "data:image/png;base64,QUJD"
        );
        assert_eq!(
            image_data_url(Path::new("photos/site.jpeg"), b""),
            "data:image/jpeg;base64,"
        );
        assert!(image_data_url(Path::new("notes"), b"x").starts_with("data:application/octet-stream;"));
    }

    #[tokio::test]
    async fn test_build_site_update() {
        let now = Utc::now();
        let update = build_site_update(42.5, None, Some("office".to_string()), now)
            .await
            .unwrap();

        assert_eq!(update.slider_value, 42.5);
        assert_eq!(update.source.as_deref(), Some("office"));
        assert!(update.timestamp.as_deref().unwrap().ends_with('Z'));
        assert!(update.image_base64.is_none());

        let again = build_site_update(42.5, None, Some("office".to_string()), now)
            .await
            .unwrap();
        assert_eq!(again, update);

        assert!(build_site_update(f64::NAN, None, None, now).await.is_err());
        assert!(
            build_site_update(1.0, Some(Path::new("/nonexistent/site.png")), None, now)
                .await
                .is_err()
        );
    }
}
