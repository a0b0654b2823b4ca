use std::error::Error as StdError;
use std::fmt;

use anyhow::Result;
use const_format::formatcp;
use displaydoc::Display;
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client as HttpClient, Response, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::version::SITEUP_DISTRIBUTOR;
use siteup::api::v1::health::HealthResponse;
use siteup::api::v1::site_update::{HistoryResponse, LatestValue};
use siteup::api::v1::upload_chunk::{ApplyChunkResponse, ChunkPacket};
use siteup::api::v1::upload_status::UploadStatus;

/// The User-Agent string of the siteup client.
const SITEUP_USER_AGENT: &str = formatcp!(
    "Siteup/{} ({})",
    env!("CARGO_PKG_VERSION"),
    SITEUP_DISTRIBUTOR
);

/// The siteup API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Base endpoint of the server.
    endpoint: Url,

    /// An initialized HTTP client.
    client: HttpClient,
}

/// An API error.
#[derive(Debug, Display)]
pub enum ApiError {
    /// {0}
    Structured(StructuredApiError),

    /// HTTP {0}: {1}
    Unstructured(StatusCode, String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructuredApiError {
    code: u16,
    error: String,
    message: String,
}

impl ApiClient {
    /// Creates a client for the server at `endpoint`.
    pub fn new(endpoint: &str) -> Result<Self> {
        let mut client = Self {
            endpoint: Url::parse("http://localhost/")?,
            client: build_http_client()?,
        };
        client.set_endpoint(endpoint)?;

        Ok(client)
    }

    /// Sets the API endpoint of this client.
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<()> {
        // `Url::join` replaces the last segment unless the base ends in a slash
        let endpoint = if endpoint.ends_with('/') {
            Url::parse(endpoint)?
        } else {
            Url::parse(&format!("{}/", endpoint))?
        };

        self.endpoint = endpoint;
        Ok(())
    }

    /// Uploads a single chunk.
    pub async fn upload_chunk(&self, packet: &ChunkPacket) -> Result<ApplyChunkResponse> {
        let endpoint = self.endpoint.join("_api/v1/upload-chunk")?;
        let res = self.client.post(endpoint).json(packet).send().await?;

        parse_response(res).await
    }

    /// Returns which chunks of an upload the server holds.
    pub async fn upload_status(&self, upload_id: &str) -> Result<UploadStatus> {
        let endpoint = self.endpoint.join("_api/v1/upload-status")?;
        let res = self
            .client
            .get(endpoint)
            .query(&[("uploadId", upload_id)])
            .send()
            .await?;

        parse_response(res).await
    }

    /// Returns the most recently committed update.
    pub async fn latest_value(&self) -> Result<LatestValue> {
        self.get("_api/v1/latest-value").await
    }

    /// Returns the recently committed updates.
    pub async fn history(&self) -> Result<HistoryResponse> {
        self.get("_api/v1/history").await
    }

    /// Returns the health of the server.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("_api/v1/health").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let endpoint = self.endpoint.join(path)?;
        let res = self.client.get(endpoint).send().await?;

        parse_response(res).await
    }
}

async fn parse_response<T: DeserializeOwned>(res: Response) -> Result<T> {
    if res.status().is_success() {
        Ok(res.json().await?)
    } else {
        let api_error = ApiError::try_from_response(res).await?;
        Err(api_error.into())
    }
}

impl StdError for ApiError {}

impl ApiError {
    async fn try_from_response(response: Response) -> Result<Self> {
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str(&text) {
            Ok(s) => Ok(Self::Structured(s)),
            Err(_) => Ok(Self::Unstructured(status, text)),
        }
    }

    /// Returns whether sending the same request again may succeed.
    ///
    /// Requests the server rejected as invalid fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        let status = match self {
            Self::Structured(e) => e.code,
            Self::Unstructured(status, _) => status.as_u16(),
        };

        status != StatusCode::BAD_REQUEST.as_u16()
    }
}

impl fmt::Display for StructuredApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

fn build_http_client() -> Result<HttpClient> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(SITEUP_USER_AGENT));

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;

    Ok(client)
}
