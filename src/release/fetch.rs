//! Release API interaction

use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::request::redact;
use super::retry::RetryPolicy;
use crate::error::{FetchError, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("springroll-fetch/", env!("CARGO_PKG_VERSION"));

/// Response envelope from `/api/release/{id}`
#[derive(Deserialize, Debug)]
struct ReleaseResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Parsed release for one game
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseResult {
    pub success: bool,
    pub error: Option<String>,
    pub archive_url: Option<String>,
    /// The full `data` payload, persisted verbatim as the sidecar
    pub metadata: Value,
}

impl ReleaseResult {
    fn from_data(data: Option<Value>) -> Self {
        let metadata = data.unwrap_or(Value::Null);
        let archive_url = metadata
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            success: true,
            error: None,
            archive_url,
            metadata,
        }
    }
}

/// HTTP client shared by every item of a batch
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl ReleaseClient {
    pub fn new(request_timeout: Duration, retry: RetryPolicy) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            request_timeout,
            retry,
        })
    }

    /// Underlying client, reused for archive downloads
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Request the release behind `url` and validate the response
    pub async fn fetch_release(&self, identifier: &str, url: &Url) -> Result<ReleaseResult, FetchError> {
        debug!("GET {}", redact(url));

        let response = self
            .retry
            .run("release request", move || self.request(url))
            .await
            .map_err(|source| FetchError::Transport {
                identifier: identifier.to_string(),
                source,
            })?;

        if !response.success {
            return Err(FetchError::Release {
                message: response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string()),
                identifier: identifier.to_string(),
            });
        }

        Ok(ReleaseResult::from_data(response.data))
    }

    async fn request(&self, url: &Url) -> Result<ReleaseResponse, TransportError> {
        let response = self
            .http
            .get(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        // The API reports failures in the body, often with a 4xx status
        match serde_json::from_slice::<ReleaseResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(TransportError::Status(status)),
            Err(e) => Err(TransportError::Decode(e)),
        }
    }
}
