//! HTTP client for the external video analysis service.
//!
//! Wraps the service's `POST /v1/analyze` endpoint using [`reqwest`] and
//! normalizes the returned detections into canonically ordered
//! [`DetectionEvent`](dashscore_core::detection::DetectionEvent)s.

use std::time::Duration;

use async_trait::async_trait;
use dashscore_core::detection::{normalize_detections, NormalizedDetections, RawDetection};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::capabilities::VideoAnalyzer;
use crate::error::AnalysisError;

/// Request body for `POST /v1/analyze`.
#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    footage_location: &'a str,
}

/// Response returned by the analysis service.
#[derive(Debug, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// Connection settings for [`HttpVideoAnalyzer`].
#[derive(Debug, Clone)]
pub struct AnalysisClientConfig {
    /// Base HTTP URL, e.g. `http://vision:8080`.
    pub base_url: String,
    /// Bearer token; omitted from requests when `None`.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// [`VideoAnalyzer`] backed by the remote analysis service.
pub struct HttpVideoAnalyzer {
    client: reqwest::Client,
    config: AnalysisClientConfig,
}

impl HttpVideoAnalyzer {
    pub fn new(config: AnalysisClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create an analyzer reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: AnalysisClientConfig) -> Self {
        Self { client, config }
    }

    fn analyze_url(&self) -> String {
        format!("{}/v1/analyze", self.config.base_url.trim_end_matches('/'))
    }

    fn map_transport_error(&self, err: reqwest::Error) -> AnalysisError {
        if err.is_timeout() {
            AnalysisError::Timeout(self.config.timeout)
        } else if err.is_decode() {
            AnalysisError::Service(format!("malformed response: {err}"))
        } else {
            AnalysisError::Service(err.to_string())
        }
    }
}

#[async_trait]
impl VideoAnalyzer for HttpVideoAnalyzer {
    async fn analyze(&self, footage_location: &str) -> Result<NormalizedDetections, AnalysisError> {
        let mut request = self
            .client
            .post(self.analyze_url())
            .timeout(self.config.timeout)
            .json(&AnalyzeRequest { footage_location });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify_status(status, body));
        }

        let parsed: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let normalized = normalize_detections(parsed.detections);
        if normalized.unknown_labels > 0 || normalized.malformed > 0 {
            tracing::debug!(
                footage_location,
                unknown_labels = normalized.unknown_labels,
                malformed = normalized.malformed,
                "Dropped detections during normalization"
            );
        }
        Ok(normalized)
    }
}

/// Map a non-2xx status from the service onto an [`AnalysisError`].
///
/// - 401 / 403 → `Unauthorized` (permanent)
/// - 415 / 422 → `UnsupportedFormat` (permanent)
/// - 408 / 429 / 5xx and anything else → `Service` (transient)
/// - other 4xx → `Rejected` (permanent)
pub fn classify_status(status: StatusCode, body: String) -> AnalysisError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AnalysisError::Unauthorized(format!("{status}: {body}"))
        }
        StatusCode::UNSUPPORTED_MEDIA_TYPE | StatusCode::UNPROCESSABLE_ENTITY => {
            AnalysisError::UnsupportedFormat(body)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            AnalysisError::Service(format!("{status}: {body}"))
        }
        _ if status.is_client_error() => AnalysisError::Rejected(format!("{status}: {body}")),
        _ => AnalysisError::Service(format!("{status}: {body}")),
    }
}
