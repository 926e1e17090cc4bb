//! Client for the metric aggregation service REST API.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;

use hydromon_core::connectivity::ReachabilityProbe;
use hydromon_core::sync::{DeliveryError, QueuedRecord, RecordDeliverer};

use crate::error::{Result, SyncClientError};
use crate::types::{DehydrationRisk, DeliveryAck};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Shorter timeout for reachability probes.
const PROBE_TIMEOUT_SECS: u64 = 5;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Header carrying the record id so the service can deduplicate replays.
pub const RECORD_ID_HEADER: &str = "x-hydromon-record-id";

/// Environment variable overriding the service base URL.
pub const API_URL_ENV: &str = "HYDROMON_API_URL";

/// Resolve the base URL from an explicit value or the environment.
pub fn resolve_api_url(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(API_URL_ENV).ok())
        .filter(|value| !value.trim().is_empty())
}

/// Client for the aggregation service.
///
/// One instance is shared by the drain worker and the connectivity
/// monitor; probes use a shorter timeout than deliveries.
#[derive(Debug, Clone)]
pub struct MetricSyncClient {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    base_url: String,
}

impl MetricSyncClient {
    /// Create a client with the default delivery timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the aggregation service
    ///   (e.g., "http://192.168.1.75:5000")
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        let probe_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .expect("Failed to build probe HTTP client");

        Self {
            client,
            probe_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// POST one payload to its endpoint.
    ///
    /// A 2xx response whose body does not carry `status: "error"` is an
    /// acknowledgment; everything else is a delivery failure.
    pub async fn post_payload(
        &self,
        path: &str,
        record_id: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            RECORD_ID_HEADER,
            HeaderValue::from_str(record_id)
                .map_err(|_| SyncClientError::invalid_request("Invalid record id format"))?,
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(SyncClientError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        if let Ok(ack) = serde_json::from_str::<DeliveryAck>(&body) {
            if ack.status.as_deref() == Some("error") {
                return Err(SyncClientError::Rejected(
                    ack.message
                        .unwrap_or_else(|| "unspecified service error".to_string()),
                ));
            }
        }
        Ok(())
    }

    /// GET the latest-metrics endpoint as a cheap reachability probe.
    ///
    /// GET /latest_metrics
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/latest_metrics", self.base_url);
        match self.probe_client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!("[SyncClient] health probe failed: {}", err);
                false
            }
        }
    }

    /// Fetch the server-computed dehydration risk for display.
    ///
    /// GET /predict_dehydration_risk
    pub async fn fetch_dehydration_risk(&self) -> Result<DehydrationRisk> {
        let url = format!("{}/predict_dehydration_risk", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(SyncClientError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            SyncClientError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }
}

#[async_trait]
impl RecordDeliverer for MetricSyncClient {
    async fn deliver(&self, record: &QueuedRecord) -> std::result::Result<(), DeliveryError> {
        let payload: serde_json::Value = serde_json::from_str(&record.payload).map_err(|err| {
            DeliveryError::permanent(format!("payload is not valid JSON: {}", err))
        })?;

        self.post_payload(record.endpoint.path(), &record.id, &payload)
            .await
            .map_err(|err| DeliveryError {
                retry_class: err.retry_class(),
                message: err.to_string(),
            })
    }
}

#[async_trait]
impl ReachabilityProbe for MetricSyncClient {
    async fn check(&self) -> bool {
        self.check_health().await
    }
}
