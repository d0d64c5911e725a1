//! Controller Client: sends telemetry and fetches routes with bounded
//! retry and fixed backoff.

use std::time::Duration;

use sdwan_common::models::{RouteResponse, TelemetryReport};
use sdwan_common::SdwanError;

/// Talks to the controller's two HTTP endpoints. Owns a single `reqwest`
/// client so connections are pooled across calls.
pub struct ControllerClient {
    base_url: String,
    http: reqwest::Client,
    retry_attempts: u32,
    retry_backoff: Vec<u64>,
}

impl ControllerClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry_attempts: u32,
        retry_backoff: Vec<u64>,
    ) -> Result<Self, SdwanError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SdwanError::InvalidArgument(format!("failed to build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
            retry_attempts: retry_attempts.max(1),
            retry_backoff,
        })
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize).min(self.retry_backoff.len().saturating_sub(1));
        Duration::from_secs(self.retry_backoff.get(idx).copied().unwrap_or(1))
    }

    /// Runs `operation` up to `retry_attempts` times, sleeping the
    /// configured backoff between attempts (not after the last one).
    /// Returns the first `Some` result, or `RetryExhausted`.
    async fn retry_with_backoff<T, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, SdwanError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Option<T>>,
    {
        for attempt in 0..self.retry_attempts {
            if let Some(result) = operation().await {
                return Ok(result);
            }
            tracing::warn!(operation = operation_name, attempt, "attempt failed");
            if attempt + 1 < self.retry_attempts {
                tokio::time::sleep(self.backoff_for(attempt)).await;
            }
        }
        Err(SdwanError::RetryExhausted {
            operation: operation_name.to_string(),
            attempts: self.retry_attempts,
        })
    }

    /// POSTs the report to the ingest endpoint. Returns `true` iff HTTP 200.
    /// Transport errors and non-200 statuses are both failures, never raised.
    pub async fn send_telemetry(&self, report: &TelemetryReport) -> bool {
        let url = format!("{}/api/v1/telemetry", self.base_url);
        match self.http.post(&url).json(report).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => true,
            Ok(resp) => {
                let err = SdwanError::TransportFailure(format!("unexpected status {}", resp.status()));
                tracing::debug!(error = %err, "telemetry post failed");
                false
            }
            Err(e) => {
                let err = SdwanError::TransportFailure(e.to_string());
                tracing::debug!(error = %err, "telemetry post failed");
                false
            }
        }
    }

    pub async fn send_telemetry_with_retry(&self, report: &TelemetryReport) -> bool {
        let result = self
            .retry_with_backoff("send_telemetry", || async {
                if self.send_telemetry(report).await {
                    Some(())
                } else {
                    None
                }
            })
            .await;
        result.is_ok()
    }

    /// GETs routes for `agent_id`. A 404 means "no routes yet" and is
    /// returned as `None` without triggering retry-exhaustion semantics.
    pub async fn fetch_routes(&self, agent_id: &str) -> Option<RouteResponse> {
        let url = format!("{}/api/v1/routes", self.base_url);
        let resp = match self.http.get(&url).query(&[("agent_id", agent_id)]).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let err = SdwanError::TransportFailure(e.to_string());
                tracing::debug!(agent_id, error = %err, "route fetch failed");
                return None;
            }
        };
        match resp.status() {
            reqwest::StatusCode::OK => resp.json::<RouteResponse>().await.ok(),
            reqwest::StatusCode::NOT_FOUND => {
                tracing::warn!(agent_id, "controller has no routes for this agent yet");
                None
            }
            other => {
                let err = SdwanError::TransportFailure(format!("unexpected status {other}"));
                tracing::debug!(agent_id, error = %err, "route fetch failed");
                None
            }
        }
    }

    pub async fn fetch_routes_with_retry(&self, agent_id: &str) -> Option<RouteResponse> {
        self.retry_with_backoff("fetch_routes", || async { self.fetch_routes(agent_id).await })
            .await
            .ok()
    }
}
