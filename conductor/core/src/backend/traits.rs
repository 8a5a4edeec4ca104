//! Manual API Traits
//!
//! Trait definitions for the manual question-answering service. The
//! Conductor only ever talks to the backend through [`ManualApi`], so tests can
//! substitute a scripted implementation and observe exactly which requests were
//! made.
//!
//! # Design Philosophy
//!
//! Catalog and health calls are plain awaited requests. Asking a question is
//! different: the caller must stay responsive while the answer is generated
//! and must see the moment the response arrives (to move from "searching" to
//! "generating"). [`ManualApi::ask`] therefore starts the request in the
//! background and hands back a channel of [`QueryEvent`]s.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::catalog::VehicleListing;
use crate::error::{CatalogLoadError, QueryError};
use crate::messages::Source;

/// Progress of a single `/ask` round trip
#[derive(Clone, Debug, PartialEq)]
pub enum QueryEvent {
    /// Response headers arrived; the body is being read
    ResponseReceived,
    /// The round trip finished
    Completed(Result<AskResponse, QueryError>),
}

/// Body of `POST /ask`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    /// Question text
    pub q: String,
    /// Vehicle code the question is about
    pub vehicle: String,
}

impl AskRequest {
    /// Create a request for `vehicle`
    pub fn new(q: impl Into<String>, vehicle: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            vehicle: vehicle.into(),
        }
    }
}

/// Successful `/ask` response body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    /// Markdown answer text
    pub answer: String,
    /// Citations, possibly empty
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Vehicle the backend answered for
    #[serde(default)]
    pub vehicle: Option<String>,
}

/// Body of `GET /health`
///
/// Only `status` is required; anything else the backend reports is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status, `"healthy"` when ready
    pub status: String,
    /// Manual files the backend has indexed
    #[serde(default)]
    pub loaded_manuals: Vec<String>,
    /// Whether the embedding model is loaded
    #[serde(default)]
    pub embedding_model_ready: Option<bool>,
    /// Whether the answer generator is loaded
    #[serde(default)]
    pub answer_generator_ready: Option<bool>,
}

impl HealthReport {
    /// Whether the backend reports itself healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// Manual QA service
///
/// Implement this trait to point the Conductor at a different transport.
#[async_trait]
pub trait ManualApi: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Probe `GET /health`
    async fn health(&self) -> anyhow::Result<HealthReport>;

    /// Fetch `GET /vehicles`
    async fn vehicles(&self) -> Result<VehicleListing, CatalogLoadError>;

    /// Start `POST /ask` in the background
    ///
    /// The receiver yields at most one [`QueryEvent::ResponseReceived`]
    /// followed by exactly one [`QueryEvent::Completed`]. If the channel closes
    /// without a completion the caller treats it as a network failure.
    fn ask(&self, request: AskRequest) -> mpsc::Receiver<QueryEvent>;
}

/// Connection settings for the HTTP backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Timeout for `/ask`
    pub request_timeout: Duration,
    /// Timeout for `/health` and `/vehicles`
    pub health_timeout: Duration,
}

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl ApiConfig {
    /// Config for `base_url` with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the health probe timeout
    #[must_use]
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Absolute URL for an endpoint path
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_endpoint_joins_slashes() {
        let config = ApiConfig::new("http://qa.local:8000/");
        assert_eq!(config.endpoint("/ask"), "http://qa.local:8000/ask");
        assert_eq!(config.endpoint("vehicles"), "http://qa.local:8000/vehicles");
    }

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::default()
            .with_request_timeout(Duration::from_secs(30));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.health_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_ask_response_tolerates_missing_sources() {
        let response: AskResponse =
            serde_json::from_str(r#"{"answer": "오일을 교환하세요"}"#).unwrap();
        assert_eq!(response.answer, "오일을 교환하세요");
        assert!(response.sources.is_empty());
        assert_eq!(response.vehicle, None);
    }

    #[test]
    fn test_health_report_extra_fields() {
        let report: HealthReport = serde_json::from_str(
            r#"{"status": "healthy", "loaded_manuals": ["sonata"], "supported_vehicles": ["SONATA"]}"#,
        )
        .unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.loaded_manuals, vec!["sonata".to_string()]);
    }
}
