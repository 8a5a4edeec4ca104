//! HTTP Manual API
//!
//! [`ManualApi`] over the QA service's JSON HTTP interface.
//!
//! # Endpoints
//!
//! - `GET /health` - readiness and loaded manuals
//! - `GET /vehicles` - `{vehicles, available_vehicles}`
//! - `POST /ask` - `{q, vehicle}` in, `{answer, sources, vehicle}` out
//!
//! Errors come back as FastAPI-style `{"detail": ...}` bodies; the detail is
//! carried into [`QueryError::Http`] so the user sees why a question failed.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;

use super::traits::{ApiConfig, AskRequest, AskResponse, HealthReport, ManualApi, QueryEvent};
use crate::catalog::VehicleListing;
use crate::error::{CatalogLoadError, QueryError};

const JSON: &str = "application/json";

/// Longest raw body excerpt kept as error detail
const MAX_DETAIL_CHARS: usize = 200;

/// HTTP manual QA client
#[derive(Clone, Debug)]
pub struct HttpManualApi {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl HttpManualApi {
    /// Create a client for the configured backend
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Connection settings
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn post_ask(
        http_client: &reqwest::Client,
        url: &str,
        request: &AskRequest,
        tx: &mpsc::Sender<QueryEvent>,
    ) -> Result<AskResponse, QueryError> {
        let response = http_client
            .post(url)
            .header(ACCEPT, JSON)
            .json(request)
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        // Receiver may already be gone after a vehicle change
        let _ = tx.send(QueryEvent::ResponseReceived).await;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(QueryError::Http {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        parse_answer(&body)
    }
}

#[async_trait]
impl ManualApi for HttpManualApi {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn health(&self) -> anyhow::Result<HealthReport> {
        let response = self
            .http_client
            .get(self.config.endpoint("/health"))
            .header(ACCEPT, JSON)
            .timeout(self.config.health_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("health check returned {status}: {body}");
        }

        Ok(response.json::<HealthReport>().await?)
    }

    async fn vehicles(&self) -> Result<VehicleListing, CatalogLoadError> {
        let response = self
            .http_client
            .get(self.config.endpoint("/vehicles"))
            .header(ACCEPT, JSON)
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(|e| CatalogLoadError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogLoadError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogLoadError::Request(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| CatalogLoadError::Malformed(e.to_string()))
    }

    fn ask(&self, request: AskRequest) -> mpsc::Receiver<QueryEvent> {
        let (tx, rx) = mpsc::channel(4);
        let http_client = self.http_client.clone();
        let url = self.config.endpoint("/ask");

        tokio::spawn(async move {
            tracing::debug!(vehicle = %request.vehicle, "Sending question");
            let result = Self::post_ask(&http_client, &url, &request, &tx).await;
            if let Err(ref e) = result {
                tracing::debug!(vehicle = %request.vehicle, error = %e, "Question failed");
            }
            let _ = tx.send(QueryEvent::Completed(result)).await;
        });

        rx
    }
}

/// Parse a success body into an answer
pub(crate) fn parse_answer(body: &str) -> Result<AskResponse, QueryError> {
    serde_json::from_str(body).map_err(|e| QueryError::MalformedResponse(e.to_string()))
}

/// Extract a human-readable reason from an error body
///
/// Prefers the `detail` field; falls back to a short excerpt of the raw body.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return match value.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
    }

    let mut excerpt: String = trimmed.chars().take(MAX_DETAIL_CHARS).collect();
    if trimmed.chars().count() > MAX_DETAIL_CHARS {
        excerpt.push('…');
    }
    Some(excerpt)
}
