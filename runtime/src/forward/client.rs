//! HTTP delivery of alert records.

use super::AlertSink;
use crate::extraction::rows::AlertRecord;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// How much of a non-JSON error body is kept.
const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("record {row_id} has no event id")]
    MissingEventId { row_id: String },

    #[error("sink returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("sink sent invalid JSON (HTTP {status}): {source}")]
    InvalidJson {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to sink failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// What the sink said about a delivered record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardOutcome {
    /// Sink-reported status, `"success"` when it gave none, `"warning"` for
    /// a non-JSON reply.
    pub status: String,
    pub response: serde_json::Value,
}

/// POSTs records as JSON to the sink endpoint.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    endpoint: String,
}

impl Forwarder {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Deliver one record. Records without an event id are refused before
    /// any request is made.
    pub async fn forward(&self, record: &AlertRecord) -> Result<ForwardOutcome, ForwardError> {
        let Some(event_id) = record.event_id.as_deref() else {
            return Err(ForwardError::MissingEventId {
                row_id: record.row_id.clone(),
            });
        };

        info!(
            event_id,
            home = %record.home_team,
            away = %record.away_team,
            market = %record.bet_description,
            "forwarding alert"
        );

        let response = self.client.post(&self.endpoint).json(record).send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let body = response.text().await?;

        if !status.is_success() {
            let message = if is_json {
                serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| {
                        v.get("message")
                            .or_else(|| v.get("error"))
                            .and_then(|m| m.as_str())
                            .filter(|m| !m.is_empty())
                            .map(str::to_string)
                    })
                    .unwrap_or(reason)
            } else {
                let snippet: String = body.chars().take(ERROR_BODY_CHARS).collect();
                format!("{reason}. Server: {snippet}")
            };
            return Err(ForwardError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let outcome = if is_json {
            let value: serde_json::Value =
                serde_json::from_str(&body).map_err(|source| ForwardError::InvalidJson {
                    status: status.as_u16(),
                    source,
                })?;
            ForwardOutcome {
                status: value
                    .get("status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("success")
                    .to_string(),
                response: value,
            }
        } else {
            ForwardOutcome {
                status: "warning".to_string(),
                response: serde_json::json!({
                    "status": "warning",
                    "message": "sink response not JSON",
                    "raw": body,
                }),
            }
        };
        debug!(event_id, status = %outcome.status, "sink replied");
        Ok(outcome)
    }
}

#[async_trait]
impl AlertSink for Forwarder {
    async fn deliver(&self, record: &AlertRecord) -> Result<ForwardOutcome, ForwardError> {
        self.forward(record).await
    }
}
