//! Delivery of correlated alerts to the external sink.

pub mod client;
pub mod queue;

use crate::extraction::rows::AlertRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use client::{ForwardError, ForwardOutcome, Forwarder};
pub use queue::{ForwardJob, ForwardQueue};

/// Where a record's event id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventIdSource {
    /// Captured from the network after the click.
    Sniffed,
    /// Leading segment of the row id, used when nothing was captured.
    RowAttribute,
}

/// Destination for alert records.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, record: &AlertRecord) -> Result<ForwardOutcome, ForwardError>;
}

/// Logs records instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSink;

#[async_trait]
impl AlertSink for DryRunSink {
    async fn deliver(&self, record: &AlertRecord) -> Result<ForwardOutcome, ForwardError> {
        if record.event_id.is_none() {
            return Err(ForwardError::MissingEventId {
                row_id: record.row_id.clone(),
            });
        }
        let payload = serde_json::to_value(record).unwrap_or_default();
        info!(%payload, "dry run: not forwarding");
        Ok(ForwardOutcome {
            status: "dry_run".to_string(),
            response: serde_json::Value::Null,
        })
    }
}
