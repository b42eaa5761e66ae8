//! Background forwarding so the pipeline never waits on the sink.

use super::{AlertSink, EventIdSource};
use crate::audit::logger::{ForwardLog, ForwardLogEntry};
use crate::extraction::rows::AlertRecord;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// One record waiting to be forwarded.
#[derive(Debug, Clone)]
pub struct ForwardJob {
    pub record: AlertRecord,
    pub source: EventIdSource,
}

/// Bounded queue drained by a background delivery task.
pub struct ForwardQueue {
    tx: mpsc::Sender<ForwardJob>,
    task: JoinHandle<()>,
}

impl ForwardQueue {
    /// Start the delivery task.
    pub fn spawn(sink: Arc<dyn AlertSink>, log: Option<ForwardLog>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(delivery_loop(sink, log, rx));
        Self { tx, task }
    }

    /// Queue a record. Returns false (and drops it) when the queue is full
    /// or the delivery task has stopped.
    pub fn enqueue(&self, job: ForwardJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(row_id = %job.record.row_id, "forward queue full; dropping alert");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                error!(row_id = %job.record.row_id, "forward task stopped; dropping alert");
                false
            }
        }
    }

    /// Stop accepting records and wait for queued ones to be delivered.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            error!("forward task panicked: {e}");
        }
    }
}

async fn delivery_loop(
    sink: Arc<dyn AlertSink>,
    mut log: Option<ForwardLog>,
    mut rx: mpsc::Receiver<ForwardJob>,
) {
    while let Some(job) = rx.recv().await {
        let start = Instant::now();
        let result = sink.deliver(&job.record).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (status, error) = match &result {
            Ok(outcome) => {
                info!(row_id = %job.record.row_id, status = %outcome.status, duration_ms, "alert forwarded");
                (outcome.status.clone(), None)
            }
            Err(e) => {
                error!(row_id = %job.record.row_id, "forwarding failed: {e}");
                ("error".to_string(), Some(e.to_string()))
            }
        };

        if let Some(log) = log.as_mut() {
            let entry = ForwardLogEntry {
                timestamp: Utc::now().to_rfc3339(),
                row_id: job.record.row_id.clone(),
                event_id: job.record.event_id.clone(),
                source: job.source,
                status,
                error,
                duration_ms,
            };
            if let Err(e) = log.log(&entry) {
                warn!("writing forward log: {e}");
            }
        }
    }
}
