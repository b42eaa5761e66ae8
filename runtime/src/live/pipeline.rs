//! Per-row processing: filter, throttle, extract, deduplicate, click,
//! correlate, forward.

use crate::config::AgentConfig;
use crate::extraction::rows::{extract_alert, is_alert_row, RawRow};
use crate::forward::{EventIdSource, ForwardJob, ForwardQueue};
use crate::live::correlate::{Correlation, Correlator};
use crate::live::dedup::{fingerprint, AlertLedger};
use crate::live::observer::GridObserver;
use crate::live::sniffer::SniffedEvent;
use crate::live::throttle::Throttle;
use crate::renderer::{now_ms, RenderContext};
use anyhow::Result;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// No row id or the alert text lacks the keyword.
    NotAlert,
    /// Cells missing or unparseable.
    Invalid,
    Duplicate,
    /// The row or its outcome cell was gone by click time.
    ClickFailed,
    /// No event id from the network and none derivable from the row id.
    Unresolved,
    Queued {
        event_id: String,
        source: EventIdSource,
    },
    /// Correlated, but the forward queue refused it.
    Dropped { event_id: String },
}

/// Counters over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub rows_seen: u64,
    pub alerts: u64,
    pub invalid: u64,
    pub duplicates: u64,
    pub click_failures: u64,
    pub unresolved: u64,
    pub sniffed: u64,
    pub row_attribute_fallbacks: u64,
    pub dropped: u64,
}

impl RunStats {
    pub fn record(&mut self, outcome: &RowOutcome) {
        self.rows_seen += 1;
        if *outcome != RowOutcome::NotAlert {
            self.alerts += 1;
        }
        match outcome {
            RowOutcome::NotAlert => {}
            RowOutcome::Invalid => self.invalid += 1,
            RowOutcome::Duplicate => self.duplicates += 1,
            RowOutcome::ClickFailed => self.click_failures += 1,
            RowOutcome::Unresolved => self.unresolved += 1,
            RowOutcome::Queued {
                source: EventIdSource::Sniffed,
                ..
            } => self.sniffed += 1,
            RowOutcome::Queued {
                source: EventIdSource::RowAttribute,
                ..
            } => self.row_attribute_fallbacks += 1,
            RowOutcome::Dropped { .. } => self.dropped += 1,
        }
    }
}

/// Row processing state shared across the run.
pub struct Pipeline {
    observer: GridObserver,
    correlator: Correlator,
    ledger: AlertLedger,
    throttle: Throttle,
    queue: ForwardQueue,
    keyword: String,
    leagues: Vec<String>,
}

impl Pipeline {
    pub fn new(
        config: &AgentConfig,
        latest: watch::Receiver<Option<SniffedEvent>>,
        queue: ForwardQueue,
    ) -> Self {
        Self {
            observer: GridObserver::new(config.selectors.clone()),
            correlator: Correlator::new(latest, config.correlation),
            ledger: AlertLedger::new(config.dedup_window()),
            throttle: Throttle::new(config.fetch_interval()),
            queue,
            keyword: config.alert_keyword.clone(),
            leagues: config.leagues.clone(),
        }
    }

    pub fn observer(&self) -> &GridObserver {
        &self.observer
    }

    pub fn ledger(&self) -> &AlertLedger {
        &self.ledger
    }

    /// Run one row through the pipeline. Rows are expected one at a time:
    /// a correlation window must belong to a single click.
    pub async fn process_row(&self, ctx: &dyn RenderContext, row: &RawRow) -> Result<RowOutcome> {
        if !is_alert_row(row, &self.keyword) {
            return Ok(RowOutcome::NotAlert);
        }

        let waited = self.throttle.acquire().await;
        if !waited.is_zero() {
            debug!(waited_ms = waited.as_millis() as u64, "throttled");
        }

        let now = now_ms();
        let Some(mut record) = extract_alert(row, &self.leagues, chrono::Utc::now()) else {
            return Ok(RowOutcome::Invalid);
        };
        let row_id = record.row_id.clone();

        let fp = fingerprint(&record);
        if self.ledger.is_duplicate(&row_id, &fp, now) {
            debug!(%row_id, "duplicate alert");
            return Ok(RowOutcome::Duplicate);
        }

        info!(%row_id, "new alert; clicking outcome cell");
        let click_ts = now_ms();
        if !self.observer.click_outcome(ctx, &row_id).await? {
            error!(%row_id, "outcome cell not found; cannot reveal event id");
            return Ok(RowOutcome::ClickFailed);
        }

        let source = match self.correlator.await_event(click_ts).await {
            Correlation::Matched { event, attempts } => {
                info!(%row_id, event_id = %event.event_id, attempts, "event id captured");
                record.event_id = Some(event.event_id);
                EventIdSource::Sniffed
            }
            Correlation::TimedOut { .. } if !record.event_id_from_row_attribute.is_empty() => {
                warn!(
                    %row_id,
                    fallback = %record.event_id_from_row_attribute,
                    "no event id captured; using row id prefix"
                );
                record.event_id = Some(record.event_id_from_row_attribute.clone());
                EventIdSource::RowAttribute
            }
            Correlation::TimedOut { .. } => {
                error!(%row_id, "no event id could be determined");
                self.ledger.record(&row_id, fp, now, None);
                return Ok(RowOutcome::Unresolved);
            }
        };

        let event_id = record.event_id.clone().unwrap_or_default();
        self.ledger.record(&row_id, fp, now, Some(event_id.clone()));

        if self.queue.enqueue(ForwardJob { record, source }) {
            Ok(RowOutcome::Queued { event_id, source })
        } else {
            Ok(RowOutcome::Dropped { event_id })
        }
    }

    /// Stop forwarding and wait for queued records.
    pub async fn shutdown(self) {
        self.queue.close().await;
    }
}
