//! Ledger of processed alert rows.

use crate::extraction::rows::AlertRecord;
use dashmap::DashMap;
use std::time::Duration;

/// Identity of an alert's visible content.
pub fn fingerprint(record: &AlertRecord) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}",
        record.home_team,
        record.away_team,
        record.old_odds,
        record.new_odds,
        record.bet_description,
        record.market_type,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedAlert {
    pub fingerprint: String,
    /// When processing started, wall-clock ms.
    pub at_ms: i64,
    pub event_id: Option<String>,
}

/// Rows already handled, keyed by row id.
#[derive(Debug)]
pub struct AlertLedger {
    entries: DashMap<String, ProcessedAlert>,
    window: Duration,
}

impl AlertLedger {
    /// `window`: how long an unchanged row stays suppressed.
    pub fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
        }
    }

    /// The row was processed with the same fingerprint less than one window ago.
    pub fn is_duplicate(&self, row_id: &str, fingerprint: &str, now_ms: i64) -> bool {
        self.entries
            .get(row_id)
            .map(|p| p.fingerprint == fingerprint && now_ms - p.at_ms < self.window.as_millis() as i64)
            .unwrap_or(false)
    }

    pub fn record(&self, row_id: &str, fingerprint: String, now_ms: i64, event_id: Option<String>) {
        self.entries.insert(
            row_id.to_string(),
            ProcessedAlert {
                fingerprint,
                at_ms: now_ms,
                event_id,
            },
        );
    }

    pub fn get(&self, row_id: &str) -> Option<ProcessedAlert> {
        self.entries.get(row_id).map(|p| p.clone())
    }

    /// Drop entries older than `retention`. Returns how many were removed.
    pub fn prune(&self, now_ms: i64, retention: Duration) -> usize {
        let before = self.entries.len();
        let cutoff = now_ms - retention.as_millis() as i64;
        self.entries.retain(|_, p| p.at_ms >= cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
