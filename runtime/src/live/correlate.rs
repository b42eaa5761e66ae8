//! Match a sniffed event id to the click that caused it.

use crate::live::sniffer::SniffedEvent;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Timing of one correlation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationWindow {
    /// Wait before the first check so the request can be issued.
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for CorrelationWindow {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(600),
            poll_interval: Duration::from_millis(200),
            max_attempts: 25,
        }
    }
}

impl CorrelationWindow {
    /// Longest time a correlation can take.
    pub fn budget(&self) -> Duration {
        self.initial_delay + self.poll_interval * self.max_attempts
    }
}

/// Outcome of waiting for an event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    Matched { event: SniffedEvent, attempts: u32 },
    TimedOut { last_seen: Option<SniffedEvent>, attempts: u32 },
}

/// Reads the sniffer's latest capture and decides freshness.
pub struct Correlator {
    latest: watch::Receiver<Option<SniffedEvent>>,
    window: CorrelationWindow,
}

impl Correlator {
    pub fn new(latest: watch::Receiver<Option<SniffedEvent>>, window: CorrelationWindow) -> Self {
        Self { latest, window }
    }

    /// Wait for a capture stamped at or after `click_ts_ms`.
    ///
    /// Sleeps the initial delay, then checks once per poll interval until a
    /// fresh capture shows up or `max_attempts` checks have been made.
    pub async fn await_event(&self, click_ts_ms: i64) -> Correlation {
        tokio::time::sleep(self.window.initial_delay).await;

        let mut attempts = 0;
        let mut last_seen = None;
        while attempts < self.window.max_attempts {
            tokio::time::sleep(self.window.poll_interval).await;
            attempts += 1;

            last_seen = self.latest.borrow().clone();
            if let Some(event) = last_seen.as_ref().filter(|e| is_fresh(e, click_ts_ms)) {
                debug!(event_id = %event.event_id, attempts, "correlated click with event");
                return Correlation::Matched {
                    event: event.clone(),
                    attempts,
                };
            }
        }

        warn!(
            click_ts_ms,
            attempts,
            last_seen = ?last_seen.as_ref().map(|e| (&e.event_id, e.timestamp_ms)),
            "no fresh event id after click"
        );
        Correlation::TimedOut { last_seen, attempts }
    }
}

fn is_fresh(event: &SniffedEvent, click_ts_ms: i64) -> bool {
    !event.event_id.is_empty() && event.timestamp_ms >= click_ts_ms
}

/// Serde helper storing durations as integer milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
