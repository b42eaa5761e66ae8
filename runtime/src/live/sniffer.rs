//! Network sniffer: picks event ids out of completed responses.
//!
//! The terminal loads an event's details from an `/events/<id>` endpoint
//! after a row's outcome cell is clicked. The sniffer keeps the most recent
//! such id; the [`crate::live::correlate::Correlator`] decides whether it
//! belongs to a given click.

use crate::renderer::ResponseSeen;
use futures::stream::BoxStream;
use futures::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

/// Default capture pattern; group 1 is the event id.
pub const DEFAULT_EVENT_URL_PATTERN: &str =
    r"^https://swordfish-production\.up\.railway\.app/events/(\d+)";

/// The latest event id seen on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SniffedEvent {
    pub event_id: String,
    pub timestamp_ms: i64,
    pub url: String,
}

/// Holds the latest captured event id.
pub struct EventSniffer {
    pattern: Regex,
    latest: watch::Sender<Option<SniffedEvent>>,
}

impl EventSniffer {
    /// `pattern` must contain a capture group for the id.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let (latest, _) = watch::channel(None);
        Ok(Self {
            pattern: Regex::new(pattern)?,
            latest,
        })
    }

    /// Receiver for the latest capture.
    pub fn subscribe(&self) -> watch::Receiver<Option<SniffedEvent>> {
        self.latest.subscribe()
    }

    pub fn latest(&self) -> Option<SniffedEvent> {
        self.latest.borrow().clone()
    }

    /// Offer a completed response. The capture is replaced when the id
    /// differs from the current one or the timestamp is newer. Returns
    /// whether it was replaced.
    pub fn observe(&self, url: &str, timestamp_ms: i64) -> bool {
        let Some(event_id) = self
            .pattern
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            return false;
        };

        let changed = self.latest.send_if_modified(|latest| {
            let replace = match latest {
                Some(cur) => cur.event_id != event_id || timestamp_ms > cur.timestamp_ms,
                None => true,
            };
            if replace {
                *latest = Some(SniffedEvent {
                    event_id: event_id.clone(),
                    timestamp_ms,
                    url: url.to_string(),
                });
            }
            replace
        });

        if changed {
            info!(%event_id, timestamp_ms, url, "captured event id");
        }
        changed
    }

    /// Consume responses until the stream ends.
    pub async fn run(&self, mut responses: BoxStream<'static, ResponseSeen>) {
        while let Some(seen) = responses.next().await {
            self.observe(&seen.url, seen.timestamp_ms);
        }
        debug!("response stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://swordfish-production.up.railway.app/events/";

    fn sniffer() -> EventSniffer {
        EventSniffer::new(DEFAULT_EVENT_URL_PATTERN).unwrap()
    }

    #[test]
    fn test_ignores_unrelated_urls() {
        let s = sniffer();
        assert!(!s.observe("https://example.com/events/123", 10));
        assert!(!s.observe(&format!("{BASE}abc"), 10));
        assert!(s.latest().is_none());
    }

    #[test]
    fn test_captures_id_and_url() {
        let s = sniffer();
        let url = format!("{BASE}48213?include=markets");
        assert!(s.observe(&url, 1_000));
        let latest = s.latest().unwrap();
        assert_eq!(latest.event_id, "48213");
        assert_eq!(latest.timestamp_ms, 1_000);
        assert_eq!(latest.url, url);
    }

    #[test]
    fn test_update_rule() {
        let s = sniffer();
        assert!(s.observe(&format!("{BASE}1"), 1_000));
        // Same id, older or equal timestamp: kept.
        assert!(!s.observe(&format!("{BASE}1"), 900));
        assert!(!s.observe(&format!("{BASE}1"), 1_000));
        // Same id, newer: replaced.
        assert!(s.observe(&format!("{BASE}1"), 1_100));
        // Different id, even older: replaced.
        assert!(s.observe(&format!("{BASE}2"), 500));
        assert_eq!(s.latest().unwrap().event_id, "2");
    }

    #[tokio::test]
    async fn test_run_feeds_subscribers() {
        let s = sniffer();
        let mut rx = s.subscribe();
        let responses = futures::stream::iter(vec![
            ResponseSeen {
                url: "https://cdn.example.com/app.js".to_string(),
                status: 200,
                timestamp_ms: 1,
            },
            ResponseSeen {
                url: format!("{BASE}77"),
                status: 200,
                timestamp_ms: 2,
            },
        ])
        .boxed();

        s.run(responses).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().event_id, "77");
    }
}
