//! Agent configuration.
//!
//! Layered: built-in defaults, then an optional JSON file, then
//! `POD_ALERT_*` environment variables, then command-line flags (applied by
//! the CLI).

use crate::extraction::matchup::DEFAULT_LEAGUES;
use crate::extraction::GridSelectors;
use crate::live::correlate::CorrelationWindow;
use crate::live::sniffer::DEFAULT_EVENT_URL_PATTERN;
use crate::renderer::BrowserSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SINK_URL: &str = "http://localhost:5001/pod_alert";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Browser launch options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub executable: Option<PathBuf>,
    /// Profile directory; defaults to `<home>/profile`.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Page opened when the agent launches its own browser.
    pub terminal_url: Option<String>,
    /// The agent only works on pages whose path ends with this.
    pub page_path_suffix: String,
    /// DevTools websocket of a running browser; attach instead of launching.
    pub ws_url: Option<String>,
    pub browser: BrowserSection,

    pub selectors: GridSelectors,
    /// Alert cells must contain this text (case-insensitive).
    pub alert_keyword: String,
    pub leagues: Vec<String>,

    /// Regex for event detail URLs; group 1 is the event id.
    pub event_url_pattern: String,
    pub correlation: CorrelationWindow,

    pub fetch_interval_ms: u64,
    pub dedup_window_ms: u64,
    pub ledger_retention_ms: u64,
    pub startup_delay_ms: u64,
    pub container_timeout_ms: u64,
    pub drain_interval_ms: u64,
    pub navigation_timeout_ms: u64,

    pub sink_url: String,
    pub sink_timeout_ms: u64,
    pub queue_capacity: usize,
    /// Forward log location; defaults to `<home>/forwarded.jsonl`.
    pub forward_log: Option<PathBuf>,
    pub forward_log_enabled: bool,
    /// Log records instead of posting them.
    pub dry_run: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            terminal_url: None,
            page_path_suffix: "/terminal".to_string(),
            ws_url: None,
            browser: BrowserSection::default(),
            selectors: GridSelectors::default(),
            alert_keyword: "second".to_string(),
            leagues: DEFAULT_LEAGUES.iter().map(|s| s.to_string()).collect(),
            event_url_pattern: DEFAULT_EVENT_URL_PATTERN.to_string(),
            correlation: CorrelationWindow::default(),
            fetch_interval_ms: 2_000,
            dedup_window_ms: 5_000,
            ledger_retention_ms: 600_000,
            startup_delay_ms: 4_000,
            container_timeout_ms: 20_000,
            drain_interval_ms: 250,
            navigation_timeout_ms: 30_000,
            sink_url: DEFAULT_SINK_URL.to_string(),
            sink_timeout_ms: 10_000,
            queue_capacity: 256,
            forward_log: None,
            forward_log_enabled: true,
            dry_run: false,
        }
    }
}

impl AgentConfig {
    /// Defaults, overlaid with `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `POD_ALERT_*` variables looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("POD_ALERT_SINK_URL") {
            self.sink_url = v;
        }
        if let Some(v) = var("POD_ALERT_TERMINAL_URL") {
            self.terminal_url = Some(v);
        }
        if let Some(v) = var("POD_ALERT_WS_URL") {
            self.ws_url = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if let Err(e) = url::Url::parse(&self.sink_url) {
            return invalid(format!("sink_url {:?}: {e}", self.sink_url));
        }
        if let Some(u) = &self.terminal_url {
            if let Err(e) = url::Url::parse(u) {
                return invalid(format!("terminal_url {u:?}: {e}"));
            }
        }
        match regex::Regex::new(&self.event_url_pattern) {
            Ok(re) if re.captures_len() < 2 => {
                return invalid("event_url_pattern needs a capture group for the id".to_string())
            }
            Err(e) => return invalid(format!("event_url_pattern: {e}")),
            Ok(_) => {}
        }
        if self.alert_keyword.trim().is_empty() {
            return invalid("alert_keyword is empty".to_string());
        }
        if self.correlation.max_attempts == 0 || self.correlation.poll_interval.is_zero() {
            return invalid("correlation needs at least one attempt and a non-zero interval".to_string());
        }
        if self.drain_interval_ms == 0 || self.sink_timeout_ms == 0 || self.queue_capacity == 0 {
            return invalid("drain_interval_ms, sink_timeout_ms and queue_capacity must be non-zero".to_string());
        }
        if self.ws_url.is_none() && self.terminal_url.is_none() {
            return invalid("set terminal_url (launch) or ws_url (attach)".to_string());
        }
        Ok(())
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            executable: self.browser.executable.clone(),
            user_data_dir: Some(
                self.browser
                    .user_data_dir
                    .clone()
                    .unwrap_or_else(|| pod_alert_home().join("profile")),
            ),
            headless: self.browser.headless,
            no_sandbox: self.browser.no_sandbox,
        }
    }

    /// Forward log path, or `None` when disabled.
    pub fn forward_log_path(&self) -> Option<PathBuf> {
        self.forward_log_enabled.then(|| {
            self.forward_log
                .clone()
                .unwrap_or_else(|| pod_alert_home().join("forwarded.jsonl"))
        })
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.fetch_interval_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn ledger_retention(&self) -> Duration {
        Duration::from_millis(self.ledger_retention_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn container_timeout(&self) -> Duration {
        Duration::from_millis(self.container_timeout_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }
}

/// State directory (`~/.pod-alert`, or `POD_ALERT_HOME`).
pub fn pod_alert_home() -> PathBuf {
    if let Ok(p) = std::env::var("POD_ALERT_HOME") {
        return PathBuf::from(p);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".pod-alert")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> AgentConfig {
        AgentConfig {
            terminal_url: Some("https://app.example.com/terminal".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let c = AgentConfig::default();
        assert_eq!(c.sink_url, DEFAULT_SINK_URL);
        assert_eq!(c.fetch_interval(), Duration::from_secs(2));
        assert_eq!(c.dedup_window(), Duration::from_secs(5));
        assert_eq!(c.startup_delay(), Duration::from_secs(4));
        assert_eq!(c.container_timeout(), Duration::from_secs(20));
        assert_eq!(c.correlation, CorrelationWindow::default());
        assert_eq!(c.leagues.len(), DEFAULT_LEAGUES.len());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pod-alert.json");
        std::fs::write(
            &path,
            r##"{
                "terminal_url": "https://app.example.com/terminal",
                "alert_keyword": "minute",
                "correlation": { "max_attempts": 10 },
                "selectors": { "container": "#grid" }
            }"##,
        )
        .unwrap();

        let c = AgentConfig::from_file(&path).unwrap();
        assert_eq!(c.alert_keyword, "minute");
        assert_eq!(c.correlation.max_attempts, 10);
        assert_eq!(c.correlation.poll_interval, Duration::from_millis(200));
        assert_eq!(c.selectors.container, "#grid");
        assert_eq!(c.selectors.row, ".ag-row");
        assert_eq!(c.sink_url, DEFAULT_SINK_URL);
        c.validate().unwrap();
    }

    #[test]
    fn test_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(AgentConfig::from_file(&missing), Err(ConfigError::Read { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(AgentConfig::from_file(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("POD_ALERT_SINK_URL", "http://sink:9000/in"),
            ("POD_ALERT_WS_URL", "ws://127.0.0.1:9222/devtools/browser/x"),
            ("POD_ALERT_CHROMIUM_PATH", "/opt/chrome"),
        ]
        .into_iter()
        .collect();

        let mut c = AgentConfig::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.sink_url, "http://sink:9000/in");
        assert_eq!(c.ws_url.as_deref(), Some("ws://127.0.0.1:9222/devtools/browser/x"));
        // Left to Chromium discovery, after any configured executable.
        assert!(c.browser.executable.is_none());
        assert!(c.terminal_url.is_none());
    }

    #[test]
    fn test_validate() {
        valid().validate().unwrap();

        assert!(AgentConfig::default().validate().is_err());

        let mut c = valid();
        c.sink_url = "not a url".to_string();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.event_url_pattern = r"/events/\d+".to_string();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.event_url_pattern = "(".to_string();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.correlation.max_attempts = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_forward_log_path() {
        let mut c = valid();
        c.forward_log = Some(PathBuf::from("/var/log/pod.jsonl"));
        assert_eq!(c.forward_log_path(), Some(PathBuf::from("/var/log/pod.jsonl")));
        c.forward_log_enabled = false;
        assert_eq!(c.forward_log_path(), None);
    }
}
