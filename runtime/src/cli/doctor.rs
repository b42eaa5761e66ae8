//! Environment readiness check: browser, sink and configuration.
//!
//! Every failure includes a specific fix instruction.

use crate::cli::output::{self, Styled};
use crate::config::{pod_alert_home, AgentConfig};
use crate::renderer::resolve_chromium;
use anyhow::Result;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

const SINK_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// How the sink answered a plain GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkProbe {
    /// Any HTTP answer, even an error status, means something is listening.
    Reachable { status: u16, ms: u64 },
    Unreachable(String),
}

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = AgentConfig::load(config_path)?;
    let chromium = resolve_chromium(config.browser.executable.as_deref());
    let chromium_version = chromium.as_deref().and_then(chromium_version);
    let sink = probe_sink(&config.sink_url).await;
    let validation = config.validate();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium_path": chromium.as_ref().map(|p| p.display().to_string()),
            "chromium_version": chromium_version,
            "sink_url": config.sink_url,
            "sink_reachable": matches!(sink, SinkProbe::Reachable { .. }),
            "config_valid": validation.is_ok(),
            "config_error": validation.as_ref().err().map(|e| e.to_string()),
            "correlation_budget_ms": config.correlation.budget().as_millis() as u64,
            "home": pod_alert_home().display().to_string(),
            "forward_log": config.forward_log_path().map(|p| p.display().to_string()),
        }));
        return Ok(());
    }

    let s = Styled::new();
    let mut ready = true;
    let mut has_warning = false;

    output::print_header(&s);

    output::print_section(&s, "Browser");
    match (&chromium, &config.ws_url) {
        (_, Some(ws)) => {
            output::print_check(s.info_sym(), "Mode:", &format!("attach to {ws}"));
        }
        (Some(path), None) => {
            let ver = chromium_version.as_deref().unwrap_or("unknown version");
            output::print_check(s.ok_sym(), "Chromium:", &format!("{ver} at {}", path.display()));
        }
        (None, None) => {
            output::print_check(s.fail_sym(), "Chromium:", "NOT FOUND");
            output::print_detail("Install Chrome or Chromium,");
            output::print_detail("or set POD_ALERT_CHROMIUM_PATH=/path/to/chrome");
            ready = false;
        }
    }
    eprintln!();

    output::print_section(&s, "Sink");
    if config.dry_run {
        output::print_check(s.info_sym(), "Endpoint:", "dry run, nothing is sent");
    } else {
        match &sink {
            SinkProbe::Reachable { status, ms } => {
                output::print_check(
                    s.ok_sym(),
                    "Endpoint:",
                    &format!("{} answered HTTP {status} in {ms}ms", config.sink_url),
                );
            }
            SinkProbe::Unreachable(e) => {
                output::print_check(s.warn_sym(), "Endpoint:", &format!("{} unreachable", config.sink_url));
                output::print_detail(e);
                output::print_detail("Start the sink or set POD_ALERT_SINK_URL.");
                has_warning = true;
            }
        }
    }
    eprintln!();

    output::print_section(&s, "Config");
    match &validation {
        Ok(()) => output::print_check(s.ok_sym(), "Settings:", "valid"),
        Err(e) => {
            output::print_check(s.fail_sym(), "Settings:", &e.to_string());
            ready = false;
        }
    }
    output::print_check(
        s.info_sym(),
        "Correlation:",
        &format!("up to {}ms per alert", config.correlation.budget().as_millis()),
    );
    output::print_check(s.info_sym(), "Home:", &pod_alert_home().display().to_string());
    match config.forward_log_path() {
        Some(path) => output::print_check(s.info_sym(), "Forward log:", &path.display().to_string()),
        None => output::print_check(s.info_sym(), "Forward log:", "disabled"),
    }

    let (status, msg) = match (ready, has_warning) {
        (true, false) => (s.green("READY"), "all checks passed"),
        (true, true) => ("READY".to_string(), "with warnings"),
        (false, _) => ("NOT READY".to_string(), "fix the failures above"),
    };
    output::print_status(&s, &status, msg);

    if !ready {
        std::process::exit(1);
    }
    Ok(())
}

/// GET the sink URL to see whether anything is listening.
pub async fn probe_sink(url: &str) -> SinkProbe {
    let client = match reqwest::Client::builder().timeout(SINK_PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => return SinkProbe::Unreachable(e.to_string()),
    };
    let start = Instant::now();
    match client.get(url).send().await {
        Ok(resp) => SinkProbe::Reachable {
            status: resp.status().as_u16(),
            ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => SinkProbe::Unreachable(e.to_string()),
    }
}

fn chromium_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if output.status.success() {
        let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Some(raw.replace("Google Chrome ", "").replace("Chromium ", ""))
    } else {
        None
    }
}
