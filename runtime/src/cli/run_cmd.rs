//! `pod-alert run`: launch or attach to the browser and watch the terminal.

use crate::cli::output::{self, Styled};
use crate::config::AgentConfig;
use crate::live::agent;
use crate::renderer::{ChromiumRenderer, Renderer};
use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn, Instrument};

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Terminal page to open in a launched browser.
    #[arg(long)]
    pub url: Option<String>,

    /// Attach to a running browser through its DevTools websocket URL.
    #[arg(long, value_name = "WS_URL")]
    pub connect: Option<String>,

    /// Endpoint records are POSTed to.
    #[arg(long)]
    pub sink: Option<String>,

    /// Launch the browser without a window.
    #[arg(long)]
    pub headless: bool,

    /// Pass --no-sandbox to Chromium (containers).
    #[arg(long)]
    pub no_sandbox: bool,

    /// Log records instead of POSTing them.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not write the JSONL forward log.
    #[arg(long)]
    pub no_forward_log: bool,
}

impl RunArgs {
    /// Overlay the flags that were given.
    pub fn apply(&self, config: &mut AgentConfig) {
        if let Some(url) = &self.url {
            config.terminal_url = Some(url.clone());
        }
        if let Some(ws) = &self.connect {
            config.ws_url = Some(ws.clone());
        }
        if let Some(sink) = &self.sink {
            config.sink_url = sink.clone();
        }
        if self.headless {
            config.browser.headless = true;
        }
        if self.no_sandbox {
            config.browser.no_sandbox = true;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.no_forward_log {
            config.forward_log_enabled = false;
        }
    }
}

pub async fn run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let s = Styled::new();
    let mut config = AgentConfig::load(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id);

    let renderer = match &config.ws_url {
        Some(ws) => ChromiumRenderer::connect(ws).await?,
        None => ChromiumRenderer::launch(&config.browser_settings()).await?,
    };

    let sink = agent::build_sink(&config)?;
    let log = agent::open_forward_log(&config)?;

    if !output::is_quiet() {
        let target = config
            .ws_url
            .as_deref()
            .or(config.terminal_url.as_deref())
            .unwrap_or_default();
        eprintln!("  {} pod-alert watching {target}", s.ok_sym());
        if config.dry_run {
            eprintln!("  {} dry run: records are logged, not sent", s.info_sym());
        } else {
            eprintln!("  Forwarding to {}", config.sink_url);
        }
        if let Some(log) = &log {
            eprintln!("  Forward log: {}", s.dim(&log.path().display().to_string()));
        }
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("listening for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
        info!("received shutdown signal");
    };

    let started = Instant::now();
    let result = agent::run(&config, &renderer, sink, log, shutdown)
        .instrument(span)
        .await;

    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown: {e:#}");
    }
    let stats = result?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "run_id": run_id.to_string(),
            "elapsed_secs": started.elapsed().as_secs(),
            "stats": stats,
        }));
    } else if !output::is_quiet() {
        let elapsed = output::format_duration(started.elapsed().as_secs());
        eprintln!(
            "  {} stopped after {elapsed}: {} alerts, {} forwarded ({} by row id), {} duplicates",
            s.ok_sym(),
            stats.alerts,
            s.green(&(stats.sniffed + stats.row_attribute_fallbacks).to_string()),
            stats.row_attribute_fallbacks,
            stats.duplicates,
        );
    }
    Ok(())
}
