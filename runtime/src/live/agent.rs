//! The watch loop tying renderer, observer, sniffer and pipeline together.

use crate::audit::logger::ForwardLog;
use crate::config::AgentConfig;
use crate::forward::{AlertSink, DryRunSink, ForwardQueue, Forwarder};
use crate::live::observer::{is_terminal_page, wait_for_element, Drain};
use crate::live::pipeline::{Pipeline, RunStats};
use crate::live::sniffer::EventSniffer;
use crate::renderer::{now_ms, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const CONTAINER_POLL: Duration = Duration::from_millis(250);
/// Drain ticks between ledger prunes.
const PRUNE_EVERY_TICKS: u64 = 240;

/// Build the sink the config asks for.
pub fn build_sink(config: &AgentConfig) -> Result<Arc<dyn AlertSink>> {
    if config.dry_run {
        return Ok(Arc::new(DryRunSink));
    }
    let forwarder = Forwarder::new(config.sink_url.clone(), config.sink_timeout())
        .context("building sink client")?;
    info!(endpoint = forwarder.endpoint(), "forwarding alerts to sink");
    Ok(Arc::new(forwarder))
}

/// Open the configured forward log, if enabled.
pub fn open_forward_log(config: &AgentConfig) -> Result<Option<ForwardLog>> {
    config
        .forward_log_path()
        .map(|path| ForwardLog::open(&path))
        .transpose()
}

/// Obtain the terminal tab: attach to an open one, or open and navigate a
/// new one. The flag says whether the agent owns (and should close) the tab.
async fn acquire_terminal(
    renderer: &dyn Renderer,
    config: &AgentConfig,
) -> Result<(Box<dyn RenderContext>, bool)> {
    if config.ws_url.is_some() {
        if let Some(ctx) = renderer.attach(&config.page_path_suffix).await? {
            return Ok((ctx, false));
        }
        if config.terminal_url.is_none() {
            bail!("no open tab ends with {:?} and no terminal_url to open", config.page_path_suffix);
        }
    }

    let Some(url) = config.terminal_url.as_deref() else {
        bail!("no terminal_url configured");
    };
    let mut ctx = renderer.new_context().await?;
    let nav = ctx.navigate(url, config.navigation_timeout_ms).await?;
    info!(url = %nav.final_url, load_time_ms = nav.load_time_ms, "terminal opened");
    Ok((ctx, true))
}

/// Run the agent until `shutdown` resolves.
pub async fn run<F>(
    config: &AgentConfig,
    renderer: &dyn Renderer,
    sink: Arc<dyn AlertSink>,
    log: Option<ForwardLog>,
    shutdown: F,
) -> Result<RunStats>
where
    F: Future<Output = ()>,
{
    let (ctx, owned) = acquire_terminal(renderer, config).await?;
    let result = watch_terminal(config, ctx.as_ref(), sink, log, shutdown).await;

    if owned {
        if let Err(e) = ctx.close().await {
            debug!("closing terminal tab: {e}");
        }
    }
    result
}

/// Watch an already open terminal tab until `shutdown` resolves.
pub async fn watch_terminal<F>(
    config: &AgentConfig,
    ctx: &dyn RenderContext,
    sink: Arc<dyn AlertSink>,
    log: Option<ForwardLog>,
    shutdown: F,
) -> Result<RunStats>
where
    F: Future<Output = ()>,
{
    let sniffer = Arc::new(EventSniffer::new(&config.event_url_pattern).context("event_url_pattern")?);
    let responses = ctx.responses().await?;
    let sniff_task = {
        let sniffer = Arc::clone(&sniffer);
        tokio::spawn(async move { sniffer.run(responses).await })
    };

    let result = watch_with_sniffer(config, ctx, &sniffer, sink, log, shutdown).await;
    sniff_task.abort();
    result
}

async fn watch_with_sniffer<F>(
    config: &AgentConfig,
    ctx: &dyn RenderContext,
    sniffer: &EventSniffer,
    sink: Arc<dyn AlertSink>,
    log: Option<ForwardLog>,
    shutdown: F,
) -> Result<RunStats>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let ready = tokio::select! {
        biased;
        _ = &mut shutdown => false,
        prepared = prepare_terminal(config, ctx) => {
            prepared?;
            true
        }
    };
    if !ready {
        info!("shutdown requested before watching started");
        return Ok(RunStats::default());
    }

    let queue = ForwardQueue::spawn(sink, log, config.queue_capacity);
    let pipeline = Pipeline::new(config, sniffer.subscribe(), queue);
    if !pipeline.observer().install(ctx).await? {
        warn!("grid observer could not be installed yet");
    }

    let stats = watch_loop(config, ctx, &pipeline, shutdown.as_mut()).await;
    pipeline.shutdown().await;
    Ok(stats)
}

/// Startup delay, terminal page check, and wait for the grid container.
async fn prepare_terminal(config: &AgentConfig, ctx: &dyn RenderContext) -> Result<()> {
    tokio::time::sleep(config.startup_delay()).await;

    let url = ctx.get_url().await?;
    if !is_terminal_page(&url, &config.page_path_suffix) {
        bail!("not on a {} page ({url})", config.page_path_suffix);
    }

    let container = &config.selectors.container;
    if !wait_for_element(ctx, container, config.container_timeout(), CONTAINER_POLL).await? {
        bail!("grid container {container:?} not found within {:?}", config.container_timeout());
    }
    info!(%container, "grid container found");
    Ok(())
}

async fn watch_loop<F>(
    config: &AgentConfig,
    ctx: &dyn RenderContext,
    pipeline: &Pipeline,
    mut shutdown: Pin<&mut F>,
) -> RunStats
where
    F: Future<Output = ()>,
{
    let mut stats = RunStats::default();
    let mut ticker = tokio::time::interval(config.drain_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    info!("watching for alerts");
    'watch: loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break 'watch,
            _ = ticker.tick() => {}
        }

        ticks += 1;
        if ticks % PRUNE_EVERY_TICKS == 0 {
            let pruned = pipeline.ledger().prune(now_ms(), config.ledger_retention());
            if pruned > 0 {
                debug!(pruned, "pruned alert ledger");
            }
        }

        let rows = match pipeline.observer().drain(ctx).await {
            Ok(Drain::Rows(rows)) => rows,
            Ok(Drain::Detached) => {
                match pipeline.observer().install(ctx).await {
                    Ok(true) => info!("grid observer reinstalled"),
                    Ok(false) => debug!("grid container not present; retrying"),
                    Err(e) => warn!("reinstalling grid observer: {e:#}"),
                }
                continue;
            }
            Err(e) => {
                warn!("draining rows: {e:#}");
                continue;
            }
        };

        for (idx, row) in rows.iter().enumerate() {
            let processed = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                result = pipeline.process_row(ctx, row) => Some(result),
            };
            match processed {
                Some(Ok(outcome)) => stats.record(&outcome),
                Some(Err(e)) => error!(row_id = ?row.row_id, "processing row: {e:#}"),
                None => {
                    debug!(skipped = rows.len() - idx, "abandoning drained rows");
                    break 'watch;
                }
            }
        }
    }

    info!(?stats, "shutdown requested; watch loop finished");
    stats
}
