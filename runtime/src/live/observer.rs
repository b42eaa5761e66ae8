//! Grid observer: the page-side half of the agent.

use crate::extraction::rows::RawRow;
use crate::extraction::{scripts, GridSelectors};
use crate::renderer::RenderContext;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of draining the page queue.
#[derive(Debug)]
pub enum Drain {
    Rows(Vec<RawRow>),
    /// The page lost its observer (reload or container swap).
    Detached,
}

#[derive(Deserialize)]
struct InstallReply {
    installed: bool,
    #[serde(default)]
    fresh: bool,
    #[serde(default)]
    queued: usize,
}

#[derive(Deserialize)]
struct DrainReply {
    rows: Vec<RawRow>,
    #[serde(default)]
    dropped: u64,
}

#[derive(Deserialize)]
struct ClickReply {
    clicked: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Drives the injected observer scripts for one grid.
#[derive(Debug, Clone)]
pub struct GridObserver {
    selectors: GridSelectors,
}

impl GridObserver {
    pub fn new(selectors: GridSelectors) -> Self {
        Self { selectors }
    }

    /// Inject the mutation observer. Returns false when the grid container
    /// is not on the page.
    pub async fn install(&self, ctx: &dyn RenderContext) -> Result<bool> {
        let value = ctx
            .execute_js(&scripts::install_observer(&self.selectors))
            .await
            .context("installing grid observer")?;
        let reply: InstallReply =
            serde_json::from_value(value).context("unexpected observer install reply")?;
        if reply.installed {
            debug!(fresh = reply.fresh, queued = reply.queued, "grid observer active");
        }
        Ok(reply.installed)
    }

    /// Take the rows queued since the last drain.
    pub async fn drain(&self, ctx: &dyn RenderContext) -> Result<Drain> {
        let value = ctx
            .execute_js(&scripts::drain_queue())
            .await
            .context("draining row queue")?;
        if value.is_null() {
            return Ok(Drain::Detached);
        }
        let reply: DrainReply = serde_json::from_value(value).context("unexpected drain reply")?;
        if reply.dropped > 0 {
            warn!(dropped = reply.dropped, "page queue overflowed; oldest rows were dropped");
        }
        Ok(Drain::Rows(reply.rows))
    }

    /// Click the outcome cell of `row_id`. Returns false when the row or
    /// its cell is gone.
    pub async fn click_outcome(&self, ctx: &dyn RenderContext, row_id: &str) -> Result<bool> {
        let value = ctx
            .execute_js(&scripts::click_outcome(&self.selectors, row_id))
            .await
            .context("clicking outcome cell")?;
        let reply: ClickReply = serde_json::from_value(value).context("unexpected click reply")?;
        if let Some(reason) = reply.reason.filter(|_| !reply.clicked) {
            debug!(row_id, %reason, "click not dispatched");
        }
        Ok(reply.clicked)
    }
}

/// Poll until `css` matches an element or `timeout` passes.
pub async fn wait_for_element(
    ctx: &dyn RenderContext,
    css: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    let script = scripts::probe(css);
    loop {
        if ctx.execute_js(&script).await?.as_bool().unwrap_or(false) {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(poll).await;
    }
}

/// Whether `url`'s path ends with `suffix`.
pub fn is_terminal_page(url: &str, suffix: &str) -> bool {
    url::Url::parse(url)
        .map(|u| u.path().ends_with(suffix))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal_page() {
        assert!(is_terminal_page("https://app.example.com/terminal", "/terminal"));
        assert!(is_terminal_page("https://app.example.com/x/terminal?tab=2", "/terminal"));
        assert!(!is_terminal_page("https://app.example.com/terminal/", "/terminal"));
        assert!(!is_terminal_page("https://app.example.com/login", "/terminal"));
        assert!(!is_terminal_page("not a url", "/terminal"));
    }
}
