//! Browser rendering seam.
//!
//! Everything above this module talks to a [`RenderContext`] (one browser
//! tab) handed out by a [`Renderer`]. The Chromium implementation lives in
//! [`chromium`]; tests substitute scripted contexts.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use chromium::{find_chromium, resolve_chromium, BrowserSettings, ChromiumRenderer};

/// Outcome of a navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// URL after redirects.
    pub final_url: String,
    /// Wall time spent navigating.
    pub load_time_ms: u64,
}

/// A network response observed in a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSeen {
    pub url: String,
    pub status: i64,
    /// Wall-clock milliseconds since the Unix epoch, taken at receipt.
    pub timestamp_ms: i64,
}

/// A single browser tab.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to `url`, failing after `timeout_ms`.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;

    /// Evaluate a script in the page and return its JSON value
    /// (`null` when the script produced nothing serialisable).
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;

    /// Current URL of the tab.
    async fn get_url(&self) -> Result<String>;

    /// Stream of network responses completed in this tab from now on.
    async fn responses(&self) -> Result<BoxStream<'static, ResponseSeen>>;

    /// Close the tab.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Hands out browser tabs.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh blank tab.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;

    /// Take over an already open tab whose URL path ends with `path_suffix`.
    async fn attach(&self, path_suffix: &str) -> Result<Option<Box<dyn RenderContext>>>;

    /// Close the browser connection.
    async fn shutdown(&self) -> Result<()>;
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
