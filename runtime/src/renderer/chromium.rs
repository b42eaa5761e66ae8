//! Chromium renderer over the DevTools protocol.

use super::{now_ms, NavigationResult, RenderContext, Renderer, ResponseSeen};
use crate::live::observer::is_terminal_page;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventResponseReceived};
use chromiumoxide::{Handler, Page};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How to launch a local browser.
#[derive(Debug, Clone, Default)]
pub struct BrowserSettings {
    /// Explicit executable; discovered when unset.
    pub executable: Option<PathBuf>,
    /// Profile directory, kept across runs so the terminal login survives.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
}

/// Fetched targets register with the handler asynchronously.
const ATTACH_ATTEMPTS: u32 = 10;
const ATTACH_POLL: Duration = Duration::from_millis(100);

/// Renderer backed by a Chromium instance.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    /// Launched by us; an attached browser is left running on shutdown.
    owned: bool,
}

impl ChromiumRenderer {
    /// Launch a new browser process.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let executable = resolve_chromium(settings.executable.as_deref())
            .ok_or_else(|| anyhow!("no Chromium executable found; set POD_ALERT_CHROMIUM_PATH"))?;

        let mut builder = BrowserConfig::builder().chrome_executable(&executable);
        if !settings.headless {
            builder = builder.with_head();
        }
        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(dir) = &settings.user_data_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating profile dir {}", dir.display()))?;
            builder = builder.user_data_dir(dir);
        }
        let config = builder.build().map_err(|e| anyhow!("browser config: {e}"))?;

        info!("launching {}", executable.display());
        let (browser, handler) = Browser::launch(config)
            .await
            .context("launching browser")?;

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task: spawn_handler_task(handler),
            owned: true,
        })
    }

    /// Attach to a browser that is already running with remote debugging on.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        info!("connecting to {ws_url}");
        let (browser, handler) = Browser::connect(ws_url)
            .await
            .with_context(|| format!("connecting to {ws_url}"))?;

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task: spawn_handler_task(handler),
            owned: false,
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("opening tab")?;
        Ok(Box::new(ChromiumContext::new(page).await?))
    }

    async fn attach(&self, path_suffix: &str) -> Result<Option<Box<dyn RenderContext>>> {
        let mut browser = self.browser.lock().await;
        // A connected browser only tracks tabs opened after the connection
        // until the existing targets are fetched.
        let targets = browser.fetch_targets().await.context("fetching open tabs")?;
        debug!(targets = targets.len(), "fetched browser targets");

        let browser = &*browser;
        let page = poll_for(ATTACH_ATTEMPTS, ATTACH_POLL, || async move {
            let pages = browser.pages().await.context("listing tabs")?;
            for page in pages {
                let url = page.url().await.ok().flatten().unwrap_or_default();
                if is_terminal_page(&url, path_suffix) {
                    info!("attached to open tab {url}");
                    return Ok(Some(page));
                }
            }
            Ok(None)
        })
        .await?;

        match page {
            Some(page) => Ok(Some(Box::new(ChromiumContext::new(page).await?))),
            None => Ok(None),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        if self.owned {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                debug!("browser close: {e}");
            }
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        Ok(())
    }
}

/// One Chromium tab.
pub struct ChromiumContext {
    page: Page,
}

impl ChromiumContext {
    async fn new(page: Page) -> Result<Self> {
        page.execute(EnableParams::default())
            .await
            .context("enabling network events")?;
        Ok(Self { page })
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation to {url} timed out after {timeout_ms}ms"))?
            .with_context(|| format!("navigating to {url}"))?;

        let final_url = self.get_url().await.unwrap_or_else(|_| url.to_string());
        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await.context("evaluating script")?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn responses(&self) -> Result<BoxStream<'static, ResponseSeen>> {
        let events = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("subscribing to network responses")?;

        Ok(events
            .map(|event| ResponseSeen {
                url: event.response.url.clone(),
                status: event.response.status,
                timestamp_ms: now_ms(),
            })
            .boxed())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await.context("closing tab")
    }
}

/// Call `find` up to `attempts` times, `delay` apart, until it yields a value.
async fn poll_for<T, F, Fut>(attempts: u32, delay: Duration, mut find: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=attempts {
        if let Some(found) = find().await? {
            return Ok(Some(found));
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(None)
}

fn spawn_handler_task(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                warn!("cdp handler error: {e}");
            }
        }
        debug!("cdp handler finished");
    })
}

/// The configured executable, else whatever [`find_chromium`] discovers.
pub fn resolve_chromium(configured: Option<&Path>) -> Option<PathBuf> {
    configured.map(Path::to_path_buf).or_else(find_chromium)
}

/// Find a Chromium binary by checking multiple locations.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("POD_ALERT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        for candidate in [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ] {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Some(path);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_poll_for_retries_until_found() {
        let calls = AtomicU32::new(0);
        let found = poll_for(5, Duration::from_millis(1), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((n == 3).then_some(n))
        })
        .await
        .unwrap();
        assert_eq!(found, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_for_gives_up() {
        let calls = AtomicU32::new(0);
        let found: Option<()> = poll_for(4, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
        .await
        .unwrap();
        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_configured_executable_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let from_env = dir.path().join("chrome-env");
        std::fs::write(&from_env, "").unwrap();
        std::env::set_var("POD_ALERT_CHROMIUM_PATH", &from_env);

        let configured = PathBuf::from("/opt/configured/chrome");
        assert_eq!(resolve_chromium(Some(&configured)), Some(configured.clone()));
        assert_eq!(resolve_chromium(None), Some(from_env.clone()));

        std::env::set_var("POD_ALERT_CHROMIUM_PATH", dir.path().join("missing"));
        assert_ne!(resolve_chromium(None), Some(dir.path().join("missing")));
        std::env::remove_var("POD_ALERT_CHROMIUM_PATH");
    }
}
