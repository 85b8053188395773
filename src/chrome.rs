//! Chrome/Chromium browser backend.
//!
//! Launches a local Chromium-family browser through the DevTools protocol
//! (`chromiumoxide`) and exposes its single page as a [`BrowserSession`].
//!
//! # Configuration
//!
//! ```toml
//! [browser]
//! headless = false
//! # executable = "/usr/bin/chromium"
//! args = ["--no-sandbox", "--disable-dev-shm-usage"]
//! ```
//!
//! The DevTools event handler runs as a background task for the lifetime of
//! the session and is aborted on [`BrowserSession::close`].

use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::SessionInitError;
use crate::session::{BrowserSession, Locator, SessionProvider};

/// Interval between DOM polls while waiting for an element.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const CLICKABLE_JS: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    const s = window.getComputedStyle(this); \
    return !this.disabled && r.width > 0 && r.height > 0 \
        && s.visibility !== 'hidden' && s.pointerEvents !== 'none'; }";

/// Launch switches passed before the configured `[browser].args`.
///
/// Replaces chromiumoxide's built-in defaults, which include
/// `--enable-automation`; the portal should see an ordinary browser.
const BASE_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-extensions",
    "--disable-hang-monitor",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--metrics-recording-only",
    "--no-first-run",
    "--password-store=basic",
    "--use-mock-keychain",
];

const CLEAR_JS: &str = "function() { \
    this.value = ''; \
    this.dispatchEvent(new Event('input', { bubbles: true })); }";

/// Launches Chrome sessions from the `[browser]` configuration.
pub struct ChromeProvider {
    config: BrowserConfig,
}

impl ChromeProvider {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Every switch the browser is launched with, base switches first.
    fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = BASE_ARGS.iter().map(|a| a.to_string()).collect();
        for arg in &self.config.args {
            if !args.contains(arg) {
                args.push(arg.clone());
            }
        }
        args
    }

    fn cdp_config(&self) -> Result<CdpBrowserConfig, SessionInitError> {
        let mut builder = CdpBrowserConfig::builder().disable_default_args();
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(exe) = &self.config.executable {
            builder = builder.chrome_executable(exe);
        }
        builder = builder.args(self.launch_args());
        builder.build().map_err(SessionInitError::Launch)
    }
}

#[async_trait]
impl SessionProvider for ChromeProvider {
    type Session = ChromeSession;

    fn name(&self) -> &str {
        "chrome"
    }

    async fn open(&self) -> Result<ChromeSession, SessionInitError> {
        let (browser, mut handler) = Browser::launch(self.cdp_config()?)
            .await
            .map_err(|e| SessionInitError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("devtools handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(SessionInitError::Launch(format!("failed to open page: {}", e)));
            }
        };
        info!(headless = self.config.headless, "browser launched");

        Ok(ChromeSession {
            browser: Mutex::new(browser),
            page,
            handler_task,
        })
    }
}

/// One browser with one page.
pub struct ChromeSession {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    async fn poll_until<F, Fut>(&self, locator: &Locator, timeout: Duration, check: F) -> Result<Element>
    where
        F: Fn(Element) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Option<Element>> + Send,
    {
        let css = locator.to_css();
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.page.find_element(css.as_str()).await {
                if let Some(element) = check(element).await {
                    return Ok(element);
                }
            }
            if Instant::now() >= deadline {
                bail!("timed out after {:?} waiting for {}", timeout, locator);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

async fn is_clickable(element: &Element) -> bool {
    match element.call_js_fn(CLICKABLE_JS, false).await {
        Ok(ret) => ret
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {} failed", url))?;
        Ok(())
    }

    async fn wait_until_present(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        self.poll_until(locator, timeout, |el| async move { Some(el) })
            .await
    }

    async fn wait_until_clickable(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        self.poll_until(locator, timeout, |el| async move {
            if is_clickable(&el).await {
                Some(el)
            } else {
                None
            }
        })
        .await
    }

    async fn find_element(&self, locator: &Locator) -> Result<Element> {
        self.page
            .find_element(locator.to_css())
            .await
            .map_err(|e| anyhow!("{} not found: {}", locator, e))
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<Element>> {
        Ok(self.page.find_elements(locator.to_css()).await?)
    }

    async fn find_elements_in(&self, scope: &Element, locator: &Locator) -> Result<Vec<Element>> {
        Ok(scope.find_elements(locator.to_css()).await?)
    }

    async fn text(&self, element: &Element) -> Result<String> {
        Ok(element.inner_text().await?.unwrap_or_default())
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        // Properties resolve relative hrefs to absolute URLs
        if let Ok(Some(value)) = element.property(name).await {
            if let Some(s) = value.as_str() {
                return Ok(Some(s.to_string()));
            }
        }
        Ok(element.attribute(name).await?)
    }

    async fn clear_and_type(&self, element: &Element, value: &str) -> Result<()> {
        element.call_js_fn(CLEAR_JS, false).await?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn click(&self, element: &Element) -> Result<()> {
        element.click().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            warn!("browser process did not exit cleanly: {}", e);
        }
        self.handler_task.abort();
        closed.context("failed to close browser")?;
        Ok(())
    }
}
