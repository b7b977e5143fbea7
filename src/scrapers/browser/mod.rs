//! Chrome-backed sessions for the rendered-DOM channel.
//!
//! Uses chromiumoxide (CDP) with stealth evasion. Every run launches (or
//! connects to) its own browser; sessions are never pooled.

mod config;
#[cfg(feature = "browser")]
mod session;
#[cfg(feature = "browser")]
mod stealth;

pub use config::{BrowserEngineConfig, BrowserEngineType};
#[cfg(feature = "browser")]
pub use session::BrowserSession;

use async_trait::async_trait;
use url::Url;

use super::dom::{DomError, RenderedPage, SessionFactory};

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Handler};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::info;

/// Opens a fresh Chrome tab per run.
#[derive(Debug, Clone)]
pub struct ChromeSessionFactory {
    config: BrowserEngineConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "browser")]
impl ChromeSessionFactory {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Find a Chrome executable on disk or in PATH.
    fn find_chrome() -> Result<PathBuf, DomError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(DomError::Launch(
            "Chrome/Chromium not found; install it or set BROWSER_URL to a running instance"
                .to_string(),
        ))
    }

    async fn launch(&self) -> Result<(Browser, Handler), DomError> {
        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        let (width, height) = self.config.window_size;
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .arg(format!("--window-size={},{}", width, height));

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| DomError::Launch(format!("invalid browser config: {}", e)))?;

        Browser::launch(config)
            .await
            .map_err(|e| DomError::Launch(e.to_string()))
    }

    /// Connect to a remote Chrome instance through its DevTools endpoint.
    async fn connect_remote(&self, url: &str) -> Result<(Browser, Handler), DomError> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.timeout_secs
        );

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| DomError::Launch(format!("remote browser unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| DomError::Launch(format!("bad browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DomError::Launch("no webSocketDebuggerUrl in response".to_string()))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout_secs),
            ..Default::default()
        };

        Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| DomError::Launch(e.to_string()))
    }
}

#[cfg(feature = "browser")]
fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    })
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, url: &Url) -> Result<Box<dyn RenderedPage>, DomError> {
        let (browser, handler, owns_browser) = match self.config.remote_url.as_deref() {
            Some(remote) => {
                let (browser, handler) = self.connect_remote(remote).await?;
                (browser, handler, false)
            }
            None => {
                let (browser, handler) = self.launch().await?;
                (browser, handler, true)
            }
        };
        let handler = spawn_handler(handler);

        let page = match tokio::time::timeout(
            self.config.command_timeout(),
            browser.new_page("about:blank"),
        )
        .await
        {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                handler.abort();
                return Err(DomError::Launch(format!("could not open tab: {}", e)));
            }
            Err(_) => {
                handler.abort();
                return Err(DomError::Launch("timed out opening tab".to_string()));
            }
        };

        let mut session = BrowserSession::new(
            browser,
            page,
            handler,
            owns_browser,
            self.config.command_timeout(),
        );
        if let Err(e) = session.initialize(url, &self.config).await {
            session.close().await;
            return Err(e);
        }
        Ok(Box::new(session))
    }
}

// Stub for when the browser feature is disabled
#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, url: &Url) -> Result<Box<dyn RenderedPage>, DomError> {
        tracing::warn!(
            "Cannot render {} with the {:?} engine: built without browser support",
            url,
            self.config.engine
        );
        Err(DomError::Unavailable)
    }
}
