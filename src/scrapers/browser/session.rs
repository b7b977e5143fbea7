//! A live Chrome tab driven over CDP.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::config::{BrowserEngineConfig, BrowserEngineType};
use super::stealth::STEALTH_SCRIPTS;
use crate::scrapers::dom::{DomError, RenderedPage};
use crate::scrapers::http_client::resolve_user_agent;
use crate::scrapers::strategy::LoadMoreStrategy;

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

const SCROLL_TO_BOTTOM_SCRIPT: &str =
    "(() => { window.scrollTo(0, document.body ? document.body.scrollHeight : 0); return true; })()";

const SCROLL_HEIGHT_SCRIPT: &str = "(document.body ? document.body.scrollHeight : 0)";

/// Embed a value as a JavaScript literal.
fn js_literal<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn consent_script(selectors: &[String]) -> String {
    format!(
        r#"(() => {{
            for (const sel of {selectors}) {{
                let el = null;
                try {{ el = document.querySelector(sel); }} catch (e) {{ continue; }}
                if (el && el.offsetParent !== null) {{ el.click(); return true; }}
            }}
            return false;
        }})()"#,
        selectors = js_literal(selectors)
    )
}

fn click_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            let el = null;
            try {{ el = document.querySelector({selector}); }} catch (e) {{ return false; }}
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()"#,
        selector = js_literal(selector)
    )
}

fn scroll_into_view_script(selector: &str, index: usize) -> String {
    format!(
        r#"(() => {{
            let els = [];
            try {{ els = document.querySelectorAll({selector}); }} catch (e) {{ return false; }}
            if (els.length === 0) return false;
            els[Math.min({index}, els.length - 1)].scrollIntoView({{ block: 'end' }});
            return true;
        }})()"#,
        selector = js_literal(selector),
        index = index
    )
}

fn load_more_script(load_more: &LoadMoreStrategy) -> String {
    format!(
        r#"(() => {{
            const usable = (el) => el && el.offsetParent !== null && !el.disabled
                && el.getAttribute('aria-disabled') !== 'true';
            const press = (el) => {{ el.scrollIntoView({{ block: 'center' }}); el.click(); return true; }};
            for (const sel of {selectors}) {{
                let found = [];
                try {{ found = Array.from(document.querySelectorAll(sel)); }} catch (e) {{ continue; }}
                const el = found.find(usable);
                if (el) return press(el);
            }}
            const phrases = {phrases};
            if (phrases.length === 0) return false;
            const labelled = (el) => {{
                const text = (el.innerText || '').trim();
                return text.length > 0 && text.length < 80 && phrases.some((p) => text.includes(p));
            }};
            for (const query of ['button, a, [role="button"]', 'span, div']) {{
                const el = Array.from(document.querySelectorAll(query)).find((c) => usable(c) && labelled(c));
                if (el) return press(el);
            }}
            return false;
        }})()"#,
        selectors = js_literal(&load_more.selectors),
        phrases = js_literal(&load_more.phrases)
    )
}

fn page_number_script(page: u32) -> String {
    format!(
        r#"(() => {{
            const label = {label};
            const query = '[class*="agination"] a, [class*="agination"] button, [class*="agination"] li, nav a, nav button';
            const el = Array.from(document.querySelectorAll(query))
                .find((c) => c.offsetParent !== null && (c.innerText || '').trim() === label);
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()"#,
        label = js_literal(&page.to_string())
    )
}

fn classify(error: CdpError) -> DomError {
    match error {
        CdpError::Timeout => DomError::Timeout,
        CdpError::Ws(e) => DomError::SessionLost(e.to_string()),
        CdpError::ChannelSendError(e) => DomError::SessionLost(e.to_string()),
        CdpError::NoResponse => DomError::SessionLost("no response from browser".to_string()),
        other => DomError::Command(other.to_string()),
    }
}

async fn command<T, F>(timeout: Duration, fut: F) -> Result<T, DomError>
where
    F: Future<Output = Result<T, CdpError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(classify),
        Err(_) => Err(DomError::Timeout),
    }
}

async fn eval<T: DeserializeOwned>(page: &Page, timeout: Duration, script: String) -> Result<T, DomError> {
    let result = command(timeout, page.evaluate(script)).await?;
    result
        .into_value::<T>()
        .map_err(|e| DomError::Command(format!("unexpected script result: {}", e)))
}

async fn wait_for_page_ready(page: &Page, timeout: Duration) {
    match tokio::time::timeout(timeout, page.evaluate(WAIT_FOR_READY_SCRIPT.to_string())).await {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("Page ready state: {}", state);
        }
        Ok(Err(e)) => debug!("Could not check ready state: {}", e),
        Err(_) => warn!("Timeout waiting for page ready state"),
    }
}

/// One browser tab for one run.
///
/// A launched browser is closed with the session; a remote one only loses the tab.
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    owns_browser: bool,
    command_timeout: Duration,
}

impl BrowserSession {
    pub(super) fn new(
        browser: Browser,
        page: Page,
        handler: JoinHandle<()>,
        owns_browser: bool,
        command_timeout: Duration,
    ) -> Self {
        Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
            owns_browser,
            command_timeout,
        }
    }

    async fn run<T: DeserializeOwned>(&mut self, script: String) -> Result<T, DomError> {
        let timeout = self.command_timeout;
        let page = self.page()?;
        eval(page, timeout, script).await
    }

    fn page(&self) -> Result<&Page, DomError> {
        self.page
            .as_ref()
            .ok_or_else(|| DomError::SessionLost("page already closed".to_string()))
    }

    /// Set the user agent, load `url` and apply stealth patches.
    pub(super) async fn initialize(
        &mut self,
        url: &Url,
        config: &BrowserEngineConfig,
    ) -> Result<(), DomError> {
        let page = self.page()?;
        let user_agent = resolve_user_agent(config.user_agent.as_deref());
        command(
            self.command_timeout,
            page.execute(SetUserAgentOverrideParams::new(user_agent)),
        )
        .await?;

        info!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url.as_str())
            .build()
            .map_err(|e| DomError::Command(format!("invalid URL: {}", e)))?;
        match tokio::time::timeout(config.timeout(), page.execute(nav_params)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(DomError::SessionLost(format!(
                    "navigation failed for {}: {}",
                    url, e
                )))
            }
            Err(_) => {
                return Err(DomError::SessionLost(format!(
                    "navigation timed out after {}s for {}",
                    config.timeout_secs, url
                )))
            }
        }

        wait_for_page_ready(page, config.timeout()).await;

        if config.engine == BrowserEngineType::Stealth {
            debug!("Applying stealth scripts");
            for script in STEALTH_SCRIPTS {
                if let Err(e) = page.evaluate(script.to_string()).await {
                    debug!("Stealth script injection skipped: {}", e);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RenderedPage for BrowserSession {
    async fn dismiss_consent(&mut self, selectors: &[String]) -> Result<bool, DomError> {
        if selectors.is_empty() {
            return Ok(false);
        }
        self.run(consent_script(selectors)).await
    }

    async fn click(&mut self, selector: &str) -> Result<bool, DomError> {
        self.run(click_script(selector)).await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DomError> {
        self.run::<bool>(SCROLL_TO_BOTTOM_SCRIPT.to_string())
            .await
            .map(|_| ())
    }

    async fn scroll_into_view(&mut self, selector: &str, index: usize) -> Result<bool, DomError> {
        self.run(scroll_into_view_script(selector, index)).await
    }

    async fn scroll_height(&mut self) -> Result<u64, DomError> {
        let height: f64 = self.run(SCROLL_HEIGHT_SCRIPT.to_string()).await?;
        Ok(height.max(0.0) as u64)
    }

    async fn click_load_more(&mut self, load_more: &LoadMoreStrategy) -> Result<bool, DomError> {
        self.run(load_more_script(load_more)).await
    }

    async fn go_to_page(&mut self, page: u32) -> Result<bool, DomError> {
        self.run(page_number_script(page)).await
    }

    async fn content(&mut self) -> Result<String, DomError> {
        let page = self.page()?;
        command(self.command_timeout, page.content()).await
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            match tokio::time::timeout(self.command_timeout, page.close()).await {
                Ok(Ok(())) => debug!("Closed page"),
                Ok(Err(e)) => debug!("Closing page failed: {}", e),
                Err(_) => debug!("Timed out closing page"),
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if self.owns_browser {
                match tokio::time::timeout(self.command_timeout, browser.close()).await {
                    Ok(Ok(_)) => debug!("Closed browser"),
                    Ok(Err(e)) => debug!("Closing browser failed: {}", e),
                    Err(_) => debug!("Timed out closing browser"),
                }
                let _ = tokio::time::timeout(self.command_timeout, browser.wait()).await;
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
