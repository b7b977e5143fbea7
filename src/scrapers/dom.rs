//! Rendered-DOM channel.
//!
//! A [`RenderedPage`] is one live browser tab; [`SessionFactory`] opens one per
//! run. [`RenderedDomAdapter`] layers element discovery and the selector
//! cascade on top. Markup is copied out of the page as HTML and parsed
//! locally, so nothing parsed is ever held across an await point.

use async_trait::async_trait;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::extract::{compile_selectors, ReviewElement, SelectorCascade};
use super::rate_limiter::{pause, PacingPolicy};
use super::strategy::{ExtractionStrategy, LoadMoreStrategy};
use crate::models::ReviewRecord;

/// Failure of a browser command or session.
#[derive(Debug, Error)]
pub enum DomError {
    #[error("browser command timed out")]
    Timeout,
    #[error("browser command failed: {0}")]
    Command(String),
    #[error("browser session lost: {0}")]
    SessionLost(String),
    #[error("failed to start browser: {0}")]
    Launch(String),
    #[error("browser support is not compiled in (enable the `browser` feature)")]
    Unavailable,
}

impl DomError {
    /// Whether the session can no longer be driven at all.
    ///
    /// Anything else only spoils the current cycle.
    pub fn is_session_level(&self) -> bool {
        matches!(
            self,
            DomError::SessionLost(_) | DomError::Launch(_) | DomError::Unavailable
        )
    }
}

/// Interactions the DOM channel needs from a live page.
#[async_trait]
pub trait RenderedPage: Send {
    /// Click the first visible consent button among `selectors`.
    async fn dismiss_consent(&mut self, selectors: &[String]) -> Result<bool, DomError>;

    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<bool, DomError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), DomError>;

    /// Scroll the `index`-th match of `selector` into view.
    async fn scroll_into_view(&mut self, selector: &str, index: usize) -> Result<bool, DomError>;

    async fn scroll_height(&mut self) -> Result<u64, DomError>;

    /// Click a displayed, enabled "load more" control if there is one.
    async fn click_load_more(&mut self, load_more: &LoadMoreStrategy) -> Result<bool, DomError>;

    /// Click the pagination control labelled `page`.
    async fn go_to_page(&mut self, page: u32) -> Result<bool, DomError>;

    /// Current document markup.
    async fn content(&mut self) -> Result<String, DomError>;

    /// Release the page and its browser. Must be safe to call more than once.
    async fn close(&mut self);
}

/// Opens one rendered page per run.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Box<dyn RenderedPage>, DomError>;
}

/// Element snapshots and records from one extraction cycle.
#[derive(Debug, Default)]
pub struct CycleBatch {
    pub elements: usize,
    pub records: Vec<ReviewRecord>,
    /// Elements the cascade produced nothing for.
    pub misses: usize,
}

/// DOM channel bound to one page.
pub struct RenderedDomAdapter {
    page: Box<dyn RenderedPage>,
    strategy: ExtractionStrategy,
    containers: Vec<(String, Selector)>,
    adopted: Option<usize>,
    cascade: SelectorCascade,
    pacing: PacingPolicy,
    last_count: usize,
    closed: bool,
}

impl RenderedDomAdapter {
    pub fn new(page: Box<dyn RenderedPage>, strategy: &ExtractionStrategy, pacing: PacingPolicy) -> Self {
        let containers = strategy
            .container_selectors
            .iter()
            .zip(compile_selectors(&strategy.container_selectors))
            .map(|(css, selector)| (css.clone(), selector))
            .collect();
        Self {
            page,
            strategy: strategy.clone(),
            containers,
            adopted: None,
            cascade: SelectorCascade::new(strategy),
            pacing,
            last_count: 0,
            closed: false,
        }
    }

    pub fn strategy(&self) -> &ExtractionStrategy {
        &self.strategy
    }

    /// Container selector in use, once one has matched.
    pub fn adopted_selector(&self) -> Option<&str> {
        self.adopted
            .and_then(|i| self.containers.get(i))
            .map(|(css, _)| css.as_str())
    }

    /// Dismiss the consent overlay and open the review list.
    ///
    /// Only session-level failures are returned.
    pub async fn prepare(&mut self) -> Result<(), DomError> {
        match self.page.dismiss_consent(&self.strategy.consent_selectors).await {
            Ok(true) => debug!("Dismissed consent overlay"),
            Ok(false) => debug!("No consent overlay"),
            Err(e) if e.is_session_level() => return Err(e),
            Err(e) => debug!("Consent dismissal failed: {}", e),
        }

        if let Some(selector) = self.strategy.entry_click_selector.clone() {
            match self.page.click(&selector).await {
                Ok(true) => {
                    info!("Opened review list via {}", selector);
                    pause(self.pacing.load_more_pause()).await;
                }
                Ok(false) => warn!("Review tab {} not found; using rendered page as is", selector),
                Err(e) if e.is_session_level() => return Err(e),
                Err(e) => warn!("Clicking review tab {} failed: {}", selector, e),
            }
        }
        Ok(())
    }

    /// Snapshot review elements, retrying once after a scroll when none match.
    pub async fn current_elements(&mut self) -> Result<Vec<ReviewElement>, DomError> {
        let html = self.page.content().await?;
        let elements = self.discover(&html);
        if !elements.is_empty() {
            self.last_count = elements.len();
            return Ok(elements);
        }

        debug!("No review elements yet; scrolling and retrying once");
        self.page.scroll_to_bottom().await?;
        pause(self.pacing.retry_pause()).await;
        let html = self.page.content().await?;
        let elements = self.discover(&html);
        self.last_count = elements.len();
        Ok(elements)
    }

    /// Run the cascade over every current element.
    pub async fn extract_cycle(&mut self) -> Result<CycleBatch, DomError> {
        let elements = self.current_elements().await?;
        let mut batch = CycleBatch {
            elements: elements.len(),
            ..CycleBatch::default()
        };
        for element in &elements {
            match self.cascade.extract(element) {
                Some(record) => batch.records.push(record),
                None => batch.misses += 1,
            }
        }
        debug!(
            "Cycle: {} elements, {} candidates, {} misses",
            batch.elements,
            batch.records.len(),
            batch.misses
        );
        Ok(batch)
    }

    /// Scroll toward the last known review element, or the page bottom.
    pub async fn scroll_forward(&mut self) -> Result<(), DomError> {
        if let (Some(css), true) = (self.adopted_selector().map(str::to_string), self.last_count > 0) {
            if self.page.scroll_into_view(&css, self.last_count - 1).await? {
                return Ok(());
            }
        }
        self.page.scroll_to_bottom().await
    }

    pub async fn scroll_height(&mut self) -> Result<u64, DomError> {
        self.page.scroll_height().await
    }

    pub async fn click_load_more(&mut self) -> Result<bool, DomError> {
        if self.strategy.load_more.is_empty() {
            return Ok(false);
        }
        self.page.click_load_more(&self.strategy.load_more).await
    }

    pub async fn go_to_page(&mut self, page: u32) -> Result<bool, DomError> {
        self.page.go_to_page(page).await
    }

    pub async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.page.close().await;
        }
    }

    /// Find review elements in `html`, adopting the first container selector
    /// that matches anything.
    fn discover(&mut self, html: &str) -> Vec<ReviewElement> {
        let document = Html::parse_document(html);

        if let Some(index) = self.adopted {
            let (_, selector) = &self.containers[index];
            return document
                .select(selector)
                .map(|el| ReviewElement::new(el.html()))
                .collect();
        }

        for (index, (css, selector)) in self.containers.iter().enumerate() {
            let found: Vec<ReviewElement> = document
                .select(selector)
                .map(|el| ReviewElement::new(el.html()))
                .collect();
            if !found.is_empty() {
                debug!("Adopting container selector {} ({} matches)", css, found.len());
                self.adopted = Some(index);
                return found;
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::rate_limiter::PacingConfig;
    use std::sync::{Arc, Mutex};

    /// Page whose markup is replaced by the test between cycles.
    struct StaticPage {
        html: Arc<Mutex<Vec<String>>>,
        scrolls: Arc<Mutex<usize>>,
        closes: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl RenderedPage for StaticPage {
        async fn dismiss_consent(&mut self, _selectors: &[String]) -> Result<bool, DomError> {
            Ok(false)
        }
        async fn click(&mut self, _selector: &str) -> Result<bool, DomError> {
            Ok(false)
        }
        async fn scroll_to_bottom(&mut self) -> Result<(), DomError> {
            *self.scrolls.lock().unwrap() += 1;
            Ok(())
        }
        async fn scroll_into_view(&mut self, _selector: &str, _index: usize) -> Result<bool, DomError> {
            Ok(true)
        }
        async fn scroll_height(&mut self) -> Result<u64, DomError> {
            Ok(1000)
        }
        async fn click_load_more(&mut self, _lm: &LoadMoreStrategy) -> Result<bool, DomError> {
            Ok(false)
        }
        async fn go_to_page(&mut self, _page: u32) -> Result<bool, DomError> {
            Ok(false)
        }
        async fn content(&mut self) -> Result<String, DomError> {
            let mut pages = self.html.lock().unwrap();
            Ok(if pages.len() > 1 {
                pages.remove(0)
            } else {
                pages.first().cloned().unwrap_or_default()
            })
        }
        async fn close(&mut self) {
            *self.closes.lock().unwrap() += 1;
        }
    }

    fn adapter(pages: Vec<&str>) -> (RenderedDomAdapter, Arc<Mutex<usize>>, Arc<Mutex<usize>>) {
        let scrolls = Arc::new(Mutex::new(0));
        let closes = Arc::new(Mutex::new(0));
        let page = StaticPage {
            html: Arc::new(Mutex::new(pages.into_iter().map(String::from).collect())),
            scrolls: scrolls.clone(),
            closes: closes.clone(),
        };
        let mut strategy = ExtractionStrategy::trendyol();
        strategy.container_selectors = vec![".missing".into(), ".review-card".into(), "div".into()];
        strategy.comment_selectors = vec![".comment-text".into()];
        let adapter = RenderedDomAdapter::new(
            Box::new(page),
            &strategy,
            PacingPolicy::new(PacingConfig::immediate()),
        );
        (adapter, scrolls, closes)
    }

    #[test]
    fn test_session_level_errors() {
        assert!(DomError::SessionLost("ws closed".into()).is_session_level());
        assert!(DomError::Unavailable.is_session_level());
        assert!(!DomError::Timeout.is_session_level());
        assert!(!DomError::Command("boom".into()).is_session_level());
    }

    #[tokio::test]
    async fn test_first_matching_selector_is_adopted() {
        let (mut adapter, _, _) = adapter(vec![
            r#"<div class="review-card"><div class="comment-text">İlk yorum burada</div></div>"#,
        ]);
        let batch = adapter.extract_cycle().await.unwrap();
        assert_eq!(adapter.adopted_selector(), Some(".review-card"));
        assert_eq!(batch.elements, 1);
        assert_eq!(batch.records[0].text(), "İlk yorum burada");
    }

    #[tokio::test]
    async fn test_adopted_selector_is_kept() {
        let (mut adapter, _, _) = adapter(vec![
            r#"<div class="review-card"><div class="comment-text">İlk yorum burada</div></div>"#,
            r#"<section><p>Kart yapısı değişti ama metin var</p></section>"#,
        ]);
        adapter.extract_cycle().await.unwrap();
        // The generic `div` selector would match here, but `.review-card` was adopted.
        let elements = adapter.current_elements().await.unwrap();
        assert!(elements.is_empty());
        assert_eq!(adapter.adopted_selector(), Some(".review-card"));
    }

    #[tokio::test]
    async fn test_scroll_and_retry_when_nothing_matches() {
        let (mut adapter, scrolls, _) = adapter(vec![
            "<section></section>",
            r#"<div class="review-card"><div class="comment-text">Geç yüklenen yorum</div></div>"#,
        ]);
        let elements = adapter.current_elements().await.unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(*scrolls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_misses_are_counted() {
        let (mut adapter, _, _) = adapter(vec![
            r#"<div class="review-card"><div class="comment-text">Gayet başarılı ürün</div></div>
               <div class="review-card"><span>ok</span></div>"#,
        ]);
        let batch = adapter.extract_cycle().await.unwrap();
        assert_eq!(batch.elements, 2);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.misses, 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut adapter, _, closes) = adapter(vec!["<p></p>"]);
        adapter.close().await;
        adapter.close().await;
        assert_eq!(*closes.lock().unwrap(), 1);
    }
}
