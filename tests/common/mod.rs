//! Fake channel implementations shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use reviewacquire::scrapers::api::{parse_review_page, ApiEndpoint, ApiError, ApiPage, ProductRef, ReviewApi};
use reviewacquire::scrapers::dom::{DomError, RenderedPage, SessionFactory};
use reviewacquire::scrapers::rate_limiter::{PacingConfig, PacingPolicy};
use reviewacquire::scrapers::strategy::LoadMoreStrategy;
use reviewacquire::ApiFactory;

pub fn immediate() -> PacingPolicy {
    PacingPolicy::new(PacingConfig::immediate())
}

/// Review texts long enough to pass the cascade.
pub fn texts(prefix: &str, n: usize) -> Vec<String> {
    (1..=n)
        .map(|i| format!("{} yorum numarası {} gayet memnun kaldım", prefix, i))
        .collect()
}

/// Markup of one review card in the style of the scroll-paginated site.
pub fn scroll_card(text: &str) -> String {
    format!(
        r#"<div class="review-card"><div class="user-name">Müşteri</div><div class="comment-text">{}</div></div>"#,
        text
    )
}

/// Markup of one review card in the style of the numbered-pages site.
pub fn numbered_card(text: &str) -> String {
    format!(
        r#"<div class="hermes-ReviewCard-module-abc"><span>{}</span></div>"#,
        text
    )
}

/// Counters observed by tests.
#[derive(Debug, Default)]
pub struct PageStats {
    pub content_calls: usize,
    pub scrolls: usize,
    pub load_more_clicks: usize,
    pub page_clicks: Vec<u32>,
    pub closes: usize,
    pub visible_at_cancel: Option<usize>,
}

/// How the fake page behaves.
#[derive(Clone)]
pub struct PageScript {
    pub reviews: Vec<String>,
    /// Endless page: review `i` is generated on demand.
    pub endless: bool,
    pub initially_visible: usize,
    /// Reviews revealed per scroll (infinite mode).
    pub reveal_per_scroll: usize,
    /// Reviews revealed per "load more" click; zero means no such control.
    pub reveal_per_load_more: usize,
    /// Reviews per numbered page; `None` means infinite-scroll layout.
    pub page_size: Option<usize>,
    pub fixed_height: Option<u64>,
    pub card: fn(&str) -> String,
    /// Cancel this token on the given content call.
    pub cancel_on_content: Option<(usize, CancellationToken)>,
    /// Report a lost session from the given content call on.
    pub lose_session_on_content: Option<usize>,
    /// Content calls that time out.
    pub timeout_on_content: Vec<usize>,
    /// Every page height read fails with a command error.
    pub height_unreadable: bool,
}

impl PageScript {
    pub fn scrolling(reviews: Vec<String>, initially_visible: usize, reveal_per_scroll: usize) -> Self {
        Self {
            reviews,
            endless: false,
            initially_visible,
            reveal_per_scroll,
            reveal_per_load_more: 0,
            page_size: None,
            fixed_height: None,
            card: scroll_card,
            cancel_on_content: None,
            lose_session_on_content: None,
            timeout_on_content: Vec::new(),
            height_unreadable: false,
        }
    }

    pub fn numbered(reviews: Vec<String>, page_size: usize) -> Self {
        Self {
            reviews,
            endless: false,
            initially_visible: page_size,
            reveal_per_scroll: 0,
            reveal_per_load_more: 0,
            page_size: Some(page_size),
            fixed_height: Some(2000),
            card: numbered_card,
            cancel_on_content: None,
            lose_session_on_content: None,
            timeout_on_content: Vec::new(),
            height_unreadable: false,
        }
    }

    fn review(&self, i: usize) -> Option<String> {
        if self.endless {
            Some(format!("Sonsuz sayfa yorumu {} oldukça faydalı", i))
        } else {
            self.reviews.get(i).cloned()
        }
    }

    fn available(&self) -> usize {
        if self.endless {
            usize::MAX
        } else {
            self.reviews.len()
        }
    }
}

pub struct FakePage {
    script: PageScript,
    visible: usize,
    current_page: u32,
    stats: Arc<Mutex<PageStats>>,
}

impl FakePage {
    pub fn new(script: PageScript, stats: Arc<Mutex<PageStats>>) -> Self {
        let visible = script.initially_visible.min(script.available());
        Self {
            script,
            visible,
            current_page: 1,
            stats,
        }
    }

    fn reveal(&mut self) {
        self.reveal_by(self.script.reveal_per_scroll);
    }

    fn reveal_by(&mut self, count: usize) {
        self.visible = self
            .visible
            .saturating_add(count)
            .min(self.script.available());
    }

    fn render(&self) -> String {
        let range = match self.script.page_size {
            Some(size) => {
                let start = (self.current_page as usize - 1) * size;
                start..(start + size)
            }
            None => 0..self.visible,
        };
        let cards: String = range
            .filter_map(|i| self.script.review(i))
            .map(|t| (self.script.card)(&t))
            .collect();
        format!("<html><body><main>{}</main></body></html>", cards)
    }
}

#[async_trait]
impl RenderedPage for FakePage {
    async fn dismiss_consent(&mut self, _selectors: &[String]) -> Result<bool, DomError> {
        Ok(true)
    }

    async fn click(&mut self, _selector: &str) -> Result<bool, DomError> {
        Ok(true)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DomError> {
        self.stats.lock().unwrap().scrolls += 1;
        self.reveal();
        Ok(())
    }

    async fn scroll_into_view(&mut self, _selector: &str, _index: usize) -> Result<bool, DomError> {
        self.stats.lock().unwrap().scrolls += 1;
        self.reveal();
        Ok(true)
    }

    async fn scroll_height(&mut self) -> Result<u64, DomError> {
        if self.script.height_unreadable {
            return Err(DomError::Command("document.body is null".to_string()));
        }
        Ok(self
            .script
            .fixed_height
            .unwrap_or(self.visible.min(100_000) as u64 * 100))
    }

    async fn click_load_more(&mut self, load_more: &LoadMoreStrategy) -> Result<bool, DomError> {
        let hidden = self.visible < self.script.available();
        if load_more.is_empty() || self.script.reveal_per_load_more == 0 || !hidden {
            return Ok(false);
        }
        self.stats.lock().unwrap().load_more_clicks += 1;
        self.reveal_by(self.script.reveal_per_load_more);
        Ok(true)
    }

    async fn go_to_page(&mut self, page: u32) -> Result<bool, DomError> {
        self.stats.lock().unwrap().page_clicks.push(page);
        let Some(size) = self.script.page_size else {
            return Ok(false);
        };
        let pages = self.script.available().div_ceil(size) as u32;
        if page > pages {
            return Ok(false);
        }
        self.current_page = page;
        Ok(true)
    }

    async fn content(&mut self) -> Result<String, DomError> {
        let call = {
            let mut stats = self.stats.lock().unwrap();
            stats.content_calls += 1;
            stats.content_calls
        };
        if let Some(from) = self.script.lose_session_on_content {
            if call >= from {
                return Err(DomError::SessionLost("target closed".to_string()));
            }
        }
        if self.script.timeout_on_content.contains(&call) {
            return Err(DomError::Timeout);
        }
        if let Some((at, ref token)) = self.script.cancel_on_content {
            if call == at {
                self.stats.lock().unwrap().visible_at_cancel = Some(self.visible);
                token.cancel();
            }
        }
        Ok(self.render())
    }

    async fn close(&mut self) {
        self.stats.lock().unwrap().closes += 1;
    }
}

/// Opens [`FakePage`]s and records which URLs were requested.
pub struct FakeSessions {
    pub script: PageScript,
    pub stats: Arc<Mutex<PageStats>>,
    pub opened: Mutex<Vec<String>>,
    pub fail_to_open: bool,
}

impl FakeSessions {
    pub fn new(script: PageScript) -> Self {
        Self {
            script,
            stats: Arc::new(Mutex::new(PageStats::default())),
            opened: Mutex::new(Vec::new()),
            fail_to_open: false,
        }
    }
}

#[async_trait]
impl SessionFactory for FakeSessions {
    async fn open(&self, url: &Url) -> Result<Box<dyn RenderedPage>, DomError> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.fail_to_open {
            return Err(DomError::Launch("no chrome here".to_string()));
        }
        Ok(Box::new(FakePage::new(self.script.clone(), self.stats.clone())))
    }
}

/// Review endpoint serving canned JSON bodies, one per page.
#[derive(Clone)]
pub struct FakeApi {
    pub bodies: Vec<String>,
    pub calls: Arc<Mutex<Vec<(ProductRef, u32)>>>,
    pub always_fail: bool,
}

impl FakeApi {
    pub fn serving(bodies: Vec<String>) -> Self {
        Self {
            bodies,
            calls: Arc::new(Mutex::new(Vec::new())),
            always_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            bodies: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            always_fail: true,
        }
    }
}

#[async_trait]
impl ReviewApi for FakeApi {
    async fn fetch_page(&self, product: &ProductRef, page: u32) -> Result<ApiPage, ApiError> {
        self.calls.lock().unwrap().push((product.clone(), page));
        if self.always_fail {
            return Err(ApiError::Status(403));
        }
        match self.bodies.get(page as usize) {
            Some(body) => parse_review_page(body),
            None => Err(ApiError::Status(404)),
        }
    }
}

impl ApiFactory for FakeApi {
    fn connect(&self, _endpoint: &ApiEndpoint) -> Result<Box<dyn ReviewApi>, ApiError> {
        Ok(Box::new(self.clone()))
    }
}

/// JSON body of one review endpoint page.
pub fn api_body(total_pages: u32, reviews: &[(&str, u8, &str)]) -> String {
    let content: Vec<serde_json::Value> = reviews
        .iter()
        .map(|(comment, rate, user)| {
            serde_json::json!({
                "comment": comment,
                "rate": rate,
                "userFullName": user,
                "commentDateISOtype": "2024-05-01"
            })
        })
        .collect();
    serde_json::json!({
        "isSuccess": true,
        "statusCode": 200,
        "error": null,
        "result": {
            "productReviews": {
                "totalPages": total_pages,
                "content": content
            }
        }
    })
    .to_string()
}
