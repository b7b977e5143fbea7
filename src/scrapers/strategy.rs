//! Per-site extraction strategies.
//!
//! A strategy is plain configuration data: ordered selector lists, noise
//! denylists and the pagination style of the rendered review page. Adding a
//! site means adding one strategy, never branching inside the controller.

use serde::{Deserialize, Serialize};

/// How the rendered review list exposes more content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceMode {
    /// Scroll and click "load more" until content stops growing.
    #[default]
    InfiniteScroll,
    /// Click the pagination control labelled with the next page number.
    NumberedPages,
}

/// Locators for a "load more" style control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadMoreStrategy {
    /// CSS selectors for candidate controls.
    #[serde(default)]
    pub selectors: Vec<String>,
    /// Visible-text phrases identifying the control (substring match).
    #[serde(default)]
    pub phrases: Vec<String>,
}

impl LoadMoreStrategy {
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty() && self.phrases.is_empty()
    }
}

/// Ordered selector and heuristic descriptors for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStrategy {
    /// Review container selectors, most site-specific first.
    pub container_selectors: Vec<String>,
    /// Comment text selectors tried inside a container (cascade step 1).
    pub comment_selectors: Vec<String>,
    /// Text-bearing nodes scanned by cascade step 2.
    #[serde(default = "default_generic_text_selector")]
    pub generic_text_selector: String,
    /// Boilerplate phrases rejected at every cascade step (case-insensitive).
    #[serde(default)]
    pub noise_phrases: Vec<String>,
    /// Extra phrases rejected by the generic scan, e.g. leaked query tokens.
    #[serde(default)]
    pub broad_noise_phrases: Vec<String>,
    /// Step 1 and step 3 accept text strictly longer than this many characters.
    #[serde(default = "default_min_comment_chars")]
    pub min_comment_chars: usize,
    /// Step 2 accepts text strictly longer than this many characters.
    #[serde(default = "default_generic_min_chars")]
    pub generic_min_chars: usize,
    /// Steps 2 and 3 accept text strictly shorter than this many characters.
    #[serde(default = "default_max_comment_chars")]
    pub max_comment_chars: usize,
    #[serde(default)]
    pub rating_selectors: Vec<String>,
    /// Class fragments marking a rating element as a filled star.
    #[serde(default)]
    pub rating_active_markers: Vec<String>,
    #[serde(default)]
    pub author_selectors: Vec<String>,
    #[serde(default)]
    pub date_selectors: Vec<String>,
    /// Cookie-consent accept buttons.
    #[serde(default)]
    pub consent_selectors: Vec<String>,
    /// Control clicked once to reveal the review list (e.g. a reviews tab).
    #[serde(default)]
    pub entry_click_selector: Option<String>,
    #[serde(default)]
    pub load_more: LoadMoreStrategy,
    #[serde(default)]
    pub advance: AdvanceMode,
}

fn default_generic_text_selector() -> String {
    "p, span, div, h3, h4, h5".to_string()
}

fn default_min_comment_chars() -> usize {
    5
}

fn default_generic_min_chars() -> usize {
    10
}

fn default_max_comment_chars() -> usize {
    500
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Boilerplate seen on Turkish marketplace review cards.
const MARKETPLACE_NOISE: &[&str] = &["sağlık beyanı", "fotoğraflı", "tümü"];

/// Query-parameter tokens that leak into rendered text.
const LEAKED_QUERY_TOKENS: &[&str] = &[
    "boutique",
    "merchant",
    "storefront",
    "culture",
    "logged-in",
    "isbuyer",
    "channel",
    "socialproof",
    "abtesting",
];

impl ExtractionStrategy {
    /// Trendyol review page (`/yorumlar`), infinitely scrolled.
    pub fn trendyol() -> Self {
        Self {
            container_selectors: strings(&[
                r#"[data-testid="review-card"]"#,
                "div.comment",
                ".review-card",
                ".r-card",
                ".comment-item",
                ".review-item",
                r#"[class*="review"]"#,
                r#"[class*="comment"]"#,
            ]),
            comment_selectors: strings(&[
                r#"[data-testid="review-comment"]"#,
                "div.comment-text p",
                ".review-comment",
                ".comment-text",
                ".r-card-text",
                r#"[class*="comment"]"#,
                r#"[class*="review-text"]"#,
                ".review-content",
                ".comment-content",
                r#"[data-testid="comment"]"#,
            ]),
            generic_text_selector: default_generic_text_selector(),
            noise_phrases: strings(MARKETPLACE_NOISE),
            broad_noise_phrases: strings(LEAKED_QUERY_TOKENS),
            min_comment_chars: default_min_comment_chars(),
            generic_min_chars: default_generic_min_chars(),
            max_comment_chars: default_max_comment_chars(),
            rating_selectors: strings(&[r#"[class*="star"]"#, r#"[class*="rating"]"#]),
            rating_active_markers: strings(&["filled", "active"]),
            author_selectors: strings(&[r#"[class*="user"]"#, r#"[class*="author"]"#]),
            date_selectors: strings(&[r#"[class*="date"]"#]),
            consent_selectors: strings(&["#onetrust-accept-btn-handler"]),
            entry_click_selector: None,
            load_more: LoadMoreStrategy {
                selectors: strings(&[r#"[class*="load-more"]"#, r#"[class*="show-more"]"#]),
                phrases: strings(&["Daha Fazla Yorum", "Daha Fazla Göster"]),
            },
            advance: AdvanceMode::InfiniteScroll,
        }
    }

    /// Hepsiburada product page; reviews live behind a tab with numbered pages.
    pub fn hepsiburada() -> Self {
        Self {
            container_selectors: strings(&[
                r#"div[class^="hermes-ReviewCard-module-"]"#,
                r#"[class*="ReviewCard"]"#,
                r#"[class*="review"]"#,
            ]),
            // Author and date spans sit in a nested header; the comment is a
            // direct child of the card.
            comment_selectors: strings(&[
                r#"div[class^="hermes-ReviewCard-module-"] > span:not([class])"#,
                r#"[class*="comment"]"#,
            ]),
            generic_text_selector: default_generic_text_selector(),
            noise_phrases: strings(MARKETPLACE_NOISE),
            broad_noise_phrases: strings(LEAKED_QUERY_TOKENS),
            min_comment_chars: default_min_comment_chars(),
            generic_min_chars: default_generic_min_chars(),
            max_comment_chars: default_max_comment_chars(),
            rating_selectors: strings(&[r#"[class*="star"]"#]),
            rating_active_markers: strings(&["filled", "active", "full"]),
            author_selectors: strings(&[r#"[class*="author"]"#, r#"[class*="user"]"#]),
            date_selectors: strings(&[r#"[class*="date"]"#]),
            consent_selectors: strings(&["#onetrust-accept-btn-handler"]),
            entry_click_selector: Some(r#"a[href*="-yorumlari"]"#.to_string()),
            load_more: LoadMoreStrategy::default(),
            advance: AdvanceMode::NumberedPages,
        }
    }
}
