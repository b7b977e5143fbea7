//! Selector cascade: turn one review element into a record.
//!
//! Heuristics are tried in order and the first success wins:
//! 1. site-specific comment selectors,
//! 2. a scan of generic text-bearing descendants within a length band,
//! 3. the longest visible line of the whole element.
//!
//! An element that survives none of them simply yields no record.

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::strategy::ExtractionStrategy;
use crate::models::{ReviewRecord, SourceChannel};
use crate::utils::{collapse_whitespace, rendered_lines, rendered_text};

/// Owned snapshot of one rendered review element (its outer HTML).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewElement {
    html: String,
}

impl ReviewElement {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Cascade step that produced the comment text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    CommentSelector,
    GenericScan,
    LongestLine,
}

/// Parse selectors, skipping (and logging) any that fail to parse.
pub(crate) fn compile_selectors(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|css| match Selector::parse(css) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Ignoring invalid selector {:?}: {:?}", css, e);
                None
            }
        })
        .collect()
}

/// Join selectors into one group so every element matches at most once.
fn compile_group(selectors: &[String]) -> Option<Selector> {
    if selectors.is_empty() {
        return None;
    }
    compile_selectors(&[selectors.join(", ")]).into_iter().next()
}

fn lowercase_all<'a>(phrases: impl Iterator<Item = &'a String>) -> Vec<String> {
    phrases
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Compiled, read-only form of an [`ExtractionStrategy`].
#[derive(Debug)]
pub struct SelectorCascade {
    comment: Vec<Selector>,
    generic: Option<Selector>,
    rating: Option<Selector>,
    author: Vec<Selector>,
    date: Vec<Selector>,
    noise: Vec<String>,
    broad_noise: Vec<String>,
    active_markers: Vec<String>,
    min_chars: usize,
    generic_min_chars: usize,
    max_chars: usize,
}

impl SelectorCascade {
    pub fn new(strategy: &ExtractionStrategy) -> Self {
        Self {
            comment: compile_selectors(&strategy.comment_selectors),
            generic: compile_selectors(std::slice::from_ref(&strategy.generic_text_selector))
                .into_iter()
                .next(),
            rating: compile_group(&strategy.rating_selectors),
            author: compile_selectors(&strategy.author_selectors),
            date: compile_selectors(&strategy.date_selectors),
            noise: lowercase_all(strategy.noise_phrases.iter()),
            broad_noise: lowercase_all(
                strategy
                    .noise_phrases
                    .iter()
                    .chain(strategy.broad_noise_phrases.iter()),
            ),
            active_markers: strategy.rating_active_markers.clone(),
            min_chars: strategy.min_comment_chars,
            generic_min_chars: strategy.generic_min_chars,
            max_chars: strategy.max_comment_chars,
        }
    }

    /// Extract a record from an element snapshot.
    pub fn extract(&self, element: &ReviewElement) -> Option<ReviewRecord> {
        let fragment = Html::parse_fragment(element.html());
        let root = fragment.root_element();
        let container = root.children().find_map(ElementRef::wrap).unwrap_or(root);
        self.extract_from(container)
    }

    /// Extract a record from a parsed element.
    pub fn extract_from(&self, element: ElementRef<'_>) -> Option<ReviewRecord> {
        let (text, _) = self.comment_text(element)?;
        let mut record = ReviewRecord::new(&text, SourceChannel::RenderedDom)?;

        if let Some(rating) = self.rating(element) {
            record = record.with_rating(rating);
        }
        if let Some(author) = first_line(element, &self.author) {
            record = record.with_author(&author);
        }
        if let Some(date) = first_line(element, &self.date) {
            record = record.with_timestamp(&date);
        }
        Some(record)
    }

    /// Run the text cascade, reporting which step succeeded.
    pub fn comment_text(&self, element: ElementRef<'_>) -> Option<(String, CascadeStep)> {
        self.from_comment_selectors(element)
            .map(|t| (t, CascadeStep::CommentSelector))
            .or_else(|| self.from_generic_scan(element).map(|t| (t, CascadeStep::GenericScan)))
            .or_else(|| self.from_longest_line(element).map(|t| (t, CascadeStep::LongestLine)))
    }

    fn from_comment_selectors(&self, element: ElementRef<'_>) -> Option<String> {
        self.comment.iter().find_map(|selector| {
            let matched = element.select(selector).next()?;
            let text = rendered_text(matched);
            let text = text.trim();
            (char_len(text) > self.min_chars && !contains_any(text, &self.noise))
                .then(|| text.to_string())
        })
    }

    fn from_generic_scan(&self, element: ElementRef<'_>) -> Option<String> {
        let generic = self.generic.as_ref()?;
        element.select(generic).find_map(|node| {
            let text = rendered_text(node);
            let text = text.trim();
            let len = char_len(text);
            (len > self.generic_min_chars
                && len < self.max_chars
                && !contains_any(text, &self.broad_noise))
            .then(|| text.to_string())
        })
    }

    fn from_longest_line(&self, element: ElementRef<'_>) -> Option<String> {
        let lines = rendered_lines(element);
        let longest = lines
            .iter()
            .fold(None::<&String>, |best, line| match best {
                Some(b) if char_len(b) >= char_len(line) => Some(b),
                _ => Some(line),
            })?;
        let len = char_len(longest);
        (len > self.min_chars && len < self.max_chars && !contains_any(longest, &self.noise))
            .then(|| longest.clone())
    }

    /// Count filled rating elements; `None` when the element shows no rating at all.
    fn rating(&self, element: ElementRef<'_>) -> Option<i64> {
        let selector = self.rating.as_ref()?;
        let mut seen = false;
        let mut filled = 0i64;
        for star in element.select(selector) {
            seen = true;
            let class = star.value().attr("class").unwrap_or_default();
            if self.active_markers.iter().any(|m| class.contains(m.as_str())) {
                filled += 1;
            }
        }
        seen.then_some(filled)
    }
}

fn first_line(element: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        element.select(selector).find_map(|node| {
            rendered_lines(node)
                .into_iter()
                .next()
                .map(|line| collapse_whitespace(&line))
                .filter(|line| !line.is_empty())
        })
    })
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn contains_any(text: &str, phrases: &[String]) -> bool {
    let lowered = text.to_lowercase();
    phrases.iter().any(|p| lowered.contains(p.as_str()))
}
