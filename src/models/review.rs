//! Canonical review record.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Author recorded when a review carries no visible name.
pub const DEFAULT_AUTHOR: &str = "anonymous";

/// Highest star rating a review can carry.
pub const MAX_RATING: u8 = 5;

/// Channel a record was extracted through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChannel {
    StructuredApi,
    RenderedDom,
}

impl SourceChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuredApi => "structured_api",
            Self::RenderedDom => "rendered_dom",
        }
    }
}

impl std::fmt::Display for SourceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single user review.
///
/// Serializes to the record shape consumed by the indexing pipeline:
/// `{"comment", "rate", "user", "date", "source"}`. An unknown rating is
/// written as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(rename = "comment")]
    text: String,
    #[serde(
        rename = "rate",
        serialize_with = "serialize_rating",
        deserialize_with = "deserialize_rating",
        default
    )]
    rating: Option<u8>,
    #[serde(rename = "user", default = "default_author")]
    author: String,
    #[serde(rename = "date", default)]
    timestamp: Option<String>,
    #[serde(rename = "source")]
    source_channel: SourceChannel,
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

fn serialize_rating<S: Serializer>(rating: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(rating.unwrap_or(0))
}

fn deserialize_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(clamp_rating))
}

/// Clamp a raw rating into `1..=5`; zero and negatives mean "unknown".
fn clamp_rating(raw: i64) -> Option<u8> {
    if raw <= 0 {
        None
    } else {
        Some(raw.min(MAX_RATING as i64) as u8)
    }
}

impl ReviewRecord {
    /// Create a record from raw comment text.
    ///
    /// Returns `None` when the text is empty after trimming.
    pub fn new(text: &str, source_channel: SourceChannel) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            rating: None,
            author: default_author(),
            timestamp: None,
            source_channel,
        })
    }

    /// Set the star rating. Values above 5 are clamped; zero or below clears it.
    pub fn with_rating(mut self, rating: i64) -> Self {
        self.rating = clamp_rating(rating);
        self
    }

    /// Set the author, keeping the default when the name is blank.
    pub fn with_author(mut self, author: &str) -> Self {
        let author = author.trim();
        if !author.is_empty() {
            self.author = author.to_string();
        }
        self
    }

    pub fn with_timestamp(mut self, timestamp: &str) -> Self {
        let timestamp = timestamp.trim();
        self.timestamp = (!timestamp.is_empty()).then(|| timestamp.to_string());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Identity key used for deduplication.
    pub fn dedup_key(&self) -> &str {
        &self.text
    }

    pub fn rating(&self) -> Option<u8> {
        self.rating
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn source_channel(&self) -> SourceChannel {
        self.source_channel
    }
}
