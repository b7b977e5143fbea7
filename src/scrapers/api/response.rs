//! Wire format of the review endpoint and its decoding into records.

use serde::Deserialize;

use super::{ApiError, ApiPage};
use crate::models::{ReviewRecord, SourceChannel};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    is_success: bool,
    #[serde(default)]
    result: Option<ResultBody>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultBody {
    #[serde(default)]
    product_reviews: Option<ProductReviews>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductReviews {
    #[serde(default)]
    total_pages: Option<u32>,
    #[serde(default)]
    content: Vec<ApiReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReview {
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    rate: Option<f64>,
    #[serde(default)]
    user_full_name: Option<String>,
    #[serde(default, rename = "commentDateISOtype")]
    comment_date_iso: Option<String>,
}

impl ApiReview {
    fn into_record(self) -> Option<ReviewRecord> {
        let mut record = ReviewRecord::new(self.comment.as_deref()?, SourceChannel::StructuredApi)?;
        if let Some(rate) = self.rate {
            record = record.with_rating(rate.round() as i64);
        }
        if let Some(ref user) = self.user_full_name {
            record = record.with_author(user);
        }
        if let Some(ref date) = self.comment_date_iso {
            record = record.with_timestamp(date);
        }
        Some(record)
    }
}

/// Decode one page of the review endpoint.
///
/// Reviews without comment text are dropped. A missing `totalPages` counts
/// as a single page.
pub fn parse_review_page(body: &str) -> Result<ApiPage, ApiError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| ApiError::Malformed(e.to_string()))?;

    let result = match envelope.result {
        Some(result) if envelope.is_success => result,
        _ => {
            let reason = envelope
                .error
                .map(|e| match e {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "isSuccess=false".to_string());
            return Err(ApiError::Unsuccessful(reason));
        }
    };

    let reviews = result.product_reviews.unwrap_or_default();
    let records = reviews
        .content
        .into_iter()
        .filter_map(ApiReview::into_record)
        .collect();

    Ok(ApiPage {
        records,
        total_pages: reviews.total_pages.unwrap_or(1),
    })
}
