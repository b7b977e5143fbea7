//! Structured-API channel: paged JSON review endpoints.

mod response;

pub use response::parse_review_page;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::http_client::{HttpClient, HttpConfig};
use crate::models::ReviewRecord;

/// Failure of the structured API channel. Every variant is terminal for the
/// channel; the run falls back to the rendered page.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("product id missing from URL")]
    MissingProductId,
    #[error("merchant id missing from URL; request cannot be authenticated")]
    MissingMerchantId,
    #[error("review endpoint returned HTTP {0}")]
    Status(u16),
    #[error("review endpoint reported failure: {0}")]
    Unsuccessful(String),
    #[error("malformed review payload: {0}")]
    Malformed(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Product coordinates extracted from a product page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    /// URL path without surrounding slashes, e.g. `brand/name-p-288620006`.
    pub product_id: String,
    /// `merchantId` query parameter, when present.
    pub merchant_id: Option<String>,
}

impl ProductRef {
    /// Returns `None` when the URL has no path to identify the product.
    pub fn from_url(url: &Url) -> Option<Self> {
        let product_id = url.path().trim_matches('/').to_string();
        if product_id.is_empty() {
            return None;
        }
        let merchant_id = url
            .query_pairs()
            .find(|(k, _)| k == "merchantId")
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Some(Self {
            product_id,
            merchant_id,
        })
    }
}

/// One decoded page of reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiPage {
    pub records: Vec<ReviewRecord>,
    pub total_pages: u32,
}

/// A paged review source.
#[async_trait]
pub trait ReviewApi: Send + Sync {
    /// Fetch page `page` (zero-based) of a product's reviews.
    async fn fetch_page(&self, product: &ProductRef, page: u32) -> Result<ApiPage, ApiError>;
}

/// Versioned review endpoint of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    /// URL with `{product}`, `{merchant}` and `{page}` placeholders.
    pub url_template: String,
    /// Extra request headers (Accept, Referer, Origin, ...).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ApiEndpoint {
    pub fn trendyol() -> Self {
        let headers = [
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", "tr-TR,tr;q=0.9,en;q=0.8"),
            ("Referer", "https://www.trendyol.com/"),
            ("Origin", "https://www.trendyol.com"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            url_template: "https://apigw.trendyol.com/discovery-web-socialgw-service/reviews/{product}/yorumlar?merchantId={merchant}&page={page}&culture=tr-TR&storefrontId=1".to_string(),
            headers,
        }
    }

    /// Expand the template for one page.
    pub fn page_url(&self, product_id: &str, merchant_id: &str, page: u32) -> String {
        let product = product_id
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        self.url_template
            .replace("{product}", &product)
            .replace("{merchant}", &urlencoding::encode(merchant_id))
            .replace("{page}", &page.to_string())
    }
}

/// HTTP implementation of [`ReviewApi`].
#[derive(Debug, Clone)]
pub struct StructuredApiAdapter {
    client: HttpClient,
    endpoint: ApiEndpoint,
}

impl StructuredApiAdapter {
    pub fn new(config: &HttpConfig, endpoint: ApiEndpoint) -> Result<Self, ApiError> {
        let headers: Vec<(String, String)> = endpoint
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let client = HttpClient::new(config, &headers)?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ReviewApi for StructuredApiAdapter {
    async fn fetch_page(&self, product: &ProductRef, page: u32) -> Result<ApiPage, ApiError> {
        if product.product_id.is_empty() {
            return Err(ApiError::MissingProductId);
        }
        let merchant = product
            .merchant_id
            .as_deref()
            .ok_or(ApiError::MissingMerchantId)?;

        let url = self.endpoint.page_url(&product.product_id, merchant, page);
        let response = self.client.get_text(&url).await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Http(e)
            }
        })?;

        if !response.status.is_success() {
            debug!(
                "Review endpoint {} answered {}: {}",
                url,
                response.status,
                response.body.chars().take(200).collect::<String>()
            );
            return Err(ApiError::Status(response.status.as_u16()));
        }

        parse_review_page(&response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_ref_from_url() {
        let url = Url::parse(
            "https://www.trendyol.com/harmana/hindiba-kahvesi-p-288620006?boutiqueId=61&merchantId=936059",
        )
        .unwrap();
        let product = ProductRef::from_url(&url).unwrap();
        assert_eq!(product.product_id, "harmana/hindiba-kahvesi-p-288620006");
        assert_eq!(product.merchant_id.as_deref(), Some("936059"));
    }

    #[test]
    fn test_product_ref_without_merchant() {
        let url = Url::parse("https://www.trendyol.com/brand/item-p-1/").unwrap();
        let product = ProductRef::from_url(&url).unwrap();
        assert_eq!(product.product_id, "brand/item-p-1");
        assert!(product.merchant_id.is_none());
    }

    #[test]
    fn test_product_ref_requires_path() {
        let url = Url::parse("https://www.trendyol.com/?merchantId=1").unwrap();
        assert!(ProductRef::from_url(&url).is_none());
    }

    #[test]
    fn test_page_url_expansion() {
        let endpoint = ApiEndpoint::trendyol();
        let url = endpoint.page_url("harmana/hindiba-kahvesi-p-288620006", "936059", 3);
        assert_eq!(
            url,
            "https://apigw.trendyol.com/discovery-web-socialgw-service/reviews/harmana/hindiba-kahvesi-p-288620006/yorumlar?merchantId=936059&page=3&culture=tr-TR&storefrontId=1"
        );
    }

    #[tokio::test]
    async fn test_missing_merchant_fails_without_request() {
        let adapter =
            StructuredApiAdapter::new(&HttpConfig::default(), ApiEndpoint::trendyol()).unwrap();
        let product = ProductRef {
            product_id: "brand/item-p-1".to_string(),
            merchant_id: None,
        };
        let err = adapter.fetch_page(&product, 0).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingMerchantId));
    }
}
