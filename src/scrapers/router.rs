//! Site router: map a product URL onto a registered site profile.
//!
//! Classification is a hostname substring match against a fixed registry.
//! Unknown hosts are never scraped.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::api::ApiEndpoint;
use super::strategy::ExtractionStrategy;

/// Primary channel of a registered site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    StructuredApi,
    RenderedDom,
    Unsupported,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::StructuredApi => "structured_api",
            Route::RenderedDom => "rendered_dom",
            Route::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to harvest one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    /// Matched as a substring of the URL's host.
    pub host_pattern: String,
    pub channel: Route,
    pub strategy: ExtractionStrategy,
    /// Review endpoint for sites with a structured API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiEndpoint>,
    /// Path segment appended to reach the rendered review page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_path_suffix: Option<String>,
    /// Drop the query string before rendering.
    #[serde(default)]
    pub strip_query: bool,
}

impl SiteProfile {
    pub fn trendyol() -> Self {
        Self {
            name: "trendyol".to_string(),
            host_pattern: "trendyol.com".to_string(),
            channel: Route::StructuredApi,
            strategy: ExtractionStrategy::trendyol(),
            api: Some(ApiEndpoint::trendyol()),
            review_path_suffix: Some("/yorumlar".to_string()),
            strip_query: false,
        }
    }

    pub fn hepsiburada() -> Self {
        Self {
            name: "hepsiburada".to_string(),
            host_pattern: "hepsiburada.com".to_string(),
            channel: Route::RenderedDom,
            strategy: ExtractionStrategy::hepsiburada(),
            api: None,
            review_path_suffix: None,
            strip_query: true,
        }
    }

    pub fn matches(&self, host: &str) -> bool {
        !self.host_pattern.is_empty() && host.contains(&self.host_pattern.to_lowercase())
    }

    /// URL of the page the rendered-DOM channel should load.
    pub fn dom_url(&self, url: &Url) -> Url {
        let mut target = url.clone();
        if self.strip_query {
            target.set_query(None);
        }
        if let Some(suffix) = self.review_path_suffix.as_deref() {
            let suffix = suffix.trim_matches('/');
            let path = target.path().trim_end_matches('/').to_string();
            if !suffix.is_empty() && !path.ends_with(&format!("/{}", suffix)) {
                target.set_path(&format!("{}/{}", path, suffix));
            }
        }
        target
    }
}

/// Ordered collection of site profiles; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRegistry {
    profiles: Vec<SiteProfile>,
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SiteRegistry {
    pub fn new(profiles: Vec<SiteProfile>) -> Self {
        Self { profiles }
    }

    pub fn builtin() -> Self {
        Self::new(vec![SiteProfile::trendyol(), SiteProfile::hepsiburada()])
    }

    pub fn profiles(&self) -> &[SiteProfile] {
        &self.profiles
    }

    /// Find the profile whose host pattern occurs in the URL's host.
    pub fn lookup(&self, url: &Url) -> Option<&SiteProfile> {
        let host = url.host_str()?.to_lowercase();
        let profile = self.profiles.iter().find(|p| p.matches(&host));
        debug!(
            "Routing host {} to {}",
            host,
            profile.map(|p| p.name.as_str()).unwrap_or("<unsupported>")
        );
        profile
    }

    pub fn classify(&self, url: &Url) -> Route {
        self.lookup(url)
            .map(|p| p.channel)
            .unwrap_or(Route::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_classify_registered_hosts() {
        let registry = SiteRegistry::builtin();
        assert_eq!(
            registry.classify(&url("https://www.trendyol.com/a/b-p-1?merchantId=2")),
            Route::StructuredApi
        );
        assert_eq!(
            registry.classify(&url("https://www.hepsiburada.com/urun-p-HBC0001")),
            Route::RenderedDom
        );
    }

    #[test]
    fn test_unknown_host_is_unsupported() {
        let registry = SiteRegistry::builtin();
        assert_eq!(
            registry.classify(&url("https://shop.example.org/item/1")),
            Route::Unsupported
        );
        assert!(registry.lookup(&url("file:///tmp/page.html")).is_none());
    }

    #[test]
    fn test_host_match_is_case_insensitive() {
        let registry = SiteRegistry::builtin();
        assert_eq!(
            registry.classify(&url("https://M.TRENDYOL.COM/x-p-1")),
            Route::StructuredApi
        );
    }

    #[test]
    fn test_dom_url_appends_review_suffix_before_query() {
        let profile = SiteProfile::trendyol();
        let rewritten =
            profile.dom_url(&url("https://www.trendyol.com/brand/item-p-1?merchantId=936059"));
        assert_eq!(
            rewritten.as_str(),
            "https://www.trendyol.com/brand/item-p-1/yorumlar?merchantId=936059"
        );

        let already = profile.dom_url(&url("https://www.trendyol.com/brand/item-p-1/yorumlar"));
        assert_eq!(already.path(), "/brand/item-p-1/yorumlar");
    }

    #[test]
    fn test_dom_url_strips_query() {
        let profile = SiteProfile::hepsiburada();
        let rewritten = profile.dom_url(&url("https://www.hepsiburada.com/urun-p-HB1?magaza=x"));
        assert_eq!(rewritten.as_str(), "https://www.hepsiburada.com/urun-p-HB1");
    }

    #[test]
    fn test_registry_toml_roundtrip_shape() {
        let registry: SiteRegistry = toml::from_str(
            r#"
            [[profiles]]
            name = "demo"
            host_pattern = "demo.test"
            channel = "rendered_dom"

            [profiles.strategy]
            container_selectors = [".review"]
            comment_selectors = [".review p"]
            "#,
        )
        .unwrap();
        assert_eq!(registry.profiles().len(), 1);
        assert_eq!(
            registry.classify(&url("https://www.demo.test/p/1")),
            Route::RenderedDom
        );
    }
}
