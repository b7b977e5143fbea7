//! HTTP client for structured review endpoints.

mod user_agent;

pub use user_agent::{random_user_agent, resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// HTTP settings shared by every request of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// User agent configuration.
    /// - None: default desktop browser user agent
    /// - "impersonate": randomly select from real browser user agents
    /// - Any other string: used as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Response body with its status.
#[derive(Debug)]
pub struct TextResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Thin wrapper over `reqwest::Client` with per-site default headers.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client with the configured user agent, timeout and extra headers.
    ///
    /// Headers that are not valid HTTP header names or values are skipped.
    pub fn new(config: &HttpConfig, headers: &[(String, String)]) -> Result<Self, reqwest::Error> {
        let user_agent = resolve_user_agent(config.user_agent.as_deref());

        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    default_headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header {}: {}", name, value),
            }
        }

        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(config.timeout())
            .default_headers(default_headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// GET a URL and read the body as text.
    pub async fn get_text(&self, url: &str) -> Result<TextResponse, reqwest::Error> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(TextResponse { status, body })
    }
}
