//! Browser engine configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Browser engine configuration, handed to the session factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Browser engine type.
    #[serde(default)]
    pub engine: BrowserEngineType,

    /// Run in headless mode (default: true).
    /// Set to false to watch the page being driven.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for each individual browser command, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// User agent override; None uses the default desktop user agent,
    /// "impersonate" picks a random real one.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Viewport size as (width, height).
    #[serde(default = "default_window_size")]
    pub window_size: (u32, u32),

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

fn default_command_timeout() -> u64 {
    20
}

fn default_window_size() -> (u32, u32) {
    (1920, 1080)
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngineType::default(),
            headless: default_headless(),
            proxy: None,
            timeout_secs: default_timeout(),
            command_timeout_secs: default_command_timeout(),
            user_agent: None,
            window_size: default_window_size(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply `BROWSER_URL` and `SOCKS_PROXY` from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BROWSER_URL") {
            if !url.trim().is_empty() {
                self.remote_url = Some(url.trim().to_string());
            }
        }
        if let Ok(proxy) = std::env::var("SOCKS_PROXY") {
            if !proxy.trim().is_empty() {
                self.proxy = Some(proxy.trim().to_string());
            }
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Browser engine types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineType {
    /// chromiumoxide with stealth patches (default).
    #[default]
    Stealth,

    /// No stealth patches (for debugging).
    Standard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: BrowserEngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, BrowserEngineConfig::default());
        assert!(config.headless);
        assert_eq!(config.engine, BrowserEngineType::Stealth);
        assert_eq!(config.command_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_engine_parsing() {
        let config: BrowserEngineConfig =
            toml::from_str("engine = \"standard\"\nheadless = false").unwrap();
        assert_eq!(config.engine, BrowserEngineType::Standard);
        assert!(!config.headless);
    }
}
