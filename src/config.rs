//! Run settings.
//!
//! Loaded from TOML, discovered in the usual places, then adjusted by
//! environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::harvest::RunLimits;
use crate::pagination::ConvergenceConfig;
use crate::scrapers::{BrowserEngineConfig, HttpConfig, PacingConfig, SiteRegistry};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "reviewacquire.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a run needs besides the target URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub convergence: ConvergenceConfig,
    #[serde(default)]
    pub limits: RunLimits,
    /// Where the JSON record array is written.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Site registry; the built-in sites unless overridden.
    #[serde(default)]
    pub sites: SiteRegistry,
    /// File these settings were read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("reviews.json")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            browser: BrowserEngineConfig::default(),
            pacing: PacingConfig::default(),
            convergence: ConvergenceConfig::default(),
            limits: RunLimits::default(),
            output_path: default_output_path(),
            sites: SiteRegistry::builtin(),
            source_path: None,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, or the first discovered config file, or
    /// defaults; then apply environment overrides.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match explicit.map(Path::to_path_buf).or_else(Self::discover) {
            Some(path) => Self::load_from_path(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        let settings = settings.with_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Candidate config files, in lookup order.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("reviewacquire").join("config.toml"));
        }
        candidates
    }

    fn discover() -> Option<PathBuf> {
        Self::candidate_paths().into_iter().find(|p| p.is_file())
    }

    /// Load configuration from a specific TOML file.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let mut settings = Self::from_toml(&contents)?;
        settings.source_path = Some(path.to_path_buf());
        info!("Loaded config from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `REVIEWACQUIRE_*` variables plus the browser's own overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let mut settings = self.with_overrides(|key| std::env::var(key).ok())?;
        settings.browser = settings.browser.with_env_overrides();
        Ok(settings)
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("REVIEWACQUIRE_OUTPUT").filter(|v| !v.trim().is_empty()) {
            self.output_path = PathBuf::from(path.trim());
        }
        if let Some(value) = lookup("REVIEWACQUIRE_MAX_RECORDS") {
            self.limits.max_records = parse_number("REVIEWACQUIRE_MAX_RECORDS", &value)?;
        }
        if let Some(value) = lookup("REVIEWACQUIRE_MAX_PAGES") {
            self.limits.max_pages = parse_number("REVIEWACQUIRE_MAX_PAGES", &value)?;
        }
        if let Some(value) = lookup("REVIEWACQUIRE_PATIENCE") {
            self.convergence.patience = parse_number("REVIEWACQUIRE_PATIENCE", &value)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.convergence.patience == 0 {
            return Err(ConfigError::Invalid(
                "convergence.patience must be at least 1".to_string(),
            ));
        }
        if self.convergence.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "convergence.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.browser.command_timeout_secs == 0 || self.http.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        if let Some(profile) = self.sites.profiles().iter().find(|p| p.host_pattern.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "site {} has an empty host_pattern",
                profile.name
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} is not a valid number: {:?}", key, value)))
}
