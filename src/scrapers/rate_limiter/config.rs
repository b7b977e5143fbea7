//! Pacing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inclusive millisecond range a random delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl JitterRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Bounds in order, tolerating a reversed configuration.
    pub fn bounds(&self) -> (u64, u64) {
        (self.min_ms.min(self.max_ms), self.min_ms.max(self.max_ms))
    }
}

/// Delays applied between requests and browser interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Fixed delay between API pages.
    #[serde(default = "default_api_delay")]
    pub api_delay_ms: u64,
    /// Random wait after each scroll of the rendered page.
    #[serde(default = "default_dom_jitter")]
    pub dom_jitter_ms: JitterRange,
    /// Extra random wait after clicking a "load more" control.
    #[serde(default = "default_load_more_pause")]
    pub load_more_pause_ms: JitterRange,
    /// Wait before re-querying when no review elements were found.
    #[serde(default = "default_retry_pause")]
    pub retry_pause_ms: u64,
}

fn default_api_delay() -> u64 {
    1000
}

fn default_dom_jitter() -> JitterRange {
    JitterRange::new(1000, 2500)
}

fn default_load_more_pause() -> JitterRange {
    JitterRange::new(2000, 3500)
}

fn default_retry_pause() -> u64 {
    3000
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            api_delay_ms: default_api_delay(),
            dom_jitter_ms: default_dom_jitter(),
            load_more_pause_ms: default_load_more_pause(),
            retry_pause_ms: default_retry_pause(),
        }
    }
}

impl PacingConfig {
    /// No waiting at all; used by tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            api_delay_ms: 0,
            dom_jitter_ms: JitterRange::new(0, 0),
            load_more_pause_ms: JitterRange::new(0, 0),
            retry_pause_ms: 0,
        }
    }

    pub fn api_delay(&self) -> Duration {
        Duration::from_millis(self.api_delay_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}
