//! Request pacing for both extraction channels.
//!
//! The API channel sleeps a fixed interval between pages. The rendered-page
//! channel waits a jittered interval after every scroll and a longer one after
//! clicking "load more". There is no backoff: a failing channel is abandoned
//! rather than retried.

mod config;

use std::time::Duration;

use rand::Rng;
use tracing::debug;

pub use config::{JitterRange, PacingConfig};

/// Pacing policy shared by the controllers of one run.
#[derive(Debug, Clone, Default)]
pub struct PacingPolicy {
    config: PacingConfig,
}

impl PacingPolicy {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Delay before requesting the next API page.
    pub fn api_interval(&self) -> Duration {
        self.config.api_delay()
    }

    /// Random delay after a scroll.
    pub fn dom_interval(&self) -> Duration {
        sample(self.config.dom_jitter_ms)
    }

    /// Random delay after a "load more" click.
    pub fn load_more_pause(&self) -> Duration {
        sample(self.config.load_more_pause_ms)
    }

    /// Delay before the single scroll-and-retry of element discovery.
    pub fn retry_pause(&self) -> Duration {
        self.config.retry_pause()
    }
}

fn sample(range: JitterRange) -> Duration {
    let (min, max) = range.bounds();
    let ms = if min == max {
        min
    } else {
        rand::rng().random_range(min..=max)
    };
    Duration::from_millis(ms)
}

/// Sleep for `delay`, skipping the timer entirely for zero delays.
pub async fn pause(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    debug!("Pacing: waiting {:?}", delay);
    tokio::time::sleep(delay).await;
}
