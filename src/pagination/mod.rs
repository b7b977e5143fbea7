//! Pagination and convergence control.
//!
//! Both channels share [`PaginationState`] and [`StopReason`]. The API loop is
//! bounded by page count, the DOM loop by an iteration cap plus two patience
//! counters (page height and record count).

mod api;
mod dom;

pub use api::run_api_channel;
pub use dom::run_dom_channel;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::models::SourceChannel;
use crate::scrapers::rate_limiter::pause;

/// Per-run loop bookkeeping for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationState {
    pub channel: SourceChannel,
    /// Next page index (API) or review elements on the page after the last
    /// successful cycle (DOM).
    pub cursor: usize,
    pub consecutive_no_progress: u32,
    pub stable_height_count: u32,
    pub attempts: u32,
}

impl PaginationState {
    pub fn new(channel: SourceChannel) -> Self {
        Self {
            channel,
            cursor: 0,
            consecutive_no_progress: 0,
            stable_height_count: 0,
            attempts: 0,
        }
    }

    /// Record whether the last cycle added anything.
    pub fn observe_progress(&mut self, added: usize) {
        if added > 0 {
            self.consecutive_no_progress = 0;
        } else {
            self.consecutive_no_progress += 1;
        }
    }

    /// Record the page height seen after a cycle.
    pub fn observe_height(&mut self, previous: Option<u64>, current: u64) {
        if previous == Some(current) {
            self.stable_height_count += 1;
        } else {
            self.stable_height_count = 0;
        }
    }
}

/// Why a channel loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// Every available page was fetched.
    Exhausted,
    /// The channel failed; the caller may fall back.
    ChannelFailed(String),
    /// The accumulation set is full.
    CapReached,
    HeightStable,
    NoGrowth,
    IterationCap,
    /// Numbered pagination has no next page.
    NoMorePages,
    Cancelled,
    /// The browser session died.
    SessionFailed(String),
}

impl StopReason {
    /// Terminations that count as a successful, complete run of the channel.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            StopReason::Exhausted
                | StopReason::CapReached
                | StopReason::HeightStable
                | StopReason::NoGrowth
                | StopReason::IterationCap
                | StopReason::NoMorePages
        )
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Exhausted => write!(f, "all pages fetched"),
            StopReason::ChannelFailed(e) => write!(f, "channel failed: {}", e),
            StopReason::CapReached => write!(f, "record cap reached"),
            StopReason::HeightStable => write!(f, "page height stopped changing"),
            StopReason::NoGrowth => write!(f, "no new records"),
            StopReason::IterationCap => write!(f, "iteration cap reached"),
            StopReason::NoMorePages => write!(f, "no further pages"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::SessionFailed(e) => write!(f, "session failed: {}", e),
        }
    }
}

/// Termination thresholds of the DOM loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Consecutive stagnant iterations tolerated before stopping.
    #[serde(default = "default_patience")]
    pub patience: u32,
    /// Hard cap on iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_patience() -> u32 {
    5
}

fn default_max_iterations() -> u32 {
    50
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            patience: default_patience(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Final state of a channel loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    pub state: PaginationState,
    pub stop: StopReason,
}

/// Sleep unless cancelled first. Returns `false` on cancellation.
pub(crate) async fn paced(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = pause(delay) => true,
    }
}
