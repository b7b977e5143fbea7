//! Convergence loop for the rendered-DOM channel.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{paced, ChannelOutcome, ConvergenceConfig, PaginationState, StopReason};
use crate::models::{AccumulationSet, SourceChannel};
use crate::scrapers::dom::{DomError, RenderedDomAdapter};
use crate::scrapers::rate_limiter::PacingPolicy;
use crate::scrapers::strategy::AdvanceMode;

/// What one iteration observed.
enum Step {
    Advanced {
        added: usize,
        elements: usize,
        height: Option<u64>,
    },
    NoMorePages,
    Cancelled,
}

/// Drive the page until it converges, the set fills up or the cap is hit.
///
/// A baseline extraction runs before the first iteration. Per-iteration
/// browser failures count as an iteration without progress; only a lost
/// session ends the loop early.
pub async fn run_dom_channel(
    adapter: &mut RenderedDomAdapter,
    convergence: &ConvergenceConfig,
    pacing: &PacingPolicy,
    set: &mut AccumulationSet,
    cancel: &CancellationToken,
) -> ChannelOutcome {
    let mut state = PaginationState::new(SourceChannel::RenderedDom);
    let stop = drive(adapter, convergence, pacing, set, cancel, &mut state).await;
    info!(
        "DOM channel stopped after {} iteration(s) with {} records: {}",
        state.attempts,
        set.len(),
        stop
    );
    ChannelOutcome { state, stop }
}

async fn drive(
    adapter: &mut RenderedDomAdapter,
    convergence: &ConvergenceConfig,
    pacing: &PacingPolicy,
    set: &mut AccumulationSet,
    cancel: &CancellationToken,
    state: &mut PaginationState,
) -> StopReason {
    let mode = adapter.strategy().advance;

    let prepared = tokio::select! {
        biased;
        _ = cancel.cancelled() => return StopReason::Cancelled,
        result = baseline(adapter, set) => result,
    };
    let mut last_height = match prepared {
        Ok((elements, height)) => {
            state.cursor = elements;
            height
        }
        Err(e) => return StopReason::SessionFailed(e.to_string()),
    };
    if set.is_full() {
        return StopReason::CapReached;
    }

    // Last page reached in numbered mode; unused when scrolling.
    let mut page_number: u32 = 1;
    while state.attempts < convergence.max_iterations {
        state.attempts += 1;

        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(Step::Cancelled),
            result = iterate(adapter, pacing, set, cancel, mode, page_number + 1) => result,
        };

        let (added, height) = match step {
            Ok(Step::Advanced {
                added,
                elements,
                height,
            }) => {
                page_number += 1;
                state.cursor = elements;
                (added, height)
            }
            Ok(Step::NoMorePages) => return StopReason::NoMorePages,
            Ok(Step::Cancelled) => return StopReason::Cancelled,
            Err(e) if e.is_session_level() => return StopReason::SessionFailed(e.to_string()),
            Err(e) => {
                warn!("DOM iteration {} failed: {}", state.attempts, e);
                (0, None)
            }
        };
        state.observe_progress(added);
        if let Some(current) = height {
            state.observe_height(last_height, current);
            last_height = Some(current);
        }
        debug!(
            "Iteration {}: +{} (total {}), no-progress {}, stable-height {}",
            state.attempts,
            added,
            set.len(),
            state.consecutive_no_progress,
            state.stable_height_count
        );

        if set.is_full() {
            return StopReason::CapReached;
        }
        if state.consecutive_no_progress >= convergence.patience {
            return StopReason::NoGrowth;
        }
        if mode == AdvanceMode::InfiniteScroll && state.stable_height_count >= convergence.patience
        {
            return StopReason::HeightStable;
        }
    }
    StopReason::IterationCap
}

/// Open the review list and take the first extraction. Returns the element
/// count and the initial page height when it could be read.
async fn baseline(
    adapter: &mut RenderedDomAdapter,
    set: &mut AccumulationSet,
) -> Result<(usize, Option<u64>), DomError> {
    adapter.prepare().await?;
    let elements = match adapter.extract_cycle().await {
        Ok(batch) => {
            let elements = batch.elements;
            let summary = set.merge(batch.records);
            debug!("Baseline: {} elements, {} records", elements, summary.added);
            elements
        }
        Err(e) if e.is_session_level() => return Err(e),
        Err(e) => {
            warn!("Baseline extraction failed: {}", e);
            0
        }
    };
    match adapter.scroll_height().await {
        Ok(height) => Ok((elements, Some(height))),
        Err(e) if e.is_session_level() => Err(e),
        Err(_) => Ok((elements, None)),
    }
}

async fn iterate(
    adapter: &mut RenderedDomAdapter,
    pacing: &PacingPolicy,
    set: &mut AccumulationSet,
    cancel: &CancellationToken,
    mode: AdvanceMode,
    next_page: u32,
) -> Result<Step, DomError> {
    match mode {
        AdvanceMode::InfiniteScroll => {
            adapter.scroll_forward().await?;
            if !paced(pacing.dom_interval(), cancel).await {
                return Ok(Step::Cancelled);
            }
            if adapter.click_load_more().await? {
                debug!("Clicked load-more control");
                if !paced(pacing.load_more_pause(), cancel).await {
                    return Ok(Step::Cancelled);
                }
            }
        }
        AdvanceMode::NumberedPages => {
            if !adapter.go_to_page(next_page).await? {
                debug!("No control for page {}", next_page);
                return Ok(Step::NoMorePages);
            }
            if !paced(pacing.load_more_pause(), cancel).await {
                return Ok(Step::Cancelled);
            }
        }
    }

    let batch = adapter.extract_cycle().await?;
    let elements = batch.elements;
    let summary = set.merge(batch.records);
    let height = match adapter.scroll_height().await {
        Ok(height) => Some(height),
        Err(e) if e.is_session_level() => return Err(e),
        Err(e) => {
            warn!("Could not read page height: {}", e);
            None
        }
    };
    Ok(Step::Advanced {
        added: summary.added,
        elements,
        height,
    })
}
