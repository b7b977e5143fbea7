//! Page loop for the structured API channel.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{paced, ChannelOutcome, PaginationState, StopReason};
use crate::models::{AccumulationSet, SourceChannel};
use crate::scrapers::api::{ProductRef, ReviewApi};
use crate::scrapers::rate_limiter::PacingPolicy;

/// Fetch pages `0..min(total_pages, max_pages)` into `set`.
///
/// `total_pages` is taken from the first successful page and never revised.
/// A page that adds nothing does not end the loop; any failure does.
pub async fn run_api_channel(
    api: &dyn ReviewApi,
    product: &ProductRef,
    max_pages: u32,
    pacing: &PacingPolicy,
    set: &mut AccumulationSet,
    cancel: &CancellationToken,
) -> ChannelOutcome {
    let mut state = PaginationState::new(SourceChannel::StructuredApi);
    let mut total_pages: Option<u32> = None;
    let mut page: u32 = 0;

    let stop = loop {
        if set.is_full() {
            break StopReason::CapReached;
        }
        let bound = total_pages.map_or(max_pages, |total| total.min(max_pages));
        if page >= bound {
            break StopReason::Exhausted;
        }
        if page > 0 && !paced(pacing.api_interval(), cancel).await {
            break StopReason::Cancelled;
        }

        state.attempts += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break StopReason::Cancelled,
            result = api.fetch_page(product, page) => result,
        };

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("Review API failed on page {}: {}", page, e);
                break StopReason::ChannelFailed(e.to_string());
            }
        };

        let total = *total_pages.get_or_insert(fetched.total_pages);
        let summary = set.merge(fetched.records);
        state.observe_progress(summary.added);
        page += 1;
        state.cursor = page as usize;
        debug!(
            "API page {}/{}: {} new, {} duplicates",
            page, total, summary.added, summary.duplicates
        );

        if summary.full {
            break StopReason::CapReached;
        }
    };

    info!(
        "API channel stopped after {} page(s) with {} records: {}",
        state.cursor,
        set.len(),
        stop
    );
    ChannelOutcome { state, stop }
}
