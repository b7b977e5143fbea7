//! Convergence behaviour of the rendered-page loop against scripted pages.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{immediate, texts, FakePage, PageScript, PageStats};
use reviewacquire::models::AccumulationSet;
use reviewacquire::pagination::{run_dom_channel, ChannelOutcome, ConvergenceConfig, StopReason};
use reviewacquire::scrapers::dom::RenderedDomAdapter;
use reviewacquire::scrapers::rate_limiter::{JitterRange, PacingConfig, PacingPolicy};
use reviewacquire::scrapers::strategy::ExtractionStrategy;

async fn drive(
    script: PageScript,
    strategy: ExtractionStrategy,
    convergence: ConvergenceConfig,
    max_records: usize,
) -> (ChannelOutcome, AccumulationSet, Arc<Mutex<PageStats>>) {
    drive_paced(script, strategy, convergence, max_records, immediate()).await
}

async fn drive_paced(
    script: PageScript,
    strategy: ExtractionStrategy,
    convergence: ConvergenceConfig,
    max_records: usize,
    pacing: PacingPolicy,
) -> (ChannelOutcome, AccumulationSet, Arc<Mutex<PageStats>>) {
    let stats = Arc::new(Mutex::new(PageStats::default()));
    let page = FakePage::new(script, stats.clone());
    let mut adapter = RenderedDomAdapter::new(Box::new(page), &strategy, pacing.clone());
    let mut set = AccumulationSet::new(max_records);
    let outcome = run_dom_channel(
        &mut adapter,
        &convergence,
        &pacing,
        &mut set,
        &CancellationToken::new(),
    )
    .await;
    adapter.close().await;
    (outcome, set, stats)
}

fn convergence(patience: u32, max_iterations: u32) -> ConvergenceConfig {
    ConvergenceConfig {
        patience,
        max_iterations,
    }
}

#[tokio::test]
async fn test_stops_after_patience_iterations_without_growth() {
    let mut script = PageScript::scrolling(texts("Sabit", 4), 4, 0);
    script.fixed_height = Some(1000);

    let (outcome, set, _) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(5, 50),
        100,
    )
    .await;

    assert_eq!(outcome.stop, StopReason::NoGrowth);
    assert_eq!(outcome.state.attempts, 5);
    assert_eq!(outcome.state.consecutive_no_progress, 5);
    assert_eq!(set.len(), 4);
}

#[tokio::test]
async fn test_always_progressing_page_hits_iteration_cap() {
    let mut script = PageScript::scrolling(Vec::new(), 1, 1);
    script.endless = true;

    let (outcome, set, _) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(3, 8),
        1000,
    )
    .await;

    assert_eq!(outcome.stop, StopReason::IterationCap);
    assert_eq!(outcome.state.attempts, 8);
    assert_eq!(set.len(), 9);
}

#[tokio::test]
async fn test_always_progressing_page_stops_at_record_cap() {
    let mut script = PageScript::scrolling(Vec::new(), 2, 2);
    script.endless = true;

    let (outcome, set, _) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(3, 50),
        5,
    )
    .await;

    assert_eq!(outcome.stop, StopReason::CapReached);
    assert_eq!(set.len(), 5);
}

#[tokio::test]
async fn test_never_progressing_page_converges() {
    let script = PageScript::scrolling(Vec::new(), 0, 0);

    let (outcome, set, stats) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(3, 50),
        100,
    )
    .await;

    assert_eq!(outcome.stop, StopReason::NoGrowth);
    assert_eq!(outcome.state.attempts, 3);
    assert!(set.is_empty());
    assert_eq!(stats.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn test_growing_page_collects_everything_once() {
    let reviews = texts("Kaydırma", 12);
    let script = PageScript::scrolling(reviews.clone(), 3, 3);

    let (outcome, set, _) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(2, 50),
        100,
    )
    .await;

    assert!(outcome.stop.is_converged());
    let got: Vec<&str> = set.records().iter().map(|r| r.text()).collect();
    let expected: Vec<&str> = reviews.iter().map(String::as_str).collect();
    assert_eq!(got, expected);
    let unique: HashSet<&str> = got.iter().copied().collect();
    assert_eq!(unique.len(), got.len());
}

#[tokio::test]
async fn test_numbered_pages_until_no_more_pages() {
    let script = PageScript::numbered(texts("Sayfa", 7), 3);

    // Patience 1 with a constant height: height is no stop signal in numbered mode.
    let (outcome, set, stats) = drive(
        script,
        ExtractionStrategy::hepsiburada(),
        convergence(1, 50),
        100,
    )
    .await;

    assert_eq!(outcome.stop, StopReason::NoMorePages);
    assert_eq!(set.len(), 7);
    assert_eq!(stats.lock().unwrap().page_clicks, vec![2, 3, 4]);
}

#[tokio::test]
async fn test_load_more_clicks_reveal_reviews() {
    // Scrolling reveals nothing; only the load-more control grows the list.
    let mut script = PageScript::scrolling(texts("Buton", 9), 3, 0);
    script.reveal_per_load_more = 3;

    let (outcome, set, stats) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(2, 50),
        100,
    )
    .await;

    assert_eq!(stats.lock().unwrap().load_more_clicks, 2);
    assert_eq!(set.len(), 9);
    assert_eq!(outcome.stop, StopReason::NoGrowth);
    assert_eq!(outcome.state.attempts, 4);
    assert_eq!(outcome.state.cursor, 9);
}

#[tokio::test(start_paused = true)]
async fn test_load_more_click_waits_for_longer_pause() {
    let mut script = PageScript::scrolling(texts("Bekleme", 9), 3, 0);
    script.reveal_per_load_more = 3;
    let pacing = PacingPolicy::new(PacingConfig {
        api_delay_ms: 0,
        dom_jitter_ms: JitterRange::new(0, 0),
        load_more_pause_ms: JitterRange::new(500, 500),
        retry_pause_ms: 0,
    });

    let started = tokio::time::Instant::now();
    let (_, set, stats) = drive_paced(
        script,
        ExtractionStrategy::trendyol(),
        convergence(2, 50),
        100,
        pacing,
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(set.len(), 9);
    assert_eq!(stats.lock().unwrap().load_more_clicks, 2);
    // One pause per successful click, none when the control is gone.
    assert!(elapsed >= Duration::from_millis(1000), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
}

#[tokio::test]
async fn test_stable_height_stops_growing_page() {
    let mut script = PageScript::scrolling(Vec::new(), 1, 1);
    script.endless = true;
    script.fixed_height = Some(1000);

    let (outcome, set, _) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(3, 50),
        100,
    )
    .await;

    assert_eq!(outcome.stop, StopReason::HeightStable);
    assert_eq!(outcome.state.attempts, 3);
    assert_eq!(outcome.state.stable_height_count, 3);
    assert_eq!(outcome.state.consecutive_no_progress, 0);
    assert_eq!(set.len(), 4);
}

#[tokio::test]
async fn test_command_timeouts_count_as_idle_iterations() {
    let reviews = texts("Zaman", 12);
    let mut script = PageScript::scrolling(reviews.clone(), 3, 3);
    // Second and third iterations time out while reading the page.
    script.timeout_on_content = vec![3, 4];

    let (outcome, set, _) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(3, 50),
        100,
    )
    .await;

    assert_eq!(outcome.stop, StopReason::NoGrowth);
    assert_eq!(outcome.state.attempts, 7);
    assert_eq!(outcome.state.cursor, 12);
    let got: Vec<&str> = set.records().iter().map(|r| r.text()).collect();
    let expected: Vec<&str> = reviews.iter().map(String::as_str).collect();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn test_unreadable_height_keeps_progress() {
    let mut script = PageScript::scrolling(texts("Yükseklik", 6), 2, 2);
    script.height_unreadable = true;

    let (outcome, set, _) = drive(
        script,
        ExtractionStrategy::trendyol(),
        convergence(2, 50),
        100,
    )
    .await;

    assert_eq!(set.len(), 6);
    assert_eq!(outcome.stop, StopReason::NoGrowth);
    assert_eq!(outcome.state.attempts, 4);
    assert_eq!(outcome.state.stable_height_count, 0);
}
