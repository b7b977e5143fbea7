//! One harvest run: route the URL, drive the channels, return the records.
//!
//! Sites with a structured API try it first and fall back to the rendered
//! page when it is unavailable or fails. Records from both channels land in
//! the same [`AccumulationSet`]. The browser session is closed on every path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::models::{AccumulationSet, ReviewRecord, SourceChannel};
use crate::pagination::{
    run_api_channel, run_dom_channel, ChannelOutcome, ConvergenceConfig, PaginationState,
    StopReason,
};
use crate::scrapers::api::{ApiEndpoint, ApiError, ProductRef, ReviewApi, StructuredApiAdapter};
use crate::scrapers::browser::ChromeSessionFactory;
use crate::scrapers::dom::{RenderedDomAdapter, SessionFactory};
use crate::scrapers::http_client::HttpConfig;
use crate::scrapers::rate_limiter::PacingPolicy;
use crate::scrapers::router::{Route, SiteProfile, SiteRegistry};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Caller-supplied bounds of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLimits {
    /// Upper bound on API pages.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Capacity of the accumulation set.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

fn default_max_pages() -> u32 {
    10
}

fn default_max_records() -> usize {
    100
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_records: default_max_records(),
        }
    }
}

/// Builds a [`ReviewApi`] for a site's endpoint.
pub trait ApiFactory: Send + Sync {
    fn connect(&self, endpoint: &ApiEndpoint) -> Result<Box<dyn ReviewApi>, ApiError>;
}

/// [`ApiFactory`] backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpApiFactory {
    config: HttpConfig,
}

impl HttpApiFactory {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

impl ApiFactory for HttpApiFactory {
    fn connect(&self, endpoint: &ApiEndpoint) -> Result<Box<dyn ReviewApi>, ApiError> {
        Ok(Box::new(StructuredApiAdapter::new(
            &self.config,
            endpoint.clone(),
        )?))
    }
}

/// Outcome of one run. Always carries whatever was accumulated.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub url: String,
    pub site: String,
    pub records: Vec<ReviewRecord>,
    pub channels_tried: Vec<SourceChannel>,
    /// The rendered page was used after the API channel gave up.
    pub fell_back: bool,
    pub stop: StopReason,
    pub pagination: Option<PaginationState>,
    pub session_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestReport {
    pub fn is_partial(&self) -> bool {
        !self.stop.is_converged()
    }
}

/// Runs harvests. Holds no per-run state, so concurrent runs are independent.
pub struct Harvester {
    registry: SiteRegistry,
    apis: Arc<dyn ApiFactory>,
    sessions: Arc<dyn SessionFactory>,
    pacing: PacingPolicy,
    convergence: ConvergenceConfig,
}

impl Harvester {
    pub fn new(
        registry: SiteRegistry,
        apis: Arc<dyn ApiFactory>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            registry,
            apis,
            sessions,
            pacing: PacingPolicy::default(),
            convergence: ConvergenceConfig::default(),
        }
    }

    /// Harvester wired to the real HTTP client and Chrome.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.sites.clone(),
            Arc::new(HttpApiFactory::new(settings.http.clone())),
            Arc::new(ChromeSessionFactory::new(settings.browser.clone())),
        )
        .with_pacing(PacingPolicy::new(settings.pacing.clone()))
        .with_convergence(settings.convergence)
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// Harvest reviews for one product page.
    ///
    /// Fails only for URLs that cannot be parsed or belong to no registered
    /// site (or to one registered as unsupported). Channel and session failures are reported inside the returned
    /// report together with the partial record set.
    pub async fn harvest(
        &self,
        raw_url: &str,
        limits: RunLimits,
        cancel: CancellationToken,
    ) -> Result<HarvestReport, HarvestError> {
        let url = Url::parse(raw_url.trim()).map_err(|e| HarvestError::InvalidUrl {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;
        let profile = self
            .registry
            .lookup(&url)
            .filter(|profile| profile.channel != Route::Unsupported)
            .ok_or_else(|| {
                HarvestError::UnsupportedSource(url.host_str().unwrap_or(raw_url).to_string())
            })?;

        let started_at = Utc::now();
        info!("Harvesting {} as {} ({})", url, profile.name, profile.channel);

        let mut run = Run {
            set: AccumulationSet::new(limits.max_records),
            channels_tried: Vec::new(),
            fell_back: false,
            outcome: None,
            session_error: None,
        };

        let needs_dom = match profile.channel {
            Route::StructuredApi => {
                let converged = self.try_api(profile, &url, limits, &cancel, &mut run).await;
                if !converged && !cancel.is_cancelled() {
                    run.fell_back = true;
                    warn!("Falling back to rendered page for {}", url);
                }
                !converged && !cancel.is_cancelled()
            }
            Route::RenderedDom => true,
            Route::Unsupported => false,
        };

        if needs_dom {
            if run.set.is_full() {
                run.outcome = Some(ChannelOutcome {
                    state: PaginationState::new(SourceChannel::RenderedDom),
                    stop: StopReason::CapReached,
                });
            } else {
                self.run_dom(profile, &url, &cancel, &mut run).await;
            }
        }

        let stop = match run.outcome.as_ref() {
            Some(outcome) => outcome.stop.clone(),
            None if cancel.is_cancelled() => StopReason::Cancelled,
            None => StopReason::Exhausted,
        };
        info!("Harvest of {} finished with {} records ({})", url, run.set.len(), stop);

        Ok(HarvestReport {
            url: url.to_string(),
            site: profile.name.clone(),
            records: run.set.into_records(),
            channels_tried: run.channels_tried,
            fell_back: run.fell_back,
            stop,
            pagination: run.outcome.map(|o| o.state),
            session_error: run.session_error,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Run the API channel. Returns `true` when it finished without failing.
    async fn try_api(
        &self,
        profile: &SiteProfile,
        url: &Url,
        limits: RunLimits,
        cancel: &CancellationToken,
        run: &mut Run,
    ) -> bool {
        let Some(endpoint) = profile.api.as_ref() else {
            warn!("Site {} has no API endpoint configured", profile.name);
            return false;
        };
        let Some(product) = ProductRef::from_url(url) else {
            warn!("{}", ApiError::MissingProductId);
            return false;
        };
        if product.merchant_id.is_none() {
            warn!("{}", ApiError::MissingMerchantId);
            return false;
        }
        let api = match self.apis.connect(endpoint) {
            Ok(api) => api,
            Err(e) => {
                warn!("Review API unavailable: {}", e);
                return false;
            }
        };

        run.channels_tried.push(SourceChannel::StructuredApi);
        let outcome = run_api_channel(
            api.as_ref(),
            &product,
            limits.max_pages,
            &self.pacing,
            &mut run.set,
            cancel,
        )
        .await;
        let ok = !matches!(outcome.stop, StopReason::ChannelFailed(_));
        run.outcome = Some(outcome);
        ok
    }

    async fn run_dom(
        &self,
        profile: &SiteProfile,
        url: &Url,
        cancel: &CancellationToken,
        run: &mut Run,
    ) {
        run.channels_tried.push(SourceChannel::RenderedDom);
        let target = profile.dom_url(url);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.sessions.open(&target) => Some(result),
        };
        let page = match opened {
            None => {
                run.outcome = Some(ChannelOutcome {
                    state: PaginationState::new(SourceChannel::RenderedDom),
                    stop: StopReason::Cancelled,
                });
                return;
            }
            Some(Err(e)) => {
                warn!("Could not open browser session for {}: {}", target, e);
                run.session_error = Some(e.to_string());
                run.outcome = Some(ChannelOutcome {
                    state: PaginationState::new(SourceChannel::RenderedDom),
                    stop: StopReason::SessionFailed(e.to_string()),
                });
                return;
            }
            Some(Ok(page)) => page,
        };

        let mut adapter = RenderedDomAdapter::new(page, &profile.strategy, self.pacing.clone());
        let outcome = run_dom_channel(
            &mut adapter,
            &self.convergence,
            &self.pacing,
            &mut run.set,
            cancel,
        )
        .await;
        adapter.close().await;

        if let StopReason::SessionFailed(e) = &outcome.stop {
            warn!("Browser session failed: {}", e);
            run.session_error = Some(e.clone());
        }
        run.outcome = Some(outcome);
    }
}

/// Mutable state of one harvest.
struct Run {
    set: AccumulationSet,
    channels_tried: Vec<SourceChannel>,
    fell_back: bool,
    outcome: Option<ChannelOutcome>,
    session_error: Option<String>,
}
