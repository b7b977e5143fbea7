//! Review sources: site routing, the two extraction channels and their
//! shared pacing.

pub mod api;
pub mod browser;
pub mod dom;
pub mod extract;
pub mod http_client;
pub mod rate_limiter;
pub mod router;
pub mod strategy;

pub use api::{ApiEndpoint, ApiError, ApiPage, ProductRef, ReviewApi, StructuredApiAdapter};
pub use browser::{BrowserEngineConfig, BrowserEngineType, ChromeSessionFactory};
pub use dom::{CycleBatch, DomError, RenderedDomAdapter, RenderedPage, SessionFactory};
pub use extract::{CascadeStep, ReviewElement, SelectorCascade};
pub use http_client::{HttpClient, HttpConfig};
pub use rate_limiter::{JitterRange, PacingConfig, PacingPolicy};
pub use router::{Route, SiteProfile, SiteRegistry};
pub use strategy::{AdvanceMode, ExtractionStrategy, LoadMoreStrategy};
