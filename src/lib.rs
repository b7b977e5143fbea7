//! reviewacquire - product review acquisition.
//!
//! Harvests user reviews from e-commerce product pages, either through a
//! site's review API or by driving the rendered page in a browser, and
//! emits a deduplicated, bounded record set.

pub mod cli;
pub mod config;
pub mod harvest;
pub mod models;
pub mod output;
pub mod pagination;
pub mod scrapers;
mod utils;

pub use config::{ConfigError, Settings};
pub use harvest::{ApiFactory, HarvestError, HarvestReport, Harvester, HttpApiFactory, RunLimits};
pub use models::{AccumulationSet, ReviewRecord, SourceChannel};
pub use output::{write_records, OutputError};
pub use pagination::{ConvergenceConfig, PaginationState, StopReason};
