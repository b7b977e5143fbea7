//! Data models for review acquisition.

mod accumulation;
mod review;

pub use accumulation::{AccumulationSet, InsertOutcome, MergeSummary};
pub use review::{ReviewRecord, SourceChannel, DEFAULT_AUTHOR, MAX_RATING};
