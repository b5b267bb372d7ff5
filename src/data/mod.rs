//! Data ingestion
//!
//! CSV match log normalization and the feature table built from it.

pub mod dataset;
pub mod match_log;

pub use dataset::{FeatureRow, FeatureTable};
pub use match_log::{LabelPolicy, LogStats, MatchLog};
