//! drillgrade-core: classification, scoring and aggregation for
//! communications drill messages.
//!
//! This crate defines the data model, the per-sender classifier, the
//! per-form scoring rules and the run engine that the rest of drillgrade
//! builds on.

pub mod acknowledgement;
pub mod classifier;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod history;
pub mod location;
pub mod model;
pub mod parser;
pub mod persistence;
pub mod report;
pub mod results;
pub mod scoring;
pub mod statistics;
pub mod store;
pub mod traits;
