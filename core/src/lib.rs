//! Audit risk scoring and report aggregation.
//!
//! Transactions are classified by a deterministic, ordered rule chain.
//! An external narrative generator adds advisory text to flagged
//! transactions and writes session reports; its failures never change a
//! classification.

pub mod config;
pub mod duplicate_detection;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod narrative;
pub mod narrative_augmenter;
pub mod rate_limiter;
pub mod report;
pub mod rule_engine;
pub mod statistics;
pub mod store;
pub mod types;
