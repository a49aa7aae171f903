//! Matching stage
//!
//! Consumes accepted orders and produces deterministic trades against a
//! fixed market-maker counterparty at the symbol's reference price. Fills
//! are broadcast so any number of settlement-side consumers can subscribe.

pub mod engine;
pub mod worker;

pub use engine::{MatchError, MatchingEngine};
pub use worker::{declare_topology, spawn_pool, MatchingConfig, MatchingError, MatchingWorker};
