//! Risk validation stage
//!
//! Consumes new orders, applies shape and balance/holdings checks, and
//! emits exactly one Accepted or Rejected disposition per order. This stage
//! only reads account state; settlement is the sole writer.

pub mod engine;
pub mod validator;
pub mod worker;

pub use engine::RiskEngine;
pub use worker::{declare_topology, spawn_pool, RiskConfig, RiskError, RiskWorker};
