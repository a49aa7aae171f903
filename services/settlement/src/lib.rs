//! Settlement stage
//!
//! Consumes trade fills and idempotently applies symmetric cash/position
//! deltas to both counterparties, recording immutable ledger rows. The
//! settlement transaction is atomic in the store; acknowledgement strictly
//! follows the commit.

pub mod engine;
pub mod worker;

pub use engine::{plan_for, SettlementEngine};
pub use worker::{
    declare_topology, spawn_pool, SettlementConfig, SettlementError, SettlementWorker,
};
