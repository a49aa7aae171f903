//! Persisted ledger rows and account views
//!
//! Mirrors the relational schema of the ledger store: `users`, `positions`,
//! `trades`, `ledger_entries`. Ledger entries are the system's source of
//! truth — an account's cash and positions are defined as the sum of its
//! entries' deltas, and the materialized account rows must never diverge
//! from that aggregate.

use crate::ids::{Symbol, TradeId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted trade row. Immutable once written; on replay the first writer
/// wins and later identical writes are absorbed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub qty: u32,
    pub price: Decimal,
    pub buy_user: UserId,
    pub sell_user: UserId,
    /// Commit timestamp, Unix nanos, assigned by the store.
    pub ts: i64,
}

/// Uniqueness key for ledger entries: at most one row per (trade, user).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub trade_id: TradeId,
    pub user_id: UserId,
}

/// Immutable accounting row: one account's delta from one trade.
/// Insert-only, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub user_id: UserId,
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub delta_cash: Decimal,
    pub delta_qty: i64,
    /// Commit timestamp, Unix nanos, assigned by the store.
    pub ts: i64,
}

impl LedgerEntry {
    pub fn key(&self) -> LedgerKey {
        LedgerKey {
            trade_id: self.trade_id.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

/// Materialized account view: a cache over the ledger aggregate, updated
/// only through the store's atomic settlement operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub cash_balance: Decimal,
    pub positions: HashMap<Symbol, i64>,
}
