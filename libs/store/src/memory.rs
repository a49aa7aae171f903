//! In-memory ledger store
//!
//! Backs the pipeline in tests and local runs. One mutex guards all four
//! tables, so a settlement's writes are atomic: a reader either sees none
//! of a trade's effects or all of them. `set_unavailable` simulates a
//! storage outage so redelivery behavior can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;

use types::ids::{Symbol, TradeId, UserId};
use types::ledger::{Account, LedgerEntry, LedgerKey, Trade};

use crate::error::StoreError;
use crate::plan::{SettlementPlan, SettlementReceipt};
use crate::LedgerStore;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, Decimal>,
    positions: HashMap<(UserId, Symbol), i64>,
    trades: HashMap<TradeId, Trade>,
    ledger_entries: Vec<LedgerEntry>,
    ledger_index: HashSet<LedgerKey>,
    next_entry_id: u64,
    unavailable: bool,
}

/// In-memory realization of the ledger store.
#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a user row with starting cash.
    pub fn seed_user(&self, user: &UserId, cash: Decimal) {
        self.lock().users.insert(user.clone(), cash);
    }

    /// Seed a position row with starting holdings.
    pub fn seed_position(&self, user: &UserId, symbol: &Symbol, qty: i64) {
        self.lock()
            .positions
            .insert((user.clone(), symbol.clone()), qty);
    }

    /// Toggle simulated storage outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Persisted trade row, if the trade has settled.
    pub fn trade(&self, trade_id: &TradeId) -> Option<Trade> {
        self.lock().trades.get(trade_id).cloned()
    }

    /// All ledger entries for a user, in insert order.
    pub fn entries_for(&self, user: &UserId) -> Vec<LedgerEntry> {
        self.lock()
            .ledger_entries
            .iter()
            .filter(|entry| &entry.user_id == user)
            .cloned()
            .collect()
    }

    /// Total number of ledger entries across all users.
    pub fn entry_count(&self) -> usize {
        self.lock().ledger_entries.len()
    }

    /// Materialized account view for a user.
    pub fn account(&self, user: &UserId) -> Account {
        let tables = self.lock();
        let positions = tables
            .positions
            .iter()
            .filter(|((owner, _), _)| owner == user)
            .map(|((_, symbol), qty)| (symbol.clone(), *qty))
            .collect();
        Account {
            user_id: user.clone(),
            cash_balance: tables.users.get(user).copied().unwrap_or(Decimal::ZERO),
            positions,
        }
    }
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn cash_balance(&self, user: &UserId) -> Result<Decimal, StoreError> {
        let tables = self.lock();
        if tables.unavailable {
            return Err(StoreError::Unavailable);
        }
        Ok(tables.users.get(user).copied().unwrap_or(Decimal::ZERO))
    }

    async fn position(&self, user: &UserId, symbol: &Symbol) -> Result<i64, StoreError> {
        let tables = self.lock();
        if tables.unavailable {
            return Err(StoreError::Unavailable);
        }
        Ok(tables
            .positions
            .get(&(user.clone(), symbol.clone()))
            .copied()
            .unwrap_or(0))
    }

    async fn apply_settlement(
        &self,
        plan: &SettlementPlan,
    ) -> Result<SettlementReceipt, StoreError> {
        let mut tables = self.lock();
        if tables.unavailable {
            return Err(StoreError::Unavailable);
        }
        let ts = now_nanos();
        let fill = &plan.trade;

        // Trade row: first writer wins, replays are absorbed.
        if tables.trades.contains_key(&fill.trade_id) {
            debug!(trade_id = %fill.trade_id, "trade row already present, replay absorbed");
        } else {
            tables.trades.insert(
                fill.trade_id.clone(),
                Trade {
                    trade_id: fill.trade_id.clone(),
                    symbol: fill.symbol.clone(),
                    qty: fill.qty,
                    price: fill.price,
                    buy_user: fill.buy_user.clone(),
                    sell_user: fill.sell_user.clone(),
                    ts,
                },
            );
        }

        // Per-leg conflict-skip: the ledger key is the idempotence guard.
        // A leg whose key already exists is skipped entirely — increment
        // and entry move together.
        for leg in [&plan.buyer, &plan.seller] {
            let key = LedgerKey {
                trade_id: fill.trade_id.clone(),
                user_id: leg.user_id.clone(),
            };
            if tables.ledger_index.contains(&key) {
                debug!(
                    trade_id = %fill.trade_id,
                    user_id = %leg.user_id,
                    "ledger entry already recorded, leg skipped"
                );
                continue;
            }

            *tables
                .users
                .entry(leg.user_id.clone())
                .or_insert(Decimal::ZERO) += leg.delta_cash;
            *tables
                .positions
                .entry((leg.user_id.clone(), fill.symbol.clone()))
                .or_insert(0) += leg.delta_qty;

            tables.next_entry_id += 1;
            let id = tables.next_entry_id;
            tables.ledger_entries.push(LedgerEntry {
                id,
                user_id: leg.user_id.clone(),
                trade_id: fill.trade_id.clone(),
                symbol: fill.symbol.clone(),
                delta_cash: leg.delta_cash,
                delta_qty: leg.delta_qty,
                ts,
            });
            tables.ledger_index.insert(key);
        }

        Ok(SettlementReceipt {
            buyer_cash_after: tables
                .users
                .get(&fill.buy_user)
                .copied()
                .unwrap_or(Decimal::ZERO),
            buyer_pos_after: tables
                .positions
                .get(&(fill.buy_user.clone(), fill.symbol.clone()))
                .copied()
                .unwrap_or(0),
            seller_cash_after: tables
                .users
                .get(&fill.sell_user)
                .copied()
                .unwrap_or(Decimal::ZERO),
            seller_pos_after: tables
                .positions
                .get(&(fill.sell_user.clone(), fill.symbol.clone()))
                .copied()
                .unwrap_or(0),
        })
    }
}
