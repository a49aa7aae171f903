//! Ledger store collaborator
//!
//! Durable home of accounts, positions, trades, and ledger entries. The
//! pipeline touches it through two narrow capabilities: read-only balance
//! lookups for the risk gate, and one atomic settlement operation whose
//! per-key conflict-skip makes redelivered trades converge instead of
//! double-applying.
//!
//! The balance reads are deliberately not serialized against settlement
//! commits — two orders from the same user can both pass a funds check
//! before either settles.

pub mod error;
pub mod memory;
pub mod plan;

use async_trait::async_trait;
use rust_decimal::Decimal;
use types::ids::{Symbol, UserId};

pub use error::StoreError;
pub use memory::MemoryLedgerStore;
pub use plan::{SettlementLeg, SettlementPlan, SettlementReceipt};

/// Atomic read-modify-write surface of the ledger store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current cash balance; zero for unknown users.
    async fn cash_balance(&self, user: &UserId) -> Result<Decimal, StoreError>;

    /// Currently held quantity; zero when no position row exists.
    async fn position(&self, user: &UserId, symbol: &Symbol) -> Result<i64, StoreError>;

    /// Apply a settlement plan in one transaction: trade row (first writer
    /// wins), then per counterparty an account increment plus ledger entry,
    /// both skipped together when the (trade_id, user) key already exists.
    /// Either every write commits or none does.
    async fn apply_settlement(
        &self,
        plan: &SettlementPlan,
    ) -> Result<SettlementReceipt, StoreError>;
}
