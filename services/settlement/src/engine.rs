//! Settlement application
//!
//! Turns a trade fill into its symmetric pair of ledger legs and applies
//! them through the store's atomic settlement operation. Applying the same
//! fill any number of times produces the state of applying it once — the
//! store's (trade_id, user) conflict-skip absorbs every replay.

use std::sync::Arc;

use ledger_store::{
    LedgerStore, SettlementLeg, SettlementPlan, SettlementReceipt, StoreError,
};
use types::messages::TradeFill;

/// Build the write set for a fill: the buyer pays price × qty and gains
/// qty, the seller mirrors with opposite signs.
pub fn plan_for(fill: &TradeFill) -> SettlementPlan {
    let gross = fill.gross();
    SettlementPlan {
        buyer: SettlementLeg {
            user_id: fill.buy_user.clone(),
            delta_cash: -gross,
            delta_qty: i64::from(fill.qty),
        },
        seller: SettlementLeg {
            user_id: fill.sell_user.clone(),
            delta_cash: gross,
            delta_qty: -i64::from(fill.qty),
        },
        trade: fill.clone(),
    }
}

/// Settlement engine: the pipeline's only writer of account state.
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Idempotently apply a fill. The receipt's post-state balances are
    /// observability only.
    pub async fn apply(&self, fill: &TradeFill) -> Result<SettlementReceipt, StoreError> {
        self.store.apply_settlement(&plan_for(fill)).await
    }
}
