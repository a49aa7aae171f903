//! Risk validation orchestrator
//!
//! Combines the pure shape checks with the funds/holdings gates backed by
//! the ledger store, producing exactly one disposition per order. This is a
//! read-only gate: balances are never mutated here.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use ledger_store::{LedgerStore, StoreError};
use types::messages::{Disposition, NewOrder, OrderAccepted, OrderRejected, RejectReason};
use types::order::Side;
use types::prices::PriceTable;

use crate::validator;

/// Risk validation engine.
pub struct RiskEngine {
    store: Arc<dyn LedgerStore>,
    prices: PriceTable,
}

impl RiskEngine {
    pub fn new(store: Arc<dyn LedgerStore>, prices: PriceTable) -> Self {
        Self { store, prices }
    }

    /// Validate a new-order payload into its disposition.
    ///
    /// Shape failures reject immediately. BUY orders must cover price × qty
    /// in cash; SELL orders must already hold the quantity offered. The
    /// balance read here is not serialized against settlement writes, so
    /// two in-flight orders from one user can both pass before either
    /// settles.
    ///
    /// Errors only on store unavailability — the caller must then leave the
    /// message unacknowledged.
    pub async fn validate(&self, order: &NewOrder) -> Result<Disposition, StoreError> {
        let checked = match validator::shape_check(order, &self.prices) {
            Ok(checked) => checked,
            Err(reason) => return Ok(reject(order, reason)),
        };

        match checked.side {
            Side::BUY => {
                // The symbol passed the allow-list, so the table prices it.
                let Some(price) = self.prices.price(&checked.symbol) else {
                    return Ok(reject(order, RejectReason::SymbolNotAllowed));
                };
                let needed = price * Decimal::from(checked.qty);
                let cash = self.store.cash_balance(&checked.user_id).await?;
                debug!(
                    order_id = %checked.order_id,
                    user_id = %checked.user_id,
                    %needed,
                    %cash,
                    "funds check"
                );
                if cash < needed {
                    return Ok(reject(order, RejectReason::InsufficientFunds { needed, cash }));
                }
            }
            Side::SELL => {
                let have = self
                    .store
                    .position(&checked.user_id, &checked.symbol)
                    .await?;
                let needed = i64::from(checked.qty);
                debug!(
                    order_id = %checked.order_id,
                    user_id = %checked.user_id,
                    have,
                    needed,
                    "holdings check"
                );
                if have < needed {
                    return Ok(reject(order, RejectReason::InsufficientShares { have, needed }));
                }
            }
        }

        Ok(Disposition::Accepted(OrderAccepted {
            order_id: checked.order_id,
            symbol: checked.symbol,
            qty: checked.qty,
            side: checked.side,
            user_id: checked.user_id,
        }))
    }
}

fn reject(order: &NewOrder, reason: RejectReason) -> Disposition {
    Disposition::Rejected(OrderRejected {
        order_id: Some(order.order_id.clone()),
        reason,
    })
}
