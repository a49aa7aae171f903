//! Settlement write sets
//!
//! A [`SettlementPlan`] is the full set of writes for settling one trade:
//! the trade row plus one leg per counterparty. Each leg's increment is
//! guarded by the (trade_id, user) ledger key — the insert-if-absent on that
//! key is the idempotence guard, independent of the trade-row insert.

use rust_decimal::Decimal;
use types::ids::UserId;
use types::messages::TradeFill;

/// One account's share of a settlement. Applied only when the
/// (trade_id, user) ledger key is not yet present.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementLeg {
    pub user_id: UserId,
    pub delta_cash: Decimal,
    pub delta_qty: i64,
}

/// Full write set for settling one trade. All writes commit together or
/// not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementPlan {
    pub trade: TradeFill,
    pub buyer: SettlementLeg,
    pub seller: SettlementLeg,
}

/// Post-commit balances of both counterparties, reported for observability
/// only — never used for control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReceipt {
    pub buyer_cash_after: Decimal,
    pub buyer_pos_after: i64,
    pub seller_cash_after: Decimal,
    pub seller_pos_after: i64,
}
