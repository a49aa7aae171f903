//! Wire message schemas
//!
//! Every message on the fabric is JSON with an internally tagged `type`
//! field, one tag per schema version: `order.v1`, `order_accepted.v1`,
//! `order_rejected.v1`, `trade_fill.v1`. The new-order payload is loosely
//! typed on purpose: policy violations (unknown symbol, bad side, fractional
//! qty) must surface as enumerated reject reasons, not decode errors.

use crate::ids::{OrderId, Symbol, TradeId, UserId};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Any message published or consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "order.v1")]
    NewOrder(NewOrder),
    #[serde(rename = "order_accepted.v1")]
    OrderAccepted(OrderAccepted),
    #[serde(rename = "order_rejected.v1")]
    OrderRejected(OrderRejected),
    #[serde(rename = "trade_fill.v1")]
    TradeFill(TradeFill),
}

impl Event {
    /// Decode a JSON payload into a typed event.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode for publication.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Best-effort order-id extraction from an arbitrary payload, used to keep
/// an id on rejections of messages that never decoded.
pub fn salvage_order_id(bytes: &[u8]) -> Option<OrderId> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()?
        .get("order_id")?
        .as_str()
        .map(OrderId::from_string)
}

/// `order.v1` — intake payload, not yet validated.
///
/// `symbol`, `side` and `qty` are loose so the validator can map every
/// malformed value to its reject reason; `order_id` and `user_id` are typed
/// because nothing downstream can be done without them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub qty: serde_json::Value,
}

/// `order_accepted.v1` — validated order forwarded to matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub qty: u32,
    pub side: Side,
    pub user_id: UserId,
}

/// `order_rejected.v1` — terminal rejection with an enumerated reason.
///
/// `order_id` is absent only when the offending payload carried none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub order_id: Option<OrderId>,
    #[serde(flatten)]
    pub reason: RejectReason,
}

/// Enumerated rejection reasons, with their wire codes and any
/// reason-specific diagnostic fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    BadType,
    SymbolNotAllowed,
    BadSide,
    BadQty,
    InsufficientFunds { needed: Decimal, cash: Decimal },
    InsufficientShares { have: i64, needed: i64 },
}

impl RejectReason {
    /// Wire code of this reason, for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::BadType => "bad_type",
            RejectReason::SymbolNotAllowed => "symbol_not_allowed",
            RejectReason::BadSide => "bad_side",
            RejectReason::BadQty => "bad_qty",
            RejectReason::InsufficientFunds { .. } => "insufficient_funds",
            RejectReason::InsufficientShares { .. } => "insufficient_shares",
        }
    }
}

/// `trade_fill.v1` — matched fill, broadcast to every settlement-side
/// subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFill {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub qty: u32,
    pub price: Decimal,
    pub buy_user: UserId,
    pub sell_user: UserId,
}

impl TradeFill {
    /// Gross cash value of the fill (price × qty).
    pub fn gross(&self) -> Decimal {
        self.price * Decimal::from(self.qty)
    }
}

/// Outcome of risk validation. Exactly one disposition is published per
/// consumed order.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Accepted(OrderAccepted),
    Rejected(OrderRejected),
}

impl Disposition {
    /// Routing key on the disposition exchange.
    pub fn routing_key(&self) -> &'static str {
        match self {
            Disposition::Accepted(_) => crate::topology::RK_ACCEPTED,
            Disposition::Rejected(_) => crate::topology::RK_REJECTED,
        }
    }

    /// Convert into the wire event to publish.
    pub fn into_event(self) -> Event {
        match self {
            Disposition::Accepted(accepted) => Event::OrderAccepted(accepted),
            Disposition::Rejected(rejected) => Event::OrderRejected(rejected),
        }
    }
}

/// Message codec failure (malformed JSON or unknown schema tag).
#[derive(Debug, Error)]
#[error("message codec failure: {0}")]
pub struct CodecError(#[from] serde_json::Error);
