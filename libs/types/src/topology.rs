//! Routing topology shared by every stage
//!
//! New orders flow over a direct exchange, dispositions over a second
//! direct exchange keyed accepted/rejected, and trade fills over a fanout
//! exchange so any number of settlement-side consumers can subscribe.
//! Workers declare the pieces they use at startup; declarations are
//! idempotent.

/// Direct exchange carrying intake orders (routing key [`RK_NEW`]).
pub const ORDERS_EXCHANGE: &str = "orders.direct";

/// Direct exchange carrying dispositions, keyed [`RK_ACCEPTED`] /
/// [`RK_REJECTED`].
pub const EVENTS_EXCHANGE: &str = "orders.events";

/// Fanout exchange broadcasting trade fills to all bound queues.
pub const TRADES_EXCHANGE: &str = "trades.fanout";

/// Queue of orders awaiting risk validation.
pub const NEW_ORDERS_QUEUE: &str = "orders.new";

/// Queue of accepted orders awaiting matching.
pub const ACCEPTED_QUEUE: &str = "orders.accepted";

/// Queue of rejected-order notices.
pub const REJECTED_QUEUE: &str = "orders.rejected";

/// Queue of trade fills awaiting settlement.
pub const SETTLE_QUEUE: &str = "trades.to_settle";

pub const RK_NEW: &str = "new";
pub const RK_ACCEPTED: &str = "accepted";
pub const RK_REJECTED: &str = "rejected";
