//! Order shape validation
//!
//! Policy checks that need no store access, applied before any balance
//! read. Checks run in order and short-circuit on the first failure, so a
//! caller always sees the earliest reason an order is unacceptable.

use types::ids::Symbol;
use types::messages::{NewOrder, RejectReason};
use types::order::{Order, Side};
use types::prices::PriceTable;

/// Smallest order quantity the exchange accepts.
pub const QTY_MIN: i64 = 1;
/// Largest order quantity the exchange accepts.
pub const QTY_MAX: i64 = 100;

/// Validate an `order.v1` payload into a well-formed [`Order`].
///
/// Checks, in order: symbol in the allowed trading set, side recognized
/// (case-insensitive), qty an integer in [[`QTY_MIN`], [`QTY_MAX`]].
pub fn shape_check(order: &NewOrder, prices: &PriceTable) -> Result<Order, RejectReason> {
    let symbol = Symbol::new(&order.symbol);
    if !prices.is_allowed(&symbol) {
        return Err(RejectReason::SymbolNotAllowed);
    }

    let side: Side = order.side.parse().map_err(|_| RejectReason::BadSide)?;

    let qty = match order.qty.as_i64() {
        Some(qty) if (QTY_MIN..=QTY_MAX).contains(&qty) => qty as u32,
        _ => return Err(RejectReason::BadQty),
    };

    Ok(Order {
        order_id: order.order_id.clone(),
        user_id: order.user_id.clone(),
        symbol,
        side,
        qty,
    })
}
