//! Fixed-counterparty matcher
//!
//! There is no order book: every accepted order fills in full against the
//! market maker at the symbol's reference price. The trade id derives from
//! the order id, so redelivering an accepted order reproduces the same
//! trade identity and downstream settlement converges instead of
//! double-booking.

use thiserror::Error;

use types::ids::{Symbol, TradeId, UserId};
use types::messages::{OrderAccepted, TradeFill};
use types::order::Side;
use types::prices::PriceTable;

/// Matching failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// No reference price configured for the symbol. A configuration
    /// fault, not bad input — there is no valid fill to emit, so the
    /// delivery must be requeued rather than acknowledged and dropped.
    #[error("no reference price configured for {symbol}")]
    NoReferencePrice { symbol: Symbol },
}

/// Deterministic matcher against a fixed market-maker counterparty.
pub struct MatchingEngine {
    prices: PriceTable,
    market_maker: UserId,
}

impl MatchingEngine {
    pub fn new(prices: PriceTable, market_maker: UserId) -> Self {
        Self {
            prices,
            market_maker,
        }
    }

    /// Match an accepted order into a trade fill.
    ///
    /// BUY orders buy from the market maker; SELL orders sell to it.
    pub fn match_order(&self, accepted: &OrderAccepted) -> Result<TradeFill, MatchError> {
        let price = self
            .prices
            .price(&accepted.symbol)
            .ok_or_else(|| MatchError::NoReferencePrice {
                symbol: accepted.symbol.clone(),
            })?;

        let (buy_user, sell_user) = match accepted.side {
            Side::BUY => (accepted.user_id.clone(), self.market_maker.clone()),
            Side::SELL => (self.market_maker.clone(), accepted.user_id.clone()),
        };

        Ok(TradeFill {
            trade_id: TradeId::for_order(&accepted.order_id),
            symbol: accepted.symbol.clone(),
            qty: accepted.qty,
            price,
            buy_user,
            sell_user,
        })
    }
}
