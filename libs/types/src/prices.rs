//! Static reference price table
//!
//! Stands in for real price discovery: every fill executes at the table
//! price, and the allowed trading set is exactly the table's key set. Risk
//! and matching must share one table — the funds check and the fill price
//! have to agree for settlement arithmetic to balance.

use crate::ids::Symbol;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Symbol → reference price lookup.
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<Symbol, Decimal>,
}

impl PriceTable {
    pub fn new(prices: HashMap<Symbol, Decimal>) -> Self {
        Self { prices }
    }

    /// Reference price for a symbol, if configured.
    pub fn price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    /// Whether the symbol is in the allowed trading set.
    pub fn is_allowed(&self, symbol: &Symbol) -> bool {
        self.prices.contains_key(symbol)
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        let table: [(&str, i64); 10] = [
            ("AAPL", 225),
            ("MSFT", 415),
            ("GOOG", 168),
            ("AMZN", 185),
            ("META", 510),
            ("NVDA", 115),
            ("TSLA", 205),
            ("NFLX", 620),
            ("AVGO", 1720),
            ("AMD", 155),
        ];
        Self {
            prices: table
                .into_iter()
                .map(|(symbol, price)| (Symbol::new(symbol), Decimal::from(price)))
                .collect(),
        }
    }
}
