//! Validated order type
//!
//! An [`Order`] only exists after the risk validator's shape checks have
//! passed: its symbol is in the allowed trading set, its side is recognized,
//! and its quantity is within bounds. Terminal once a disposition is emitted.

use crate::ids::{OrderId, Symbol, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Order side (buyer or seller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    BUY,
    SELL,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

/// Error returned when parsing an unrecognized side string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized side: {0}")]
pub struct ParseSideError(pub String);

impl FromStr for Side {
    type Err = ParseSideError;

    /// Case-insensitive parse: "buy", "BUY" and "Buy" all resolve to BUY.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::BUY),
            "SELL" => Ok(Side::SELL),
            other => Err(ParseSideError(other.to_string())),
        }
    }
}

/// A fully validated order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: u32,
}
