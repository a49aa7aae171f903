//! Fabric error taxonomy

use thiserror::Error;

/// Errors surfaced by the message fabric.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FabricError {
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    #[error("exchange {name} already declared with a different kind")]
    ExchangeKindMismatch { name: String },

    #[error("unknown delivery tag: {0}")]
    UnknownDeliveryTag(u64),

    #[error("consumer exceeded its in-flight limit of {limit}")]
    PrefetchExceeded { limit: usize },

    #[error("fabric is closed")]
    Closed,
}
