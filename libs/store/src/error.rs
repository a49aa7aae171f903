//! Store error taxonomy

use thiserror::Error;

/// Failures surfaced by the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backing storage is unreachable. The caller must leave its message
    /// unacknowledged so the fabric redelivers it once storage returns.
    #[error("ledger store unavailable")]
    Unavailable,
}
