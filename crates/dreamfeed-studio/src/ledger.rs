//! Collaborator seam for the points ledger.

use async_trait::async_trait;
use thiserror::Error;

use dreamfeed_core::UserId;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient balance: {required} points required, {available} available")]
    InsufficientBalance { required: i64, available: i64 },
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// External billing ledger. Deduction happens before generation starts and is
/// final; refunds are the embedding application's concern.
#[async_trait]
pub trait PointsLedger: Send + Sync {
    async fn deduct(&self, owner: &UserId, amount: i64, reason: &str)
        -> Result<(), LedgerError>;
}
