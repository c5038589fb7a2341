use thiserror::Error;

use crate::ledger::LedgerError;
use crate::posts::PostStoreError;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("Invalid action data: {0}")]
    BadActionData(String),
    #[error("Points ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Generation failed: {0}")]
    Generation(String),
    #[error("Generation failed or timed out before completion")]
    GenerationFailedOrTimedOut,
    #[error("Post store: {0}")]
    PostStore(#[from] PostStoreError),
    #[error("Post not found: {id}")]
    MissingPost { id: String },
    #[error("Publish failed: {0}")]
    Publish(String),
}

pub type Result<T> = std::result::Result<T, StudioError>;
