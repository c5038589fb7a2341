use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, PublishError>;
