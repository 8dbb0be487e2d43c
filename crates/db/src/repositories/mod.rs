use capquote_core::errors::ApplicationError;
use thiserror::Error;

pub mod conversation_state;
pub mod price_tables;

pub use conversation_state::SqlQuoteStateStore;
pub use price_tables::SqlPriceTableProvider;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}
