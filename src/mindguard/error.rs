use thiserror::Error;

use crate::mindguard::database::DatabaseError;
use crate::mindguard::messages::ValidationError;
use crate::mindguard::store::StoreError;

pub type Result<T> = core::result::Result<T, MindguardError>;

#[derive(Error, Debug)]
pub enum MindguardError {
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Invalid message: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl MindguardError {
    /// Whether retrying the same operation can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, MindguardError::Store(StoreError::Transient(_)))
    }
}
