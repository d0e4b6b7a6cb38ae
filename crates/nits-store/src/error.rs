//! # Store Errors

use thiserror::Error;

/// Error returned by every store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The key is absent from the named collection.
    #[error("{collection}/{key} not found")]
    NotFound { collection: String, key: String },

    /// The key cannot be used as a storage key.
    #[error("invalid store key {0:?}")]
    InvalidKey(String),

    /// Two collections were configured with the same name.
    #[error("collection name {0:?} is used more than once")]
    DuplicateCollection(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(collection: &str, key: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
