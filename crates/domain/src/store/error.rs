use common::{CardId, OrderId};
use thiserror::Error;

use crate::order::DisplayId;
use crate::store::Version;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A compare-and-set update lost a race with a concurrent writer.
    /// Retryable: reload and re-apply the operation.
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// Another live order already carries this display id. The caller retries
    /// allocation and insert as a unit.
    #[error("Display id {0} is already taken")]
    DuplicateDisplayId(DisplayId),

    /// A non-deleted card already exists for this (location, phone) pair.
    #[error("A stamp card already exists for this phone number at this location")]
    DuplicateCard,

    /// The order referenced by an update does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The card referenced by an update does not exist.
    #[error("Card not found: {0}")]
    CardNotFound(CardId),

    /// The storage backend failed.
    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Wraps a backend-specific error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
