//! Domain error types.

use thiserror::Error;

use crate::order::OrderError;
use crate::stamps::{PhoneError, StampError};
use crate::store::StoreError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the store layer.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An order operation was rejected.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A stamp ledger operation was rejected.
    #[error("Stamp error: {0}")]
    Stamp(#[from] StampError),

    /// A phone number could not be normalized.
    #[error("Phone error: {0}")]
    Phone(#[from] PhoneError),

    /// Entity not found.
    #[error("Not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },
}

impl DomainError {
    /// Returns true when the failure is a concurrent-update conflict the
    /// caller may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::Store(StoreError::ConcurrencyConflict { .. })
        )
    }
}
