//! Loyalty stamp cards: the stamp ledger, phone canonicalization and the
//! stamp service.

mod entity;
mod phone;
mod service;

use common::CardId;
use thiserror::Error;

pub use entity::{CardSummary, Stamp, StampCard, DEFAULT_STAMPS_REQUIRED};
pub use phone::{DefaultPhoneNormalizer, PhoneError, PhoneNormalizer, PhoneNumber};
pub use service::{RegisterCard, StampService};

/// Errors from stamp-card operations.
#[derive(Debug, Error)]
pub enum StampError {
    /// The card was soft-deleted; its ledger is frozen.
    #[error("Stamp card {0} is deleted")]
    CardDeleted(CardId),

    /// Undo was requested but every stamp is already deleted (or none exist).
    #[error("Stamp card {0} has no stamp to undo")]
    NothingToUndo(CardId),

    /// A claim asked for more stamps than the card holds.
    #[error("Claim of {requested} stamps requested, only {available} available")]
    InsufficientStamps { available: u32, requested: u32 },

    /// A claim must spend at least one stamp.
    #[error("Claim count must be positive")]
    InvalidClaimCount,
}
