//! Stamp card and stamp records.

use chrono::{DateTime, Utc};
use common::{CardId, LocationId, StampId};
use serde::{Deserialize, Serialize};

use crate::store::Version;

use super::PhoneNumber;

/// Default number of stamps needed for one reward.
pub const DEFAULT_STAMPS_REQUIRED: u32 = 10;

/// A customer's loyalty card at one merchant location.
///
/// At most one non-deleted card may exist per (location, canonical phone)
/// pair. Progress counters are not stored here; they are derived on read
/// from the stamp ledger (see [`CardSummary`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampCard {
    pub id: CardId,
    pub location_id: LocationId,

    /// Canonical phone number identifying the customer at this location.
    pub phone: PhoneNumber,

    /// Card holder's first name, as the merchant entered it.
    pub first_name: String,

    /// Stamps needed for one reward.
    pub stamps_required: u32,

    /// Soft-deletion flag; deleted cards stay in the store for audit.
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,

    /// Record version for optimistic concurrency. Every stamp mutation bumps
    /// it, so the card version guards the whole ledger.
    pub version: Version,
}

impl StampCard {
    /// Builds a fresh card with the default reward threshold.
    pub fn register(
        id: CardId,
        location_id: LocationId,
        phone: PhoneNumber,
        first_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            location_id,
            phone,
            first_name: first_name.into(),
            stamps_required: DEFAULT_STAMPS_REQUIRED,
            is_deleted: false,
            created_at: Utc::now(),
            version: Version::default(),
        }
    }
}

/// One entry in a card's stamp ledger.
///
/// Stamps are append-only: claiming marks them, undo soft-deletes them,
/// nothing is ever physically removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: StampId,
    pub card_id: CardId,
    pub created_at: DateTime<Utc>,

    /// Set when the stamp was spent on a reward.
    pub claimed_at: Option<DateTime<Utc>>,

    /// Set when the stamp was undone by the merchant.
    pub is_deleted: bool,
}

impl Stamp {
    /// Appends a fresh stamp for a card.
    pub fn new(card_id: CardId) -> Self {
        Self {
            id: StampId::new(),
            card_id,
            created_at: Utc::now(),
            claimed_at: None,
            is_deleted: false,
        }
    }

    /// Returns true while the stamp counts toward the next reward.
    pub fn is_active(&self) -> bool {
        !self.is_deleted && self.claimed_at.is_none()
    }
}

/// Read-model of a card with its counters derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSummary {
    pub card_id: CardId,
    pub location_id: LocationId,
    pub phone: PhoneNumber,
    pub first_name: String,
    pub stamps_required: u32,

    /// All non-deleted stamps, claimed or not.
    pub total_stamps: u32,

    /// Unclaimed, non-deleted stamps counting toward the next reward.
    pub active_stamps: u32,

    /// Stamps spent on rewards.
    pub claimed_stamps: u32,

    /// True when a full reward's worth of active stamps is available.
    pub can_claim: bool,
}

impl CardSummary {
    /// Derives the summary from a card and its full ledger.
    pub fn derive(card: &StampCard, stamps: &[Stamp]) -> Self {
        let active_stamps = stamps.iter().filter(|s| s.is_active()).count() as u32;
        let claimed_stamps = stamps
            .iter()
            .filter(|s| !s.is_deleted && s.claimed_at.is_some())
            .count() as u32;
        Self {
            card_id: card.id,
            location_id: card.location_id,
            phone: card.phone.clone(),
            first_name: card.first_name.clone(),
            stamps_required: card.stamps_required,
            total_stamps: active_stamps + claimed_stamps,
            active_stamps,
            claimed_stamps,
            can_claim: active_stamps >= card.stamps_required,
        }
    }
}
