//! Store ports for persisted order and stamp state.
//!
//! The persisted store is the single source of truth; services never hold
//! authoritative mutable state in memory. Mutations go through expected-version
//! compare-and-set so that two concurrent writers cannot both succeed.

pub mod error;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CardId, LocationId, OrderId, StampId};
use serde::{Deserialize, Serialize};

use crate::order::{DisplayId, Order};
use crate::stamps::{PhoneNumber, Stamp, StampCard};

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;

/// Version number of a mutable record, used for optimistic concurrency control.
///
/// Versions start at 1 when a record is inserted and increment by 1 on each
/// successful update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version a freshly inserted record carries.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Persistence port for orders.
///
/// Implementations must be thread-safe and must enforce the display-id unique
/// constraint at commit time, not merely at check time.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order together with its items, atomically.
    ///
    /// Fails with [`StoreError::DuplicateDisplayId`] when another live order
    /// already carries the same display id.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Loads an order by its internal id, items included.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Returns true when any existing order carries the given display id.
    async fn display_id_exists(&self, display_id: DisplayId) -> Result<bool>;

    /// Persists a mutated order if its stored version still equals `expected`.
    ///
    /// Items are immutable after insertion and are not written here. Returns
    /// the new version on success; fails with
    /// [`StoreError::ConcurrencyConflict`] when the record moved underneath
    /// the caller.
    async fn update_order(&self, order: &Order, expected: Version) -> Result<Version>;

    /// Lists orders for one merchant location, most recent first.
    async fn orders_for_location(&self, location_id: LocationId) -> Result<Vec<Order>>;
}

/// Persistence port for loyalty stamp cards and their stamps.
#[async_trait]
pub trait StampStore: Send + Sync {
    /// Inserts a new card.
    ///
    /// Fails with [`StoreError::DuplicateCard`] when a non-deleted card
    /// already exists for the same (location, canonical phone) pair.
    async fn insert_card(&self, card: &StampCard) -> Result<()>;

    /// Loads a card by id, whether soft-deleted or not.
    async fn get_card(&self, id: CardId) -> Result<Option<StampCard>>;

    /// Finds the non-deleted card for a (location, canonical phone) pair.
    async fn find_card_by_phone(
        &self,
        location_id: LocationId,
        phone: &PhoneNumber,
    ) -> Result<Option<StampCard>>;

    /// Persists card attribute changes (name, deletion flag) under CAS.
    async fn update_card(&self, card: &StampCard, expected: Version) -> Result<Version>;

    /// Lists non-deleted cards for a location.
    async fn cards_for_location(&self, location_id: LocationId) -> Result<Vec<StampCard>>;

    /// Appends one stamp to a card's ledger.
    async fn insert_stamp(&self, stamp: &Stamp) -> Result<()>;

    /// Returns every stamp of a card, deleted entries included, in creation
    /// order (oldest first).
    async fn stamps_for_card(&self, card_id: CardId) -> Result<Vec<Stamp>>;

    /// Marks the given stamps claimed in one atomic batch, guarded by the
    /// card's version.
    ///
    /// Every listed stamp must still be unclaimed and non-deleted; otherwise
    /// the whole batch fails with [`StoreError::ConcurrencyConflict`] and no
    /// stamp is touched. Returns the card's new version.
    async fn mark_stamps_claimed(
        &self,
        card_id: CardId,
        expected: Version,
        stamp_ids: &[StampId],
        claimed_at: DateTime<Utc>,
    ) -> Result<Version>;

    /// Soft-deletes a single stamp, guarded by the card's version.
    ///
    /// The stamp must still be non-deleted; returns the card's new version.
    async fn soft_delete_stamp(
        &self,
        card_id: CardId,
        expected: Version,
        stamp_id: StampId,
    ) -> Result<Version>;
}
