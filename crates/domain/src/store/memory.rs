//! In-memory store for tests and local development.
//!
//! Enforces the same constraints as the Postgres store: display-id
//! uniqueness, one non-deleted card per (location, phone), and
//! expected-version compare-and-set on every update.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CardId, LocationId, OrderId, StampId};
use tokio::sync::RwLock;

use crate::order::{DisplayId, Order};
use crate::stamps::{PhoneNumber, Stamp, StampCard};

use super::{OrderStore, Result, StampStore, StoreError, Version};

#[derive(Debug, Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    cards: HashMap<CardId, StampCard>,
    stamps: HashMap<CardId, Vec<Stamp>>,
}

/// Thread-safe in-memory implementation of [`OrderStore`] and [`StampStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders. Test helper.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .orders
            .values()
            .any(|o| o.display_id == order.display_id)
        {
            return Err(StoreError::DuplicateDisplayId(order.display_id));
        }
        let mut stored = order.clone();
        stored.version = Version::first();
        inner.orders.insert(stored.id, stored);
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn display_id_exists(&self, display_id: DisplayId) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .await
            .orders
            .values()
            .any(|o| o.display_id == display_id))
    }

    async fn update_order(&self, order: &Order, expected: Version) -> Result<Version> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::OrderNotFound(order.id))?;
        if stored.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: "order",
                id: order.id.to_string(),
                expected,
                actual: stored.version,
            });
        }
        let next = expected.next();
        // Items are immutable; carry the stored ones through.
        let items = std::mem::take(&mut stored.items);
        *stored = order.clone();
        stored.items = items;
        stored.version = next;
        Ok(next)
    }

    async fn orders_for_location(&self, location_id: LocationId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.location_id == location_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl StampStore for InMemoryStore {
    async fn insert_card(&self, card: &StampCard) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .cards
            .values()
            .any(|c| !c.is_deleted && c.location_id == card.location_id && c.phone == card.phone)
        {
            return Err(StoreError::DuplicateCard);
        }
        let mut stored = card.clone();
        stored.version = Version::first();
        inner.stamps.entry(stored.id).or_default();
        inner.cards.insert(stored.id, stored);
        Ok(())
    }

    async fn get_card(&self, id: CardId) -> Result<Option<StampCard>> {
        Ok(self.inner.read().await.cards.get(&id).cloned())
    }

    async fn find_card_by_phone(
        &self,
        location_id: LocationId,
        phone: &PhoneNumber,
    ) -> Result<Option<StampCard>> {
        Ok(self
            .inner
            .read()
            .await
            .cards
            .values()
            .find(|c| !c.is_deleted && c.location_id == location_id && c.phone == *phone)
            .cloned())
    }

    async fn update_card(&self, card: &StampCard, expected: Version) -> Result<Version> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .cards
            .get_mut(&card.id)
            .ok_or(StoreError::CardNotFound(card.id))?;
        if stored.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: "stamp card",
                id: card.id.to_string(),
                expected,
                actual: stored.version,
            });
        }
        let next = expected.next();
        *stored = card.clone();
        stored.version = next;
        Ok(next)
    }

    async fn cards_for_location(&self, location_id: LocationId) -> Result<Vec<StampCard>> {
        let inner = self.inner.read().await;
        let mut cards: Vec<StampCard> = inner
            .cards
            .values()
            .filter(|c| !c.is_deleted && c.location_id == location_id)
            .cloned()
            .collect();
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(cards)
    }

    async fn insert_stamp(&self, stamp: &Stamp) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.cards.contains_key(&stamp.card_id) {
            return Err(StoreError::CardNotFound(stamp.card_id));
        }
        inner
            .stamps
            .entry(stamp.card_id)
            .or_default()
            .push(stamp.clone());
        Ok(())
    }

    async fn stamps_for_card(&self, card_id: CardId) -> Result<Vec<Stamp>> {
        Ok(self
            .inner
            .read()
            .await
            .stamps
            .get(&card_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_stamps_claimed(
        &self,
        card_id: CardId,
        expected: Version,
        stamp_ids: &[StampId],
        claimed_at: DateTime<Utc>,
    ) -> Result<Version> {
        let mut inner = self.inner.write().await;
        let card = inner
            .cards
            .get(&card_id)
            .ok_or(StoreError::CardNotFound(card_id))?;
        if card.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: "stamp card",
                id: card_id.to_string(),
                expected,
                actual: card.version,
            });
        }

        // All-or-nothing: verify the whole batch before touching anything.
        let stamps = inner.stamps.get(&card_id).map(Vec::as_slice).unwrap_or(&[]);
        for stamp_id in stamp_ids {
            let ok = stamps.iter().any(|s| s.id == *stamp_id && s.is_active());
            if !ok {
                return Err(StoreError::ConcurrencyConflict {
                    entity: "stamp card",
                    id: card_id.to_string(),
                    expected,
                    actual: expected,
                });
            }
        }

        let next = expected.next();
        if let Some(stamps) = inner.stamps.get_mut(&card_id) {
            for stamp in stamps.iter_mut() {
                if stamp_ids.contains(&stamp.id) {
                    stamp.claimed_at = Some(claimed_at);
                }
            }
        }
        if let Some(card) = inner.cards.get_mut(&card_id) {
            card.version = next;
        }
        Ok(next)
    }

    async fn soft_delete_stamp(
        &self,
        card_id: CardId,
        expected: Version,
        stamp_id: StampId,
    ) -> Result<Version> {
        let mut inner = self.inner.write().await;
        let card = inner
            .cards
            .get(&card_id)
            .ok_or(StoreError::CardNotFound(card_id))?;
        if card.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: "stamp card",
                id: card_id.to_string(),
                expected,
                actual: card.version,
            });
        }

        let stamps = inner.stamps.get(&card_id).map(Vec::as_slice).unwrap_or(&[]);
        if !stamps.iter().any(|s| s.id == stamp_id && !s.is_deleted) {
            return Err(StoreError::ConcurrencyConflict {
                entity: "stamp card",
                id: card_id.to_string(),
                expected,
                actual: expected,
            });
        }

        let next = expected.next();
        if let Some(stamps) = inner.stamps.get_mut(&card_id) {
            if let Some(stamp) = stamps.iter_mut().find(|s| s.id == stamp_id) {
                stamp.is_deleted = true;
            }
        }
        if let Some(card) = inner.cards.get_mut(&card_id) {
            card.version = next;
        }
        Ok(next)
    }
}
