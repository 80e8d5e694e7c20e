//! Display-id allocation.
//!
//! Display ids are short 4-digit labels drawn at random so consecutive orders
//! do not reveal order volume. The allocator only pre-checks candidates; the
//! store's unique constraint is the real guard, so callers retry the
//! allocate-and-insert pair as a unit on [`StoreError::DuplicateDisplayId`].

use chrono::Utc;
use rand::Rng;

use crate::store::{OrderStore, Result};

use super::DisplayId;

/// How many random candidates are tried before falling back.
pub const ALLOCATION_ATTEMPTS: usize = 50;

/// Picks a display id not currently carried by any existing order.
///
/// Draws up to [`ALLOCATION_ATTEMPTS`] random candidates from the 4-digit
/// window and returns the first free one. If every draw collides, returns the
/// time-derived fallback without a free-check; the insert's unique constraint
/// then has the final say.
pub async fn allocate_display_id<S: OrderStore + ?Sized>(store: &S) -> Result<DisplayId> {
    for _ in 0..ALLOCATION_ATTEMPTS {
        let candidate = {
            let mut rng = rand::thread_rng();
            DisplayId::from_raw(rng.gen_range(DisplayId::MIN..=DisplayId::MAX))
        };
        if !store.display_id_exists(candidate).await? {
            return Ok(candidate);
        }
    }
    Ok(fallback_display_id())
}

/// Derives a display id from the current time, coerced into the 4-digit
/// window. Used when random allocation keeps colliding.
pub fn fallback_display_id() -> DisplayId {
    DisplayId::coerced((Utc::now().timestamp_millis() % 10_000) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Contact, Money, Order, OrderItem};
    use crate::store::InMemoryStore;
    use common::{LocationId, OrderId};

    fn order_with_display_id(display_id: DisplayId) -> Order {
        Order::place(
            OrderId::new(),
            LocationId::new(),
            display_id,
            vec![OrderItem::new("coffee", "Coffee", 1, Money::from_cents(350))],
            Contact::none(),
        )
    }

    #[tokio::test]
    async fn allocates_in_range() {
        let store = InMemoryStore::new();
        let id = allocate_display_id(&store).await.unwrap();
        assert!(id.is_in_range());
    }

    #[tokio::test]
    async fn avoids_existing_ids() {
        let store = InMemoryStore::new();
        let taken = DisplayId::from_raw(4321);
        store
            .insert_order(&order_with_display_id(taken))
            .await
            .unwrap();

        for _ in 0..20 {
            let id = allocate_display_id(&store).await.unwrap();
            assert_ne!(id, taken);
        }
    }

    #[test]
    fn fallback_is_in_range() {
        assert!(fallback_display_id().is_in_range());
    }
}
