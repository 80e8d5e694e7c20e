//! End-to-end order lifecycle tests against the in-memory store.

use std::collections::HashSet;
use std::sync::Arc;

use domain::{
    Contact, InMemoryNotifier, InMemoryStore, Money, NewOrderItem, OrderService, OrderStatus,
    PaymentStatus, PlaceOrder, RecordAuthorization, UpdateStatus,
};
use common::LocationId;

fn service() -> (
    OrderService<InMemoryStore, InMemoryNotifier>,
    Arc<InMemoryStore>,
    Arc<InMemoryNotifier>,
) {
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(InMemoryNotifier::new());
    (
        OrderService::new(Arc::clone(&store), Arc::clone(&notifier)),
        store,
        notifier,
    )
}

fn pizza_and_coffee(location_id: LocationId) -> PlaceOrder {
    PlaceOrder {
        location_id,
        items: vec![
            NewOrderItem {
                product_id: "margherita".into(),
                product_name: "Margherita".to_string(),
                quantity: 1,
                unit_price: Money::from_cents(1400),
                options_total: Money::from_cents(100),
            },
            NewOrderItem {
                product_id: "coffee".into(),
                product_name: "Coffee".to_string(),
                quantity: 2,
                unit_price: Money::from_cents(250),
                options_total: Money::zero(),
            },
        ],
        contact: Contact::email("asiakas@example.fi"),
    }
}

#[tokio::test]
async fn full_pickup_lifecycle_notifies_at_the_right_points() {
    let (service, _, notifier) = service();
    let location = LocationId::new();

    let order = service.place_order(pizza_and_coffee(location)).await.unwrap();
    assert_eq!(order.total_amount.cents(), 2000);
    assert_eq!(order.status, OrderStatus::Placed);

    for status in [
        OrderStatus::Accepted,
        OrderStatus::Processing,
        OrderStatus::ReadyForPickup,
        OrderStatus::Fulfilled,
    ] {
        let updated = service
            .update_status(UpdateStatus {
                order_id: order.id,
                status,
            })
            .await
            .unwrap();
        assert_eq!(updated.status, status);
    }

    // Accepted and ReadyForPickup notify; Processing and Fulfilled do not.
    // Dispatch is detached, so give the spawned tasks a moment.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let sent: Vec<OrderStatus> = notifier.sent().iter().map(|s| s.snapshot.status).collect();
    assert_eq!(sent, vec![OrderStatus::Accepted, OrderStatus::ReadyForPickup]);
}

#[tokio::test]
async fn rejection_is_terminal() {
    let (service, _, notifier) = service();
    let order = service
        .place_order(pizza_and_coffee(LocationId::new()))
        .await
        .unwrap();

    service
        .update_status(UpdateStatus {
            order_id: order.id,
            status: OrderStatus::Rejected,
        })
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(notifier.sent_count(), 1);

    for status in [OrderStatus::Accepted, OrderStatus::Processing] {
        assert!(service
            .update_status(UpdateStatus {
                order_id: order.id,
                status,
            })
            .await
            .is_err());
    }
}

#[tokio::test]
async fn display_ids_are_unique_across_orders() {
    let (service, _, _) = service();
    let location = LocationId::new();

    let mut seen = HashSet::new();
    for _ in 0..50 {
        let order = service.place_order(pizza_and_coffee(location)).await.unwrap();
        assert!(order.display_id.is_in_range());
        assert!(seen.insert(order.display_id), "display id allocated twice");
    }
}

#[tokio::test]
async fn orders_listed_most_recent_first() {
    let (service, _, _) = service();
    let location = LocationId::new();

    let mut placed = Vec::new();
    for _ in 0..3 {
        placed.push(service.place_order(pizza_and_coffee(location)).await.unwrap());
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let listed = service.orders_for_location(location).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].id, placed[2].id);
    assert_eq!(listed[2].id, placed[0].id);

    // Another location sees nothing.
    let other = service
        .orders_for_location(LocationId::new())
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn authorization_then_failure_frees_nothing_but_payment() {
    let (service, _, _) = service();
    let order = service
        .place_order(pizza_and_coffee(LocationId::new()))
        .await
        .unwrap();

    service
        .record_authorization(RecordAuthorization {
            order_id: order.id,
            payment_intent: "pi_1".to_string(),
        })
        .await
        .unwrap();

    let failed = service.mark_payment_failed(order.id).await.unwrap();
    assert_eq!(failed.payment_status, PaymentStatus::Failed);
    assert_eq!(failed.status, OrderStatus::Placed);

    // With the hold settled as failed, the merchant can reject directly.
    let rejected = service
        .update_status(UpdateStatus {
            order_id: order.id,
            status: OrderStatus::Rejected,
        })
        .await
        .unwrap();
    assert_eq!(rejected.status, OrderStatus::Rejected);
}
