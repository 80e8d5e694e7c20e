//! The order record and its state-machine mutations.

use chrono::{DateTime, Utc};
use common::{LocationId, OrderId};
use serde::{Deserialize, Serialize};

use crate::store::Version;

use super::{Contact, DisplayId, Money, OrderError, OrderItem, OrderStatus, PaymentStatus};

/// An order as persisted by the store.
///
/// Orders are a financial record: they are never physically deleted, and
/// their items are immutable after placement. All mutations go through the
/// methods below so the transition allow-lists cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Internal identity, opaque and stable.
    pub id: OrderId,

    /// The merchant location this order belongs to.
    pub location_id: LocationId,

    /// Human-facing 4-digit label, unique among existing orders.
    pub display_id: DisplayId,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// Current payment status.
    pub payment_status: PaymentStatus,

    /// Sum of line totals at placement time.
    pub total_amount: Money,

    /// Amount to settle with the processor (equals the total at placement).
    pub payment_amount: Money,

    /// Amount actually captured; set only when payment becomes Captured.
    pub payment_captured_amount: Option<Money>,

    /// Processor reference for the authorization hold, if any.
    pub payment_intent: Option<String>,

    /// Customer contact channels for status notifications.
    pub contact: Contact,

    /// Line items, immutable after placement.
    pub items: Vec<OrderItem>,

    /// When the order was placed.
    pub created_at: DateTime<Utc>,

    /// When the payment was captured, if it was.
    pub payment_captured_at: Option<DateTime<Utc>>,

    /// Record version for optimistic concurrency.
    pub version: Version,
}

impl Order {
    /// Builds a freshly placed order. Item validation and total computation
    /// are the caller's (the service's) job.
    pub fn place(
        id: OrderId,
        location_id: LocationId,
        display_id: DisplayId,
        items: Vec<OrderItem>,
        contact: Contact,
    ) -> Self {
        let total_amount: Money = items.iter().map(OrderItem::total_price).sum();
        Self {
            id,
            location_id,
            display_id,
            status: OrderStatus::Placed,
            payment_status: PaymentStatus::Pending,
            total_amount,
            payment_amount: total_amount,
            payment_captured_amount: None,
            payment_intent: None,
            contact,
            items,
            created_at: Utc::now(),
            payment_captured_at: None,
            version: Version::default(),
        }
    }

    /// Returns the number of line items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns true while an authorization hold is open and unsettled.
    pub fn has_open_authorization(&self) -> bool {
        self.payment_status == PaymentStatus::Authorized
    }

    /// Moves the order to `next` if the transition is on the allow-list.
    ///
    /// Accept/reject of an order with an open authorization must go through
    /// the payment coordinator instead, so local state never claims a
    /// settlement the processor has not made.
    pub fn transition_status(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if matches!(next, OrderStatus::Accepted | OrderStatus::Rejected)
            && self.has_open_authorization()
        {
            return Err(OrderError::PaymentSettlementRequired {
                order_id: self.id,
                payment_status: self.payment_status,
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Records a processor authorization hold: Pending → Authorized.
    pub fn record_authorization(&mut self, intent_ref: impl Into<String>) -> Result<(), OrderError> {
        self.transition_payment(PaymentStatus::Authorized)?;
        self.payment_intent = Some(intent_ref.into());
        Ok(())
    }

    /// Marks the payment as failed after a processor-reported hard failure.
    pub fn mark_payment_failed(&mut self) -> Result<(), OrderError> {
        self.transition_payment(PaymentStatus::Failed)
    }

    /// Applies a successful external capture as one local mutation:
    /// status=Accepted, payment=Captured, captured amount and timestamp set.
    ///
    /// The captured amount is the payment amount by construction, so it can
    /// never exceed it.
    pub fn settle_capture(&mut self, captured_at: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition_payment(PaymentStatus::Captured)?;
        self.status = OrderStatus::Accepted;
        self.payment_captured_amount = Some(self.payment_amount);
        self.payment_captured_at = Some(captured_at);
        Ok(())
    }

    /// Applies a successful external cancellation: status=Rejected,
    /// payment=Canceled.
    pub fn settle_cancel(&mut self) -> Result<(), OrderError> {
        self.transition_payment(PaymentStatus::Canceled)?;
        self.status = OrderStatus::Rejected;
        Ok(())
    }

    fn transition_payment(&mut self, next: PaymentStatus) -> Result<(), OrderError> {
        if !self.payment_status.can_transition_to(next) {
            return Err(OrderError::InvalidPaymentTransition {
                from: self.payment_status,
                to: next,
            });
        }
        self.payment_status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed_order() -> Order {
        Order::place(
            OrderId::new(),
            LocationId::new(),
            DisplayId::from_raw(1234),
            vec![
                OrderItem::new("margherita", "Margherita", 2, Money::from_cents(1000)),
                OrderItem::new("coffee", "Coffee", 1, Money::from_cents(350)),
            ],
            Contact::email("asiakas@example.fi"),
        )
    }

    #[test]
    fn place_computes_totals() {
        let order = placed_order();
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total_amount.cents(), 2350);
        assert_eq!(order.payment_amount.cents(), 2350);
        assert!(order.payment_captured_amount.is_none());
        assert_eq!(order.item_count(), 2);
    }

    #[test]
    fn transition_rejects_off_allow_list() {
        let mut order = placed_order();
        let err = order
            .transition_status(OrderStatus::Fulfilled)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
        assert_eq!(order.status, OrderStatus::Placed);
    }

    #[test]
    fn accept_blocked_while_authorization_open() {
        let mut order = placed_order();
        order.record_authorization("pi_123").unwrap();

        let err = order.transition_status(OrderStatus::Accepted).unwrap_err();
        assert!(matches!(
            err,
            OrderError::PaymentSettlementRequired { .. }
        ));
        assert_eq!(order.status, OrderStatus::Placed);
    }

    #[test]
    fn accept_allowed_for_pay_at_shop() {
        // No authorization recorded: the merchant decides directly.
        let mut order = placed_order();
        order.transition_status(OrderStatus::Accepted).unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
    }

    #[test]
    fn settle_capture_sets_all_payment_fields() {
        let mut order = placed_order();
        order.record_authorization("pi_123").unwrap();

        let now = Utc::now();
        order.settle_capture(now).unwrap();

        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.payment_status, PaymentStatus::Captured);
        assert_eq!(order.payment_captured_amount, Some(order.payment_amount));
        assert_eq!(order.payment_captured_at, Some(now));
    }

    #[test]
    fn settle_capture_requires_authorization() {
        let mut order = placed_order();
        let err = order.settle_capture(Utc::now()).unwrap_err();
        assert!(matches!(err, OrderError::InvalidPaymentTransition { .. }));
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn settle_cancel_rejects_order() {
        let mut order = placed_order();
        order.record_authorization("pi_123").unwrap();
        order.settle_cancel().unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert_eq!(order.payment_status, PaymentStatus::Canceled);
    }

    #[test]
    fn double_settlement_is_rejected() {
        let mut order = placed_order();
        order.record_authorization("pi_123").unwrap();
        order.settle_capture(Utc::now()).unwrap();

        assert!(order.settle_capture(Utc::now()).is_err());
        assert!(order.settle_cancel().is_err());
    }

    #[test]
    fn payment_failure_reachable_from_pending_and_authorized() {
        let mut order = placed_order();
        order.mark_payment_failed().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Failed);

        let mut order = placed_order();
        order.record_authorization("pi_123").unwrap();
        order.mark_payment_failed().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Failed);
    }

    #[test]
    fn serialization_roundtrip() {
        let order = placed_order();
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
