//! Customer notification dispatch.
//!
//! Notifications are best-effort: dispatch runs in a detached task after the
//! status write commits, and a failed channel is logged and swallowed, never
//! rolled back into the order transition that triggered it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{LocationId, OrderId};
use thiserror::Error;
use tracing::warn;

use crate::order::{Contact, DisplayId, Order, OrderStatus};

/// Error from a notification channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The downstream channel (mail gateway, SMS provider) failed.
    #[error("Notification channel failed: {0}")]
    Channel(String),
}

/// What a notification channel gets to work with: a read-only view of the
/// order at the moment of the transition.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub location_id: LocationId,
    pub display_id: DisplayId,
    pub status: OrderStatus,
    pub contact: Contact,
}

impl OrderSnapshot {
    /// Captures the notification-relevant view of an order.
    pub fn of(order: &Order) -> Self {
        Self {
            order_id: order.id,
            location_id: order.location_id,
            display_id: order.display_id,
            status: order.status,
            contact: order.contact.clone(),
        }
    }
}

/// Port for customer-facing notification channels.
///
/// Both methods are called only for statuses where
/// [`OrderStatus::notifies_customer`] is true, and only when the order's
/// contact carries the matching address.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Emails the customer that their order reached a new status.
    async fn send_order_status_email(
        &self,
        email: &str,
        snapshot: &OrderSnapshot,
    ) -> Result<(), NotifyError>;

    /// Texts the customer that their order reached a new status.
    async fn send_order_status_sms(
        &self,
        phone: &str,
        snapshot: &OrderSnapshot,
    ) -> Result<(), NotifyError>;
}

/// Dispatches status notifications on a detached task when the order's new
/// status calls for them and contact info is present.
///
/// Used after every committed write that moves an order into a notifying
/// status, whether through the order service or the payment coordinator.
/// Channel failures are logged and swallowed; dispatch never delays or fails
/// the write that triggered it.
pub fn dispatch_status_notification<N: Notifier + 'static>(notifier: Arc<N>, order: &Order) {
    if !order.status.notifies_customer() {
        return;
    }
    if order.contact.is_empty() {
        return;
    }
    let snapshot = OrderSnapshot::of(order);
    tokio::spawn(async move {
        if let Some(email) = snapshot.contact.email.clone()
            && let Err(err) = notifier.send_order_status_email(&email, &snapshot).await
        {
            warn!(
                order_id = %snapshot.order_id,
                status = %snapshot.status,
                error = %err,
                "customer email notification failed"
            );
            metrics::counter!("order_notifications_failed_total", "channel" => "email")
                .increment(1);
        }
        if let Some(phone) = snapshot.contact.phone.clone()
            && let Err(err) = notifier.send_order_status_sms(&phone, &snapshot).await
        {
            warn!(
                order_id = %snapshot.order_id,
                status = %snapshot.status,
                error = %err,
                "customer SMS notification failed"
            );
            metrics::counter!("order_notifications_failed_total", "channel" => "sms")
                .increment(1);
        }
    });
}

/// Which channel carried a recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyChannel {
    Email,
    Sms,
}

/// One notification recorded by [`InMemoryNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub channel: NotifyChannel,
    pub recipient: String,
    pub snapshot: OrderSnapshot,
}

/// In-memory notifier for tests and local development.
///
/// Records every dispatched notification and can be toggled to fail.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: RwLock<Vec<SentNotification>>,
    should_fail: AtomicBool,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent dispatch fail (or succeed again).
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every notification dispatched so far.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().unwrap().clone()
    }

    /// Returns how many notifications were dispatched.
    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    fn record(
        &self,
        channel: NotifyChannel,
        recipient: &str,
        snapshot: &OrderSnapshot,
    ) -> Result<(), NotifyError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Channel(
                "simulated notification failure".to_string(),
            ));
        }
        self.sent.write().unwrap().push(SentNotification {
            channel,
            recipient: recipient.to_string(),
            snapshot: snapshot.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send_order_status_email(
        &self,
        email: &str,
        snapshot: &OrderSnapshot,
    ) -> Result<(), NotifyError> {
        self.record(NotifyChannel::Email, email, snapshot)
    }

    async fn send_order_status_sms(
        &self,
        phone: &str,
        snapshot: &OrderSnapshot,
    ) -> Result<(), NotifyError> {
        self.record(NotifyChannel::Sms, phone, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Money, OrderItem};

    fn snapshot() -> OrderSnapshot {
        let order = Order::place(
            OrderId::new(),
            LocationId::new(),
            DisplayId::from_raw(1234),
            vec![OrderItem::new("coffee", "Coffee", 1, Money::from_cents(350))],
            Contact::email("a@b.fi"),
        );
        OrderSnapshot::of(&order)
    }

    #[tokio::test]
    async fn records_channel_and_recipient() {
        let notifier = InMemoryNotifier::new();
        notifier
            .send_order_status_email("a@b.fi", &snapshot())
            .await
            .unwrap();
        notifier
            .send_order_status_sms("+358401234567", &snapshot())
            .await
            .unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].channel, NotifyChannel::Email);
        assert_eq!(sent[0].recipient, "a@b.fi");
        assert_eq!(sent[1].channel, NotifyChannel::Sms);
    }

    #[tokio::test]
    async fn fail_toggle() {
        let notifier = InMemoryNotifier::new();
        notifier.set_should_fail(true);
        assert!(notifier
            .send_order_status_email("a@b.fi", &snapshot())
            .await
            .is_err());
        assert_eq!(notifier.sent_count(), 0);

        notifier.set_should_fail(false);
        notifier
            .send_order_status_email("a@b.fi", &snapshot())
            .await
            .unwrap();
        assert_eq!(notifier.sent_count(), 1);
    }
}
