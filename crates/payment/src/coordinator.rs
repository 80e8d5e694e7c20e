//! The payment coordinator: external settlement first, local record second.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::OrderId;
use domain::{dispatch_status_notification, Notifier, Order, OrderStore, PaymentStatus, StoreError};
use tracing::{info, warn};

use crate::error::PaymentError;
use crate::processor::{PaymentProcessor, ProcessorError};

/// Default upper bound on one processor call.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinates payment settlement for online-paid orders.
///
/// Capture and cancel both run in two steps: the processor call settles the
/// hold, then the outcome is written into the order under the record's
/// version. A concurrent writer makes the local write fail, never the money
/// move twice; the processor call is idempotent per intent, so a retry after
/// a timeout is safe.
///
/// Settlement is the only accept/reject path while a hold is open, so the
/// coordinator also carries the customer notification for the committed
/// status, dispatched the same detached best-effort way as the order service.
pub struct PaymentCoordinator<S, P, N> {
    store: Arc<S>,
    processor: Arc<P>,
    notifier: Arc<N>,
    call_timeout: Duration,
}

impl<S, P, N> Clone for PaymentCoordinator<S, P, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            processor: Arc::clone(&self.processor),
            notifier: Arc::clone(&self.notifier),
            call_timeout: self.call_timeout,
        }
    }
}

impl<S, P, N> PaymentCoordinator<S, P, N>
where
    S: OrderStore,
    P: PaymentProcessor,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, processor: Arc<P>, notifier: Arc<N>) -> Self {
        Self {
            store,
            processor,
            notifier,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Overrides the per-call processor timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Captures the authorization hold and accepts the order.
    ///
    /// Requires the payment to be Authorized; the order is left untouched
    /// and the processor is not called otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn capture_payment(&self, order_id: OrderId) -> Result<Order, PaymentError> {
        let mut order = self.load_authorized(order_id).await?;
        let intent = order
            .payment_intent
            .clone()
            .ok_or(PaymentError::NoPaymentIntent(order_id))?;

        let outcome = tokio::time::timeout(
            self.call_timeout,
            self.processor.capture(&intent, order.payment_amount),
        )
        .await
        .map_err(|_| {
            metrics::counter!("payment_processor_timeouts_total").increment(1);
            PaymentError::Timeout {
                timeout: self.call_timeout,
            }
        })?
        .map_err(|err| {
            metrics::counter!("payments_capture_failed_total").increment(1);
            match err {
                ProcessorError::Declined(reason) | ProcessorError::Transport(reason) => {
                    PaymentError::CaptureFailed { reason }
                }
            }
        })?;

        if outcome.captured_amount != order.payment_amount {
            warn!(
                %order_id,
                requested = %order.payment_amount,
                captured = %outcome.captured_amount,
                "processor captured a different amount than requested"
            );
        }

        let expected = order.version;
        order
            .settle_capture(Utc::now())
            .map_err(|_| PaymentError::NotAuthorized {
                order_id,
                actual: order.payment_status,
            })?;
        order.version = self.commit(&order, expected).await?;
        dispatch_status_notification(Arc::clone(&self.notifier), &order);

        info!(%order_id, amount = %order.payment_amount, "payment captured");
        metrics::counter!("payments_captured_total").increment(1);
        Ok(order)
    }

    /// Releases the authorization hold and rejects the order.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_payment(&self, order_id: OrderId) -> Result<Order, PaymentError> {
        let mut order = self.load_authorized(order_id).await?;
        let intent = order
            .payment_intent
            .clone()
            .ok_or(PaymentError::NoPaymentIntent(order_id))?;

        tokio::time::timeout(self.call_timeout, self.processor.cancel(&intent))
            .await
            .map_err(|_| {
                metrics::counter!("payment_processor_timeouts_total").increment(1);
                PaymentError::Timeout {
                    timeout: self.call_timeout,
                }
            })?
            .map_err(|err| match err {
                ProcessorError::Declined(reason) | ProcessorError::Transport(reason) => {
                    PaymentError::CancelFailed { reason }
                }
            })?;

        let expected = order.version;
        order
            .settle_cancel()
            .map_err(|_| PaymentError::NotAuthorized {
                order_id,
                actual: order.payment_status,
            })?;
        order.version = self.commit(&order, expected).await?;
        dispatch_status_notification(Arc::clone(&self.notifier), &order);

        info!(%order_id, "payment canceled, order rejected");
        metrics::counter!("payments_canceled_total").increment(1);
        Ok(order)
    }

    async fn load_authorized(&self, order_id: OrderId) -> Result<Order, PaymentError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        if order.payment_status != PaymentStatus::Authorized {
            return Err(PaymentError::NotAuthorized {
                order_id,
                actual: order.payment_status,
            });
        }
        Ok(order)
    }

    /// Writes the settled order back. A version conflict means someone else
    /// moved the record mid-flight: if they settled the payment, report that
    /// outcome; otherwise let the caller reload and retry.
    async fn commit(
        &self,
        order: &Order,
        expected: domain::Version,
    ) -> Result<domain::Version, PaymentError> {
        match self.store.update_order(order, expected).await {
            Ok(version) => Ok(version),
            Err(StoreError::ConcurrencyConflict { .. }) => {
                let current = self
                    .store
                    .get_order(order.id)
                    .await?
                    .ok_or(PaymentError::OrderNotFound(order.id))?;
                if current.payment_status != PaymentStatus::Authorized {
                    Err(PaymentError::NotAuthorized {
                        order_id: order.id,
                        actual: current.payment_status,
                    })
                } else {
                    Err(PaymentError::Conflict(order.id))
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}
