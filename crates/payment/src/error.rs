use std::time::Duration;

use common::OrderId;
use domain::{PaymentStatus, StoreError};
use thiserror::Error;

/// Errors from payment settlement.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order carries no processor reference to settle against.
    #[error("Order {0} has no payment intent")]
    NoPaymentIntent(OrderId),

    /// The order's payment is not in the Authorized state.
    #[error("Order {order_id} payment is {actual}, not Authorized")]
    NotAuthorized {
        order_id: OrderId,
        actual: PaymentStatus,
    },

    /// The processor refused the capture.
    #[error("Capture failed: {reason}")]
    CaptureFailed { reason: String },

    /// The processor refused the cancellation.
    #[error("Cancel failed: {reason}")]
    CancelFailed { reason: String },

    /// The processor did not answer within the call timeout. The hold's real
    /// state is unknown; the caller retries or investigates.
    #[error("Payment processor timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// A concurrent writer settled or moved the order mid-flight. Retryable.
    #[error("Concurrent update on order {0}, reload and retry")]
    Conflict(OrderId),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
