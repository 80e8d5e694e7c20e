//! Order lifecycle: records, state machines, display-id allocation and the
//! order service.

mod commands;
mod entity;
mod sequence;
mod service;
mod state;
mod value_objects;

use thiserror::Error;

pub use commands::{NewOrderItem, PlaceOrder, RecordAuthorization, UpdateStatus};
pub use entity::Order;
pub use sequence::{allocate_display_id, fallback_display_id, ALLOCATION_ATTEMPTS};
pub use service::OrderService;
pub use state::{OrderStatus, PaymentStatus, UnknownStatus};
pub use value_objects::{Contact, DisplayId, Money, OrderItem, ProductId};

/// Errors from order validation and lifecycle transitions.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested lifecycle move is not on the allow-list.
    #[error("Cannot transition order from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The requested payment move is not on the allow-list.
    #[error("Cannot transition payment from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Accept/reject was requested directly while an authorization hold is
    /// open; the payment coordinator must settle the hold instead.
    #[error(
        "Order {order_id} has payment status {payment_status}: settle the payment to accept or reject"
    )]
    PaymentSettlementRequired {
        order_id: common::OrderId,
        payment_status: PaymentStatus,
    },

    /// An order must contain at least one item.
    #[error("Order must contain at least one item")]
    NoItems,

    /// Line quantities must be positive.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Prices must not be negative.
    #[error("Invalid price {price} for product {product_id}")]
    InvalidPrice { product_id: ProductId, price: Money },

    /// Display-id allocation kept colliding with existing orders.
    #[error("Could not allocate a free display id")]
    DisplayIdExhausted,

    /// A status name outside the canonical vocabulary was supplied.
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatus),
}
