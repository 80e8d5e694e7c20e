//! Domain layer for the restaurant ordering platform.
//!
//! This crate provides the core business logic:
//! - Order lifecycle state machine with payment-status tracking
//! - Display-id sequence allocation for human-facing order numbers
//! - Loyalty stamp ledger with FIFO claims and single-step undo
//! - Store ports (`OrderStore`, `StampStore`) with an in-memory implementation
//! - Notification dispatcher boundary consumed by the order service

pub mod error;
pub mod notify;
pub mod order;
pub mod stamps;
pub mod store;

pub use error::DomainError;
pub use notify::{
    dispatch_status_notification, InMemoryNotifier, Notifier, NotifyChannel, NotifyError,
    OrderSnapshot, SentNotification,
};
pub use order::{
    Contact, DisplayId, Money, NewOrderItem, Order, OrderError, OrderItem, OrderService,
    OrderStatus, PaymentStatus, PlaceOrder, ProductId, RecordAuthorization, UpdateStatus,
};
pub use stamps::{
    CardSummary, DefaultPhoneNormalizer, PhoneError, PhoneNormalizer, PhoneNumber, RegisterCard,
    Stamp, StampCard, StampError, StampService,
};
pub use store::{InMemoryStore, OrderStore, StampStore, StoreError, Version};
