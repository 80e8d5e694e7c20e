//! Payment settlement against an external processor.
//!
//! The coordinator owns the accept/reject decision for online-paid orders:
//! it settles the authorization hold with the processor first and only then
//! writes the outcome into the order record, so the local state never claims
//! money the processor has not moved.

mod coordinator;
mod error;
mod processor;

pub use coordinator::PaymentCoordinator;
pub use error::PaymentError;
pub use processor::{
    CancelOutcome, CaptureOutcome, InMemoryPaymentProcessor, PaymentProcessor, ProcessorError,
};
