//! Shared identifier types used across the ordering platform crates.

pub mod types;

pub use types::{CardId, LocationId, OrderId, StampId};
