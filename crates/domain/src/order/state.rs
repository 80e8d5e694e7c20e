//! Order and payment status state machines.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// Placed ──┬──► Accepted ──► Processing ──► ReadyForPickup ──► Fulfilled
///          └──► Rejected
/// ```
///
/// This is the single canonical vocabulary; anything outside the allow-list
/// below is rejected without mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order was placed at checkout and awaits a merchant decision.
    #[default]
    Placed,

    /// Merchant accepted the order.
    Accepted,

    /// Merchant rejected the order (terminal state).
    Rejected,

    /// Order is being prepared.
    Processing,

    /// Order is ready for the customer to pick up.
    ReadyForPickup,

    /// Order was handed over (terminal state).
    Fulfilled,
}

impl OrderStatus {
    /// Returns true when moving from `self` to `next` is on the allow-list.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Placed, Accepted)
                | (Placed, Rejected)
                | (Accepted, Processing)
                | (Processing, ReadyForPickup)
                | (ReadyForPickup, Fulfilled)
        )
    }

    /// Returns true when reaching this status triggers a customer
    /// notification.
    pub fn notifies_customer(&self) -> bool {
        matches!(
            self,
            OrderStatus::Accepted | OrderStatus::Rejected | OrderStatus::ReadyForPickup
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Fulfilled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Processing => "Processing",
            OrderStatus::ReadyForPickup => "ReadyForPickup",
            OrderStatus::Fulfilled => "Fulfilled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Placed" => Ok(OrderStatus::Placed),
            "Accepted" => Ok(OrderStatus::Accepted),
            "Rejected" => Ok(OrderStatus::Rejected),
            "Processing" => Ok(OrderStatus::Processing),
            "ReadyForPickup" => Ok(OrderStatus::ReadyForPickup),
            "Fulfilled" => Ok(OrderStatus::Fulfilled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Error returned when parsing a status name outside the canonical vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// The payment status of an order.
///
/// Transitions:
/// ```text
/// Pending ──► Authorized ──┬──► Captured
///    │             │       └──► Canceled
///    └──► Failed ◄─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// No authorization recorded yet (also the pay-at-shop resting state).
    #[default]
    Pending,

    /// A hold was placed; funds can be captured or the hold released.
    Authorized,

    /// The authorized amount was settled (terminal state).
    Captured,

    /// The authorization was released without settling (terminal state).
    Canceled,

    /// The processor reported a hard failure (terminal state).
    Failed,
}

impl PaymentStatus {
    /// Returns true when moving from `self` to `next` is on the allow-list.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Authorized)
                | (Pending, Failed)
                | (Authorized, Captured)
                | (Authorized, Canceled)
                | (Authorized, Failed)
        )
    }

    /// Returns true once no further payment transitions are possible.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Captured | PaymentStatus::Canceled | PaymentStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Authorized => "Authorized",
            PaymentStatus::Captured => "Captured",
            PaymentStatus::Canceled => "Canceled",
            PaymentStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Authorized" => Ok(PaymentStatus::Authorized),
            "Captured" => Ok(PaymentStatus::Captured),
            "Canceled" => Ok(PaymentStatus::Canceled),
            "Failed" => Ok(PaymentStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_placed() {
        assert_eq!(OrderStatus::default(), OrderStatus::Placed);
    }

    #[test]
    fn placed_branches_to_accept_or_reject() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Accepted));
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Rejected));
        assert!(!OrderStatus::Placed.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Placed.can_transition_to(OrderStatus::Fulfilled));
    }

    #[test]
    fn happy_path_is_linear_after_accept() {
        assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::ReadyForPickup));
        assert!(OrderStatus::ReadyForPickup.can_transition_to(OrderStatus::Fulfilled));
    }

    #[test]
    fn no_transitions_out_of_terminal_states() {
        for next in [
            OrderStatus::Placed,
            OrderStatus::Accepted,
            OrderStatus::Processing,
            OrderStatus::ReadyForPickup,
            OrderStatus::Fulfilled,
        ] {
            assert!(!OrderStatus::Rejected.can_transition_to(next));
            assert!(!OrderStatus::Fulfilled.can_transition_to(next));
        }
    }

    #[test]
    fn no_backwards_transitions() {
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Accepted));
        assert!(!OrderStatus::ReadyForPickup.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Accepted.can_transition_to(OrderStatus::Placed));
    }

    #[test]
    fn notify_set_is_accept_reject_ready() {
        assert!(OrderStatus::Accepted.notifies_customer());
        assert!(OrderStatus::Rejected.notifies_customer());
        assert!(OrderStatus::ReadyForPickup.notifies_customer());
        assert!(!OrderStatus::Placed.notifies_customer());
        assert!(!OrderStatus::Processing.notifies_customer());
        assert!(!OrderStatus::Fulfilled.notifies_customer());
    }

    #[test]
    fn status_parse_rejects_legacy_vocabulary() {
        assert!("Placed".parse::<OrderStatus>().is_ok());
        assert!("CONFIRMED".parse::<OrderStatus>().is_err());
        assert!("PREPARING".parse::<OrderStatus>().is_err());
        assert!("BOGUS".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn payment_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Authorized));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Authorized.can_transition_to(PaymentStatus::Captured));
        assert!(PaymentStatus::Authorized.can_transition_to(PaymentStatus::Canceled));
        assert!(PaymentStatus::Authorized.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Captured));
        assert!(!PaymentStatus::Captured.can_transition_to(PaymentStatus::Canceled));
        assert!(!PaymentStatus::Canceled.can_transition_to(PaymentStatus::Captured));
    }

    #[test]
    fn settled_states() {
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(!PaymentStatus::Authorized.is_settled());
        assert!(PaymentStatus::Captured.is_settled());
        assert!(PaymentStatus::Canceled.is_settled());
        assert!(PaymentStatus::Failed.is_settled());
    }

    #[test]
    fn display_and_parse_roundtrip() {
        for status in [
            OrderStatus::Placed,
            OrderStatus::Accepted,
            OrderStatus::Rejected,
            OrderStatus::Processing,
            OrderStatus::ReadyForPickup,
            OrderStatus::Fulfilled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
    }
}
