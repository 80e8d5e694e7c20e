//! Payment processor trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use thiserror::Error;

/// Error reported by the external processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The processor understood the request and said no.
    #[error("Processor declined: {0}")]
    Declined(String),

    /// The processor could not be reached or answered garbage.
    #[error("Processor transport error: {0}")]
    Transport(String),
}

/// Result of a successful capture call.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// Amount the processor reports as captured.
    pub captured_amount: Money,

    /// Processor-side status string, for audit logs.
    pub processor_status: String,
}

/// Result of a successful cancel call.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    /// Processor-side status string, for audit logs.
    pub processor_status: String,
}

/// Port to the external payment processor.
///
/// Both calls are idempotent on the processor side, keyed by the payment
/// intent, so a retry after a timeout is safe.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Settles an authorization hold for the given amount.
    async fn capture(
        &self,
        payment_intent: &str,
        amount: Money,
    ) -> Result<CaptureOutcome, ProcessorError>;

    /// Releases an authorization hold without settling.
    async fn cancel(&self, payment_intent: &str) -> Result<CancelOutcome, ProcessorError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum IntentState {
    Open,
    Captured(Money),
    Canceled,
}

#[derive(Debug, Default)]
struct InMemoryProcessorState {
    intents: HashMap<String, (Money, IntentState)>,
    fail_on_capture: bool,
    fail_on_cancel: bool,
    response_delay: Option<Duration>,
    capture_calls: u32,
    cancel_calls: u32,
}

/// In-memory payment processor for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryProcessorState>>,
}

impl InMemoryPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an open authorization hold for an intent.
    pub fn register_intent(&self, payment_intent: impl Into<String>, amount: Money) {
        self.state
            .write()
            .unwrap()
            .intents
            .insert(payment_intent.into(), (amount, IntentState::Open));
    }

    /// Makes subsequent capture calls fail.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Makes subsequent cancel calls fail.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Delays every response, to exercise caller timeouts.
    pub fn set_response_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().response_delay = delay;
    }

    /// Returns how many capture calls were made.
    pub fn capture_calls(&self) -> u32 {
        self.state.read().unwrap().capture_calls
    }

    /// Returns how many cancel calls were made.
    pub fn cancel_calls(&self) -> u32 {
        self.state.read().unwrap().cancel_calls
    }

    /// Returns true if the intent is captured on the processor side.
    pub fn is_captured(&self, payment_intent: &str) -> bool {
        matches!(
            self.state.read().unwrap().intents.get(payment_intent),
            Some((_, IntentState::Captured(_)))
        )
    }

    async fn simulate_latency(&self) {
        let delay = self.state.read().unwrap().response_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn capture(
        &self,
        payment_intent: &str,
        amount: Money,
    ) -> Result<CaptureOutcome, ProcessorError> {
        self.simulate_latency().await;

        let mut state = self.state.write().unwrap();
        state.capture_calls += 1;

        if state.fail_on_capture {
            return Err(ProcessorError::Declined("capture declined".to_string()));
        }

        let (held, intent_state) = state
            .intents
            .get_mut(payment_intent)
            .ok_or_else(|| ProcessorError::Declined("unknown payment intent".to_string()))?;

        match *intent_state {
            // Idempotent: a repeat capture returns the original outcome.
            IntentState::Captured(captured) => Ok(CaptureOutcome {
                captured_amount: captured,
                processor_status: "succeeded".to_string(),
            }),
            IntentState::Canceled => {
                Err(ProcessorError::Declined("intent already canceled".to_string()))
            }
            IntentState::Open => {
                if amount > *held {
                    return Err(ProcessorError::Declined(
                        "capture exceeds authorized amount".to_string(),
                    ));
                }
                *intent_state = IntentState::Captured(amount);
                Ok(CaptureOutcome {
                    captured_amount: amount,
                    processor_status: "succeeded".to_string(),
                })
            }
        }
    }

    async fn cancel(&self, payment_intent: &str) -> Result<CancelOutcome, ProcessorError> {
        self.simulate_latency().await;

        let mut state = self.state.write().unwrap();
        state.cancel_calls += 1;

        if state.fail_on_cancel {
            return Err(ProcessorError::Transport("cancel unavailable".to_string()));
        }

        let (_, intent_state) = state
            .intents
            .get_mut(payment_intent)
            .ok_or_else(|| ProcessorError::Declined("unknown payment intent".to_string()))?;

        match *intent_state {
            IntentState::Captured(_) => {
                Err(ProcessorError::Declined("intent already captured".to_string()))
            }
            // Idempotent repeat.
            IntentState::Canceled => Ok(CancelOutcome {
                processor_status: "canceled".to_string(),
            }),
            IntentState::Open => {
                *intent_state = IntentState::Canceled;
                Ok(CancelOutcome {
                    processor_status: "canceled".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_settles_open_intent() {
        let processor = InMemoryPaymentProcessor::new();
        processor.register_intent("pi_1", Money::from_cents(1750));

        let outcome = processor
            .capture("pi_1", Money::from_cents(1750))
            .await
            .unwrap();
        assert_eq!(outcome.captured_amount.cents(), 1750);
        assert!(processor.is_captured("pi_1"));
    }

    #[tokio::test]
    async fn repeat_capture_is_idempotent() {
        let processor = InMemoryPaymentProcessor::new();
        processor.register_intent("pi_1", Money::from_cents(1000));

        processor.capture("pi_1", Money::from_cents(1000)).await.unwrap();
        let again = processor
            .capture("pi_1", Money::from_cents(1000))
            .await
            .unwrap();
        assert_eq!(again.captured_amount.cents(), 1000);
        assert_eq!(processor.capture_calls(), 2);
    }

    #[tokio::test]
    async fn capture_above_hold_is_declined() {
        let processor = InMemoryPaymentProcessor::new();
        processor.register_intent("pi_1", Money::from_cents(1000));

        let err = processor
            .capture("pi_1", Money::from_cents(2000))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Declined(_)));
    }

    #[tokio::test]
    async fn cancel_after_capture_is_declined() {
        let processor = InMemoryPaymentProcessor::new();
        processor.register_intent("pi_1", Money::from_cents(1000));
        processor.capture("pi_1", Money::from_cents(1000)).await.unwrap();

        assert!(processor.cancel("pi_1").await.is_err());
    }
}
