//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError, StampError, StoreError};
use payment::PaymentError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Payment settlement error.
    #[error(transparent)]
    Payment(#[from] PaymentError),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::InvalidTransition { .. }
            | OrderError::InvalidPaymentTransition { .. }
            | OrderError::PaymentSettlementRequired { .. } => {
                (StatusCode::CONFLICT, err.to_string())
            }
            OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. }
            | OrderError::NoItems
            | OrderError::UnknownStatus(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            OrderError::DisplayIdExhausted => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        },
        DomainError::Stamp(stamp_err) => match stamp_err {
            StampError::InvalidClaimCount => (StatusCode::BAD_REQUEST, err.to_string()),
            StampError::CardDeleted(_)
            | StampError::NothingToUndo(_)
            | StampError::InsufficientStamps { .. } => (StatusCode::CONFLICT, err.to_string()),
        },
        DomainError::Phone(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Store(store_err) => store_error_to_response(store_err, &err.to_string()),
    }
}

fn store_error_to_response(err: &StoreError, message: &str) -> (StatusCode, String) {
    match err {
        StoreError::ConcurrencyConflict { .. }
        | StoreError::DuplicateDisplayId(_)
        | StoreError::DuplicateCard => (StatusCode::CONFLICT, message.to_string()),
        StoreError::OrderNotFound(_) | StoreError::CardNotFound(_) => {
            (StatusCode::NOT_FOUND, message.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()),
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    match &err {
        PaymentError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        PaymentError::NoPaymentIntent(_)
        | PaymentError::NotAuthorized { .. }
        | PaymentError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        PaymentError::CaptureFailed { .. }
        | PaymentError::CancelFailed { .. }
        | PaymentError::Timeout { .. } => (StatusCode::BAD_GATEWAY, err.to_string()),
        PaymentError::Store(store_err) => store_error_to_response(store_err, &err.to_string()),
    }
}
