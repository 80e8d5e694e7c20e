//! HTTP API server for the restaurant ordering platform.
//!
//! Exposes the order lifecycle, payment settlement and loyalty stamp cards
//! over REST, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use domain::{
    DefaultPhoneNormalizer, InMemoryNotifier, InMemoryStore, OrderService, OrderStore,
    StampService, StampStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use payment::{InMemoryPaymentProcessor, PaymentCoordinator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + StampStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", post(routes::orders::update_status::<S>))
        .route(
            "/orders/{id}/authorization",
            post(routes::orders::record_authorization::<S>),
        )
        .route(
            "/orders/{id}/payment-failed",
            post(routes::orders::payment_failed::<S>),
        )
        .route("/orders/{id}/capture", post(routes::orders::capture::<S>))
        .route(
            "/orders/{id}/cancel-payment",
            post(routes::orders::cancel_payment::<S>),
        )
        .route(
            "/locations/{location_id}/orders",
            get(routes::orders::list::<S>),
        )
        .route("/cards", post(routes::stamps::register::<S>))
        .route("/cards/{id}", get(routes::stamps::get::<S>))
        .route("/cards/{id}", delete(routes::stamps::delete::<S>))
        .route("/cards/{id}/rename", post(routes::stamps::rename::<S>))
        .route("/cards/{id}/stamps", post(routes::stamps::add_stamp::<S>))
        .route(
            "/cards/{id}/stamps/undo",
            post(routes::stamps::undo_stamp::<S>),
        )
        .route("/cards/{id}/claim", post(routes::stamps::claim::<S>))
        .route(
            "/locations/{location_id}/cards",
            get(routes::stamps::list::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds application state around the given store.
pub fn create_state<S: OrderStore + StampStore + 'static>(store: Arc<S>) -> Arc<AppState<S>> {
    let notifier = Arc::new(InMemoryNotifier::new());
    let payment_processor = Arc::new(InMemoryPaymentProcessor::new());

    Arc::new(AppState {
        order_service: OrderService::new(Arc::clone(&store), Arc::clone(&notifier)),
        stamp_service: StampService::new(Arc::clone(&store), DefaultPhoneNormalizer::default()),
        payment: PaymentCoordinator::new(
            store,
            Arc::clone(&payment_processor),
            Arc::clone(&notifier),
        ),
        notifier,
        payment_processor,
    })
}

/// Creates the default application state backed by the in-memory store.
pub fn create_default_state() -> Arc<AppState<InMemoryStore>> {
    create_state(Arc::new(InMemoryStore::new()))
}
