//! Order placement, lifecycle and payment settlement endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use common::{LocationId, OrderId};
use domain::{
    Contact, InMemoryNotifier, NewOrderItem, Money, Order, OrderService, OrderStatus, OrderStore,
    PlaceOrder, RecordAuthorization, StampService, StampStore, UpdateStatus,
    DefaultPhoneNormalizer,
};
use payment::{InMemoryPaymentProcessor, PaymentCoordinator};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore + StampStore> {
    pub order_service: OrderService<S, InMemoryNotifier>,
    pub stamp_service: StampService<S, DefaultPhoneNormalizer>,
    pub payment: PaymentCoordinator<S, InMemoryPaymentProcessor, InMemoryNotifier>,
    pub notifier: Arc<InMemoryNotifier>,
    pub payment_processor: Arc<InMemoryPaymentProcessor>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub location_id: LocationId,
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub options_total_cents: i64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct RecordAuthorizationRequest {
    pub payment_intent: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub location_id: LocationId,
    pub display_id: i32,
    pub status: String,
    pub payment_status: String,
    pub total_cents: i64,
    pub payment_captured_cents: Option<i64>,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub payment_captured_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub options_total_cents: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            location_id: order.location_id,
            display_id: order.display_id.value(),
            status: order.status.to_string(),
            payment_status: order.payment_status.to_string(),
            total_cents: order.total_amount.cents(),
            payment_captured_cents: order.payment_captured_amount.map(|m| m.cents()),
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    options_total_cents: item.options_total.cents(),
                })
                .collect(),
            created_at: order.created_at,
            payment_captured_at: order.payment_captured_at,
        }
    }
}

// -- Handlers --

/// POST /orders — place a new order.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let cmd = PlaceOrder {
        location_id: req.location_id,
        items: req
            .items
            .into_iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id.into(),
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: Money::from_cents(item.unit_price_cents),
                options_total: Money::from_cents(item.options_total_cents),
            })
            .collect(),
        contact: Contact {
            email: req.contact_email,
            phone: req.contact_phone,
        },
    };

    let order = state.order_service.place_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders/{id} — fetch one order.
pub async fn get<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .order_service
        .get_order(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {id}")))?;
    Ok(Json(order.into()))
}

/// GET /locations/{location_id}/orders — list a location's orders.
pub async fn list<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(location_id): Path<LocationId>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.order_service.orders_for_location(location_id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// POST /orders/{id}/status — move the order to a new status.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: domain::order::UnknownStatus| ApiError::BadRequest(e.to_string()))?;

    let order = state
        .order_service
        .update_status(UpdateStatus {
            order_id: id,
            status,
        })
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/authorization — record a processor hold.
#[tracing::instrument(skip(state, req))]
pub async fn record_authorization<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
    Json(req): Json<RecordAuthorizationRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .order_service
        .record_authorization(RecordAuthorization {
            order_id: id,
            payment_intent: req.payment_intent,
        })
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/payment-failed — record a processor hard failure.
#[tracing::instrument(skip(state))]
pub async fn payment_failed<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.order_service.mark_payment_failed(id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/capture — capture the hold and accept the order.
#[tracing::instrument(skip(state))]
pub async fn capture<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.payment.capture_payment(id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/cancel-payment — release the hold and reject the order.
#[tracing::instrument(skip(state))]
pub async fn cancel_payment<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.payment.cancel_payment(id).await?;
    Ok(Json(order.into()))
}
