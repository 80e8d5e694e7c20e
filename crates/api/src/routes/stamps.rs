//! Loyalty stamp card endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use common::{CardId, LocationId};
use domain::{CardSummary, OrderStore, RegisterCard, StampStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::orders::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterCardRequest {
    pub location_id: LocationId,
    pub phone: String,
    pub first_name: String,
}

#[derive(Deserialize)]
pub struct RenameCardRequest {
    pub first_name: String,
}

#[derive(Deserialize)]
pub struct ClaimRequest {
    pub count: u32,
}

#[derive(Deserialize)]
pub struct CardListQuery {
    /// Optional phone filter; canonicalized before lookup.
    pub phone: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CardResponse {
    pub id: CardId,
    pub location_id: LocationId,
    pub phone: String,
    pub first_name: String,
    pub stamps_required: u32,
    pub total_stamps: u32,
    pub active_stamps: u32,
    pub claimed_stamps: u32,
    pub can_claim: bool,
}

impl From<CardSummary> for CardResponse {
    fn from(summary: CardSummary) -> Self {
        Self {
            id: summary.card_id,
            location_id: summary.location_id,
            phone: summary.phone.to_string(),
            first_name: summary.first_name,
            stamps_required: summary.stamps_required,
            total_stamps: summary.total_stamps,
            active_stamps: summary.active_stamps,
            claimed_stamps: summary.claimed_stamps,
            can_claim: summary.can_claim,
        }
    }
}

// -- Handlers --

/// POST /cards — register a new stamp card.
#[tracing::instrument(skip(state, req))]
pub async fn register<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<RegisterCardRequest>,
) -> Result<(StatusCode, Json<CardResponse>), ApiError> {
    let card = state
        .stamp_service
        .register_card(RegisterCard {
            location_id: req.location_id,
            phone: req.phone,
            first_name: req.first_name,
        })
        .await?;
    let summary = state.stamp_service.card_summary(card.id).await?;
    Ok((StatusCode::CREATED, Json(summary.into())))
}

/// GET /cards/{id} — fetch one card with derived counters.
pub async fn get<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<CardId>,
) -> Result<Json<CardResponse>, ApiError> {
    let summary = state.stamp_service.card_summary(id).await?;
    Ok(Json(summary.into()))
}

/// GET /locations/{location_id}/cards — list cards, optionally filtered by
/// phone.
pub async fn list<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(location_id): Path<LocationId>,
    Query(query): Query<CardListQuery>,
) -> Result<Json<Vec<CardResponse>>, ApiError> {
    let summaries = match query.phone {
        Some(phone) => state
            .stamp_service
            .find_card(location_id, &phone)
            .await?
            .into_iter()
            .collect(),
        None => state.stamp_service.cards_for_location(location_id).await?,
    };
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

/// POST /cards/{id}/rename — change the card holder's name.
#[tracing::instrument(skip(state, req))]
pub async fn rename<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<CardId>,
    Json(req): Json<RenameCardRequest>,
) -> Result<Json<CardResponse>, ApiError> {
    state.stamp_service.rename_card(id, req.first_name).await?;
    let summary = state.stamp_service.card_summary(id).await?;
    Ok(Json(summary.into()))
}

/// DELETE /cards/{id} — soft-delete a card.
#[tracing::instrument(skip(state))]
pub async fn delete<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<CardId>,
) -> Result<StatusCode, ApiError> {
    state.stamp_service.delete_card(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cards/{id}/stamps — add one stamp.
#[tracing::instrument(skip(state))]
pub async fn add_stamp<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<CardId>,
) -> Result<Json<CardResponse>, ApiError> {
    let summary = state.stamp_service.add_stamp(id).await?;
    Ok(Json(summary.into()))
}

/// POST /cards/{id}/stamps/undo — undo the latest stamp.
#[tracing::instrument(skip(state))]
pub async fn undo_stamp<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<CardId>,
) -> Result<Json<CardResponse>, ApiError> {
    let summary = state.stamp_service.undo_last_stamp(id).await?;
    Ok(Json(summary.into()))
}

/// POST /cards/{id}/claim — spend stamps on a reward.
#[tracing::instrument(skip(state, req))]
pub async fn claim<S: OrderStore + StampStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<CardId>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<CardResponse>, ApiError> {
    let summary = state.stamp_service.claim_stamps(id, req.count).await?;
    Ok(Json(summary.into()))
}
