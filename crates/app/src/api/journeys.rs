//! Journey administration and student progress endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use journey_core::model::{Journey, StudentId, Trophy};
use services::{JourneyDraft, JourneyProgressView};

use super::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub updated: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

/// GET /api/students/:student/journey
///
/// Journey plus evaluated progress, or `null` when none is configured.
pub async fn get_journey(
    State(state): State<AppState>,
    Path(student): Path<String>,
) -> Result<Json<Option<JourneyProgressView>>, ApiError> {
    let student = StudentId::new(student)?;
    let view = state.journeys.journey_progress(&student).await?;
    Ok(Json(view))
}

/// POST /api/students/:student/journey
pub async fn create_journey(
    State(state): State<AppState>,
    Path(student): Path<String>,
    Json(draft): Json<JourneyDraft>,
) -> Result<(StatusCode, Json<Journey>), ApiError> {
    let student = StudentId::new(student)?;
    let journey = state.journeys.create_journey(&student, &draft).await?;
    Ok((StatusCode::CREATED, Json(journey)))
}

/// PUT /api/students/:student/journey
///
/// Whole overwrite. Progress and claims carry over by step position.
pub async fn replace_journey(
    State(state): State<AppState>,
    Path(student): Path<String>,
    Json(draft): Json<JourneyDraft>,
) -> Result<Json<Journey>, ApiError> {
    let student = StudentId::new(student)?;
    let journey = state.journeys.replace_journey(&student, &draft).await?;
    Ok(Json(journey))
}

/// DELETE /api/students/:student/journey
pub async fn reset_journey(
    State(state): State<AppState>,
    Path(student): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let student = StudentId::new(student)?;
    let deleted = state.journeys.reset_journey(&student).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// PUT /api/students/:student/journey/active
pub async fn set_active(
    State(state): State<AppState>,
    Path(student): Path<String>,
    Json(req): Json<ActiveRequest>,
) -> Result<Json<Journey>, ApiError> {
    let student = StudentId::new(student)?;
    let journey = state.journeys.set_active(&student, req.active).await?;
    Ok(Json(journey))
}

/// POST /api/students/:student/journey/sync
pub async fn sync_journey(
    State(state): State<AppState>,
    Path(student): Path<String>,
) -> Result<Json<SyncResponse>, ApiError> {
    let student = StudentId::new(student)?;
    let updated = state.journeys.sync_progress(&student).await;
    debug!(student = %student, updated, "manual sync");
    Ok(Json(SyncResponse { updated }))
}

/// POST /api/students/:student/journey/steps/:ordinal/claim
pub async fn claim_trophy(
    State(state): State<AppState>,
    Path((student, ordinal)): Path<(String, u32)>,
) -> Result<Json<Trophy>, ApiError> {
    let student = StudentId::new(student)?;
    let trophy = state.journeys.claim_trophy(&student, ordinal).await?;
    Ok(Json(trophy))
}
