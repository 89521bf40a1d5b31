use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use journey_core::model::{SessionId, SessionStatus, StudentId, TherapySession};

use super::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionStatusRequest {
    pub status: SessionStatus,
}

/// GET /api/students/:student/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(student): Path<String>,
) -> Result<Json<Vec<TherapySession>>, ApiError> {
    let student = StudentId::new(student)?;
    let sessions = state.sessions.list_sessions(&student).await?;
    Ok(Json(sessions))
}

/// PUT /api/students/:student/sessions/:session
///
/// Creates or updates the session. Marking it completed syncs the
/// student's journey before responding.
pub async fn put_session(
    State(state): State<AppState>,
    Path((student, session)): Path<(String, String)>,
    Json(req): Json<SessionStatusRequest>,
) -> Result<Json<TherapySession>, ApiError> {
    let student = StudentId::new(student)?;
    let id = SessionId::new(session)?;
    let session = state
        .sessions
        .record_session(id, student, req.status)
        .await?;
    Ok(Json(session))
}
