//! HTTP surface for student journeys.

#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use services::{AppServices, JourneyService, SessionService};

pub mod api;
pub mod config;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub journeys: Arc<JourneyService>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(services: &AppServices) -> Self {
        Self {
            journeys: services.journeys(),
            sessions: services.sessions(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let students = Router::new()
        .route(
            "/api/students/:student/journey",
            get(api::get_journey)
                .post(api::create_journey)
                .put(api::replace_journey)
                .delete(api::reset_journey),
        )
        .route("/api/students/:student/journey/active", put(api::set_active))
        .route("/api/students/:student/journey/sync", post(api::sync_journey))
        .route(
            "/api/students/:student/journey/steps/:ordinal/claim",
            post(api::claim_trophy),
        )
        .route("/api/students/:student/sessions", get(api::list_sessions))
        .route(
            "/api/students/:student/sessions/:session",
            put(api::put_session),
        );

    Router::new()
        .merge(students)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
