//! HTTP handlers

pub mod error;
pub mod health;
pub mod journeys;
pub mod sessions;

pub use error::ApiError;
pub use health::health_routes;
pub use journeys::{
    claim_trophy, create_journey, get_journey, replace_journey, reset_journey, set_active,
    sync_journey,
};
pub use sessions::{list_sessions, put_session};
