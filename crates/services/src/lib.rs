#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod journey_builder;
pub mod journey_service;
pub mod session_service;

pub use journey_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, BuilderError, JourneyServiceError, SessionServiceError};
pub use journey_builder::{JourneyDraft, StepDraft, TrophyDraft};
pub use journey_service::{JourneyProgressView, JourneyService};
pub use session_service::SessionService;
