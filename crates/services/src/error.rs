//! Shared error types for the services crate.

use thiserror::Error;

use journey_core::model::{ClaimError, JourneyError, SessionId, StudentId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while editing a `JourneyDraft`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuilderError {
    #[error("draft has no step {ordinal}")]
    StepNotFound { ordinal: u32 },
    #[error("session {session_id} is already assigned to step {ordinal}")]
    SessionAlreadyAssigned { session_id: SessionId, ordinal: u32 },
    #[error("required completion count must be >= 1")]
    ZeroRequiredCount,
}

/// Errors emitted by `JourneyService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JourneyServiceError {
    #[error("no journey for student {student}")]
    NoJourney { student: StudentId },
    #[error("student {student} already has a journey")]
    AlreadyExists { student: StudentId },
    #[error(transparent)]
    Journey(#[from] JourneyError),
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionServiceError {
    #[error("session {id} not found")]
    NotFound { id: SessionId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
