use std::sync::Arc;

use tracing::{debug, info};

use journey_core::model::{SessionId, SessionStatus, StudentId, TherapySession};
use journey_core::progress::CompletedSessions;
use storage::repository::SessionRepository;

use crate::Clock;
use crate::error::SessionServiceError;
use crate::journey_service::JourneyService;

/// Records session outcomes and keeps the owning student's journey in step.
#[derive(Clone)]
pub struct SessionService {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    journeys: Option<Arc<JourneyService>>,
}

impl SessionService {
    #[must_use]
    pub fn new(clock: Clock, sessions: Arc<dyn SessionRepository>) -> Self {
        Self {
            clock,
            sessions,
            journeys: None,
        }
    }

    /// Sync journey progress whenever a session is completed.
    #[must_use]
    pub fn with_journeys(mut self, journeys: Arc<JourneyService>) -> Self {
        self.journeys = Some(journeys);
        self
    }

    /// Create or update a session for `student`.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if persistence fails, including
    /// a conflict when the session id already belongs to another student.
    pub async fn record_session(
        &self,
        id: SessionId,
        student: StudentId,
        status: SessionStatus,
    ) -> Result<TherapySession, SessionServiceError> {
        let session = TherapySession::new(id, student, status, self.clock.now());
        self.sessions.upsert_session(&session).await?;
        debug!(session = %session.id(), status = %status, "session recorded");
        self.after_status_change(&session).await;
        Ok(session)
    }

    /// Change the status of an existing session.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::NotFound` for an unknown id and
    /// `SessionServiceError::Storage` if persistence fails.
    pub async fn set_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
    ) -> Result<TherapySession, SessionServiceError> {
        let mut session = self
            .sessions
            .get_session(id)
            .await?
            .ok_or_else(|| SessionServiceError::NotFound { id: id.clone() })?;
        if session.status() == status {
            return Ok(session);
        }

        session.set_status(status, self.clock.now());
        self.sessions.upsert_session(&session).await?;
        info!(session = %id, status = %status, "session status changed");
        self.after_status_change(&session).await;
        Ok(session)
    }

    /// All sessions for a student, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if repository access fails.
    pub async fn list_sessions(
        &self,
        student: &StudentId,
    ) -> Result<Vec<TherapySession>, SessionServiceError> {
        Ok(self.sessions.list_sessions(student).await?)
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if repository access fails.
    pub async fn completed_session_ids(
        &self,
        student: &StudentId,
    ) -> Result<CompletedSessions, SessionServiceError> {
        Ok(self.sessions.completed_session_ids(student).await?)
    }

    async fn after_status_change(&self, session: &TherapySession) {
        if !session.status().is_completed() {
            return;
        }
        if let Some(journeys) = &self.journeys {
            journeys.sync_progress(session.student_id()).await;
        }
    }
}
