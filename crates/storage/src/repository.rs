use async_trait::async_trait;
use journey_core::model::{
    Journey, JourneyId, SessionId, SessionStatus, StudentId, TherapySession,
};
use journey_core::progress::CompletedSessions;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait JourneyRepository: Send + Sync {
    /// Persist a new journey and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the student already has a journey.
    async fn insert_journey(&self, journey: &Journey) -> Result<Journey, StorageError>;

    /// Overwrite an existing journey and all of its steps.
    ///
    /// The save only applies if the stored revision still equals
    /// `journey.revision()`. Returns the journey tagged with its new revision.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the journey has no id or no stored
    /// row matches it, and `StorageError::Conflict` if the stored journey was
    /// saved since `journey` was loaded.
    async fn save_journey(&self, journey: &Journey) -> Result<Journey, StorageError>;

    /// Fetch the journey for a student, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn get_journey_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Option<Journey>, StorageError>;

    /// Delete the student's journey. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_journey_for_student(&self, student: &StudentId) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert or replace a session record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already belongs to another
    /// student.
    async fn upsert_session(&self, session: &TherapySession) -> Result<(), StorageError>;

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn get_session(&self, id: &SessionId) -> Result<Option<TherapySession>, StorageError>;

    /// List a student's sessions ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn list_sessions(&self, student: &StudentId)
    -> Result<Vec<TherapySession>, StorageError>;

    /// Ids of the student's sessions whose status is `completed`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn completed_session_ids(
        &self,
        student: &StudentId,
    ) -> Result<CompletedSessions, StorageError>;
}

#[derive(Default)]
struct JourneyTable {
    next_id: u64,
    by_student: HashMap<StudentId, Journey>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    journeys: Arc<Mutex<JourneyTable>>,
    sessions: Arc<Mutex<HashMap<SessionId, TherapySession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl JourneyRepository for InMemoryRepository {
    async fn insert_journey(&self, journey: &Journey) -> Result<Journey, StorageError> {
        let mut guard = self.journeys.lock().map_err(poisoned)?;
        if guard.by_student.contains_key(journey.student_id()) {
            return Err(StorageError::Conflict(format!(
                "journey already exists for student {}",
                journey.student_id()
            )));
        }
        guard.next_id += 1;
        let stored = journey
            .clone()
            .with_id(JourneyId::new(guard.next_id))
            .with_revision(0);
        guard
            .by_student
            .insert(stored.student_id().clone(), stored.clone());
        Ok(stored)
    }

    async fn save_journey(&self, journey: &Journey) -> Result<Journey, StorageError> {
        let id = journey.id().ok_or(StorageError::NotFound)?;
        let mut guard = self.journeys.lock().map_err(poisoned)?;
        match guard.by_student.get_mut(journey.student_id()) {
            Some(existing) if existing.id() == Some(id) => {
                if existing.revision() != journey.revision() {
                    return Err(StorageError::Conflict(format!(
                        "journey {} is at revision {}, expected {}",
                        id.value(),
                        existing.revision(),
                        journey.revision()
                    )));
                }
                let saved = journey.clone().with_revision(journey.revision() + 1);
                *existing = saved.clone();
                Ok(saved)
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn get_journey_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Option<Journey>, StorageError> {
        let guard = self.journeys.lock().map_err(poisoned)?;
        Ok(guard.by_student.get(student).cloned())
    }

    async fn delete_journey_for_student(&self, student: &StudentId) -> Result<bool, StorageError> {
        let mut guard = self.journeys.lock().map_err(poisoned)?;
        Ok(guard.by_student.remove(student).is_some())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn upsert_session(&self, session: &TherapySession) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        if let Some(existing) = guard.get(session.id()) {
            if existing.student_id() != session.student_id() {
                return Err(StorageError::Conflict(format!(
                    "session {} belongs to another student",
                    session.id()
                )));
            }
        }
        guard.insert(session.id().clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<TherapySession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    async fn list_sessions(
        &self,
        student: &StudentId,
    ) -> Result<Vec<TherapySession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut out: Vec<TherapySession> = guard
            .values()
            .filter(|s| s.student_id() == student)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(out)
    }

    async fn completed_session_ids(
        &self,
        student: &StudentId,
    ) -> Result<CompletedSessions, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|s| s.student_id() == student && s.status() == SessionStatus::Completed)
            .map(|s| s.id().clone())
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub journeys: Arc<dyn JourneyRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let journeys: Arc<dyn JourneyRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo);
        Self { journeys, sessions }
    }
}
