use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use journey_core::model::{Journey, StudentId, Trophy};
use journey_core::progress::{
    CompletedSessions, JourneyProgress, apply_completions, evaluate_journey,
};
use storage::repository::{JourneyRepository, SessionRepository, StorageError};

use crate::Clock;
use crate::error::JourneyServiceError;
use crate::journey_builder::JourneyDraft;

/// Saves attempted per operation before a concurrent-write conflict is
/// returned to the caller.
const MAX_SAVE_ATTEMPTS: u32 = 3;

/// A journey together with its freshly evaluated progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JourneyProgressView {
    pub journey: Journey,
    pub progress: JourneyProgress,
}

/// Stores journeys, folds session completions into them, and gates trophy
/// claims.
#[derive(Clone)]
pub struct JourneyService {
    clock: Clock,
    journeys: Arc<dyn JourneyRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl JourneyService {
    #[must_use]
    pub fn new(
        clock: Clock,
        journeys: Arc<dyn JourneyRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            journeys,
            sessions,
        }
    }

    /// Fetch a student's journey without evaluating progress.
    ///
    /// Returns `Ok(None)` when the student has no journey.
    ///
    /// # Errors
    ///
    /// Returns `JourneyServiceError::Storage` if repository access fails.
    pub async fn get_journey(
        &self,
        student: &StudentId,
    ) -> Result<Option<Journey>, JourneyServiceError> {
        Ok(self.journeys.get_journey_for_student(student).await?)
    }

    /// Build a journey from `draft` and store it for `student`.
    ///
    /// Sessions the student already completed are applied before saving.
    ///
    /// # Errors
    ///
    /// Returns `JourneyServiceError::AlreadyExists` if the student has a
    /// journey, `JourneyServiceError::Journey` if the draft is invalid, and
    /// `JourneyServiceError::Storage` on repository failures.
    pub async fn create_journey(
        &self,
        student: &StudentId,
        draft: &JourneyDraft,
    ) -> Result<Journey, JourneyServiceError> {
        let now = self.clock.now();
        let mut journey = draft.build(student.clone(), now)?;

        let completed = self.sessions.completed_session_ids(student).await?;
        apply_completions(&mut journey, &completed, now);

        let stored = self
            .journeys
            .insert_journey(&journey)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(_) => JourneyServiceError::AlreadyExists {
                    student: student.clone(),
                },
                other => other.into(),
            })?;

        info!(
            student = %student,
            steps = stored.steps().len(),
            "journey created"
        );
        Ok(stored)
    }

    /// Overwrite a student's journey with `draft` (last write wins).
    ///
    /// Identity, completions, and trophy claims carry over by ordinal, including
    /// claims made while the overwrite was in flight.
    ///
    /// # Errors
    ///
    /// Returns `JourneyServiceError::NoJourney` if there is nothing to
    /// replace, `JourneyServiceError::Journey` if the draft is invalid, and
    /// `JourneyServiceError::Storage` on repository failures.
    pub async fn replace_journey(
        &self,
        student: &StudentId,
        draft: &JourneyDraft,
    ) -> Result<Journey, JourneyServiceError> {
        let (journey, ()) = self
            .update(student, |journey, completed, now| {
                let mut next = draft.build(student.clone(), now)?;
                next.adopt_previous(journey);
                apply_completions(&mut next, completed, now);
                *journey = next;
                Ok(())
            })
            .await?;
        info!(student = %student, steps = journey.steps().len(), "journey replaced");
        Ok(journey)
    }

    /// Toggle whether the journey is shown to the student.
    ///
    /// # Errors
    ///
    /// Returns `JourneyServiceError::NoJourney` if the student has no journey
    /// and `JourneyServiceError::Storage` on repository failures.
    pub async fn set_active(
        &self,
        student: &StudentId,
        active: bool,
    ) -> Result<Journey, JourneyServiceError> {
        let (journey, ()) = self
            .update(student, |journey, _, now| {
                journey.set_active(active, now);
                Ok(())
            })
            .await?;
        Ok(journey)
    }

    /// Delete the student's journey outright. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `JourneyServiceError::Storage` on repository failures.
    pub async fn reset_journey(&self, student: &StudentId) -> Result<bool, JourneyServiceError> {
        let deleted = self.journeys.delete_journey_for_student(student).await?;
        info!(student = %student, deleted, "journey reset");
        Ok(deleted)
    }

    /// Fold completed sessions into the stored journey.
    ///
    /// Returns whether any step changed. Load and save failures are logged
    /// and reported as `false`.
    pub async fn sync_progress(&self, student: &StudentId) -> bool {
        let (journey, completed) = match self.load(student).await {
            Ok(loaded) => loaded,
            Err(JourneyServiceError::NoJourney { .. }) => return false,
            Err(e) => {
                warn!(student = %student, error = %e, "failed to load journey progress");
                return false;
            }
        };
        let (_, _, changed) = self.sync_loaded(student, journey, completed).await;
        changed
    }

    /// Sync and evaluate a student's journey.
    ///
    /// Returns `Ok(None)` when the student has no journey.
    ///
    /// # Errors
    ///
    /// Returns `JourneyServiceError::Storage` if the journey or sessions
    /// cannot be read. Failing to persist new completions is only logged.
    pub async fn journey_progress(
        &self,
        student: &StudentId,
    ) -> Result<Option<JourneyProgressView>, JourneyServiceError> {
        let (journey, completed) = match self.load(student).await {
            Ok(loaded) => loaded,
            Err(JourneyServiceError::NoJourney { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let (journey, completed, _) = self.sync_loaded(student, journey, completed).await;

        let progress = evaluate_journey(&journey, &completed);
        Ok(Some(JourneyProgressView { journey, progress }))
    }

    /// Claim the trophy on step `ordinal`.
    ///
    /// Progress is synced first so a claim right after the qualifying
    /// session completes succeeds. Of two concurrent claims on the same step,
    /// exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns `JourneyServiceError::NoJourney`, `JourneyServiceError::Claim`
    /// when the step is missing, has no trophy, is incomplete, or was already
    /// claimed, and `JourneyServiceError::Storage` on repository failures.
    pub async fn claim_trophy(
        &self,
        student: &StudentId,
        ordinal: u32,
    ) -> Result<Trophy, JourneyServiceError> {
        let (_, trophy) = self
            .update(student, |journey, completed, now| {
                apply_completions(journey, completed, now);
                Ok(journey.claim_trophy(ordinal, now)?.clone())
            })
            .await?;

        info!(student = %student, ordinal, trophy = trophy.name(), "trophy claimed");
        Ok(trophy)
    }

    /// Read the journey and the completed-session set together.
    async fn load(
        &self,
        student: &StudentId,
    ) -> Result<(Journey, CompletedSessions), JourneyServiceError> {
        let (journey, completed) = tokio::try_join!(
            self.journeys.get_journey_for_student(student),
            self.sessions.completed_session_ids(student),
        )?;
        let journey = journey.ok_or_else(|| JourneyServiceError::NoJourney {
            student: student.clone(),
        })?;
        Ok((journey, completed))
    }

    /// Load, edit, and save the journey. When another writer saved in
    /// between, the journey is reloaded and `edit` runs again on the fresh
    /// copy, so its checks always see the latest stored state.
    async fn update<T, F>(
        &self,
        student: &StudentId,
        mut edit: F,
    ) -> Result<(Journey, T), JourneyServiceError>
    where
        F: FnMut(&mut Journey, &CompletedSessions, DateTime<Utc>) -> Result<T, JourneyServiceError>,
    {
        let mut attempt = 1;
        loop {
            let (mut journey, completed) = self.load(student).await?;
            let value = edit(&mut journey, &completed, self.clock.now())?;
            match self.journeys.save_journey(&journey).await {
                Ok(saved) => return Ok((saved, value)),
                Err(StorageError::Conflict(reason)) if attempt < MAX_SAVE_ATTEMPTS => {
                    debug!(student = %student, attempt, %reason, "journey changed underneath update");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Stamp new completions on a loaded journey and persist them.
    ///
    /// Returns the freshest journey known, the session set it was evaluated
    /// against, and whether this call saved anything. Failures are logged.
    async fn sync_loaded(
        &self,
        student: &StudentId,
        mut journey: Journey,
        mut completed: CompletedSessions,
    ) -> (Journey, CompletedSessions, bool) {
        let mut attempt = 1;
        loop {
            if !apply_completions(&mut journey, &completed, self.clock.now()) {
                return (journey, completed, false);
            }
            match self.journeys.save_journey(&journey).await {
                Ok(saved) => {
                    debug!(student = %student, "journey progress updated");
                    return (saved, completed, true);
                }
                Err(StorageError::Conflict(reason)) if attempt < MAX_SAVE_ATTEMPTS => {
                    debug!(student = %student, attempt, %reason, "journey changed underneath sync");
                    attempt += 1;
                    match self.load(student).await {
                        Ok(reloaded) => (journey, completed) = reloaded,
                        Err(e) => {
                            warn!(student = %student, error = %e, "failed to reload journey progress");
                            return (journey, completed, false);
                        }
                    }
                }
                Err(e) => {
                    warn!(student = %student, error = %e, "failed to persist journey progress");
                    return (journey, completed, false);
                }
            }
        }
    }
}
