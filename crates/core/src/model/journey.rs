use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{JourneyId, SessionId, StudentId, UserId};
use crate::model::step::{Step, StepError};
use crate::model::trophy::{Trophy, TrophyError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum JourneyError {
    #[error("journey name cannot be empty")]
    EmptyName,

    #[error("journey must contain at least one step")]
    NoSteps,

    #[error("step ordinals must be contiguous from 1: expected {expected}, found {found}")]
    NonContiguousOrdinals { expected: u32, found: u32 },

    #[error("session {session_id} is assigned to steps {first} and {second}")]
    OverlappingSession {
        session_id: SessionId,
        first: u32,
        second: u32,
    },

    #[error("journey has too many steps: {len}")]
    TooManySteps { len: usize },

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Trophy(#[from] TrophyError),
}

/// Reasons a trophy claim is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClaimError {
    #[error("step {ordinal} does not exist")]
    StepNotFound { ordinal: u32 },

    #[error("step {ordinal} has no trophy")]
    NoTrophy { ordinal: u32 },

    #[error("step {ordinal} is not completed")]
    StepNotCompleted { ordinal: u32 },

    #[error("trophy for step {ordinal} was already claimed")]
    AlreadyClaimed { ordinal: u32 },
}

//
// ─── JOURNEY ───────────────────────────────────────────────────────────────────
//

/// A student's ordered sequence of achievement steps.
///
/// Steps are always stored sorted, with ordinals `1..=n` and pairwise
/// disjoint session lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Journey {
    id: Option<JourneyId>,
    student_id: StudentId,
    name: String,
    description: Option<String>,
    steps: Vec<Step>,
    active: bool,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Storage revision this copy was loaded at; a save against a newer
    /// stored revision is refused.
    #[serde(skip)]
    revision: u64,
}

impl Journey {
    /// Create a new, unsaved journey. The first step is unlocked at `now`.
    ///
    /// # Errors
    ///
    /// Returns `JourneyError` if the name is blank or the steps break the
    /// ordinal or disjointness rules.
    pub fn new(
        student_id: StudentId,
        name: impl Into<String>,
        description: Option<String>,
        mut steps: Vec<Step>,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Self, JourneyError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(JourneyError::EmptyName);
        }
        validate_steps(&steps)?;
        if let Some(first) = steps.first_mut() {
            first.unlock(now);
        }

        Ok(Self {
            id: None,
            student_id,
            name,
            description,
            steps,
            active: true,
            created_by,
            created_at: now,
            updated_at: now,
            revision: 0,
        })
    }

    /// Rehydrate a journey from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `JourneyError` if the stored steps violate the journey rules.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: JourneyId,
        student_id: StudentId,
        name: String,
        description: Option<String>,
        steps: Vec<Step>,
        active: bool,
        created_by: Option<UserId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, JourneyError> {
        if name.trim().is_empty() {
            return Err(JourneyError::EmptyName);
        }
        validate_steps(&steps)?;
        Ok(Self {
            id: Some(id),
            student_id,
            name,
            description,
            steps,
            active,
            created_by,
            created_at,
            updated_at,
            revision: 0,
        })
    }

    /// Return a copy carrying the storage-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: JourneyId) -> Self {
        self.id = Some(id);
        self
    }

    /// Return a copy tagged with the storage revision it corresponds to.
    #[must_use]
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Take over identity and progress from the journey this one replaces.
    ///
    /// Steps are matched by ordinal. Completion, unlock, and trophy stamps
    /// are carried so an overwrite never regresses a student's progress.
    pub fn adopt_previous(&mut self, previous: &Journey) {
        self.id = previous.id;
        self.revision = previous.revision;
        self.created_at = previous.created_at;
        self.active = previous.active;
        if self.created_by.is_none() {
            self.created_by.clone_from(&previous.created_by);
        }

        let by_ordinal: HashMap<u32, &Step> =
            previous.steps.iter().map(|s| (s.ordinal(), s)).collect();

        for step in &mut self.steps {
            let Some(old) = by_ordinal.get(&step.ordinal()) else {
                continue;
            };
            if let Some(at) = old.unlocked_at() {
                step.carry_unlock(at);
            }
            if let Some(at) = old.completed_at() {
                step.mark_completed(at);
            }
            if let (Some(new_trophy), Some(old_trophy)) = (step.trophy_mut(), old.trophy()) {
                match (old_trophy.earned_at(), old_trophy.claimed_at()) {
                    (Some(earned), Some(claimed)) => new_trophy.restore_claim(earned, claimed),
                    (Some(earned), None) => {
                        new_trophy.mark_earned(earned);
                    }
                    _ => {}
                }
            }
        }

        // Steps appended after a carried completion must still open up.
        for idx in 1..self.steps.len() {
            if let Some(done) = self.steps[idx - 1].completed_at() {
                self.steps[idx].unlock(done);
            }
        }
    }

    /// Claim the trophy of the step at `ordinal`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError` if the step is missing, has no trophy, is not
    /// completed, or its trophy was already claimed.
    pub fn claim_trophy(&mut self, ordinal: u32, now: DateTime<Utc>) -> Result<&Trophy, ClaimError> {
        let step = self
            .step_mut(ordinal)
            .ok_or(ClaimError::StepNotFound { ordinal })?;
        if step.trophy().is_none() {
            return Err(ClaimError::NoTrophy { ordinal });
        }
        let completed_at = step
            .completed_at()
            .ok_or(ClaimError::StepNotCompleted { ordinal })?;
        let trophy = step.trophy_mut().ok_or(ClaimError::NoTrophy { ordinal })?;

        trophy.mark_earned(completed_at);
        match trophy.claim(now) {
            Ok(()) => {}
            Err(TrophyError::AlreadyClaimed) => return Err(ClaimError::AlreadyClaimed { ordinal }),
            Err(_) => return Err(ClaimError::StepNotCompleted { ordinal }),
        }
        self.updated_at = now;

        self.step(ordinal)
            .and_then(Step::trophy)
            .ok_or(ClaimError::NoTrophy { ordinal })
    }

    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        if self.active != active {
            self.active = active;
            self.updated_at = now;
        }
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }

    fn step_mut(&mut self, ordinal: u32) -> Option<&mut Step> {
        let idx = usize::try_from(ordinal).ok()?.checked_sub(1)?;
        self.steps.get_mut(idx)
    }

    #[must_use]
    pub fn step(&self, ordinal: u32) -> Option<&Step> {
        let idx = usize::try_from(ordinal).ok()?.checked_sub(1)?;
        self.steps.get(idx)
    }

    #[must_use]
    pub fn id(&self) -> Option<JourneyId> {
        self.id
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn created_by(&self) -> Option<&UserId> {
        self.created_by.as_ref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn validate_steps(steps: &[Step]) -> Result<(), JourneyError> {
    if steps.is_empty() {
        return Err(JourneyError::NoSteps);
    }
    if u32::try_from(steps.len()).is_err() {
        return Err(JourneyError::TooManySteps { len: steps.len() });
    }

    let mut owners: HashMap<&SessionId, u32> = HashMap::new();
    for (expected, step) in (1_u32..).zip(steps) {
        if step.ordinal() != expected {
            return Err(JourneyError::NonContiguousOrdinals {
                expected,
                found: step.ordinal(),
            });
        }
        for session in step.session_ids() {
            if let Some(first) = owners.insert(session, step.ordinal()) {
                return Err(JourneyError::OverlappingSession {
                    session_id: session.clone(),
                    first,
                    second: step.ordinal(),
                });
            }
        }
    }
    Ok(())
}
