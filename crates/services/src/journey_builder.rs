//! Administrator-side journey authoring.
//!
//! A `JourneyDraft` is the editable, unvalidated shape of a journey. Step
//! ordinals are implied by position, so removing or moving a step renumbers
//! the rest. `build` turns the draft into a validated `Journey`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use journey_core::model::{
    Journey, JourneyError, SessionId, Step, StudentId, Trophy, TrophyError, UserId,
};

use crate::error::BuilderError;

fn default_required() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrophyDraft {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub animation: Option<String>,
}

impl TrophyDraft {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            primary_color: None,
            secondary_color: None,
            animation: None,
        }
    }

    fn build(&self) -> Result<Trophy, TrophyError> {
        Ok(Trophy::new(self.name.clone())?
            .with_icon(self.icon.clone())
            .with_colors(self.primary_color.clone(), self.secondary_color.clone())
            .with_animation(self.animation.clone()))
    }

    fn from_trophy(trophy: &Trophy) -> Self {
        Self {
            name: trophy.name().to_owned(),
            icon: trophy.icon().map(str::to_owned),
            primary_color: trophy.primary_color().map(str::to_owned),
            secondary_color: trophy.secondary_color().map(str::to_owned),
            animation: trophy.animation().map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub session_ids: Vec<SessionId>,
    #[serde(default = "default_required")]
    pub required_count: u32,
    #[serde(default)]
    pub trophy: Option<TrophyDraft>,
}

impl StepDraft {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            icon: None,
            color: None,
            session_ids: Vec::new(),
            required_count: default_required(),
            trophy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub steps: Vec<StepDraft>,
}

impl JourneyDraft {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            created_by: None,
            steps: Vec::new(),
        }
    }

    /// Editable copy of a stored journey's configuration.
    #[must_use]
    pub fn from_journey(journey: &Journey) -> Self {
        Self {
            name: journey.name().to_owned(),
            description: journey.description().map(str::to_owned),
            created_by: journey.created_by().cloned(),
            steps: journey
                .steps()
                .iter()
                .map(|step| StepDraft {
                    title: step.title().to_owned(),
                    description: step.description().map(str::to_owned),
                    icon: step.icon().map(str::to_owned),
                    color: step.color().map(str::to_owned),
                    session_ids: step.session_ids().to_vec(),
                    required_count: step.required_count(),
                    trophy: step.trophy().map(TrophyDraft::from_trophy),
                })
                .collect(),
        }
    }

    /// Append a step and return its ordinal.
    pub fn add_step(&mut self, step: StepDraft) -> u32 {
        self.steps.push(step);
        u32::try_from(self.steps.len()).unwrap_or(u32::MAX)
    }

    /// Remove a step; later steps shift down by one.
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::StepNotFound` if `ordinal` is out of range.
    pub fn remove_step(&mut self, ordinal: u32) -> Result<StepDraft, BuilderError> {
        let idx = self.index_of(ordinal)?;
        Ok(self.steps.remove(idx))
    }

    /// Move a step to a new position, shifting the steps in between.
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::StepNotFound` if either ordinal is out of range.
    pub fn move_step(&mut self, from: u32, to: u32) -> Result<(), BuilderError> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;
        let step = self.steps.remove(from_idx);
        self.steps.insert(to_idx, step);
        Ok(())
    }

    /// Assign a session to a step.
    ///
    /// Re-assigning to the same step is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::StepNotFound` for a bad ordinal and
    /// `BuilderError::SessionAlreadyAssigned` if another step owns the session.
    pub fn assign_session(&mut self, ordinal: u32, session: SessionId) -> Result<(), BuilderError> {
        let idx = self.index_of(ordinal)?;
        if let Some(owner) = self.owner_of(&session) {
            if owner == ordinal {
                return Ok(());
            }
            return Err(BuilderError::SessionAlreadyAssigned {
                session_id: session,
                ordinal: owner,
            });
        }
        self.steps[idx].session_ids.push(session);
        Ok(())
    }

    /// Remove a session from a step. Returns whether it was assigned there.
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::StepNotFound` for a bad ordinal.
    pub fn unassign_session(
        &mut self,
        ordinal: u32,
        session: &SessionId,
    ) -> Result<bool, BuilderError> {
        let idx = self.index_of(ordinal)?;
        let ids = &mut self.steps[idx].session_ids;
        let before = ids.len();
        ids.retain(|id| id != session);
        Ok(ids.len() != before)
    }

    /// Attach, replace, or (with `None`) remove a step's trophy.
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::StepNotFound` for a bad ordinal.
    pub fn set_trophy(
        &mut self,
        ordinal: u32,
        trophy: Option<TrophyDraft>,
    ) -> Result<(), BuilderError> {
        let idx = self.index_of(ordinal)?;
        self.steps[idx].trophy = trophy;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `BuilderError::StepNotFound` for a bad ordinal and
    /// `BuilderError::ZeroRequiredCount` for a zero threshold.
    pub fn set_required_count(&mut self, ordinal: u32, required: u32) -> Result<(), BuilderError> {
        if required == 0 {
            return Err(BuilderError::ZeroRequiredCount);
        }
        let idx = self.index_of(ordinal)?;
        self.steps[idx].required_count = required;
        Ok(())
    }

    /// Ordinal of the step that currently owns `session`, if any.
    #[must_use]
    pub fn owner_of(&self, session: &SessionId) -> Option<u32> {
        (1_u32..)
            .zip(&self.steps)
            .find(|(_, step)| step.session_ids.contains(session))
            .map(|(ordinal, _)| ordinal)
    }

    /// Validate the draft into a new, unsaved journey for `student`.
    ///
    /// # Errors
    ///
    /// Returns `JourneyError` for any step or journey rule violation,
    /// including sessions assigned to more than one step.
    pub fn build(&self, student: StudentId, now: DateTime<Utc>) -> Result<Journey, JourneyError> {
        let mut steps = Vec::with_capacity(self.steps.len());
        for (ordinal, draft) in (1_u32..).zip(&self.steps) {
            let trophy = draft.trophy.as_ref().map(TrophyDraft::build).transpose()?;
            let step = Step::new(
                ordinal,
                draft.title.clone(),
                draft.session_ids.clone(),
                draft.required_count,
            )?
            .with_description(draft.description.clone())
            .with_icon(draft.icon.clone())
            .with_color(draft.color.clone())
            .with_trophy(trophy);
            steps.push(step);
        }

        Journey::new(
            student,
            self.name.clone(),
            self.description.clone(),
            steps,
            self.created_by.clone(),
            now,
        )
    }

    fn index_of(&self, ordinal: u32) -> Result<usize, BuilderError> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|o| o.checked_sub(1))
            .filter(|idx| *idx < self.steps.len())
            .ok_or(BuilderError::StepNotFound { ordinal })
    }
}
