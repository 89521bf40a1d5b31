use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::SessionId;
use crate::model::trophy::Trophy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    #[error("step title cannot be empty")]
    EmptyTitle,

    #[error("step ordinal must be >= 1")]
    ZeroOrdinal,

    #[error("required completion count must be >= 1")]
    ZeroRequiredCount,
}

/// One milestone of a journey, gated by a count of completed sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    ordinal: u32,
    title: String,
    description: Option<String>,
    icon: Option<String>,
    color: Option<String>,
    session_ids: Vec<SessionId>,
    required_count: u32,
    completed_at: Option<DateTime<Utc>>,
    unlocked_at: Option<DateTime<Utc>>,
    trophy: Option<Trophy>,
}

impl Step {
    /// Create a locked, incomplete step.
    ///
    /// Duplicate session ids are dropped, keeping first occurrence order.
    ///
    /// # Errors
    ///
    /// Returns `StepError` if the ordinal or required count is zero, or the
    /// title is blank.
    pub fn new(
        ordinal: u32,
        title: impl Into<String>,
        session_ids: Vec<SessionId>,
        required_count: u32,
    ) -> Result<Self, StepError> {
        if ordinal == 0 {
            return Err(StepError::ZeroOrdinal);
        }
        if required_count == 0 {
            return Err(StepError::ZeroRequiredCount);
        }
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(StepError::EmptyTitle);
        }

        let mut unique = Vec::with_capacity(session_ids.len());
        for id in session_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        Ok(Self {
            ordinal,
            title,
            description: None,
            icon: None,
            color: None,
            session_ids: unique,
            required_count,
            completed_at: None,
            unlocked_at: None,
            trophy: None,
        })
    }

    /// Rehydrate a step from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `StepError` on the same validation failures as [`Step::new`].
    /// A later step may carry a completion stamp without an unlock stamp when
    /// its sessions finished before the previous step did.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        ordinal: u32,
        title: String,
        description: Option<String>,
        icon: Option<String>,
        color: Option<String>,
        session_ids: Vec<SessionId>,
        required_count: u32,
        completed_at: Option<DateTime<Utc>>,
        unlocked_at: Option<DateTime<Utc>>,
        trophy: Option<Trophy>,
    ) -> Result<Self, StepError> {
        let mut step = Self::new(ordinal, title, session_ids, required_count)?;
        step.description = description;
        step.icon = icon;
        step.color = color;
        step.completed_at = completed_at;
        step.unlocked_at = unlocked_at;
        step.trophy = trophy;
        Ok(step)
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_trophy(mut self, trophy: Option<Trophy>) -> Self {
        self.trophy = trophy;
        self
    }

    /// Stamp completion. Returns `false` if the step was already completed.
    pub(crate) fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        if self.completed_at.is_some() {
            return false;
        }
        self.completed_at = Some(now);
        true
    }

    /// Stamp the unlock time. Returns `false` if already unlocked.
    pub(crate) fn unlock(&mut self, now: DateTime<Utc>) -> bool {
        if self.unlocked_at.is_some() {
            return false;
        }
        self.unlocked_at = Some(now);
        true
    }

    /// Keep the earlier of the current and carried unlock times.
    pub(crate) fn carry_unlock(&mut self, at: DateTime<Utc>) {
        match self.unlocked_at {
            Some(current) if current <= at => {}
            _ => self.unlocked_at = Some(at),
        }
    }

    pub(crate) fn trophy_mut(&mut self) -> Option<&mut Trophy> {
        self.trophy.as_mut()
    }

    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    #[must_use]
    pub fn session_ids(&self) -> &[SessionId] {
        &self.session_ids
    }

    #[must_use]
    pub fn required_count(&self) -> u32 {
        self.required_count
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn unlocked_at(&self) -> Option<DateTime<Utc>> {
        self.unlocked_at
    }

    #[must_use]
    pub fn trophy(&self) -> Option<&Trophy> {
        self.trophy.as_ref()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}
