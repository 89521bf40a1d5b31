use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrophyError {
    #[error("trophy name cannot be empty")]
    EmptyName,

    #[error("trophy has not been earned yet")]
    NotEarned,

    #[error("trophy was already claimed")]
    AlreadyClaimed,

    #[error("claimed_at is set but earned_at is missing")]
    ClaimedWithoutEarned,
}

/// Cosmetic reward attached to a journey step.
///
/// `earned_at` is stamped when the owning step completes; `claimed_at` when a
/// parent or admin collects it. Both are write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trophy {
    name: String,
    icon: Option<String>,
    primary_color: Option<String>,
    secondary_color: Option<String>,
    animation: Option<String>,
    earned_at: Option<DateTime<Utc>>,
    claimed_at: Option<DateTime<Utc>>,
}

impl Trophy {
    /// Create an unearned trophy.
    ///
    /// # Errors
    ///
    /// Returns `TrophyError::EmptyName` if the name is blank.
    pub fn new(name: impl Into<String>) -> Result<Self, TrophyError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(TrophyError::EmptyName);
        }
        Ok(Self {
            name,
            icon: None,
            primary_color: None,
            secondary_color: None,
            animation: None,
            earned_at: None,
            claimed_at: None,
        })
    }

    /// Rehydrate a trophy from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `TrophyError::EmptyName` for a blank name and
    /// `TrophyError::ClaimedWithoutEarned` if the timestamps are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        name: String,
        icon: Option<String>,
        primary_color: Option<String>,
        secondary_color: Option<String>,
        animation: Option<String>,
        earned_at: Option<DateTime<Utc>>,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, TrophyError> {
        if claimed_at.is_some() && earned_at.is_none() {
            return Err(TrophyError::ClaimedWithoutEarned);
        }
        let mut trophy = Self::new(name)?;
        trophy.icon = icon;
        trophy.primary_color = primary_color;
        trophy.secondary_color = secondary_color;
        trophy.animation = animation;
        trophy.earned_at = earned_at;
        trophy.claimed_at = claimed_at;
        Ok(trophy)
    }

    #[must_use]
    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }

    #[must_use]
    pub fn with_colors(mut self, primary: Option<String>, secondary: Option<String>) -> Self {
        self.primary_color = primary;
        self.secondary_color = secondary;
        self
    }

    #[must_use]
    pub fn with_animation(mut self, animation: Option<String>) -> Self {
        self.animation = animation;
        self
    }

    /// Stamp the earned timestamp. Returns `false` if it was already earned.
    pub fn mark_earned(&mut self, now: DateTime<Utc>) -> bool {
        if self.earned_at.is_some() {
            return false;
        }
        self.earned_at = Some(now);
        true
    }

    /// Claim an earned trophy.
    ///
    /// # Errors
    ///
    /// Returns `TrophyError::NotEarned` before the trophy is earned and
    /// `TrophyError::AlreadyClaimed` on a second claim.
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), TrophyError> {
        if self.earned_at.is_none() {
            return Err(TrophyError::NotEarned);
        }
        if self.claimed_at.is_some() {
            return Err(TrophyError::AlreadyClaimed);
        }
        self.claimed_at = Some(now);
        Ok(())
    }

    /// Carry a previous claim over after an admin overwrite.
    pub(crate) fn restore_claim(&mut self, earned_at: DateTime<Utc>, claimed_at: DateTime<Utc>) {
        self.earned_at.get_or_insert(earned_at);
        self.claimed_at = Some(claimed_at);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    #[must_use]
    pub fn primary_color(&self) -> Option<&str> {
        self.primary_color.as_deref()
    }

    #[must_use]
    pub fn secondary_color(&self) -> Option<&str> {
        self.secondary_color.as_deref()
    }

    #[must_use]
    pub fn animation(&self) -> Option<&str> {
        self.animation.as_deref()
    }

    #[must_use]
    pub fn earned_at(&self) -> Option<DateTime<Utc>> {
        self.earned_at
    }

    #[must_use]
    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.claimed_at
    }

    #[must_use]
    pub fn is_earned(&self) -> bool {
        self.earned_at.is_some()
    }

    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }
}
