use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{SessionId, StudentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid session status: {raw}")]
pub struct SessionStatusError {
    raw: String,
}

/// Lifecycle status of a therapy appointment.
///
/// Only `Completed` counts toward journey progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
    Missed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Missed => "missed",
        }
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "missed" => Ok(Self::Missed),
            other => Err(SessionStatusError {
                raw: other.to_owned(),
            }),
        }
    }
}

/// A scheduled therapy appointment for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TherapySession {
    id: SessionId,
    student_id: StudentId,
    status: SessionStatus,
    updated_at: DateTime<Utc>,
}

impl TherapySession {
    #[must_use]
    pub fn new(
        id: SessionId,
        student_id: StudentId,
        status: SessionStatus,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_id,
            status,
            updated_at,
        }
    }

    pub fn set_status(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_storage_form() {
        for status in [
            SessionStatus::Scheduled,
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::Missed,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("done".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
