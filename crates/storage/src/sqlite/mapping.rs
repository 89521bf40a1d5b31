use chrono::{DateTime, Utc};
use journey_core::model::{
    JourneyId, SessionId, SessionStatus, Step, StudentId, TherapySession, Trophy, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a write failure, surfacing unique-constraint hits as conflicts.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict(db.message().to_owned());
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn read_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn journey_id_to_i64(id: JourneyId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("journey_id overflow".into()))
}

pub(crate) fn journey_id_from_i64(v: i64) -> Result<JourneyId, StorageError> {
    u64::try_from(v)
        .map(JourneyId::new)
        .map_err(|_| StorageError::Serialization("journey_id sign overflow".into()))
}

pub(crate) fn revision_to_i64(revision: u64) -> Result<i64, StorageError> {
    i64::try_from(revision).map_err(|_| StorageError::Serialization("revision overflow".into()))
}

pub(crate) fn revision_from_i64(v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid revision: {v}")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn student_id_from_row(row: &SqliteRow) -> Result<StudentId, StorageError> {
    StudentId::new(row.try_get::<String, _>("student_id").map_err(ser)?).map_err(ser)
}

pub(crate) fn created_by_from_row(row: &SqliteRow) -> Result<Option<UserId>, StorageError> {
    row.try_get::<Option<String>, _>("created_by")
        .map_err(ser)?
        .map(UserId::new)
        .transpose()
        .map_err(ser)
}

fn trophy_from_row(row: &SqliteRow) -> Result<Option<Trophy>, StorageError> {
    let Some(name) = row.try_get::<Option<String>, _>("trophy_name").map_err(ser)? else {
        return Ok(None);
    };
    Trophy::from_persisted(
        name,
        row.try_get("trophy_icon").map_err(ser)?,
        row.try_get("trophy_primary_color").map_err(ser)?,
        row.try_get("trophy_secondary_color").map_err(ser)?,
        row.try_get("trophy_animation").map_err(ser)?,
        row.try_get::<Option<DateTime<Utc>>, _>("trophy_earned_at")
            .map_err(ser)?,
        row.try_get::<Option<DateTime<Utc>>, _>("trophy_claimed_at")
            .map_err(ser)?,
    )
    .map(Some)
    .map_err(ser)
}

pub(crate) fn map_step_row(
    row: &SqliteRow,
    session_ids: Vec<SessionId>,
) -> Result<Step, StorageError> {
    Step::from_persisted(
        u32_from_i64("ordinal", row.try_get::<i64, _>("ordinal").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get("description").map_err(ser)?,
        row.try_get("icon").map_err(ser)?,
        row.try_get("color").map_err(ser)?,
        session_ids,
        u32_from_i64(
            "required_count",
            row.try_get::<i64, _>("required_count").map_err(ser)?,
        )?,
        row.try_get::<Option<DateTime<Utc>>, _>("completed_at")
            .map_err(ser)?,
        row.try_get::<Option<DateTime<Utc>>, _>("unlocked_at")
            .map_err(ser)?,
        trophy_from_row(row)?,
    )
    .map_err(ser)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<TherapySession, StorageError> {
    let status: SessionStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    Ok(TherapySession::new(
        SessionId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?,
        student_id_from_row(row)?,
        status,
        row.try_get("updated_at").map_err(ser)?,
    ))
}
