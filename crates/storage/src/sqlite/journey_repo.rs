use std::collections::BTreeMap;

use journey_core::model::{Journey, SessionId, Step, StudentId};
use sqlx::{Row, Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{
    created_by_from_row, journey_id_from_i64, journey_id_to_i64, map_step_row, read_err,
    revision_from_i64, revision_to_i64, ser, student_id_from_row, u32_from_i64, write_err,
};
use crate::repository::{JourneyRepository, StorageError};

async fn insert_steps(
    tx: &mut Transaction<'_, Sqlite>,
    journey_id: i64,
    steps: &[Step],
) -> Result<(), StorageError> {
    for step in steps {
        let ordinal = i64::from(step.ordinal());
        let trophy = step.trophy();

        sqlx::query(
            r"
            INSERT INTO journey_steps (
                journey_id, ordinal, title, description, icon, color, required_count,
                completed_at, unlocked_at, trophy_name, trophy_icon, trophy_primary_color,
                trophy_secondary_color, trophy_animation, trophy_earned_at, trophy_claimed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ",
        )
        .bind(journey_id)
        .bind(ordinal)
        .bind(step.title())
        .bind(step.description())
        .bind(step.icon())
        .bind(step.color())
        .bind(i64::from(step.required_count()))
        .bind(step.completed_at())
        .bind(step.unlocked_at())
        .bind(trophy.map(|t| t.name()))
        .bind(trophy.and_then(|t| t.icon()))
        .bind(trophy.and_then(|t| t.primary_color()))
        .bind(trophy.and_then(|t| t.secondary_color()))
        .bind(trophy.and_then(|t| t.animation()))
        .bind(trophy.and_then(|t| t.earned_at()))
        .bind(trophy.and_then(|t| t.claimed_at()))
        .execute(&mut **tx)
        .await
        .map_err(write_err)?;

        for (position, session) in (0_i64..).zip(step.session_ids()) {
            sqlx::query(
                r"
                INSERT INTO journey_step_sessions (journey_id, ordinal, position, session_id)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(journey_id)
            .bind(ordinal)
            .bind(position)
            .bind(session.as_str())
            .execute(&mut **tx)
            .await
            .map_err(write_err)?;
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl JourneyRepository for SqliteRepository {
    async fn insert_journey(&self, journey: &Journey) -> Result<Journey, StorageError> {
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO journeys (student_id, name, description, active, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(journey.student_id().as_str())
        .bind(journey.name())
        .bind(journey.description())
        .bind(i64::from(journey.is_active()))
        .bind(journey.created_by().map(|u| u.as_str()))
        .bind(journey.created_at())
        .bind(journey.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        let journey_id = res.last_insert_rowid();
        insert_steps(&mut tx, journey_id, journey.steps()).await?;
        tx.commit().await.map_err(write_err)?;

        Ok(journey
            .clone()
            .with_id(journey_id_from_i64(journey_id)?)
            .with_revision(0))
    }

    async fn save_journey(&self, journey: &Journey) -> Result<Journey, StorageError> {
        let journey_id = journey_id_to_i64(journey.id().ok_or(StorageError::NotFound)?)?;
        let expected = revision_to_i64(journey.revision())?;
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        let res = sqlx::query(
            r"
            UPDATE journeys SET
                name = ?2,
                description = ?3,
                active = ?4,
                created_by = ?5,
                updated_at = ?6,
                revision = revision + 1
            WHERE id = ?1 AND student_id = ?7 AND revision = ?8
            ",
        )
        .bind(journey_id)
        .bind(journey.name())
        .bind(journey.description())
        .bind(i64::from(journey.is_active()))
        .bind(journey.created_by().map(|u| u.as_str()))
        .bind(journey.updated_at())
        .bind(journey.student_id().as_str())
        .bind(expected)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        if res.rows_affected() == 0 {
            let stored: Option<i64> =
                sqlx::query_scalar("SELECT revision FROM journeys WHERE id = ?1 AND student_id = ?2")
                    .bind(journey_id)
                    .bind(journey.student_id().as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(read_err)?;
            return Err(match stored {
                Some(current) => StorageError::Conflict(format!(
                    "journey {journey_id} is at revision {current}, expected {expected}"
                )),
                None => StorageError::NotFound,
            });
        }

        sqlx::query("DELETE FROM journey_step_sessions WHERE journey_id = ?1")
            .bind(journey_id)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        sqlx::query("DELETE FROM journey_steps WHERE journey_id = ?1")
            .bind(journey_id)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

        insert_steps(&mut tx, journey_id, journey.steps()).await?;
        tx.commit().await.map_err(write_err)?;
        Ok(journey.clone().with_revision(journey.revision() + 1))
    }

    async fn get_journey_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Option<Journey>, StorageError> {
        // Journey row, assignments, and steps come from one snapshot.
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        let Some(row) = sqlx::query(
            r"
            SELECT
                id, student_id, name, description, active, created_by, created_at,
                updated_at, revision
            FROM journeys WHERE student_id = ?1
            ",
        )
        .bind(student.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(read_err)?
        else {
            return Ok(None);
        };

        let journey_id: i64 = row.try_get("id").map_err(ser)?;

        let assignment_rows = sqlx::query(
            r"
            SELECT ordinal, session_id
            FROM journey_step_sessions
            WHERE journey_id = ?1
            ORDER BY ordinal ASC, position ASC
            ",
        )
        .bind(journey_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(read_err)?;

        let mut assignments: BTreeMap<u32, Vec<SessionId>> = BTreeMap::new();
        for a in assignment_rows {
            let ordinal = u32_from_i64("ordinal", a.try_get::<i64, _>("ordinal").map_err(ser)?)?;
            let session =
                SessionId::new(a.try_get::<String, _>("session_id").map_err(ser)?).map_err(ser)?;
            assignments.entry(ordinal).or_default().push(session);
        }

        let step_rows = sqlx::query(
            r"
            SELECT
                ordinal, title, description, icon, color, required_count, completed_at,
                unlocked_at, trophy_name, trophy_icon, trophy_primary_color,
                trophy_secondary_color, trophy_animation, trophy_earned_at, trophy_claimed_at
            FROM journey_steps
            WHERE journey_id = ?1
            ORDER BY ordinal ASC
            ",
        )
        .bind(journey_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(read_err)?;

        let mut steps = Vec::with_capacity(step_rows.len());
        for step_row in &step_rows {
            let ordinal =
                u32_from_i64("ordinal", step_row.try_get::<i64, _>("ordinal").map_err(ser)?)?;
            let sessions = assignments.remove(&ordinal).unwrap_or_default();
            steps.push(map_step_row(step_row, sessions)?);
        }

        let journey = Journey::from_persisted(
            journey_id_from_i64(journey_id)?,
            student_id_from_row(&row)?,
            row.try_get::<String, _>("name").map_err(ser)?,
            row.try_get("description").map_err(ser)?,
            steps,
            row.try_get::<i64, _>("active").map_err(ser)? != 0,
            created_by_from_row(&row)?,
            row.try_get("created_at").map_err(ser)?,
            row.try_get("updated_at").map_err(ser)?,
        )
        .map_err(ser)?
        .with_revision(revision_from_i64(
            row.try_get::<i64, _>("revision").map_err(ser)?,
        )?);
        tx.commit().await.map_err(read_err)?;

        Ok(Some(journey))
    }

    async fn delete_journey_for_student(&self, student: &StudentId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM journeys WHERE student_id = ?1")
            .bind(student.as_str())
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(res.rows_affected() > 0)
    }
}
