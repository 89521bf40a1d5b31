use journey_core::model::{SessionId, SessionStatus, StudentId, TherapySession};
use journey_core::progress::CompletedSessions;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{map_session_row, read_err, ser, write_err};
use crate::repository::{SessionRepository, StorageError};

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn upsert_session(&self, session: &TherapySession) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO sessions (id, student_id, status, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at
            WHERE sessions.student_id = excluded.student_id
            ",
        )
        .bind(session.id().as_str())
        .bind(session.student_id().as_str())
        .bind(session.status().as_str())
        .bind(session.updated_at())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        // The upsert guard skips rows owned by another student.
        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "session {} belongs to another student",
                session.id()
            )));
        }
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<TherapySession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, student_id, status, updated_at
            FROM sessions WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn list_sessions(
        &self,
        student: &StudentId,
    ) -> Result<Vec<TherapySession>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, student_id, status, updated_at
            FROM sessions
            WHERE student_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(student.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_session_row(row)?);
        }
        Ok(out)
    }

    async fn completed_session_ids(
        &self,
        student: &StudentId,
    ) -> Result<CompletedSessions, StorageError> {
        let rows = sqlx::query("SELECT id FROM sessions WHERE student_id = ?1 AND status = ?2")
            .bind(student.as_str())
            .bind(SessionStatus::Completed.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;

        let mut out = CompletedSessions::with_capacity(rows.len());
        for row in rows {
            let id = SessionId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?;
            out.insert(id);
        }
        Ok(out)
    }
}
