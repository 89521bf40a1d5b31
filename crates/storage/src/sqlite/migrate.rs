use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates journeys with normalized steps and step-session
/// assignments, plus the session records the evaluator reads.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS journeys (
                    id INTEGER PRIMARY KEY,
                    student_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    description TEXT,
                    active INTEGER NOT NULL CHECK (active IN (0, 1)),
                    created_by TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    revision INTEGER NOT NULL DEFAULT 0 CHECK (revision >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS journey_steps (
                    journey_id INTEGER NOT NULL,
                    ordinal INTEGER NOT NULL CHECK (ordinal >= 1),
                    title TEXT NOT NULL,
                    description TEXT,
                    icon TEXT,
                    color TEXT,
                    required_count INTEGER NOT NULL CHECK (required_count >= 1),
                    completed_at TEXT,
                    unlocked_at TEXT,
                    trophy_name TEXT,
                    trophy_icon TEXT,
                    trophy_primary_color TEXT,
                    trophy_secondary_color TEXT,
                    trophy_animation TEXT,
                    trophy_earned_at TEXT,
                    trophy_claimed_at TEXT,
                    PRIMARY KEY (journey_id, ordinal),
                    FOREIGN KEY (journey_id) REFERENCES journeys(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS journey_step_sessions (
                    journey_id INTEGER NOT NULL,
                    ordinal INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    session_id TEXT NOT NULL,
                    PRIMARY KEY (journey_id, ordinal, position),
                    UNIQUE (journey_id, session_id),
                    FOREIGN KEY (journey_id, ordinal)
                        REFERENCES journey_steps(journey_id, ordinal) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    student_id TEXT NOT NULL,
                    status TEXT NOT NULL
                        CHECK (status IN ('scheduled', 'completed', 'cancelled', 'missed')),
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_student_status
                    ON sessions (student_id, status);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
