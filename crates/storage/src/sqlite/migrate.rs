use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS assistants (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            avatar_url TEXT,
            tagline TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            display_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            assistant_id INTEGER REFERENCES assistants(id) ON DELETE SET NULL,
            assistant_persona TEXT CHECK (assistant_persona IN ('calm', 'kind', 'direct')),
            skill_level TEXT NOT NULL DEFAULT 'beginner'
                CHECK (skill_level IN ('beginner', 'intermediate', 'advanced')),
            onboarding_step TEXT,
            onboarding_completed_at TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quizzes (
            id INTEGER PRIMARY KEY,
            topic TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_questions (
            id INTEGER PRIMARY KEY,
            quiz_id INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            prompt TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_options (
            id INTEGER PRIMARY KEY,
            question_id INTEGER NOT NULL REFERENCES quiz_questions(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            label TEXT NOT NULL,
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_attempts (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            quiz_id INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
            attempt_number INTEGER NOT NULL CHECK (attempt_number >= 1),
            started_at TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL CHECK (duration_seconds >= 0),
            score INTEGER NOT NULL CHECK (score >= 0),
            total INTEGER NOT NULL CHECK (total >= 0),
            UNIQUE (user_id, quiz_id, attempt_number)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_answers (
            id INTEGER PRIMARY KEY,
            attempt_id INTEGER NOT NULL REFERENCES quiz_attempts(id) ON DELETE CASCADE,
            question_id INTEGER NOT NULL REFERENCES quiz_questions(id),
            option_id INTEGER NOT NULL REFERENCES quiz_options(id),
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS activity_events (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            event_type TEXT NOT NULL,
            points_delta INTEGER NOT NULL,
            quiz_id INTEGER REFERENCES quizzes(id) ON DELETE SET NULL,
            attempt_id INTEGER REFERENCES quiz_attempts(id) ON DELETE SET NULL,
            lesson_id INTEGER,
            achievement_id INTEGER,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_quiz_questions_quiz_position
            ON quiz_questions (quiz_id, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_quiz_options_question_position
            ON quiz_options (question_id, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_quiz_answers_attempt
            ON quiz_answers (attempt_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_activity_events_user_created
            ON activity_events (user_id, created_at);
    ",
];

/// Runs versioned migrations, each inside its own transaction.
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

    // Version 1: onboarding, quiz content, attempts and the activity ledger.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

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
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
