use sprite_core::model::{ActivityEvent, ActivityEventId, AttemptId, QuizId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    attempt_id_from_i64, db_err, id_i64, map_answer_row, map_attempt_row, ser,
};
use super::user_repo::write_onboarding;
use crate::repository::{
    AnswerRecord, NewQuizAttempt, QuizAttemptRecord, QuizAttemptRepository, RecordedAttempt,
    StorageError,
};

#[async_trait::async_trait]
impl QuizAttemptRepository for SqliteRepository {
    async fn record_attempt(
        &self,
        attempt: NewQuizAttempt,
    ) -> Result<RecordedAttempt, StorageError> {
        let user_id = id_i64("user_id", attempt.user_id.value())?;
        let quiz_id = id_i64("quiz_id", attempt.quiz_id.value())?;
        let duration_seconds = attempt.duration_seconds();

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Numbering happens inside the insert so no other writer can slip between
        // reading the max and using it; the unique index backs this up.
        let row = sqlx::query(
            r"
                INSERT INTO quiz_attempts (
                    user_id, quiz_id, attempt_number, started_at, submitted_at,
                    duration_seconds, score, total
                )
                SELECT ?1, ?2, COALESCE(MAX(attempt_number), 0) + 1, ?3, ?4, ?5, ?6, ?7
                FROM quiz_attempts
                WHERE user_id = ?1 AND quiz_id = ?2
                RETURNING id, attempt_number
            ",
        )
        .bind(user_id)
        .bind(quiz_id)
        .bind(attempt.started_at)
        .bind(attempt.submitted_at)
        .bind(duration_seconds)
        .bind(i64::from(attempt.score))
        .bind(i64::from(attempt.total))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            _ => db_err(e),
        })?;

        let attempt_id = attempt_id_from_i64(row.try_get("id").map_err(ser)?)?;
        let attempt_number = u32::try_from(row.try_get::<i64, _>("attempt_number").map_err(ser)?)
            .map_err(ser)?;
        let attempt_id_i64 = id_i64("attempt_id", attempt_id.value())?;

        for answer in &attempt.answers {
            sqlx::query(
                r"
                    INSERT INTO quiz_answers (attempt_id, question_id, option_id, is_correct)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(attempt_id_i64)
            .bind(id_i64("question_id", answer.question_id.value())?)
            .bind(id_i64("option_id", answer.option_id.value())?)
            .bind(i64::from(answer.is_correct))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        write_onboarding(&mut tx, attempt.user_id, &attempt.user_state).await?;

        let mut events = Vec::with_capacity(attempt.events.len());
        for new_event in &attempt.events {
            let res = sqlx::query(
                r"
                    INSERT INTO activity_events (
                        user_id, event_type, points_delta, quiz_id, attempt_id, created_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(user_id)
            .bind(new_event.kind.as_str())
            .bind(new_event.points_delta)
            .bind(quiz_id)
            .bind(attempt_id_i64)
            .bind(attempt.submitted_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            let event_id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
            events.push(ActivityEvent {
                id: ActivityEventId::new(event_id),
                user_id: attempt.user_id,
                kind: new_event.kind,
                points_delta: new_event.points_delta,
                quiz_id: Some(attempt.quiz_id),
                attempt_id: Some(attempt_id),
                lesson_id: None,
                achievement_id: None,
                created_at: attempt.submitted_at,
            });
        }

        tx.commit().await.map_err(db_err)?;

        Ok(RecordedAttempt {
            attempt: QuizAttemptRecord {
                id: attempt_id,
                user_id: attempt.user_id,
                quiz_id: attempt.quiz_id,
                attempt_number,
                started_at: attempt.started_at,
                submitted_at: attempt.submitted_at,
                duration_seconds,
                score: attempt.score,
                total: attempt.total,
            },
            events,
        })
    }

    async fn attempts_for(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Vec<QuizAttemptRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, quiz_id, attempt_number, started_at, submitted_at,
                       duration_seconds, score, total
                FROM quiz_attempts
                WHERE user_id = ?1 AND quiz_id = ?2
                ORDER BY attempt_number ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn answers_for(&self, attempt_id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT attempt_id, question_id, option_id, is_correct
                FROM quiz_answers
                WHERE attempt_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(id_i64("attempt_id", attempt_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_answer_row(&row)?);
        }
        Ok(out)
    }
}
