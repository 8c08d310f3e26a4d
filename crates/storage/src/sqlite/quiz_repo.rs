use std::collections::HashSet;

use sprite_core::model::{Question, QuizOption, SkillQuiz};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    db_err, id_i64, option_id_from_i64, question_id_from_i64, quiz_id_from_i64, ser,
};
use crate::repository::{QuizRepository, StorageError};

fn position(index: usize) -> Result<i64, StorageError> {
    i64::try_from(index).map_err(|_| StorageError::Serialization("position overflow".into()))
}

/// Delete rows returned by `select` whose id is not in `keep`.
///
/// Content that past answers still point at cannot be removed and is
/// reported as `StorageError::Conflict`.
async fn prune(
    conn: &mut SqliteConnection,
    select: &str,
    delete: &str,
    quiz_id: i64,
    keep: &HashSet<i64>,
) -> Result<(), StorageError> {
    let rows = sqlx::query(select)
        .bind(quiz_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    for row in rows {
        let id: i64 = row.try_get("id").map_err(ser)?;
        if keep.contains(&id) {
            continue;
        }
        sqlx::query(delete)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_foreign_key_violation() => StorageError::Conflict,
                _ => db_err(e),
            })?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &SkillQuiz) -> Result<(), StorageError> {
        let quiz_id = id_i64("quiz_id", quiz.id().value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r"
            INSERT INTO quizzes (id, topic, title)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                topic = excluded.topic,
                title = excluded.title
            ",
        )
        .bind(quiz_id)
        .bind(quiz.topic())
        .bind(quiz.title())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for (q_pos, question) in quiz.questions().iter().enumerate() {
            let question_id = id_i64("question_id", question.id.value())?;
            sqlx::query(
                r"
                INSERT INTO quiz_questions (id, quiz_id, position, prompt)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    quiz_id = excluded.quiz_id,
                    position = excluded.position,
                    prompt = excluded.prompt
                ",
            )
            .bind(question_id)
            .bind(quiz_id)
            .bind(position(q_pos)?)
            .bind(question.prompt.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            for (o_pos, option) in question.options.iter().enumerate() {
                sqlx::query(
                    r"
                    INSERT INTO quiz_options (id, question_id, position, label, is_correct)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(id) DO UPDATE SET
                        question_id = excluded.question_id,
                        position = excluded.position,
                        label = excluded.label,
                        is_correct = excluded.is_correct
                    ",
                )
                .bind(id_i64("option_id", option.id.value())?)
                .bind(question_id)
                .bind(position(o_pos)?)
                .bind(option.label.as_str())
                .bind(i64::from(option.is_correct))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
        }

        let mut kept_questions = HashSet::new();
        let mut kept_options = HashSet::new();
        for question in quiz.questions() {
            kept_questions.insert(id_i64("question_id", question.id.value())?);
            for option in &question.options {
                kept_options.insert(id_i64("option_id", option.id.value())?);
            }
        }
        prune(
            &mut tx,
            r"
                SELECT o.id
                FROM quiz_options o
                JOIN quiz_questions q ON q.id = o.question_id
                WHERE q.quiz_id = ?1
            ",
            "DELETE FROM quiz_options WHERE id = ?1",
            quiz_id,
            &kept_options,
        )
        .await?;
        prune(
            &mut tx,
            "SELECT id FROM quiz_questions WHERE quiz_id = ?1",
            "DELETE FROM quiz_questions WHERE id = ?1",
            quiz_id,
            &kept_questions,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn quiz_by_topic(&self, topic: &str) -> Result<Option<SkillQuiz>, StorageError> {
        let Some(quiz_row) = sqlx::query("SELECT id, topic, title FROM quizzes WHERE topic = ?1")
            .bind(topic)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        let quiz_id: i64 = quiz_row.try_get("id").map_err(ser)?;

        let question_rows = sqlx::query(
            r"
                SELECT id, prompt
                FROM quiz_questions
                WHERE quiz_id = ?1
                ORDER BY position ASC, id ASC
            ",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let option_rows = sqlx::query(
            r"
                SELECT o.id, o.question_id, o.label, o.is_correct
                FROM quiz_options o
                JOIN quiz_questions q ON q.id = o.question_id
                WHERE q.quiz_id = ?1
                ORDER BY o.question_id ASC, o.position ASC, o.id ASC
            ",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut questions = Vec::with_capacity(question_rows.len());
        for row in &question_rows {
            questions.push(Question {
                id: question_id_from_i64(row.try_get("id").map_err(ser)?)?,
                prompt: row.try_get("prompt").map_err(ser)?,
                options: Vec::new(),
            });
        }

        for row in &option_rows {
            let question_id = question_id_from_i64(row.try_get("question_id").map_err(ser)?)?;
            let option = QuizOption {
                id: option_id_from_i64(row.try_get("id").map_err(ser)?)?,
                label: row.try_get("label").map_err(ser)?,
                is_correct: row.try_get::<i64, _>("is_correct").map_err(ser)? != 0,
            };
            if let Some(question) = questions.iter_mut().find(|q| q.id == question_id) {
                question.options.push(option);
            }
        }

        SkillQuiz::new(
            quiz_id_from_i64(quiz_id)?,
            quiz_row.try_get::<String, _>("topic").map_err(ser)?,
            quiz_row.try_get::<String, _>("title").map_err(ser)?,
            questions,
        )
        .map(Some)
        .map_err(ser)
    }
}
