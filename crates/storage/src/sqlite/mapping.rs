use sprite_core::model::{
    ActivityEvent, ActivityEventId, ActivityKind, AssistantId, AttemptId, OnboardingStep, OptionId,
    Persona, QuestionId, QuizId, SkillLevel, UserId, UserOnboardingState,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{AnswerRecord, QuizAttemptRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors, surfacing unique-constraint hits as `Conflict`.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn assistant_id_from_i64(v: i64) -> Result<AssistantId, StorageError> {
    Ok(AssistantId::new(i64_to_u64("assistant_id", v)?))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn option_id_from_i64(v: i64) -> Result<OptionId, StorageError> {
    Ok(OptionId::new(i64_to_u64("option_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn map_onboarding_row(row: &SqliteRow) -> Result<UserOnboardingState, StorageError> {
    let assistant_id = row
        .try_get::<Option<i64>, _>("assistant_id")
        .map_err(ser)?
        .map(assistant_id_from_i64)
        .transpose()?;
    let persona = row
        .try_get::<Option<String>, _>("assistant_persona")
        .map_err(ser)?
        .map(|s| s.parse::<Persona>().map_err(ser))
        .transpose()?;
    let skill_level = row
        .try_get::<String, _>("skill_level")
        .map_err(ser)?
        .parse::<SkillLevel>()
        .map_err(ser)?;
    let step = row
        .try_get::<Option<String>, _>("onboarding_step")
        .map_err(ser)?
        .map(|s| s.parse::<OnboardingStep>().map_err(ser))
        .transpose()?;
    let completed_at = row.try_get("onboarding_completed_at").map_err(ser)?;

    UserOnboardingState::from_persisted(assistant_id, persona, skill_level, step, completed_at)
        .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<QuizAttemptRecord, StorageError> {
    Ok(QuizAttemptRecord {
        id: attempt_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        quiz_id: quiz_id_from_i64(row.try_get("quiz_id").map_err(ser)?)?,
        attempt_number: u32_from_i64(
            "attempt_number",
            row.try_get("attempt_number").map_err(ser)?,
        )?,
        started_at: row.try_get("started_at").map_err(ser)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        duration_seconds: row.try_get("duration_seconds").map_err(ser)?,
        score: u32_from_i64("score", row.try_get("score").map_err(ser)?)?,
        total: u32_from_i64("total", row.try_get("total").map_err(ser)?)?,
    })
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<AnswerRecord, StorageError> {
    Ok(AnswerRecord {
        attempt_id: attempt_id_from_i64(row.try_get("attempt_id").map_err(ser)?)?,
        question_id: question_id_from_i64(row.try_get("question_id").map_err(ser)?)?,
        option_id: option_id_from_i64(row.try_get("option_id").map_err(ser)?)?,
        is_correct: row.try_get::<i64, _>("is_correct").map_err(ser)? != 0,
    })
}

pub(crate) fn map_event_row(row: &SqliteRow) -> Result<ActivityEvent, StorageError> {
    Ok(ActivityEvent {
        id: ActivityEventId::new(i64_to_u64("event_id", row.try_get("id").map_err(ser)?)?),
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        kind: row
            .try_get::<String, _>("event_type")
            .map_err(ser)?
            .parse::<ActivityKind>()
            .map_err(ser)?,
        points_delta: row.try_get("points_delta").map_err(ser)?,
        quiz_id: row
            .try_get::<Option<i64>, _>("quiz_id")
            .map_err(ser)?
            .map(quiz_id_from_i64)
            .transpose()?,
        attempt_id: row
            .try_get::<Option<i64>, _>("attempt_id")
            .map_err(ser)?
            .map(attempt_id_from_i64)
            .transpose()?,
        lesson_id: row.try_get("lesson_id").map_err(ser)?,
        achievement_id: row.try_get("achievement_id").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
