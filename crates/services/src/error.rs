//! Shared error types for the services crate.

use thiserror::Error;

use sprite_core::model::{AssistantId, TransitionError, UserId};
use sprite_core::scoring::SubmissionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `OnboardingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OnboardingError {
    #[error("no authenticated session")]
    Unauthenticated,
    #[error("onboarding already completed")]
    AlreadyCompleted,
    #[error(transparent)]
    PrerequisiteNotMet(#[from] TransitionError),
    #[error("assistant {0} does not exist")]
    AssistantNotFound(AssistantId),
    #[error("user {0} does not exist")]
    UserNotFound(UserId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SkillQuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no authenticated session")]
    Unauthenticated,
    #[error("quiz with topic {topic:?} is not seeded")]
    QuizNotFound { topic: String },
    #[error("malformed submission: {0}")]
    MalformedSubmission(#[from] SubmissionError),
    #[error("user {0} does not exist")]
    UserNotFound(UserId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
