use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sprite_core::model::{
    ActivityEvent, ActivityEventId, Assistant, AssistantId, AttemptId, NewActivityEvent, OptionId,
    QuestionId, QuizId, SkillQuiz, UserId, UserOnboardingState,
};
use sprite_core::scoring::GradedAnswer;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserRecord {
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted quiz attempt header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptRecord {
    pub id: AttemptId,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub score: u32,
    pub total: u32,
}

/// Link from an attempt to the option picked for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub attempt_id: AttemptId,
    pub question_id: QuestionId,
    pub option_id: OptionId,
    pub is_correct: bool,
}

/// Everything a graded submission writes.
///
/// `user_state` is the user's onboarding state after the grade was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuizAttempt {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub score: u32,
    pub total: u32,
    pub answers: Vec<GradedAnswer>,
    pub user_state: UserOnboardingState,
    pub events: Vec<NewActivityEvent>,
}

impl NewQuizAttempt {
    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        self.submitted_at
            .signed_duration_since(self.started_at)
            .num_seconds()
            .max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAttempt {
    pub attempt: QuizAttemptRecord,
    pub events: Vec<ActivityEvent>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create an account with default onboarding state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError>;

    /// Fetch a user's onboarding state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored row is invalid.
    async fn get_onboarding(&self, id: UserId)
    -> Result<Option<UserOnboardingState>, StorageError>;

    /// Overwrite a user's onboarding fields.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn save_onboarding(
        &self,
        id: UserId,
        state: &UserOnboardingState,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AssistantRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the assistant cannot be stored.
    async fn upsert_assistant(&self, assistant: &Assistant) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failure.
    async fn get_assistant(&self, id: AssistantId) -> Result<Option<Assistant>, StorageError>;

    /// All assistants ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failure.
    async fn list_assistants(&self) -> Result<Vec<Assistant>, StorageError>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Insert or replace a quiz with its questions and options.
    ///
    /// Questions and options no longer in `quiz` are removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if removed content is referenced by a
    /// recorded answer, or `StorageError` if the content cannot be stored.
    async fn upsert_quiz(&self, quiz: &SkillQuiz) -> Result<(), StorageError>;

    /// Load a quiz with its questions and options in display order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if stored content is not gradable.
    async fn quiz_by_topic(&self, topic: &str) -> Result<Option<SkillQuiz>, StorageError>;
}

#[async_trait]
pub trait QuizAttemptRepository: Send + Sync {
    /// Write a graded attempt as one unit: header, answers, user update and events.
    ///
    /// The attempt number is one past the highest existing number for the
    /// same user and quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user is missing, or
    /// `StorageError::Conflict` if a concurrent attempt took the same number.
    async fn record_attempt(&self, attempt: NewQuizAttempt)
    -> Result<RecordedAttempt, StorageError>;

    /// Attempts by a user for a quiz, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failure.
    async fn attempts_for(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Vec<QuizAttemptRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failure.
    async fn answers_for(&self, attempt_id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Ledger rows for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failure.
    async fn events_for_user(&self, user_id: UserId) -> Result<Vec<ActivityEvent>, StorageError>;

    /// Sum of all point deltas for a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failure.
    async fn total_points(&self, user_id: UserId) -> Result<i64, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, UserOnboardingState>,
    assistants: BTreeMap<AssistantId, Assistant>,
    quizzes: HashMap<String, SkillQuiz>,
    attempts: Vec<QuizAttemptRecord>,
    answers: Vec<AnswerRecord>,
    events: Vec<ActivityEvent>,
    next_user: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// A single lock guards all tables, so `record_attempt` is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn next_id(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX - 1) + 1
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, _user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut guard = self.lock()?;
        guard.next_user += 1;
        let id = UserId::new(guard.next_user);
        guard.users.insert(id, UserOnboardingState::new());
        Ok(id)
    }

    async fn get_onboarding(
        &self,
        id: UserId,
    ) -> Result<Option<UserOnboardingState>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn save_onboarding(
        &self,
        id: UserId,
        state: &UserOnboardingState,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.users.get_mut(&id).ok_or(StorageError::NotFound)?;
        *slot = state.clone();
        Ok(())
    }
}

#[async_trait]
impl AssistantRepository for InMemoryRepository {
    async fn upsert_assistant(&self, assistant: &Assistant) -> Result<(), StorageError> {
        self.lock()?
            .assistants
            .insert(assistant.id(), assistant.clone());
        Ok(())
    }

    async fn get_assistant(&self, id: AssistantId) -> Result<Option<Assistant>, StorageError> {
        Ok(self.lock()?.assistants.get(&id).cloned())
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, StorageError> {
        Ok(self.lock()?.assistants.values().cloned().collect())
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &SkillQuiz) -> Result<(), StorageError> {
        self.lock()?
            .quizzes
            .insert(quiz.topic().to_owned(), quiz.clone());
        Ok(())
    }

    async fn quiz_by_topic(&self, topic: &str) -> Result<Option<SkillQuiz>, StorageError> {
        Ok(self.lock()?.quizzes.get(topic).cloned())
    }
}

#[async_trait]
impl QuizAttemptRepository for InMemoryRepository {
    async fn record_attempt(
        &self,
        attempt: NewQuizAttempt,
    ) -> Result<RecordedAttempt, StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&attempt.user_id) {
            return Err(StorageError::NotFound);
        }

        let attempt_number = guard
            .attempts
            .iter()
            .filter(|a| a.user_id == attempt.user_id && a.quiz_id == attempt.quiz_id)
            .map(|a| a.attempt_number)
            .max()
            .unwrap_or(0)
            + 1;

        let record = QuizAttemptRecord {
            id: AttemptId::new(next_id(guard.attempts.len())),
            user_id: attempt.user_id,
            quiz_id: attempt.quiz_id,
            attempt_number,
            started_at: attempt.started_at,
            submitted_at: attempt.submitted_at,
            duration_seconds: attempt.duration_seconds(),
            score: attempt.score,
            total: attempt.total,
        };

        for answer in &attempt.answers {
            guard.answers.push(AnswerRecord {
                attempt_id: record.id,
                question_id: answer.question_id,
                option_id: answer.option_id,
                is_correct: answer.is_correct,
            });
        }

        guard.users.insert(attempt.user_id, attempt.user_state);

        let mut events = Vec::with_capacity(attempt.events.len());
        for new_event in attempt.events {
            let event = ActivityEvent {
                id: ActivityEventId::new(next_id(guard.events.len())),
                user_id: attempt.user_id,
                kind: new_event.kind,
                points_delta: new_event.points_delta,
                quiz_id: Some(attempt.quiz_id),
                attempt_id: Some(record.id),
                lesson_id: None,
                achievement_id: None,
                created_at: attempt.submitted_at,
            };
            guard.events.push(event.clone());
            events.push(event);
        }

        guard.attempts.push(record.clone());
        Ok(RecordedAttempt {
            attempt: record,
            events,
        })
    }

    async fn attempts_for(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Vec<QuizAttemptRecord>, StorageError> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn answers_for(&self, attempt_id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError> {
        Ok(self
            .lock()?
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .copied()
            .collect())
    }
}

#[async_trait]
impl ActivityRepository for InMemoryRepository {
    async fn events_for_user(&self, user_id: UserId) -> Result<Vec<ActivityEvent>, StorageError> {
        Ok(self
            .lock()?
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn total_points(&self, user_id: UserId) -> Result<i64, StorageError> {
        Ok(self
            .lock()?
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.points_delta)
            .sum())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub assistants: Arc<dyn AssistantRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn QuizAttemptRepository>,
    pub activity: Arc<dyn ActivityRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    pub(crate) fn from_repo<R>(repo: R) -> Self
    where
        R: UserRepository
            + AssistantRepository
            + QuizRepository
            + QuizAttemptRepository
            + ActivityRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            assistants: Arc::new(repo.clone()),
            quizzes: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            activity: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprite_core::model::{ActivityKind, OnboardingStep, SkillLevel};
    use sprite_core::time::fixed_now;

    fn attempt_for(user_id: UserId, score: u32) -> NewQuizAttempt {
        let mut user_state = UserOnboardingState::new();
        user_state.select_assistant(sprite_core::model::AssistantId::new(1));
        user_state.record_skill_level(SkillLevel::Intermediate);
        NewQuizAttempt {
            user_id,
            quiz_id: QuizId::new(1),
            started_at: fixed_now() - chrono::Duration::seconds(90),
            submitted_at: fixed_now(),
            score,
            total: 5,
            answers: vec![GradedAnswer {
                question_id: QuestionId::new(1),
                option_id: OptionId::new(10),
                is_correct: true,
            }],
            user_state,
            events: sprite_core::model::quiz_events(score, 5),
        }
    }

    #[tokio::test]
    async fn record_attempt_numbers_sequentially() {
        let repo = InMemoryRepository::new();
        let user = repo
            .insert_user(NewUserRecord {
                display_name: "Ada".into(),
                created_at: fixed_now(),
            })
            .await
            .unwrap();

        let first = repo.record_attempt(attempt_for(user, 3)).await.unwrap();
        let second = repo.record_attempt(attempt_for(user, 5)).await.unwrap();
        assert_eq!(first.attempt.attempt_number, 1);
        assert_eq!(second.attempt.attempt_number, 2);
        assert_eq!(first.attempt.duration_seconds, 90);

        let state = repo.get_onboarding(user).await.unwrap().unwrap();
        assert_eq!(state.skill_level(), SkillLevel::Intermediate);
        assert_eq!(state.onboarding_step(), Some(OnboardingStep::Persona));

        let events = repo.events_for_user(user).await.unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::QuizSubmitted,
                ActivityKind::QuizSubmitted,
                ActivityKind::QuizPerfect
            ]
        );
        assert_eq!(repo.total_points(user).await.unwrap(), 30 + 50 + 20);
        assert_eq!(repo.answers_for(second.attempt.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_attempt_for_missing_user_fails() {
        let repo = InMemoryRepository::new();
        let err = repo
            .record_attempt(attempt_for(UserId::new(404), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        assert!(repo.events_for_user(UserId::new(404)).await.unwrap().is_empty());
    }
}
