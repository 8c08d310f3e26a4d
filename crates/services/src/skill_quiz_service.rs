use std::sync::Arc;

use serde::Serialize;
use sprite_core::guard::resolve_step;
use sprite_core::model::{
    ONBOARDING_ROUTE, QuizSubmission, QuizView, SkillLevel, SkillQuiz, UserId,
};
use sprite_core::scoring::grade;
use storage::repository::{
    ActivityRepository, NewQuizAttempt, QuizAttemptRecord, QuizAttemptRepository, QuizRepository,
    RecordedAttempt, StorageError, UserRepository,
};

use crate::Clock;
use crate::error::QuizError;
use crate::invalidation::ViewInvalidator;
use crate::session::{Session, session_user};

/// Where a user goes once onboarding is over.
pub const HOME_ROUTE: &str = "/";

/// Extra tries when a concurrent submission took the same attempt number.
const CONFLICT_RETRIES: usize = 3;

/// Result of a graded submission, as returned to the quiz page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOutcome {
    pub score: u32,
    pub total: u32,
    pub level: SkillLevel,
    pub suggested_course: &'static str,
    /// Route to navigate to next.
    pub next: String,
    pub attempt_number: u32,
    pub points_awarded: i64,
}

/// Serves the skill-assessment quiz and records submissions.
#[derive(Clone)]
pub struct SkillQuizService {
    clock: Clock,
    topic: String,
    users: Arc<dyn UserRepository>,
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn QuizAttemptRepository>,
    activity: Arc<dyn ActivityRepository>,
    views: Arc<dyn ViewInvalidator>,
}

impl SkillQuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        topic: impl Into<String>,
        users: Arc<dyn UserRepository>,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn QuizAttemptRepository>,
        activity: Arc<dyn ActivityRepository>,
        views: Arc<dyn ViewInvalidator>,
    ) -> Self {
        Self {
            clock,
            topic: topic.into(),
            users,
            quizzes,
            attempts,
            activity,
            views,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Quiz content for the quiz page, without answer keys.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::QuizNotFound` if the quiz is not seeded.
    pub async fn load_quiz(&self) -> Result<QuizView, QuizError> {
        Ok(self.quiz().await?.to_view())
    }

    /// Grade a submission and record it with its side effects.
    ///
    /// The attempt, its answers, the user's new level and checkpoint, and the
    /// activity events are written together or not at all.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Unauthenticated` without a session,
    /// `QuizError::QuizNotFound` if the quiz is not seeded,
    /// `QuizError::MalformedSubmission` if the answers do not cover the quiz
    /// exactly once, and `QuizError::UserNotFound` for a dangling session.
    pub async fn submit(
        &self,
        session: Option<&Session>,
        submission: &QuizSubmission,
    ) -> Result<QuizOutcome, QuizError> {
        let user_id = session_user(session).ok_or(QuizError::Unauthenticated)?;
        let quiz = self.quiz().await?;

        let graded = grade(&quiz, &submission.answers).map_err(|err| {
            tracing::warn!(%user_id, error = %err, "rejected quiz submission");
            QuizError::MalformedSubmission(err)
        })?;

        let mut state = self
            .users
            .get_onboarding(user_id)
            .await?
            .ok_or(QuizError::UserNotFound(user_id))?;
        state.record_skill_level(graded.level);

        let now = self.clock.now();
        let started_at = submission.started_at.map_or(now, |at| at.min(now));
        let next = if state.is_completed() {
            HOME_ROUTE.to_owned()
        } else {
            resolve_step(&state).route_path()
        };

        let attempt = NewQuizAttempt {
            user_id,
            quiz_id: quiz.id(),
            started_at,
            submitted_at: now,
            score: graded.score,
            total: graded.total,
            events: graded.events(),
            answers: graded.answers,
            user_state: state,
        };
        let recorded = self.record_with_retry(attempt).await?;
        self.views.invalidate(ONBOARDING_ROUTE);

        let points_awarded: i64 = recorded.events.iter().map(|e| e.points_delta).sum();
        tracing::info!(
            %user_id,
            quiz_id = %quiz.id(),
            attempt = recorded.attempt.attempt_number,
            score = graded.score,
            total = graded.total,
            level = graded.level.as_str(),
            points = points_awarded,
            "quiz submission recorded"
        );

        Ok(QuizOutcome {
            score: graded.score,
            total: graded.total,
            level: graded.level,
            suggested_course: graded.level.suggested_course(),
            next,
            attempt_number: recorded.attempt.attempt_number,
            points_awarded,
        })
    }

    /// The session user's attempts at the skill quiz, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Unauthenticated` or `QuizError::QuizNotFound`.
    pub async fn attempt_history(
        &self,
        session: Option<&Session>,
    ) -> Result<Vec<QuizAttemptRecord>, QuizError> {
        let user_id = session_user(session).ok_or(QuizError::Unauthenticated)?;
        let quiz = self.quiz().await?;
        Ok(self.attempts.attempts_for(user_id, quiz.id()).await?)
    }

    /// Sum of every point the session user has earned.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Unauthenticated` or `QuizError::Storage`.
    pub async fn total_points(&self, session: Option<&Session>) -> Result<i64, QuizError> {
        let user_id = session_user(session).ok_or(QuizError::Unauthenticated)?;
        Ok(self.activity.total_points(user_id).await?)
    }

    async fn quiz(&self) -> Result<SkillQuiz, QuizError> {
        match self.quizzes.quiz_by_topic(&self.topic).await? {
            Some(quiz) => Ok(quiz),
            None => {
                tracing::warn!(topic = %self.topic, "skill quiz is not seeded");
                Err(QuizError::QuizNotFound {
                    topic: self.topic.clone(),
                })
            }
        }
    }

    async fn record_with_retry(&self, attempt: NewQuizAttempt) -> Result<RecordedAttempt, QuizError> {
        let user_id = attempt.user_id;
        let mut retries = 0;
        loop {
            match self.attempts.record_attempt(attempt.clone()).await {
                Ok(recorded) => return Ok(recorded),
                Err(StorageError::Conflict) if retries < CONFLICT_RETRIES => {
                    retries += 1;
                    tracing::debug!(%user_id, retries, "attempt number taken, retrying");
                }
                Err(StorageError::NotFound) => return Err(QuizError::UserNotFound(user_id)),
                Err(other) => return Err(QuizError::Storage(other)),
            }
        }
    }
}
