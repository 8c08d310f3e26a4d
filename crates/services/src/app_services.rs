use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::ServiceConfig;
use crate::error::AppServicesError;
use crate::invalidation::{NoopInvalidator, ViewInvalidator};
use crate::onboarding_service::OnboardingService;
use crate::skill_quiz_service::SkillQuizService;

/// Assembles the onboarding-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    onboarding: Arc<OnboardingService>,
    skill_quiz: Arc<SkillQuizService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: &ServiceConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        tracing::info!(db = %config.database_url, topic = %config.skill_quiz_topic, "services ready");
        Ok(Self::from_storage(
            &storage,
            clock,
            &config.skill_quiz_topic,
            Arc::new(NoopInvalidator),
        ))
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        skill_quiz_topic: &str,
        views: Arc<dyn ViewInvalidator>,
    ) -> Self {
        let onboarding = Arc::new(OnboardingService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.assistants),
            Arc::clone(&views),
        ));
        let skill_quiz = Arc::new(SkillQuizService::new(
            clock,
            skill_quiz_topic,
            Arc::clone(&storage.users),
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.activity),
            views,
        ));
        Self {
            onboarding,
            skill_quiz,
        }
    }

    #[must_use]
    pub fn onboarding(&self) -> Arc<OnboardingService> {
        Arc::clone(&self.onboarding)
    }

    #[must_use]
    pub fn skill_quiz(&self) -> Arc<SkillQuizService> {
        Arc::clone(&self.skill_quiz)
    }
}
