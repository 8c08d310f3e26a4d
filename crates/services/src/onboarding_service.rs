use std::sync::Arc;

use sprite_core::guard::{can_access_step, resolve_step};
use sprite_core::model::{
    Assistant, AssistantId, ONBOARDING_ROUTE, OnboardingStep, Persona, UserId,
    UserOnboardingState,
};
use storage::repository::{AssistantRepository, StorageError, UserRepository};

use crate::Clock;
use crate::error::OnboardingError;
use crate::invalidation::ViewInvalidator;
use crate::session::{Session, session_user};

/// Outcome of a guard check for one onboarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    /// The requested step may be shown.
    Render(OnboardingStep),
    /// The requested step is out of reach; send the user here instead.
    Redirect(OnboardingStep),
}

impl StepDecision {
    #[must_use]
    pub fn step(self) -> OnboardingStep {
        match self {
            Self::Render(step) | Self::Redirect(step) => step,
        }
    }
}

/// Guards onboarding navigation and applies step-transition actions.
#[derive(Clone)]
pub struct OnboardingService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    assistants: Arc<dyn AssistantRepository>,
    views: Arc<dyn ViewInvalidator>,
}

impl OnboardingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        assistants: Arc<dyn AssistantRepository>,
        views: Arc<dyn ViewInvalidator>,
    ) -> Self {
        Self {
            clock,
            users,
            assistants,
            views,
        }
    }

    /// Decide whether `target` may be rendered for the session's user.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::Unauthenticated` without a session,
    /// `OnboardingError::AlreadyCompleted` once onboarding is finished, and
    /// `OnboardingError::UserNotFound` if the session points at no account.
    pub async fn guard(
        &self,
        session: Option<&Session>,
        target: OnboardingStep,
    ) -> Result<StepDecision, OnboardingError> {
        let (user_id, state) = self.load_open(session).await?;
        let decision = if can_access_step(&state, target) {
            StepDecision::Render(target)
        } else {
            StepDecision::Redirect(resolve_step(&state))
        };
        tracing::debug!(%user_id, target = target.as_str(), ?decision, "onboarding guard");
        Ok(decision)
    }

    /// Guard a raw route segment such as `"skill-quiz"`.
    ///
    /// Unknown segments redirect to the resolved step.
    ///
    /// # Errors
    ///
    /// Same as [`OnboardingService::guard`].
    pub async fn guard_segment(
        &self,
        session: Option<&Session>,
        segment: &str,
    ) -> Result<StepDecision, OnboardingError> {
        match OnboardingStep::from_route_segment(segment) {
            Some(target) => self.guard(session, target).await,
            None => {
                let (_, state) = self.load_open(session).await?;
                Ok(StepDecision::Redirect(resolve_step(&state)))
            }
        }
    }

    /// Step to land on for a bare visit of the onboarding route.
    ///
    /// # Errors
    ///
    /// Same as [`OnboardingService::guard`].
    pub async fn resolve(&self, session: Option<&Session>) -> Result<OnboardingStep, OnboardingError> {
        let (_, state) = self.load_open(session).await?;
        Ok(resolve_step(&state))
    }

    /// Current onboarding state of the session's user.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::Unauthenticated` or `OnboardingError::UserNotFound`.
    pub async fn state(
        &self,
        session: Option<&Session>,
    ) -> Result<UserOnboardingState, OnboardingError> {
        let user_id = session_user(session).ok_or(OnboardingError::Unauthenticated)?;
        self.load(user_id).await
    }

    /// Assistants offered on the selection step, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::Storage` on repository failure.
    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, OnboardingError> {
        Ok(self.assistants.list_assistants().await?)
    }

    /// Store the chosen assistant and advance to the skill quiz.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::AssistantNotFound` if the id matches no
    /// assistant, plus the session/state errors of [`OnboardingService::guard`].
    pub async fn select_assistant(
        &self,
        session: Option<&Session>,
        assistant_id: AssistantId,
    ) -> Result<UserOnboardingState, OnboardingError> {
        let (user_id, mut state) = self.load_open(session).await?;
        if self.assistants.get_assistant(assistant_id).await?.is_none() {
            tracing::warn!(%user_id, %assistant_id, "selected assistant is not seeded");
            return Err(OnboardingError::AssistantNotFound(assistant_id));
        }
        state.select_assistant(assistant_id);
        self.save(user_id, &state).await?;
        tracing::info!(%user_id, %assistant_id, "assistant selected");
        Ok(state)
    }

    /// Store the chosen tone and advance to the guided intro.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::PrerequisiteNotMet` if no assistant is
    /// selected, plus the session/state errors of [`OnboardingService::guard`].
    pub async fn select_persona(
        &self,
        session: Option<&Session>,
        persona: Persona,
    ) -> Result<UserOnboardingState, OnboardingError> {
        let (user_id, mut state) = self.load_open(session).await?;
        state.select_persona(persona)?;
        self.save(user_id, &state).await?;
        tracing::info!(%user_id, persona = persona.as_str(), "persona selected");
        Ok(state)
    }

    /// Finish onboarding.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::PrerequisiteNotMet` unless assistant and
    /// persona are both set, plus the session/state errors of
    /// [`OnboardingService::guard`].
    pub async fn complete_onboarding(
        &self,
        session: Option<&Session>,
    ) -> Result<UserOnboardingState, OnboardingError> {
        let (user_id, mut state) = self.load_open(session).await?;
        state.complete(self.clock.now())?;
        self.save(user_id, &state).await?;
        tracing::info!(%user_id, "onboarding completed");
        Ok(state)
    }

    /// Clear every onboarding field, completed or not, and restart.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::Unauthenticated` or `OnboardingError::UserNotFound`.
    pub async fn reset_onboarding(
        &self,
        session: Option<&Session>,
    ) -> Result<UserOnboardingState, OnboardingError> {
        let user_id = session_user(session).ok_or(OnboardingError::Unauthenticated)?;
        let mut state = self.load(user_id).await?;
        state.reset();
        self.save(user_id, &state).await?;
        tracing::info!(%user_id, "onboarding reset");
        Ok(state)
    }

    async fn load(&self, user_id: UserId) -> Result<UserOnboardingState, OnboardingError> {
        self.users
            .get_onboarding(user_id)
            .await?
            .ok_or(OnboardingError::UserNotFound(user_id))
    }

    /// Authenticated user whose onboarding is still in progress.
    async fn load_open(
        &self,
        session: Option<&Session>,
    ) -> Result<(UserId, UserOnboardingState), OnboardingError> {
        let user_id = session_user(session).ok_or(OnboardingError::Unauthenticated)?;
        let state = self.load(user_id).await?;
        if state.is_completed() {
            return Err(OnboardingError::AlreadyCompleted);
        }
        Ok((user_id, state))
    }

    async fn save(&self, user_id: UserId, state: &UserOnboardingState) -> Result<(), OnboardingError> {
        self.users
            .save_onboarding(user_id, state)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => OnboardingError::UserNotFound(user_id),
                other => OnboardingError::Storage(other),
            })?;
        self.views.invalidate(ONBOARDING_ROUTE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invalidation::RecordingInvalidator;
    use sprite_core::model::TransitionError;
    use sprite_core::time::{fixed_clock, fixed_now};
    use storage::repository::{NewUserRecord, Storage};

    struct Fixture {
        service: OnboardingService,
        views: Arc<RecordingInvalidator>,
        session: Session,
    }

    async fn fixture() -> Fixture {
        let storage = Storage::in_memory();
        storage
            .assistants
            .upsert_assistant(&Assistant::new(AssistantId::new(1), "Nova", None, None).unwrap())
            .await
            .unwrap();
        let user_id = storage
            .users
            .insert_user(NewUserRecord {
                display_name: "Ada".into(),
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        let views = Arc::new(RecordingInvalidator::new());
        let service = OnboardingService::new(
            fixed_clock(),
            Arc::clone(&storage.users),
            Arc::clone(&storage.assistants),
            Arc::clone(&views) as Arc<dyn ViewInvalidator>,
        );
        Fixture {
            service,
            views,
            session: Session::new(user_id),
        }
    }

    #[tokio::test]
    async fn every_call_without_session_is_unauthenticated() {
        let fx = fixture().await;
        let svc = &fx.service;
        assert!(matches!(
            svc.guard(None, OnboardingStep::Welcome).await,
            Err(OnboardingError::Unauthenticated)
        ));
        assert!(matches!(svc.resolve(None).await, Err(OnboardingError::Unauthenticated)));
        assert!(matches!(
            svc.select_assistant(None, AssistantId::new(1)).await,
            Err(OnboardingError::Unauthenticated)
        ));
        assert!(matches!(
            svc.select_persona(None, Persona::Calm).await,
            Err(OnboardingError::Unauthenticated)
        ));
        assert!(matches!(
            svc.complete_onboarding(None).await,
            Err(OnboardingError::Unauthenticated)
        ));
        assert!(matches!(
            svc.reset_onboarding(None).await,
            Err(OnboardingError::Unauthenticated)
        ));
        assert!(fx.views.paths().is_empty());
    }

    #[tokio::test]
    async fn unknown_assistant_is_rejected_without_writes() {
        let fx = fixture().await;
        let err = fx
            .service
            .select_assistant(Some(&fx.session), AssistantId::new(42))
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::AssistantNotFound(id) if id == AssistantId::new(42)));
        let state = fx.service.state(Some(&fx.session)).await.unwrap();
        assert_eq!(state, UserOnboardingState::new());
        assert!(fx.views.paths().is_empty());
    }

    #[tokio::test]
    async fn persona_before_assistant_is_a_prerequisite_failure() {
        let fx = fixture().await;
        for persona in Persona::ALL {
            let err = fx
                .service
                .select_persona(Some(&fx.session), persona)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                OnboardingError::PrerequisiteNotMet(TransitionError::PrerequisiteNotMet { .. })
            ));
        }
    }

    #[tokio::test]
    async fn actions_invalidate_the_onboarding_route() {
        let fx = fixture().await;
        let session = Some(&fx.session);
        fx.service.select_assistant(session, AssistantId::new(1)).await.unwrap();
        fx.service.select_persona(session, Persona::Kind).await.unwrap();
        let done = fx.service.complete_onboarding(session).await.unwrap();

        assert_eq!(done.onboarding_completed_at(), Some(fixed_now()));
        assert_eq!(done.onboarding_step(), None);
        assert_eq!(fx.views.paths(), vec![ONBOARDING_ROUTE; 3]);
    }

    #[tokio::test]
    async fn completed_users_are_turned_away_until_reset() {
        let fx = fixture().await;
        let session = Some(&fx.session);
        fx.service.select_assistant(session, AssistantId::new(1)).await.unwrap();
        fx.service.select_persona(session, Persona::Direct).await.unwrap();
        fx.service.complete_onboarding(session).await.unwrap();

        assert!(matches!(
            fx.service.guard(session, OnboardingStep::Persona).await,
            Err(OnboardingError::AlreadyCompleted)
        ));
        assert!(matches!(
            fx.service.select_persona(session, Persona::Calm).await,
            Err(OnboardingError::AlreadyCompleted)
        ));

        let once = fx.service.reset_onboarding(session).await.unwrap();
        let twice = fx.service.reset_onboarding(session).await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(
            fx.service.resolve(session).await.unwrap(),
            OnboardingStep::Gender
        );
    }

    #[tokio::test]
    async fn guard_redirects_far_jumps_to_the_resolved_step() {
        let fx = fixture().await;
        let session = Some(&fx.session);
        assert_eq!(
            fx.service.guard(session, OnboardingStep::Gender).await.unwrap(),
            StepDecision::Render(OnboardingStep::Gender)
        );
        assert_eq!(
            fx.service.guard(session, OnboardingStep::GuidedIntro).await.unwrap(),
            StepDecision::Redirect(OnboardingStep::Gender)
        );
        assert_eq!(
            fx.service.guard_segment(session, "nowhere").await.unwrap(),
            StepDecision::Redirect(OnboardingStep::Gender)
        );
    }

    #[tokio::test]
    async fn missing_account_is_user_not_found() {
        let fx = fixture().await;
        let ghost = Session::new(UserId::new(999));
        assert!(matches!(
            fx.service.resolve(Some(&ghost)).await,
            Err(OnboardingError::UserNotFound(_))
        ));
    }
}
