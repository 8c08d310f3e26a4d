use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::AssistantId;
use crate::model::steps::OnboardingStep;

//
// ─── PERSONA & SKILL LEVEL ─────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind} value: {raw}")]
pub struct ParseEnumError {
    kind: &'static str,
    raw: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, raw: &str) -> Self {
        Self {
            kind,
            raw: raw.to_owned(),
        }
    }
}

/// Communication tone applied to the chosen assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Calm,
    Kind,
    Direct,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Calm, Persona::Kind, Persona::Direct];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Calm => "calm",
            Persona::Kind => "kind",
            Persona::Direct => "direct",
        }
    }
}

impl FromStr for Persona {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calm" => Ok(Persona::Calm),
            "kind" => Ok(Persona::Kind),
            "direct" => Ok(Persona::Direct),
            other => Err(ParseEnumError::new("persona", other)),
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-tier classification derived from the skill quiz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }

    /// Course recommended to a learner at this level.
    #[must_use]
    pub fn suggested_course(self) -> &'static str {
        match self {
            SkillLevel::Beginner => "Python Intro",
            SkillLevel::Intermediate => "Python Fundamentals + Projects",
            SkillLevel::Advanced => "Data Structures & Algorithms in Python",
        }
    }
}

impl FromStr for SkillLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            other => Err(ParseEnumError::new("skill level", other)),
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── REQUIREMENTS & ERRORS ─────────────────────────────────────────────────────
//

/// A piece of onboarding state that some step fills in and later steps need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    Assistant,
    Persona,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Assistant => f.write_str("an assistant must be selected"),
            Requirement::Persona => f.write_str("a persona must be selected"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("cannot enter {step}: {missing}")]
    PrerequisiteNotMet {
        step: OnboardingStep,
        missing: Requirement,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OnboardingStateError {
    #[error("onboarding marked complete but {0}")]
    CompletedWithout(Requirement),
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Per-user onboarding progress.
///
/// Invariant: when `completed_at` is set, both the assistant and the persona are set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOnboardingState {
    assistant_id: Option<AssistantId>,
    assistant_persona: Option<Persona>,
    skill_level: SkillLevel,
    onboarding_step: Option<OnboardingStep>,
    onboarding_completed_at: Option<DateTime<Utc>>,
}

impl UserOnboardingState {
    /// State of a freshly created account.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate state from storage, enforcing the completion invariant.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingStateError::CompletedWithout` if the record is marked
    /// complete while the assistant or persona is missing.
    pub fn from_persisted(
        assistant_id: Option<AssistantId>,
        assistant_persona: Option<Persona>,
        skill_level: SkillLevel,
        onboarding_step: Option<OnboardingStep>,
        onboarding_completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, OnboardingStateError> {
        let state = Self {
            assistant_id,
            assistant_persona,
            skill_level,
            onboarding_step,
            onboarding_completed_at,
        };
        if state.is_completed() {
            if let Some(missing) = state.first_missing(&[Requirement::Assistant, Requirement::Persona])
            {
                return Err(OnboardingStateError::CompletedWithout(missing));
            }
        }
        Ok(state)
    }

    #[must_use]
    pub fn assistant_id(&self) -> Option<AssistantId> {
        self.assistant_id
    }

    #[must_use]
    pub fn assistant_persona(&self) -> Option<Persona> {
        self.assistant_persona
    }

    #[must_use]
    pub fn skill_level(&self) -> SkillLevel {
        self.skill_level
    }

    /// Last persisted checkpoint, if any.
    #[must_use]
    pub fn onboarding_step(&self) -> Option<OnboardingStep> {
        self.onboarding_step
    }

    #[must_use]
    pub fn onboarding_completed_at(&self) -> Option<DateTime<Utc>> {
        self.onboarding_completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.onboarding_completed_at.is_some()
    }

    /// Step the user is currently on; accounts without a checkpoint start at the first step.
    #[must_use]
    pub fn current_step(&self) -> OnboardingStep {
        self.onboarding_step.unwrap_or(OnboardingStep::FIRST)
    }

    #[must_use]
    pub fn satisfies(&self, requirement: Requirement) -> bool {
        match requirement {
            Requirement::Assistant => self.assistant_id.is_some(),
            Requirement::Persona => self.assistant_persona.is_some(),
        }
    }

    /// First requirement in `requirements` this state does not meet.
    #[must_use]
    pub fn first_missing(&self, requirements: &[Requirement]) -> Option<Requirement> {
        requirements.iter().copied().find(|r| !self.satisfies(*r))
    }

    fn require_for(&self, step: OnboardingStep) -> Result<(), TransitionError> {
        match self.first_missing(crate::guard::requirements_for(step)) {
            Some(missing) => Err(TransitionError::PrerequisiteNotMet { step, missing }),
            None => Ok(()),
        }
    }

    /// Move the checkpoint up to `step`; it never moves back and stays
    /// cleared once onboarding is complete.
    fn advance_to(&mut self, step: OnboardingStep) {
        if !self.is_completed() {
            self.onboarding_step = Some(self.current_step().max(step));
        }
    }

    /// Record the chosen assistant and move on to the skill quiz.
    pub fn select_assistant(&mut self, assistant_id: AssistantId) {
        self.assistant_id = Some(assistant_id);
        self.advance_to(OnboardingStep::SkillQuiz);
    }

    /// Record the quiz outcome and move on to the persona step.
    ///
    /// The checkpoint only moves when the quiz itself was reachable, i.e. an
    /// assistant is selected.
    pub fn record_skill_level(&mut self, level: SkillLevel) {
        self.skill_level = level;
        if self.require_for(OnboardingStep::SkillQuiz).is_ok() {
            self.advance_to(OnboardingStep::Persona);
        }
    }

    /// Record the chosen tone and move on to the guided intro.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::PrerequisiteNotMet` if no assistant is selected.
    pub fn select_persona(&mut self, persona: Persona) -> Result<(), TransitionError> {
        self.require_for(OnboardingStep::Persona)?;
        self.assistant_persona = Some(persona);
        self.advance_to(OnboardingStep::GuidedIntro);
        Ok(())
    }

    /// Mark onboarding finished and drop the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::PrerequisiteNotMet` unless both assistant and persona are set.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.require_for(OnboardingStep::GuidedIntro)?;
        self.onboarding_completed_at = Some(now);
        self.onboarding_step = None;
        Ok(())
    }

    /// Clear every onboarding field and restart at the first step.
    pub fn reset(&mut self) {
        *self = Self {
            onboarding_step: Some(OnboardingStep::FIRST),
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn persona_and_level_parse_from_storage_keys() {
        for persona in Persona::ALL {
            assert_eq!(persona.as_str().parse::<Persona>().unwrap(), persona);
        }
        assert_eq!("advanced".parse::<SkillLevel>().unwrap(), SkillLevel::Advanced);
        assert!("loud".parse::<Persona>().is_err());
    }

    #[test]
    fn select_persona_requires_assistant() {
        for persona in Persona::ALL {
            let mut state = UserOnboardingState::new();
            let err = state.select_persona(persona).unwrap_err();
            assert_eq!(
                err,
                TransitionError::PrerequisiteNotMet {
                    step: OnboardingStep::Persona,
                    missing: Requirement::Assistant,
                }
            );
            assert_eq!(state, UserOnboardingState::new());
        }
    }

    #[test]
    fn complete_requires_assistant_and_persona() {
        let mut state = UserOnboardingState::new();
        state.select_assistant(AssistantId::new(1));
        let err = state.complete(fixed_now()).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::PrerequisiteNotMet {
                missing: Requirement::Persona,
                ..
            }
        ));

        state.select_persona(Persona::Kind).unwrap();
        state.complete(fixed_now()).unwrap();
        assert_eq!(state.onboarding_completed_at(), Some(fixed_now()));
        assert_eq!(state.onboarding_step(), None);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut state = UserOnboardingState::new();
        state.select_assistant(AssistantId::new(3));
        state.select_persona(Persona::Direct).unwrap();
        state.record_skill_level(SkillLevel::Advanced);

        state.reset();
        let once = state.clone();
        state.reset();
        assert_eq!(state, once);
        assert_eq!(state.onboarding_step(), Some(OnboardingStep::Welcome));
        assert_eq!(state.assistant_id(), None);
        assert_eq!(state.skill_level(), SkillLevel::Beginner);
    }

    #[test]
    fn skill_level_after_completion_keeps_checkpoint_cleared() {
        let mut state = UserOnboardingState::new();
        state.select_assistant(AssistantId::new(1));
        state.select_persona(Persona::Calm).unwrap();
        state.complete(fixed_now()).unwrap();

        state.record_skill_level(SkillLevel::Intermediate);
        assert_eq!(state.skill_level(), SkillLevel::Intermediate);
        assert_eq!(state.onboarding_step(), None);
    }

    #[test]
    fn revisiting_earlier_steps_keeps_the_checkpoint() {
        let mut state = UserOnboardingState::new();
        state.select_assistant(AssistantId::new(1));
        state.select_persona(Persona::Calm).unwrap();

        state.select_assistant(AssistantId::new(2));
        assert_eq!(state.assistant_id(), Some(AssistantId::new(2)));
        assert_eq!(state.onboarding_step(), Some(OnboardingStep::GuidedIntro));

        state.record_skill_level(SkillLevel::Advanced);
        assert_eq!(state.onboarding_step(), Some(OnboardingStep::GuidedIntro));

        state.select_persona(Persona::Kind).unwrap();
        assert_eq!(state.onboarding_step(), Some(OnboardingStep::GuidedIntro));
    }

    #[test]
    fn skill_level_without_assistant_leaves_checkpoint() {
        let mut state = UserOnboardingState::new();
        state.record_skill_level(SkillLevel::Intermediate);
        assert_eq!(state.skill_level(), SkillLevel::Intermediate);
        assert_eq!(state.onboarding_step(), None);
        assert!(!crate::guard::can_access_step(&state, OnboardingStep::Persona));
    }

    #[test]
    fn from_persisted_rejects_completed_without_persona() {
        let err = UserOnboardingState::from_persisted(
            Some(AssistantId::new(1)),
            None,
            SkillLevel::Beginner,
            None,
            Some(fixed_now()),
        )
        .unwrap_err();
        assert_eq!(err, OnboardingStateError::CompletedWithout(Requirement::Persona));
    }
}
