//! Step prerequisites and default-step resolution.
//!
//! Both the access check and the resolver read the same rule table, so the
//! two can never disagree about what a step needs.

use crate::model::{OnboardingStep, Requirement, UserOnboardingState};

struct StepRule {
    /// State this step fills in when the user completes it.
    fills: Option<Requirement>,
    /// State that must exist before the step can be entered.
    requires: &'static [Requirement],
}

// `requires` of each row is the union of `fills` of the rows above it.
const RULES: [StepRule; 5] = [
    // welcome
    StepRule {
        fills: None,
        requires: &[],
    },
    // gender
    StepRule {
        fills: Some(Requirement::Assistant),
        requires: &[],
    },
    // skill_quiz
    StepRule {
        fills: None,
        requires: &[Requirement::Assistant],
    },
    // persona
    StepRule {
        fills: Some(Requirement::Persona),
        requires: &[Requirement::Assistant],
    },
    // guided_intro
    StepRule {
        fills: None,
        requires: &[Requirement::Assistant, Requirement::Persona],
    },
];

fn rule(step: OnboardingStep) -> &'static StepRule {
    &RULES[step.index()]
}

/// State that must be present before `step` can be entered.
#[must_use]
pub fn requirements_for(step: OnboardingStep) -> &'static [Requirement] {
    rule(step).requires
}

/// State that `step` fills in, if any.
#[must_use]
pub fn fills(step: OnboardingStep) -> Option<Requirement> {
    rule(step).fills
}

/// Whether `state` may navigate to `target`.
///
/// Steps at or before the current one are always revisitable. The step right
/// after the current one is reachable once its requirements are met. Anything
/// further ahead is refused.
#[must_use]
pub fn can_access_step(state: &UserOnboardingState, target: OnboardingStep) -> bool {
    let current = state.current_step().index();
    let wanted = target.index();
    if wanted <= current {
        return true;
    }
    wanted == current + 1 && state.first_missing(requirements_for(target)).is_none()
}

/// Step a user lands on when visiting onboarding without a specific target.
///
/// Picks the first step whose state is still unfilled. The quiz fills nothing
/// of its own, so it is only chosen when the checkpoint points at it.
#[must_use]
pub fn resolve_step(state: &UserOnboardingState) -> OnboardingStep {
    let target = OnboardingStep::ALL
        .into_iter()
        .find(|step| fills(*step).is_some_and(|f| !state.satisfies(f)))
        .unwrap_or(OnboardingStep::GuidedIntro);

    if target == OnboardingStep::Persona
        && state.onboarding_step() == Some(OnboardingStep::SkillQuiz)
    {
        OnboardingStep::SkillQuiz
    } else {
        target
    }
}
