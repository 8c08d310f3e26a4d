use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Path prefix shared by every onboarding page.
pub const ONBOARDING_ROUTE: &str = "/onboarding";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown onboarding step: {0}")]
pub struct UnknownStepError(pub String);

/// One stage of the onboarding flow, in canonical order.
///
/// The derived `Ord` follows declaration order, which is the flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Welcome,
    /// Assistant selection.
    Gender,
    SkillQuiz,
    Persona,
    GuidedIntro,
}

struct StepEntry {
    step: OnboardingStep,
    key: &'static str,
    segment: &'static str,
    title: &'static str,
    description: &'static str,
}

const STEP_TABLE: [StepEntry; 5] = [
    StepEntry {
        step: OnboardingStep::Welcome,
        key: "welcome",
        segment: "welcome",
        title: "Welcome to Sprite.exe",
        description: "A quick tour before your first lesson.",
    },
    StepEntry {
        step: OnboardingStep::Gender,
        key: "gender",
        segment: "gender",
        title: "Pick your assistant",
        description: "Choose the tutor who will guide you through every lesson.",
    },
    StepEntry {
        step: OnboardingStep::SkillQuiz,
        key: "skill_quiz",
        segment: "skill-quiz",
        title: "Skill check",
        description: "Five short questions so lessons start at the right level.",
    },
    StepEntry {
        step: OnboardingStep::Persona,
        key: "persona",
        segment: "persona",
        title: "Set the tone",
        description: "Calm, kind or direct: decide how your assistant talks to you.",
    },
    StepEntry {
        step: OnboardingStep::GuidedIntro,
        key: "guided_intro",
        segment: "guided-intro",
        title: "Guided intro",
        description: "Meet your assistant and start learning.",
    },
];

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 5] = [
        OnboardingStep::Welcome,
        OnboardingStep::Gender,
        OnboardingStep::SkillQuiz,
        OnboardingStep::Persona,
        OnboardingStep::GuidedIntro,
    ];

    pub const FIRST: OnboardingStep = OnboardingStep::Welcome;

    fn entry(self) -> &'static StepEntry {
        &STEP_TABLE[self.index()]
    }

    /// Position in the canonical ordering.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Step immediately following this one; `None` at the terminal step.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Stable identifier used in storage and payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.entry().key
    }

    #[must_use]
    pub fn route_segment(self) -> &'static str {
        self.entry().segment
    }

    /// Full route of the step page, e.g. `/onboarding/skill-quiz`.
    #[must_use]
    pub fn route_path(self) -> String {
        format!("{ONBOARDING_ROUTE}/{}", self.route_segment())
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        self.entry().title
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        self.entry().description
    }

    /// Reverse lookup from a URL path fragment.
    ///
    /// Accepts the bare segment with or without surrounding slashes.
    #[must_use]
    pub fn from_route_segment(segment: &str) -> Option<Self> {
        let segment = segment.trim_matches('/');
        STEP_TABLE
            .iter()
            .find(|entry| entry.segment == segment)
            .map(|entry| entry.step)
    }
}

/// Position of a step given by its stable identifier.
///
/// # Errors
///
/// Returns `UnknownStepError` if the identifier names no step.
pub fn step_index(key: &str) -> Result<usize, UnknownStepError> {
    key.parse::<OnboardingStep>().map(OnboardingStep::index)
}

impl FromStr for OnboardingStep {
    type Err = UnknownStepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STEP_TABLE
            .iter()
            .find(|entry| entry.key == s)
            .map(|entry| entry.step)
            .ok_or_else(|| UnknownStepError(s.to_owned()))
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_enum_order() {
        for (i, step) in OnboardingStep::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
            assert_eq!(STEP_TABLE[i].step, *step);
        }
    }

    #[test]
    fn next_and_previous_walk_the_flow() {
        assert_eq!(OnboardingStep::Welcome.next(), Some(OnboardingStep::Gender));
        assert_eq!(OnboardingStep::Gender.next(), Some(OnboardingStep::SkillQuiz));
        assert_eq!(OnboardingStep::GuidedIntro.next(), None);
        assert_eq!(OnboardingStep::Welcome.previous(), None);
        assert_eq!(OnboardingStep::Persona.previous(), Some(OnboardingStep::SkillQuiz));
    }

    #[test]
    fn step_index_rejects_unknown_keys() {
        assert_eq!(step_index("persona").unwrap(), 3);
        let err = step_index("dashboard").unwrap_err();
        assert_eq!(err, UnknownStepError("dashboard".into()));
    }

    #[test]
    fn route_segments_resolve_back_to_steps() {
        for step in OnboardingStep::ALL {
            assert_eq!(OnboardingStep::from_route_segment(step.route_segment()), Some(step));
        }
        assert_eq!(
            OnboardingStep::from_route_segment("/skill-quiz/"),
            Some(OnboardingStep::SkillQuiz)
        );
        assert_eq!(OnboardingStep::from_route_segment("skill_quiz"), None);
        assert_eq!(OnboardingStep::GuidedIntro.route_path(), "/onboarding/guided-intro");
    }

    #[test]
    fn keys_round_trip_through_from_str() {
        for step in OnboardingStep::ALL {
            assert_eq!(step.as_str().parse::<OnboardingStep>().unwrap(), step);
        }
    }
}
