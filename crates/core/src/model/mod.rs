mod activity;
mod assistant;
mod ids;
mod onboarding;
mod quiz;
mod steps;

pub use ids::{
    ActivityEventId, AssistantId, AttemptId, OptionId, ParseIdError, QuestionId, QuizId, UserId,
};

pub use activity::{
    ActivityEvent, ActivityKind, NewActivityEvent, PERFECT_QUIZ_BONUS, POINTS_PER_CORRECT_ANSWER,
    quiz_events,
};
pub use assistant::{Assistant, AssistantError};
pub use onboarding::{
    OnboardingStateError, ParseEnumError, Persona, Requirement, SkillLevel, TransitionError,
    UserOnboardingState,
};
pub use quiz::{
    Answer, OptionView, Question, QuestionView, QuizContentError, QuizOption, QuizSubmission,
    QuizView, SKILL_ASSESSMENT_TOPIC, SkillQuiz,
};
pub use steps::{ONBOARDING_ROUTE, OnboardingStep, UnknownStepError, step_index};
