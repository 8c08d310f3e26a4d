#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod onboarding_service;
pub mod session;
pub mod skill_quiz_service;

pub use sprite_core::Clock;

pub use app_services::AppServices;
pub use config::ServiceConfig;
pub use error::{AppServicesError, OnboardingError, QuizError};
pub use invalidation::{NoopInvalidator, RecordingInvalidator, ViewInvalidator};
pub use onboarding_service::{OnboardingService, StepDecision};
pub use session::Session;
pub use skill_quiz_service::{HOME_ROUTE, QuizOutcome, SkillQuizService};
