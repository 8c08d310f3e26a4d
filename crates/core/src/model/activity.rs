use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::{ActivityEventId, AttemptId, QuizId, UserId};
use crate::model::onboarding::ParseEnumError;

/// Points granted per correctly answered quiz question.
pub const POINTS_PER_CORRECT_ANSWER: i64 = 10;

/// Flat bonus for answering every question correctly.
pub const PERFECT_QUIZ_BONUS: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    QuizSubmitted,
    QuizPerfect,
}

impl ActivityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::QuizSubmitted => "quiz_submitted",
            ActivityKind::QuizPerfect => "quiz_perfect",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quiz_submitted" => Ok(ActivityKind::QuizSubmitted),
            "quiz_perfect" => Ok(ActivityKind::QuizPerfect),
            other => Err(ParseEnumError::new("activity kind", other)),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event to append once the triggering attempt exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewActivityEvent {
    pub kind: ActivityKind,
    pub points_delta: i64,
}

/// Append-only gamification ledger row.
///
/// `lesson_id` and `achievement_id` reference entities owned by other parts of
/// the application and are kept as raw keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: ActivityEventId,
    pub user_id: UserId,
    pub kind: ActivityKind,
    pub points_delta: i64,
    pub quiz_id: Option<QuizId>,
    pub attempt_id: Option<AttemptId>,
    pub lesson_id: Option<i64>,
    pub achievement_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Ledger entries earned by a graded quiz.
#[must_use]
pub fn quiz_events(score: u32, question_count: u32) -> Vec<NewActivityEvent> {
    let mut events = vec![NewActivityEvent {
        kind: ActivityKind::QuizSubmitted,
        points_delta: i64::from(score) * POINTS_PER_CORRECT_ANSWER,
    }];
    if score == question_count {
        events.push(NewActivityEvent {
            kind: ActivityKind::QuizPerfect,
            points_delta: PERFECT_QUIZ_BONUS,
        });
    }
    events
}
