use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, QuizId};

/// Topic label under which the onboarding skill quiz is stored.
pub const SKILL_ASSESSMENT_TOPIC: &str = "skill-assessment";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Quiz content that cannot be graded. Signals bad seed data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizContentError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("question {0} must have exactly one correct option, found {1}")]
    CorrectOptionCount(QuestionId, usize),

    #[error("duplicate question id {0}")]
    DuplicateQuestion(QuestionId),

    #[error("duplicate option id {0}")]
    DuplicateOption(OptionId),
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub id: OptionId,
    pub label: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<QuizOption>,
}

impl Question {
    /// The single option marked correct.
    #[must_use]
    pub fn correct_option(&self) -> Option<OptionId> {
        self.options.iter().find(|o| o.is_correct).map(|o| o.id)
    }

    #[must_use]
    pub fn has_option(&self, option: OptionId) -> bool {
        self.options.iter().any(|o| o.id == option)
    }
}

/// Fixed quiz content, read-only while grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillQuiz {
    id: QuizId,
    topic: String,
    title: String,
    questions: Vec<Question>,
}

impl SkillQuiz {
    /// Build a quiz, checking that every question is gradable.
    ///
    /// # Errors
    ///
    /// Returns `QuizContentError` if there are no questions, ids repeat, or a
    /// question does not have exactly one correct option.
    pub fn new(
        id: QuizId,
        topic: impl Into<String>,
        title: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Self, QuizContentError> {
        if questions.is_empty() {
            return Err(QuizContentError::NoQuestions);
        }

        let mut question_ids = HashSet::new();
        let mut option_ids = HashSet::new();
        for question in &questions {
            if !question_ids.insert(question.id) {
                return Err(QuizContentError::DuplicateQuestion(question.id));
            }
            for option in &question.options {
                if !option_ids.insert(option.id) {
                    return Err(QuizContentError::DuplicateOption(option.id));
                }
            }
            let correct = question.options.iter().filter(|o| o.is_correct).count();
            if correct != 1 {
                return Err(QuizContentError::CorrectOptionCount(question.id, correct));
            }
        }

        Ok(Self {
            id,
            topic: topic.into(),
            title: title.into(),
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Content safe to send to the learner: correctness flags stripped.
    #[must_use]
    pub fn to_view(&self) -> QuizView {
        QuizView {
            id: self.id,
            title: self.title.clone(),
            questions: self
                .questions
                .iter()
                .map(|q| QuestionView {
                    id: q.id,
                    prompt: q.prompt.clone(),
                    options: q
                        .options
                        .iter()
                        .map(|o| OptionView {
                            id: o.id,
                            label: o.label.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub id: QuizId,
    pub title: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: OptionId,
    pub label: String,
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: QuestionId,
    pub selected_option_id: OptionId,
}

/// Payload posted from the skill quiz page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl QuizSubmission {
    #[must_use]
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers,
            started_at: None,
        }
    }

    #[must_use]
    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }
}
