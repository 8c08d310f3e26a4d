//! Grading of skill quiz submissions.

use std::collections::HashSet;
use thiserror::Error;

use crate::model::{
    Answer, NewActivityEvent, OptionId, QuestionId, SkillLevel, SkillQuiz, quiz_events,
};

/// Submitted answer set does not match the quiz.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("question {0} does not belong to this quiz")]
    UnknownQuestion(QuestionId),

    #[error("question {0} was answered more than once")]
    DuplicateAnswer(QuestionId),

    #[error("question {0} was not answered")]
    MissingAnswer(QuestionId),

    #[error("option {option} is not an option of question {question}")]
    ForeignOption {
        question: QuestionId,
        option: OptionId,
    },
}

/// One answer after grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question_id: QuestionId,
    pub option_id: OptionId,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizGrade {
    pub score: u32,
    pub total: u32,
    pub level: SkillLevel,
    pub answers: Vec<GradedAnswer>,
}

impl QuizGrade {
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.score == self.total
    }

    /// Ledger entries this grade earns.
    #[must_use]
    pub fn events(&self) -> Vec<NewActivityEvent> {
        quiz_events(self.score, self.total)
    }
}

impl SkillLevel {
    /// Map a raw score to a tier.
    ///
    /// Up to 40% is beginner, up to 70% intermediate, anything above advanced.
    /// Compared in integer space so 2/5 lands exactly on the 40% boundary.
    #[must_use]
    pub fn from_score(score: u32, total: u32) -> Self {
        if total == 0 {
            return SkillLevel::Beginner;
        }
        let scaled = u64::from(score) * 100;
        let total = u64::from(total);
        if scaled <= 40 * total {
            SkillLevel::Beginner
        } else if scaled <= 70 * total {
            SkillLevel::Intermediate
        } else {
            SkillLevel::Advanced
        }
    }
}

/// Validate `answers` against `quiz` and grade them.
///
/// Every question must be answered exactly once, with one of its own options.
///
/// # Errors
///
/// Returns `SubmissionError` describing the first mismatch found.
pub fn grade(quiz: &SkillQuiz, answers: &[Answer]) -> Result<QuizGrade, SubmissionError> {
    let mut seen = HashSet::with_capacity(answers.len());
    let mut graded = Vec::with_capacity(answers.len());

    for answer in answers {
        let question = quiz
            .question(answer.question_id)
            .ok_or(SubmissionError::UnknownQuestion(answer.question_id))?;
        if !seen.insert(question.id) {
            return Err(SubmissionError::DuplicateAnswer(question.id));
        }
        if !question.has_option(answer.selected_option_id) {
            return Err(SubmissionError::ForeignOption {
                question: question.id,
                option: answer.selected_option_id,
            });
        }
        graded.push(GradedAnswer {
            question_id: question.id,
            option_id: answer.selected_option_id,
            is_correct: question.correct_option() == Some(answer.selected_option_id),
        });
    }

    if let Some(missing) = quiz.questions().iter().find(|q| !seen.contains(&q.id)) {
        return Err(SubmissionError::MissingAnswer(missing.id));
    }

    let score = graded.iter().filter(|a| a.is_correct).count();
    // Answer count is bounded by the question list, which comes from seeded content.
    let score = u32::try_from(score).unwrap_or(u32::MAX);
    let total = u32::try_from(graded.len()).unwrap_or(u32::MAX);

    Ok(QuizGrade {
        score,
        total,
        level: SkillLevel::from_score(score, total),
        answers: graded,
    })
}
