//! Quiz run state machine
//!
//! `Idle → InProgress{question_index, answers} → scored → Idle`. Scoring
//! happens on the transition out of `InProgress`; the caller archives the
//! returned [`QuizResult`].

use super::catalog::QuizQuestion;
use super::error::CourseError;
use super::progress::QuizResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of a user's quiz run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuizState {
    /// No run active
    #[default]
    Idle,
    /// Waiting for an answer to `question_index`
    InProgress {
        /// 0-based question the user is on
        question_index: usize,
        /// Question id → chosen letter, `None` for skipped questions
        answers: BTreeMap<String, Option<String>>,
    },
}

/// What happened after an answer or skip
#[derive(Debug, Clone, PartialEq)]
pub enum QuizStep {
    /// Run continues at this question
    Next {
        /// 0-based question to show
        question_index: usize,
    },
    /// Last question handled, run scored and reset to `Idle`
    Finished(QuizResult),
}

impl QuizState {
    /// Whether a run is active
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::InProgress { .. })
    }

    /// Question the user is on, if a run is active
    #[must_use]
    pub const fn current_question(&self) -> Option<usize> {
        match self {
            Self::Idle => None,
            Self::InProgress { question_index, .. } => Some(*question_index),
        }
    }

    /// Begin a new run at the first question, dropping any in-flight answers
    pub fn start(&mut self) {
        *self = Self::InProgress {
            question_index: 0,
            answers: BTreeMap::new(),
        };
    }

    /// Record `letter` (or a skip when `None`) for the current question and advance.
    ///
    /// # Errors
    ///
    /// `QuizNotStarted` when idle, `InvalidAnswer` when the letter is not an
    /// option of the current question (the run does not advance).
    pub fn answer(
        &mut self,
        questions: &[QuizQuestion],
        letter: Option<&str>,
    ) -> Result<QuizStep, CourseError> {
        let Self::InProgress {
            question_index,
            answers,
        } = self
        else {
            return Err(CourseError::QuizNotStarted);
        };

        let current = *question_index;
        let Some(question) = questions.get(current) else {
            // Catalog shrank under a persisted run
            return self.finish(questions).map(QuizStep::Finished);
        };

        if let Some(letter) = letter {
            if !question.has_option(letter) {
                return Err(CourseError::InvalidAnswer(letter.to_string()));
            }
        }

        answers.insert(question.id.clone(), letter.map(str::to_string));
        let next = current + 1;
        *question_index = next;

        if next >= questions.len() {
            self.finish(questions).map(QuizStep::Finished)
        } else {
            Ok(QuizStep::Next {
                question_index: next,
            })
        }
    }

    /// Score the run now and return to `Idle`.
    ///
    /// Questions not reached count as unanswered.
    ///
    /// # Errors
    ///
    /// `QuizNotStarted` when idle.
    pub fn finish(&mut self, questions: &[QuizQuestion]) -> Result<QuizResult, CourseError> {
        match std::mem::take(self) {
            Self::Idle => Err(CourseError::QuizNotStarted),
            Self::InProgress { answers, .. } => Ok(score(questions, &answers)),
        }
    }
}

/// Score `answers` against the answer key.
///
/// Every question appears in the result; a missing or skipped answer is
/// recorded as `None` and counts as incorrect. The denominator is always the
/// full question count.
#[must_use]
pub fn score(questions: &[QuizQuestion], answers: &BTreeMap<String, Option<String>>) -> QuizResult {
    let mut recorded = BTreeMap::new();
    let mut correct_count = 0;

    for q in questions {
        let chosen = answers.get(&q.id).cloned().flatten();
        if chosen.as_deref() == Some(q.correct.as_str()) {
            correct_count += 1;
        }
        recorded.insert(q.id.clone(), chosen);
    }

    let total_count = questions.len();
    #[allow(clippy::cast_precision_loss)]
    let percentage = if total_count == 0 {
        0.0
    } else {
        correct_count as f64 / total_count as f64 * 100.0
    };

    QuizResult {
        finished_at: Utc::now(),
        answers: recorded,
        correct_count,
        total_count,
        percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::catalog::QuizOption;

    fn q(id: &str, correct: &str) -> QuizQuestion {
        QuizQuestion {
            id: id.to_string(),
            prompt: format!("Question {id}"),
            options: ["а", "б", "в"]
                .iter()
                .map(|l| QuizOption {
                    letter: (*l).to_string(),
                    text: format!("option {l}"),
                })
                .collect(),
            correct: correct.to_string(),
        }
    }

    #[test]
    fn test_two_correct_answers_score_full() -> Result<(), CourseError> {
        let questions = vec![q("1", "б"), q("2", "а")];
        let mut state = QuizState::default();
        state.start();

        assert_eq!(
            state.answer(&questions, Some("б"))?,
            QuizStep::Next { question_index: 1 }
        );
        let QuizStep::Finished(result) = state.answer(&questions, Some("а"))? else {
            panic!("expected the quiz to finish");
        };

        assert_eq!(result.correct_count, 2);
        assert_eq!(result.total_count, 2);
        assert!((result.percentage - 100.0).abs() < f64::EPSILON);
        assert_eq!(state, QuizState::Idle);
        Ok(())
    }

    #[test]
    fn test_half_right_is_fifty_percent() {
        let questions = vec![q("1", "б"), q("2", "а")];
        let answers = BTreeMap::from([
            ("1".to_string(), Some("б".to_string())),
            ("2".to_string(), Some("в".to_string())),
        ]);
        let result = score(&questions, &answers);
        assert_eq!(result.correct_count, 1);
        assert!((result.percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_skipping_everything_scores_zero() -> Result<(), CourseError> {
        let questions = vec![q("1", "а"), q("2", "б"), q("3", "в")];
        let mut state = QuizState::default();
        state.start();

        let mut last = None;
        for _ in 0..questions.len() {
            last = Some(state.answer(&questions, None)?);
        }

        let Some(QuizStep::Finished(result)) = last else {
            panic!("expected the quiz to finish");
        };
        assert_eq!(result.correct_count, 0);
        assert_eq!(result.total_count, 3);
        assert_eq!(result.unanswered_count(), 3);
        Ok(())
    }

    #[test]
    fn test_finish_early_counts_rest_as_unanswered() -> Result<(), CourseError> {
        let questions = vec![q("1", "а"), q("2", "б"), q("3", "в"), q("4", "а")];
        let mut state = QuizState::default();
        state.start();
        state.answer(&questions, Some("а"))?;

        let result = state.finish(&questions)?;
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.total_count, 4);
        assert_eq!(result.unanswered_count(), 3);
        assert!((result.percentage - 25.0).abs() < f64::EPSILON);
        assert!(!state.is_active());
        Ok(())
    }

    #[test]
    fn test_invalid_letter_does_not_advance() -> Result<(), CourseError> {
        let questions = vec![q("1", "а"), q("2", "б")];
        let mut state = QuizState::default();
        state.start();

        let err = state.answer(&questions, Some("z"));
        assert!(matches!(err, Err(CourseError::InvalidAnswer(l)) if l == "z"));
        assert_eq!(state.current_question(), Some(0));
        Ok(())
    }

    #[test]
    fn test_restart_discards_previous_answers() -> Result<(), CourseError> {
        let questions = vec![q("1", "а"), q("2", "б")];
        let mut state = QuizState::default();
        state.start();
        state.answer(&questions, Some("а"))?;

        state.start();
        assert_eq!(state.current_question(), Some(0));
        let QuizState::InProgress { answers, .. } = &state else {
            panic!("expected an active run");
        };
        assert!(answers.is_empty());
        Ok(())
    }

    #[test]
    fn test_idle_operations_fail() {
        let questions = vec![q("1", "а")];
        let mut state = QuizState::Idle;
        assert!(matches!(
            state.answer(&questions, Some("а")),
            Err(CourseError::QuizNotStarted)
        ));
        assert!(matches!(
            state.finish(&questions),
            Err(CourseError::QuizNotStarted)
        ));
    }
}
