use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::model::{Lesson, LessonId, Quiz, QuizQuestion, SavedQuizState, Score};

/// Multiplier applied to the score of any retried quiz.
pub const RETRY_PENALTY: f64 = 0.9;

/// Countdown given to a fresh quiz, in seconds (one micro-lesson).
pub const DEFAULT_TIME_BUDGET_SECS: u32 = 300;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("{correct} correct answers out of {total} questions")]
    TooManyCorrect { correct: usize, total: usize },

    #[error("question {index} does not exist (quiz has {len})")]
    QuestionOutOfRange { index: usize, len: usize },

    #[error("option {option} does not exist for question {question}")]
    OptionOutOfRange { question: usize, option: usize },

    #[error("time is up")]
    Expired,
}

//
// ─── SCORING ───────────────────────────────────────────────────────────────────
//

/// `round(correct / total * 100 * factor)`, where factor is the retry penalty
/// after the first attempt and 1 otherwise.
///
/// # Errors
///
/// Returns `QuizError::NoQuestions` when `total` is zero and
/// `QuizError::TooManyCorrect` when `correct > total`.
pub fn compute_score(correct: usize, total: usize, retry_count: u32) -> Result<Score, QuizError> {
    if total == 0 {
        return Err(QuizError::NoQuestions);
    }
    if correct > total {
        return Err(QuizError::TooManyCorrect { correct, total });
    }
    let factor = if retry_count > 0 { RETRY_PENALTY } else { 1.0 };

    // counts are bounded by quiz length, far below f64 precision limits
    #[allow(clippy::cast_precision_loss)]
    let ratio = correct as f64 / total as f64;
    let raw = (ratio * 100.0 * factor).round();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = raw.clamp(0.0, 100.0) as u32;

    Score::new(value).map_err(|_| QuizError::TooManyCorrect { correct, total })
}

/// Tally of a finished quiz, ready for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub lesson_id: LessonId,
    pub correct: usize,
    pub total: usize,
    pub retry_count: u32,
    pub timed_out: bool,
}

impl QuizResult {
    /// # Errors
    ///
    /// See [`compute_score`].
    pub fn score(&self) -> Result<Score, QuizError> {
        compute_score(self.correct, self.total, self.retry_count)
    }
}

//
// ─── QUIZ RUN ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running { remaining_secs: u32 },
    Expired,
}

/// In-flight answering of one lesson's quiz.
///
/// Selections can be changed freely until the run is finished, either by the
/// user or because the countdown reached zero. Unanswered questions count as
/// wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizRun {
    lesson_id: LessonId,
    quiz: Quiz,
    current: usize,
    answers: BTreeMap<usize, usize>,
    remaining_secs: u32,
    retry_count: u32,
    hints_revealed: BTreeSet<usize>,
}

impl QuizRun {
    #[must_use]
    pub fn start(lesson: &Lesson, retry_count: u32) -> Self {
        Self {
            lesson_id: lesson.id().clone(),
            quiz: lesson.quiz().clone(),
            current: 0,
            answers: BTreeMap::new(),
            remaining_secs: DEFAULT_TIME_BUDGET_SECS,
            retry_count,
            hints_revealed: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_time_budget(mut self, secs: u32) -> Self {
        self.remaining_secs = secs;
        self
    }

    /// Continue a paused quiz from its snapshot.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the snapshot points at questions or options that the
    /// lesson does not have.
    pub fn resume(
        lesson: &Lesson,
        saved: &SavedQuizState,
        retry_count: u32,
    ) -> Result<Self, QuizError> {
        let quiz = lesson.quiz();
        if saved.current_question >= quiz.len() {
            return Err(QuizError::QuestionOutOfRange {
                index: saved.current_question,
                len: quiz.len(),
            });
        }
        for (&question, &option) in &saved.answers {
            check_option(quiz, question, option)?;
        }
        Ok(Self {
            lesson_id: lesson.id().clone(),
            quiz: quiz.clone(),
            current: saved.current_question,
            answers: saved.answers.clone(),
            remaining_secs: saved.remaining_secs,
            retry_count,
            hints_revealed: BTreeSet::new(),
        })
    }

    #[must_use]
    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.quiz.question(self.current)
    }

    #[must_use]
    pub fn selected(&self, question: usize) -> Option<usize> {
        self.answers.get(&question).copied()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }

    #[must_use]
    pub fn all_answered(&self) -> bool {
        self.answers.len() == self.quiz.len()
    }

    /// Number of distinct questions whose hint has been shown.
    #[must_use]
    pub fn hints_used(&self) -> usize {
        self.hints_revealed.len()
    }

    /// Select an option for the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Expired` once time is up, or
    /// `QuizError::OptionOutOfRange` for an option the question lacks.
    pub fn select(&mut self, option: usize) -> Result<(), QuizError> {
        if self.is_expired() {
            return Err(QuizError::Expired);
        }
        check_option(&self.quiz, self.current, option)?;
        self.answers.insert(self.current, option);
        Ok(())
    }

    /// Move to another question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::QuestionOutOfRange` if `index` is past the end.
    pub fn go_to(&mut self, index: usize) -> Result<(), QuizError> {
        if index >= self.quiz.len() {
            return Err(QuizError::QuestionOutOfRange {
                index,
                len: self.quiz.len(),
            });
        }
        self.current = index;
        Ok(())
    }

    /// Advance to the next question. Returns false on the last one.
    pub fn next(&mut self) -> bool {
        if self.current + 1 < self.quiz.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Show the current question's hint. Returns the hint and whether this is
    /// the first time it was revealed in this run.
    pub fn reveal_hint(&mut self) -> Option<(String, bool)> {
        let hint = self.current_question()?.hint.clone()?;
        let first = self.hints_revealed.insert(self.current);
        Some((hint, first))
    }

    /// Count the timer down by `elapsed_secs`.
    pub fn tick(&mut self, elapsed_secs: u32) -> TimerState {
        self.remaining_secs = self.remaining_secs.saturating_sub(elapsed_secs);
        if self.is_expired() {
            TimerState::Expired
        } else {
            TimerState::Running {
                remaining_secs: self.remaining_secs,
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SavedQuizState {
        SavedQuizState {
            current_question: self.current,
            answers: self.answers.clone(),
            remaining_secs: self.remaining_secs,
        }
    }

    /// Finish the run with whatever answers are selected.
    #[must_use]
    pub fn finish(self) -> QuizResult {
        let correct = self
            .quiz
            .questions()
            .iter()
            .enumerate()
            .filter(|(i, q)| self.answers.get(i).is_some_and(|sel| q.is_correct(*sel)))
            .count();
        QuizResult {
            timed_out: self.is_expired(),
            lesson_id: self.lesson_id,
            correct,
            total: self.quiz.len(),
            retry_count: self.retry_count,
        }
    }
}

fn check_option(quiz: &Quiz, question: usize, option: usize) -> Result<(), QuizError> {
    let q = quiz.question(question).ok_or(QuizError::QuestionOutOfRange {
        index: question,
        len: quiz.len(),
    })?;
    if option >= q.options.len() {
        return Err(QuizError::OptionOutOfRange { question, option });
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
