use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::LessonId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(u32),

    #[error("progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(u32),

    #[error("lesson {0} is recorded as both completed and in progress")]
    CompletedAndInProgress(LessonId),
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Percentage score of a quiz attempt, 0 to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(u8);

impl Score {
    pub const PERFECT: Score = Score(100);
    pub const ZERO: Score = Score(0);

    /// # Errors
    ///
    /// Returns `ProgressError::ScoreOutOfRange` above 100.
    pub fn new(value: u32) -> Result<Self, ProgressError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ProgressError::ScoreOutOfRange(value))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_perfect(self) -> bool {
        self == Self::PERFECT
    }
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// One scored pass through a lesson's quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub lesson_id: LessonId,
    pub score: Score,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedLessonRecord {
    pub lesson_id: LessonId,
    pub score: Score,
    pub progress: u8,
    pub completed: bool,
}

impl CompletedLessonRecord {
    #[must_use]
    pub fn perfect(lesson_id: LessonId) -> Self {
        Self {
            lesson_id,
            score: Score::PERFECT,
            progress: 100,
            completed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InProgressRecord {
    pub lesson_id: LessonId,
    pub progress: u8,
}

/// Snapshot of a paused quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedQuizState {
    pub current_question: usize,
    pub answers: BTreeMap<usize, usize>,
    pub remaining_secs: u32,
}

/// All persisted progress for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub completed: Vec<CompletedLessonRecord>,
    pub in_progress: Vec<InProgressRecord>,
    pub attempts: Vec<Attempt>,
    pub saved_quizzes: BTreeMap<LessonId, SavedQuizState>,
}

impl ProgressState {
    /// Rehydrate from persisted records, enforcing that completion supersedes
    /// in-progress for any lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if a progress value is above 100 or a lesson is
    /// in both lists.
    pub fn from_persisted(
        completed: Vec<CompletedLessonRecord>,
        in_progress: Vec<InProgressRecord>,
        attempts: Vec<Attempt>,
        saved_quizzes: BTreeMap<LessonId, SavedQuizState>,
    ) -> Result<Self, ProgressError> {
        for record in &completed {
            if record.progress > 100 {
                return Err(ProgressError::ProgressOutOfRange(u32::from(record.progress)));
            }
        }
        for record in &in_progress {
            if record.progress > 100 {
                return Err(ProgressError::ProgressOutOfRange(u32::from(record.progress)));
            }
            if completed.iter().any(|c| c.lesson_id == record.lesson_id) {
                return Err(ProgressError::CompletedAndInProgress(
                    record.lesson_id.clone(),
                ));
            }
        }
        Ok(Self {
            completed,
            in_progress,
            attempts,
            saved_quizzes,
        })
    }

    #[must_use]
    pub fn completed_record(&self, lesson_id: &LessonId) -> Option<&CompletedLessonRecord> {
        self.completed.iter().find(|r| &r.lesson_id == lesson_id)
    }

    #[must_use]
    pub fn in_progress_record(&self, lesson_id: &LessonId) -> Option<&InProgressRecord> {
        self.in_progress.iter().find(|r| &r.lesson_id == lesson_id)
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: &LessonId) -> bool {
        self.completed_record(lesson_id).is_some()
    }

    /// Attempts on one lesson, newest first.
    #[must_use]
    pub fn attempt_history(&self, lesson_id: &LessonId) -> Vec<Attempt> {
        let mut out: Vec<Attempt> = self
            .attempts
            .iter()
            .filter(|a| &a.lesson_id == lesson_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.at.cmp(&a.at));
        out
    }

    /// Sum of all attempt scores.
    #[must_use]
    pub fn total_score(&self) -> u64 {
        self.attempts
            .iter()
            .map(|a| u64::from(a.score.value()))
            .sum()
    }

    /// Progress percentage shown for a lesson: completed, else in-progress, else 0.
    #[must_use]
    pub fn lesson_progress(&self, lesson_id: &LessonId) -> u8 {
        if let Some(done) = self.completed_record(lesson_id) {
            return done.progress;
        }
        self.in_progress_record(lesson_id)
            .map_or(0, |r| r.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn lid(id: &str) -> LessonId {
        LessonId::new(id).unwrap()
    }

    #[test]
    fn score_bounds() {
        assert!(Score::new(101).is_err());
        assert!(Score::new(300).is_err());
        assert!(Score::new(100).unwrap().is_perfect());
        assert_eq!(Score::new(54).unwrap().value(), 54);
    }

    #[test]
    fn from_persisted_rejects_double_state() {
        let err = ProgressState::from_persisted(
            vec![CompletedLessonRecord::perfect(lid("1"))],
            vec![InProgressRecord {
                lesson_id: lid("1"),
                progress: 40,
            }],
            Vec::new(),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert_eq!(err, ProgressError::CompletedAndInProgress(lid("1")));
    }

    #[test]
    fn lesson_progress_prefers_completed() {
        let state = ProgressState::from_persisted(
            vec![CompletedLessonRecord::perfect(lid("1"))],
            vec![InProgressRecord {
                lesson_id: lid("2"),
                progress: 40,
            }],
            Vec::new(),
            BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(state.lesson_progress(&lid("1")), 100);
        assert_eq!(state.lesson_progress(&lid("2")), 40);
        assert_eq!(state.lesson_progress(&lid("3")), 0);
    }

    #[test]
    fn attempt_history_is_newest_first() {
        let now = fixed_now();
        let state = ProgressState {
            attempts: vec![
                Attempt {
                    lesson_id: lid("1"),
                    score: Score::new(50).unwrap(),
                    at: now,
                },
                Attempt {
                    lesson_id: lid("2"),
                    score: Score::new(70).unwrap(),
                    at: now,
                },
                Attempt {
                    lesson_id: lid("1"),
                    score: Score::PERFECT,
                    at: now + chrono::Duration::minutes(3),
                },
            ],
            ..ProgressState::default()
        };
        let history = state.attempt_history(&lid("1"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].score, Score::PERFECT);
        assert_eq!(state.total_score(), 220);
    }
}
