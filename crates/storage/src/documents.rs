//! Persisted document shapes.
//!
//! These mirror the domain types field by field so backends can serialize
//! nested collections as JSON without leaking storage concerns into the
//! domain layer. Every `into_*` conversion re-validates, so a malformed row
//! surfaces as `StorageError::Serialization` instead of a broken domain value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use learn_core::model::{
    Attempt, Category, CompletedLessonRecord, InProgressRecord, Lesson, LessonId, ProgressState,
    Quiz, QuizQuestion, SavedQuizState, Schedule, ScheduleSlot, Score, SlotDraft,
};
use serde::{Deserialize, Serialize};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

//
// ─── LESSONS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDoc {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDoc {
    pub questions: Vec<QuestionDoc>,
}

impl QuizDoc {
    #[must_use]
    pub fn from_quiz(quiz: &Quiz) -> Self {
        Self {
            questions: quiz
                .questions()
                .iter()
                .map(|q| QuestionDoc {
                    question: q.prompt.clone(),
                    options: q.options.clone(),
                    correct: q.correct,
                    explanation: q.explanation.clone(),
                    hint: q.hint.clone(),
                })
                .collect(),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the questions fail validation.
    pub fn into_quiz(self) -> Result<Quiz, StorageError> {
        let questions = self
            .questions
            .into_iter()
            .map(|q| QuizQuestion {
                prompt: q.question,
                options: q.options,
                correct: q.correct,
                explanation: q.explanation,
                hint: q.hint,
            })
            .collect();
        Quiz::new(questions).map_err(ser)
    }
}

/// A catalog lesson as stored and as shipped in the demo catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDoc {
    pub id: String,
    pub title: String,
    pub category: String,
    pub duration: f64,
    pub quiz: QuizDoc,
}

impl LessonDoc {
    #[must_use]
    pub fn from_lesson(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id().as_str().to_owned(),
            title: lesson.title().to_owned(),
            category: lesson.category().as_str().to_owned(),
            duration: lesson.duration_minutes(),
            quiz: QuizDoc::from_quiz(lesson.quiz()),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if any field fails domain validation.
    pub fn into_lesson(self) -> Result<Lesson, StorageError> {
        let id = LessonId::new(self.id).map_err(ser)?;
        let category: Category = self.category.parse().map_err(ser)?;
        let quiz = self.quiz.into_quiz()?;
        Lesson::new(id, self.title, category, self.duration, quiz).map_err(ser)
    }
}

//
// ─── SCHEDULES ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDoc {
    pub day: String,
    pub start: String,
    pub end: String,
    pub duration: u32,
}

impl SlotDoc {
    #[must_use]
    pub fn from_slot(slot: &ScheduleSlot) -> Self {
        let draft = slot.to_draft();
        Self {
            day: draft.day,
            start: draft.start,
            end: draft.end,
            duration: draft.duration,
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored slot is not a valid
    /// five-minute window.
    pub fn into_slot(self) -> Result<ScheduleSlot, StorageError> {
        SlotDraft {
            day: self.day,
            start: self.start,
            end: self.end,
            duration: self.duration,
        }
        .validate()
        .map_err(ser)
    }
}

#[must_use]
pub fn slots_to_docs(schedule: &Schedule) -> Vec<SlotDoc> {
    schedule.slots().iter().map(SlotDoc::from_slot).collect()
}

/// # Errors
///
/// Returns `StorageError::Serialization` if any slot is invalid.
pub fn schedule_from_docs(slots: Vec<SlotDoc>) -> Result<Schedule, StorageError> {
    let slots = slots
        .into_iter()
        .map(SlotDoc::into_slot)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Schedule::new(slots))
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedDoc {
    pub lesson_id: String,
    pub score: u32,
    pub progress: u32,
    #[serde(default = "default_true")]
    pub completed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InProgressDoc {
    pub lesson_id: String,
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDoc {
    pub lesson_id: String,
    pub score: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuizDoc {
    #[serde(default)]
    pub current_question: usize,
    #[serde(default)]
    pub answers: BTreeMap<usize, usize>,
    #[serde(default)]
    pub remaining_secs: u32,
}

/// All progress collections for one user. Missing collections default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDoc {
    #[serde(default)]
    pub completed_lessons: Vec<CompletedDoc>,
    #[serde(default)]
    pub in_progress_lessons: Vec<InProgressDoc>,
    #[serde(default)]
    pub attempts: Vec<AttemptDoc>,
    #[serde(default)]
    pub saved_quizzes: BTreeMap<String, SavedQuizDoc>,
}

fn progress_u8(value: u32) -> Result<u8, StorageError> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| StorageError::Serialization(format!("progress out of range: {value}")))
}

impl ProgressDoc {
    #[must_use]
    pub fn from_state(state: &ProgressState) -> Self {
        Self {
            completed_lessons: state
                .completed
                .iter()
                .map(|r| CompletedDoc {
                    lesson_id: r.lesson_id.as_str().to_owned(),
                    score: u32::from(r.score.value()),
                    progress: u32::from(r.progress),
                    completed: r.completed,
                })
                .collect(),
            in_progress_lessons: state
                .in_progress
                .iter()
                .map(|r| InProgressDoc {
                    lesson_id: r.lesson_id.as_str().to_owned(),
                    progress: u32::from(r.progress),
                })
                .collect(),
            attempts: state
                .attempts
                .iter()
                .map(|a| AttemptDoc {
                    lesson_id: a.lesson_id.as_str().to_owned(),
                    score: u32::from(a.score.value()),
                    timestamp: a.at,
                })
                .collect(),
            saved_quizzes: state
                .saved_quizzes
                .iter()
                .map(|(id, s)| {
                    (
                        id.as_str().to_owned(),
                        SavedQuizDoc {
                            current_question: s.current_question,
                            answers: s.answers.clone(),
                            remaining_secs: s.remaining_secs,
                        },
                    )
                })
                .collect(),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for out-of-range numbers, empty
    /// lesson ids, or a lesson recorded as both completed and in progress.
    pub fn into_state(self) -> Result<ProgressState, StorageError> {
        let completed = self
            .completed_lessons
            .into_iter()
            .map(|d| {
                Ok(CompletedLessonRecord {
                    lesson_id: LessonId::new(d.lesson_id).map_err(ser)?,
                    score: Score::new(d.score).map_err(ser)?,
                    progress: progress_u8(d.progress)?,
                    completed: d.completed,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let in_progress = self
            .in_progress_lessons
            .into_iter()
            .map(|d| {
                Ok(InProgressRecord {
                    lesson_id: LessonId::new(d.lesson_id).map_err(ser)?,
                    progress: progress_u8(d.progress)?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let attempts = self
            .attempts
            .into_iter()
            .map(|d| {
                Ok(Attempt {
                    lesson_id: LessonId::new(d.lesson_id).map_err(ser)?,
                    score: Score::new(d.score).map_err(ser)?,
                    at: d.timestamp,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let saved_quizzes = self
            .saved_quizzes
            .into_iter()
            .map(|(id, d)| {
                Ok((
                    LessonId::new(id).map_err(ser)?,
                    SavedQuizState {
                        current_question: d.current_question,
                        answers: d.answers,
                        remaining_secs: d.remaining_secs,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>, StorageError>>()?;

        ProgressState::from_persisted(completed, in_progress, attempts, saved_quizzes).map_err(ser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::time::fixed_now;

    #[test]
    fn lesson_doc_parses_catalog_shape() {
        let raw = r#"{
            "id": "9",
            "title": "Lesson 9: Algebra Basics",
            "category": "Math",
            "duration": 5.0,
            "quiz": { "questions": [{
                "question": "Solve for x: 2x + 3 = 7",
                "options": ["1", "2", "3", "4"],
                "correct": 1,
                "explanation": "x = 2.",
                "hint": "Isolate x step by step."
            }]}
        }"#;
        let doc: LessonDoc = serde_json::from_str(raw).unwrap();
        let lesson = doc.into_lesson().unwrap();
        assert!(lesson.is_micro());
        assert_eq!(lesson.quiz().len(), 1);
        assert_eq!(LessonDoc::from_lesson(&lesson).category, "Math");
    }

    #[test]
    fn lesson_doc_rejects_bad_correct_index() {
        let doc = LessonDoc {
            id: "1".into(),
            title: "t".into(),
            category: "Math".into(),
            duration: 5.0,
            quiz: QuizDoc {
                questions: vec![QuestionDoc {
                    question: "q".into(),
                    options: vec!["a".into(), "b".into()],
                    correct: 4,
                    explanation: String::new(),
                    hint: None,
                }],
            },
        };
        assert!(matches!(
            doc.into_lesson(),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn progress_doc_defaults_missing_collections() {
        let doc: ProgressDoc = serde_json::from_str(
            r#"{"attempts":[{"lessonId":"2","score":100,"timestamp":"2025-07-29T19:00:00Z"}]}"#,
        )
        .unwrap();
        let state = doc.into_state().unwrap();
        assert_eq!(state.total_score(), 100);
        assert!(state.completed.is_empty());
    }

    #[test]
    fn progress_doc_rejects_double_state() {
        let doc = ProgressDoc {
            completed_lessons: vec![CompletedDoc {
                lesson_id: "1".into(),
                score: 100,
                progress: 100,
                completed: true,
            }],
            in_progress_lessons: vec![InProgressDoc {
                lesson_id: "1".into(),
                progress: 60,
            }],
            ..ProgressDoc::default()
        };
        assert!(doc.into_state().is_err());
    }

    #[test]
    fn saved_quiz_answers_survive_json() {
        let mut state = ProgressState::default();
        let mut saved = SavedQuizState {
            current_question: 1,
            remaining_secs: 120,
            ..SavedQuizState::default()
        };
        saved.answers.insert(0, 2);
        state
            .saved_quizzes
            .insert(LessonId::new("3").unwrap(), saved);
        state.attempts.push(Attempt {
            lesson_id: LessonId::new("3").unwrap(),
            score: Score::new(50).unwrap(),
            at: fixed_now(),
        });

        let json = serde_json::to_string(&ProgressDoc::from_state(&state)).unwrap();
        let back: ProgressDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_state().unwrap(), state);
    }

    #[test]
    fn slot_doc_rejects_six_minute_window() {
        let doc = SlotDoc {
            day: "Monday".into(),
            start: "09:00".into(),
            end: "09:06".into(),
            duration: 5,
        };
        assert!(doc.into_slot().is_err());
    }
}
