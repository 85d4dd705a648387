use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::ids::LessonId;

/// Length of every schedulable micro-lesson, in minutes.
pub const MICRO_LESSON_MINUTES: u32 = 5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson duration must be a positive number of minutes")]
    InvalidDuration,

    #[error("lesson quiz must contain at least one question")]
    EmptyQuiz,

    #[error("question {index} must have at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index} marks option {correct} correct but has {options} options")]
    CorrectOutOfRange {
        index: usize,
        correct: usize,
        options: usize,
    },

    #[error("question {index} prompt cannot be empty")]
    EmptyPrompt { index: usize },

    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// Topic tag a lesson belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Language,
    Mindfulness,
    Science,
    Math,
    History,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Language,
        Category::Mindfulness,
        Category::Science,
        Category::Math,
        Category::History,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Language => "Language",
            Category::Mindfulness => "Mindfulness",
            Category::Science => "Science",
            Category::Math => "Math",
            Category::History => "History",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LessonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LessonError::UnknownCategory(s.to_owned()))
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: usize,
    pub explanation: String,
    pub hint: Option<String>,
}

impl QuizQuestion {
    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        self.correct == selected
    }
}

/// Ordered questions attached to a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Validates and builds a quiz.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if there are no questions or any question is malformed.
    pub fn new(questions: Vec<QuizQuestion>) -> Result<Self, LessonError> {
        if questions.is_empty() {
            return Err(LessonError::EmptyQuiz);
        }
        for (index, q) in questions.iter().enumerate() {
            if q.prompt.trim().is_empty() {
                return Err(LessonError::EmptyPrompt { index });
            }
            if q.options.len() < 2 {
                return Err(LessonError::TooFewOptions { index });
            }
            if q.correct >= q.options.len() {
                return Err(LessonError::CorrectOutOfRange {
                    index,
                    correct: q.correct,
                    options: q.options.len(),
                });
            }
        }
        Ok(Self { questions })
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&QuizQuestion> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A short learning unit with an attached quiz. Immutable once authored.
#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    id: LessonId,
    title: String,
    category: Category,
    duration_minutes: f64,
    quiz: Quiz,
}

impl Lesson {
    /// Creates a new lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` for blank titles and
    /// `LessonError::InvalidDuration` for non-finite or non-positive durations.
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        category: Category,
        duration_minutes: f64,
        quiz: Quiz,
    ) -> Result<Self, LessonError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if !duration_minutes.is_finite() || duration_minutes <= 0.0 {
            return Err(LessonError::InvalidDuration);
        }
        Ok(Self {
            id,
            title: title.trim().to_owned(),
            category,
            duration_minutes,
            quiz,
        })
    }

    #[must_use]
    pub fn id(&self) -> &LessonId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn duration_minutes(&self) -> f64 {
        self.duration_minutes
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// True when the lesson fits exactly one micro-learning slot.
    #[must_use]
    pub fn is_micro(&self) -> bool {
        (self.duration_minutes - f64::from(MICRO_LESSON_MINUTES)).abs() < f64::EPSILON
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn question(correct: usize) -> QuizQuestion {
        QuizQuestion {
            prompt: "What is 2 + 2?".into(),
            options: vec!["3".into(), "4".into(), "5".into()],
            correct,
            explanation: "2 + 2 equals 4.".into(),
            hint: Some("Think about pairs.".into()),
        }
    }

    pub(crate) fn lesson(id: &str, category: Category, duration: f64) -> Lesson {
        Lesson::new(
            LessonId::new(id).unwrap(),
            format!("Lesson {id}"),
            category,
            duration,
            Quiz::new(vec![question(1)]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("math".parse::<Category>().unwrap(), Category::Math);
        assert!(matches!(
            "Cooking".parse::<Category>(),
            Err(LessonError::UnknownCategory(_))
        ));
    }

    #[test]
    fn quiz_rejects_out_of_range_answer() {
        let err = Quiz::new(vec![question(3)]).unwrap_err();
        assert_eq!(
            err,
            LessonError::CorrectOutOfRange {
                index: 0,
                correct: 3,
                options: 3
            }
        );
    }

    #[test]
    fn quiz_rejects_empty() {
        assert_eq!(Quiz::new(Vec::new()).unwrap_err(), LessonError::EmptyQuiz);
    }

    #[test]
    fn lesson_reports_micro_duration() {
        assert!(lesson("1", Category::Math, 5.0).is_micro());
        assert!(!lesson("2", Category::Math, 10.0).is_micro());
    }

    #[test]
    fn lesson_rejects_blank_title() {
        let quiz = Quiz::new(vec![question(0)]).unwrap();
        let err = Lesson::new(LessonId::new("1").unwrap(), "  ", Category::Math, 5.0, quiz)
            .unwrap_err();
        assert_eq!(err, LessonError::EmptyTitle);
    }
}
