use chrono::{DateTime, Utc};

use crate::model::{
    Attempt, CompletedLessonRecord, InProgressRecord, LessonId, ProgressState, Score,
};

/// Achievement awarded the first time a user completes any lesson.
pub const FIRST_QUIZ_COMPLETED: &str = "First Quiz Completed";

/// Side events produced while applying a quiz result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementEvent {
    FirstQuizCompleted,
}

impl AchievementEvent {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            AchievementEvent::FirstQuizCompleted => FIRST_QUIZ_COMPLETED,
        }
    }
}

/// Next persisted progress plus any achievements earned on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedProgress {
    pub state: ProgressState,
    pub events: Vec<AchievementEvent>,
}

/// Merge a finished quiz into the user's progress.
///
/// - The attempt is appended to the full history.
/// - A perfect score replaces any completed record and clears in-progress.
/// - Anything lower upserts the in-progress record with the score as progress.
/// - Any paused snapshot for the lesson is dropped.
///
/// The first-completion achievement fires only when the user has never
/// completed a lesson before this call: no completed record and no perfect
/// attempt in the history. Reopening a lesson with a lower score does not
/// make the next completion a "first" again.
#[must_use]
pub fn apply_quiz_result(
    current: &ProgressState,
    lesson_id: &LessonId,
    score: Score,
    at: DateTime<Utc>,
) -> ReducedProgress {
    let mut next = current.clone();
    let mut events = Vec::new();

    next.attempts.push(Attempt {
        lesson_id: lesson_id.clone(),
        score,
        at,
    });

    next.completed.retain(|r| &r.lesson_id != lesson_id);

    if score.is_perfect() {
        next.completed
            .push(CompletedLessonRecord::perfect(lesson_id.clone()));
        next.in_progress.retain(|r| &r.lesson_id != lesson_id);
        if !has_ever_completed(current) {
            events.push(AchievementEvent::FirstQuizCompleted);
        }
    } else if let Some(existing) = next
        .in_progress
        .iter_mut()
        .find(|r| &r.lesson_id == lesson_id)
    {
        existing.progress = score.value();
    } else {
        next.in_progress.push(InProgressRecord {
            lesson_id: lesson_id.clone(),
            progress: score.value(),
        });
    }

    next.saved_quizzes.remove(lesson_id);

    ReducedProgress {
        state: next,
        events,
    }
}

fn has_ever_completed(state: &ProgressState) -> bool {
    !state.completed.is_empty() || state.attempts.iter().any(|a| a.score.is_perfect())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
