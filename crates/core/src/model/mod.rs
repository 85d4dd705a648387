mod feedback;
mod ids;
mod lesson;
mod profile;
mod progress;
mod schedule;

pub use ids::{FeedbackId, LessonId, ParseIdError, UserId};

pub use feedback::{FeedbackEntry, FeedbackError, Rating};
pub use lesson::{Category, Lesson, LessonError, MICRO_LESSON_MINUTES, Quiz, QuizQuestion};
pub use profile::{Preferences, ProfileDraft, ProfileEdit, ProfileError, UserProfile};
pub use progress::{
    Attempt, CompletedLessonRecord, InProgressRecord, ProgressError, ProgressState,
    SavedQuizState, Score,
};
pub use schedule::{MinuteOfDay, Schedule, ScheduleError, ScheduleSlot, SlotDraft, weekday_name};

#[cfg(test)]
pub(crate) use lesson::tests as lesson_fixtures;
