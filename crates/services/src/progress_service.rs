use std::sync::Arc;

use learn_core::Clock;
use learn_core::model::{Attempt, LessonId, ProgressState, Score, UserId};
use learn_core::quiz::{QuizResult, QuizRun};
use learn_core::reducer::{AchievementEvent, apply_quiz_result};
use storage::repository::{
    LessonCatalogRepository, ProfileRepository, ProgressPatch, ProgressRepository,
};

use crate::error::ProgressServiceError;

/// What happened when a quiz result was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub score: Score,
    pub progress: ProgressState,
    /// Achievements newly added to the profile by this result.
    pub achievements: Vec<AchievementEvent>,
}

/// Runs quizzes and folds their results into the user's progress.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    lessons: Arc<dyn LessonCatalogRepository>,
    progress: Arc<dyn ProgressRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        lessons: Arc<dyn LessonCatalogRepository>,
        progress: Arc<dyn ProgressRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            clock,
            lessons,
            progress,
            profiles,
        }
    }

    /// Current progress, or an empty state if the user has none yet.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read fails.
    pub async fn progress(&self, user_id: &UserId) -> Result<ProgressState, ProgressServiceError> {
        Ok(self.progress.get_progress(user_id).await?.unwrap_or_default())
    }

    /// Start a quiz, resuming the saved snapshot when there is one.
    ///
    /// Every earlier attempt on the lesson makes this a retry, which carries
    /// the score penalty. A snapshot that no longer fits the lesson is ignored.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownLesson` if the lesson is missing,
    /// or `ProgressServiceError::Storage` on read failures.
    pub async fn start_quiz(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<QuizRun, ProgressServiceError> {
        let lesson = self
            .lessons
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| ProgressServiceError::UnknownLesson(lesson_id.clone()))?;
        let state = self.progress(user_id).await?;
        let previous = state.attempt_history(lesson_id).len();
        let retry_count = u32::try_from(previous).unwrap_or(u32::MAX);

        if let Some(saved) = state.saved_quizzes.get(lesson_id) {
            match QuizRun::resume(&lesson, saved, retry_count) {
                Ok(run) => {
                    tracing::debug!(user = %user_id, lesson = %lesson_id, "resumed saved quiz");
                    return Ok(run);
                }
                Err(err) => {
                    tracing::warn!(lesson = %lesson_id, error = %err, "ignoring stale quiz snapshot");
                }
            }
        }
        Ok(QuizRun::start(&lesson, retry_count))
    }

    /// Persist a paused quiz so it can be resumed later.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the merge fails.
    pub async fn save_quiz(
        &self,
        user_id: &UserId,
        run: &QuizRun,
    ) -> Result<(), ProgressServiceError> {
        let mut saved = self.progress(user_id).await?.saved_quizzes;
        saved.insert(run.lesson_id().clone(), run.snapshot());
        self.progress
            .merge_progress(user_id, ProgressPatch::saved_quizzes(saved))
            .await?;
        Ok(())
    }

    /// Drop any saved snapshot for the lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the merge fails.
    pub async fn discard_saved_quiz(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<(), ProgressServiceError> {
        let mut saved = self.progress(user_id).await?.saved_quizzes;
        if saved.remove(lesson_id).is_some() {
            self.progress
                .merge_progress(user_id, ProgressPatch::saved_quizzes(saved))
                .await?;
        }
        Ok(())
    }

    /// Count one revealed hint against the user's profile. Returns the new total.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the profile cannot be updated.
    pub async fn record_hint(&self, user_id: &UserId) -> Result<u32, ProgressServiceError> {
        let mut profile = self
            .profiles
            .get_profile(user_id)
            .await?
            .unwrap_or_default();
        profile.hint_usage = profile.hint_usage.saturating_add(1);
        self.profiles.save_profile(user_id, &profile).await?;
        Ok(profile.hint_usage)
    }

    /// Reveal the current question's hint in `run`.
    ///
    /// Hint usage is counted once per question per run; revealing the same
    /// hint again returns it without touching the profile.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the profile cannot be updated.
    pub async fn reveal_hint(
        &self,
        user_id: &UserId,
        run: &mut QuizRun,
    ) -> Result<Option<String>, ProgressServiceError> {
        let Some((hint, first)) = run.reveal_hint() else {
            return Ok(None);
        };
        if first {
            let total = self.record_hint(user_id).await?;
            tracing::debug!(user = %user_id, lesson = %run.lesson_id(), total, "hint revealed");
        }
        Ok(Some(hint))
    }

    /// Score a finished quiz and write the reduced progress back.
    ///
    /// Manual submission and countdown expiry both come through here. Any
    /// achievement the reducer emits is added to the profile unless already present.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Quiz` if the result cannot be scored, or
    /// `ProgressServiceError::Storage` on read/write failures.
    pub async fn submit(
        &self,
        user_id: &UserId,
        result: &QuizResult,
    ) -> Result<QuizOutcome, ProgressServiceError> {
        let score = result.score()?;
        let current = self.progress(user_id).await?;
        let reduced = apply_quiz_result(&current, &result.lesson_id, score, self.clock.now());

        let progress = self
            .progress
            .merge_progress(user_id, ProgressPatch::replace_all(reduced.state))
            .await?;

        let mut achievements = Vec::new();
        if !reduced.events.is_empty() {
            let mut profile = self
                .profiles
                .get_profile(user_id)
                .await?
                .unwrap_or_default();
            for event in reduced.events {
                if profile.award(event.title()) {
                    achievements.push(event);
                }
            }
            if !achievements.is_empty() {
                self.profiles.save_profile(user_id, &profile).await?;
            }
        }

        tracing::info!(
            user = %user_id,
            lesson = %result.lesson_id,
            score = score.value(),
            retry = result.retry_count,
            timed_out = result.timed_out,
            "quiz result recorded"
        );

        Ok(QuizOutcome {
            score,
            progress,
            achievements,
        })
    }

    /// Finish `run` (expired or not) and record it.
    ///
    /// # Errors
    ///
    /// See [`ProgressService::submit`].
    pub async fn finish(
        &self,
        user_id: &UserId,
        run: QuizRun,
    ) -> Result<QuizOutcome, ProgressServiceError> {
        let result = run.finish();
        self.submit(user_id, &result).await
    }

    /// Progress percentage to show for one lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read fails.
    pub async fn lesson_progress(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<u8, ProgressServiceError> {
        Ok(self.progress(user_id).await?.lesson_progress(lesson_id))
    }

    /// Attempts on one lesson, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read fails.
    pub async fn attempt_history(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<Vec<Attempt>, ProgressServiceError> {
        Ok(self.progress(user_id).await?.attempt_history(lesson_id))
    }
}
