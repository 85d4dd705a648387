use std::sync::Arc;

use learn_core::Clock;
use learn_core::model::{FeedbackEntry, LessonId, Rating, UserId};
use learn_core::personalization::average_ratings;
use storage::repository::FeedbackRepository;

use crate::error::FeedbackServiceError;

#[derive(Clone)]
pub struct FeedbackService {
    clock: Clock,
    feedback: Arc<dyn FeedbackRepository>,
}

impl FeedbackService {
    #[must_use]
    pub fn new(clock: Clock, feedback: Arc<dyn FeedbackRepository>) -> Self {
        Self { clock, feedback }
    }

    /// Rate a lesson. A second submission for the same lesson replaces the first.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackServiceError::Feedback` if the rating is outside 1-5, or
    /// `FeedbackServiceError::Storage` if persistence fails.
    pub async fn submit(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
        rating: u8,
        comment: &str,
    ) -> Result<FeedbackEntry, FeedbackServiceError> {
        let rating = Rating::new(rating)?;
        let entry = FeedbackEntry::new(
            user_id.clone(),
            lesson_id.clone(),
            rating,
            comment,
            self.clock.now(),
        );
        self.feedback.upsert_feedback(&entry).await?;
        tracing::info!(user = %user_id, lesson = %lesson_id, rating = rating.value(), "feedback saved");
        Ok(entry)
    }

    /// The user's own feedback, newest first.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackServiceError::Storage` if the read fails.
    pub async fn for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FeedbackEntry>, FeedbackServiceError> {
        Ok(self.feedback.list_feedback_for_user(user_id).await?)
    }

    /// Mean rating for a lesson, `None` when nobody rated it.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackServiceError::Storage` if the read fails.
    pub async fn average_rating(
        &self,
        lesson_id: &LessonId,
    ) -> Result<Option<f64>, FeedbackServiceError> {
        let entries = self.feedback.list_feedback_for_lesson(lesson_id).await?;
        Ok(average_ratings(&entries).get(lesson_id).copied())
    }
}
