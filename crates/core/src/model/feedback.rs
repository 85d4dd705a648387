use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{FeedbackId, LessonId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
}

/// Star rating, 1 to 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rating(u8);

impl Rating {
    /// # Errors
    ///
    /// Returns `FeedbackError::InvalidRating` outside `1..=5`.
    pub fn new(value: u8) -> Result<Self, FeedbackError> {
        if !(1..=5).contains(&value) {
            return Err(FeedbackError::InvalidRating(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

/// A user's rating and comment on a lesson. At most one per (user, lesson).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub rating: Rating,
    pub comment: String,
    pub submitted_at: DateTime<Utc>,
}

impl FeedbackEntry {
    #[must_use]
    pub fn new(
        user_id: UserId,
        lesson_id: LessonId,
        rating: Rating,
        comment: impl Into<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            lesson_id,
            rating,
            comment: comment.into().trim().to_owned(),
            submitted_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> FeedbackId {
        FeedbackId::for_pair(&self.user_id, &self.lesson_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn rating_bounds() {
        assert_eq!(Rating::new(0).unwrap_err(), FeedbackError::InvalidRating(0));
        assert_eq!(Rating::new(6).unwrap_err(), FeedbackError::InvalidRating(6));
        assert_eq!(Rating::new(1).unwrap().value(), 1);
        assert_eq!(Rating::new(5).unwrap().value(), 5);
    }

    #[test]
    fn entry_id_is_user_then_lesson() {
        let entry = FeedbackEntry::new(
            UserId::new("u1").unwrap(),
            LessonId::new("9").unwrap(),
            Rating::new(4).unwrap(),
            "  great intro  ",
            fixed_now(),
        );
        assert_eq!(entry.id().as_str(), "u1_9");
        assert_eq!(entry.comment, "great intro");
    }
}
