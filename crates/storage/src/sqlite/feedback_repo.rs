use learn_core::model::{FeedbackEntry, LessonId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_feedback_row};
use crate::repository::{FeedbackRepository, StorageError, StoreChange};

fn collect(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<FeedbackEntry>, StorageError> {
    rows.iter().map(map_feedback_row).collect()
}

#[async_trait::async_trait]
impl FeedbackRepository for SqliteRepository {
    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO feedback (user_id, lesson_id, rating, comment, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                rating = excluded.rating,
                comment = excluded.comment,
                submitted_at = excluded.submitted_at
            ",
        )
        .bind(entry.user_id.as_str())
        .bind(entry.lesson_id.as_str())
        .bind(i64::from(entry.rating.value()))
        .bind(entry.comment.as_str())
        .bind(entry.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.changes
            .publish(StoreChange::Feedback(entry.lesson_id.clone()));
        Ok(())
    }

    async fn list_feedback_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FeedbackEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, lesson_id, rating, comment, submitted_at
            FROM feedback
            WHERE user_id = ?1
            ORDER BY submitted_at DESC, lesson_id ASC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        collect(&rows)
    }

    async fn list_feedback_for_lesson(
        &self,
        lesson_id: &LessonId,
    ) -> Result<Vec<FeedbackEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, lesson_id, rating, comment, submitted_at
            FROM feedback
            WHERE lesson_id = ?1
            ORDER BY user_id ASC
            ",
        )
        .bind(lesson_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        collect(&rows)
    }

    async fn list_feedback(&self) -> Result<Vec<FeedbackEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, lesson_id, rating, comment, submitted_at
            FROM feedback
            ORDER BY user_id ASC, lesson_id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        collect(&rows)
    }
}
