use learn_core::model::{ProgressState, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, from_json, to_json};
use crate::documents::{ProgressDoc, ser};
use crate::repository::{ProgressPatch, ProgressRepository, StorageError, StoreChange};

fn progress_from_row(row: &SqliteRow) -> Result<ProgressState, StorageError> {
    let text = |column: &'static str| -> Result<String, StorageError> {
        row.try_get::<String, _>(column).map_err(ser)
    };
    ProgressDoc {
        completed_lessons: from_json("completed_lessons", &text("completed_lessons")?)?,
        in_progress_lessons: from_json("in_progress_lessons", &text("in_progress_lessons")?)?,
        attempts: from_json("attempts", &text("attempts")?)?,
        saved_quizzes: from_json("saved_quizzes", &text("saved_quizzes")?)?,
    }
    .into_state()
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(&self, user_id: &UserId) -> Result<Option<ProgressState>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT completed_lessons, in_progress_lessons, attempts, saved_quizzes
            FROM progress WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(progress_from_row).transpose()
    }

    async fn merge_progress(
        &self,
        user_id: &UserId,
        patch: ProgressPatch,
    ) -> Result<ProgressState, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let row = sqlx::query(
            r"
            SELECT completed_lessons, in_progress_lessons, attempts, saved_quizzes
            FROM progress WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?;

        let base = row
            .as_ref()
            .map(progress_from_row)
            .transpose()?
            .unwrap_or_default();
        let merged = patch.apply_to(base)?;
        let doc = ProgressDoc::from_state(&merged);

        sqlx::query(
            r"
            INSERT INTO progress (user_id, completed_lessons, in_progress_lessons, attempts, saved_quizzes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                completed_lessons = excluded.completed_lessons,
                in_progress_lessons = excluded.in_progress_lessons,
                attempts = excluded.attempts,
                saved_quizzes = excluded.saved_quizzes
            ",
        )
        .bind(user_id.as_str())
        .bind(to_json(&doc.completed_lessons)?)
        .bind(to_json(&doc.in_progress_lessons)?)
        .bind(to_json(&doc.attempts)?)
        .bind(to_json(&doc.saved_quizzes)?)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        self.changes.publish(StoreChange::Progress(user_id.clone()));
        Ok(merged)
    }
}
