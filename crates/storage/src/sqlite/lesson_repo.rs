use learn_core::model::{Lesson, LessonId};

use super::SqliteRepository;
use super::mapping::{conn, map_lesson_row, to_json};
use crate::documents::QuizDoc;
use crate::repository::{LessonCatalogRepository, StorageError, StoreChange};

#[async_trait::async_trait]
impl LessonCatalogRepository for SqliteRepository {
    async fn list_lessons(&self) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, category, duration_minutes, quiz
            FROM lessons
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(map_lesson_row(&row)?);
        }
        Ok(lessons)
    }

    async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, category, duration_minutes, quiz
            FROM lessons WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let quiz = to_json(&QuizDoc::from_quiz(lesson.quiz()))?;

        sqlx::query(
            r"
            INSERT INTO lessons (id, title, category, duration_minutes, quiz)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                category = excluded.category,
                duration_minutes = excluded.duration_minutes,
                quiz = excluded.quiz
            ",
        )
        .bind(lesson.id().as_str())
        .bind(lesson.title())
        .bind(lesson.category().as_str())
        .bind(lesson.duration_minutes())
        .bind(quiz)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.changes.publish(StoreChange::Catalog);
        Ok(())
    }
}
