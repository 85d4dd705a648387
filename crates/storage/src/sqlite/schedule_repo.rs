use chrono::{DateTime, Utc};
use learn_core::model::{Schedule, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, from_json, to_json};
use crate::documents::{schedule_from_docs, ser, slots_to_docs};
use crate::repository::{ScheduleRepository, StorageError, StoreChange};

#[async_trait::async_trait]
impl ScheduleRepository for SqliteRepository {
    async fn get_schedule(&self, user_id: &UserId) -> Result<Option<Schedule>, StorageError> {
        let row = sqlx::query("SELECT slots FROM schedules WHERE user_id = ?1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("slots").map_err(ser)?;
        schedule_from_docs(from_json("slots", &raw)?).map(Some)
    }

    async fn save_schedule(
        &self,
        user_id: &UserId,
        schedule: &Schedule,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let slots = to_json(&slots_to_docs(schedule))?;

        sqlx::query(
            r"
            INSERT INTO schedules (user_id, slots, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                slots = excluded.slots,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id.as_str())
        .bind(slots)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.changes.publish(StoreChange::Schedule(user_id.clone()));
        Ok(())
    }
}
