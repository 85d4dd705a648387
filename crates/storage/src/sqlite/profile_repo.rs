use learn_core::model::{UserId, UserProfile};

use super::SqliteRepository;
use super::mapping::{conn, map_profile_row, preferences_to_json, to_json};
use crate::repository::{ProfileRepository, StorageError, StoreChange};

const PROFILE_COLUMNS: &str = "user_id, name, email, bio, avatar_url, date_of_birth, \
     preferences, notifications_enabled, achievements, hint_usage";

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1");
        let row = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => map_profile_row(&row).map(|(_, profile)| Some(profile)),
            None => Ok(None),
        }
    }

    async fn save_profile(
        &self,
        user_id: &UserId,
        profile: &UserProfile,
    ) -> Result<(), StorageError> {
        let preferences = preferences_to_json(&profile.preferences)?;
        let achievements = to_json(&profile.achievements)?;

        sqlx::query(
            r"
            INSERT INTO profiles (user_id, name, email, bio, avatar_url, date_of_birth,
                                  preferences, notifications_enabled, achievements, hint_usage)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                bio = excluded.bio,
                avatar_url = excluded.avatar_url,
                date_of_birth = excluded.date_of_birth,
                preferences = excluded.preferences,
                notifications_enabled = excluded.notifications_enabled,
                achievements = excluded.achievements,
                hint_usage = excluded.hint_usage
            ",
        )
        .bind(user_id.as_str())
        .bind(profile.name.as_deref())
        .bind(profile.email.as_deref())
        .bind(profile.bio.as_deref())
        .bind(profile.avatar_url.as_deref())
        .bind(profile.date_of_birth)
        .bind(preferences)
        .bind(i64::from(profile.notifications_enabled))
        .bind(achievements)
        .bind(i64::from(profile.hint_usage))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.changes.publish(StoreChange::Profile(user_id.clone()));
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<(UserId, UserProfile)>, StorageError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY user_id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut profiles = Vec::with_capacity(rows.len());
        for row in rows {
            profiles.push(map_profile_row(&row)?);
        }
        Ok(profiles)
    }
}
