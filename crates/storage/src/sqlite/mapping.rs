use learn_core::model::{
    Category, FeedbackEntry, Lesson, LessonId, Preferences, Rating, UserId, UserProfile,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::documents::{LessonDoc, QuizDoc, ser};
use crate::repository::StorageError;

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: DeserializeOwned>(
    field: &'static str,
    raw: &str,
) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(format!("{field}: {e}")))
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let quiz: QuizDoc = from_json("quiz", &row.try_get::<String, _>("quiz").map_err(ser)?)?;
    LessonDoc {
        id: row.try_get("id").map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        category: row.try_get("category").map_err(ser)?,
        duration: row.try_get("duration_minutes").map_err(ser)?,
        quiz,
    }
    .into_lesson()
}

pub(crate) fn preferences_to_json(preferences: &Preferences) -> Result<String, StorageError> {
    let names: Vec<&str> = preferences
        .categories()
        .iter()
        .map(|c| c.as_str())
        .collect();
    to_json(&names)
}

fn preferences_from_json(raw: &str) -> Result<Preferences, StorageError> {
    let names: Vec<String> = from_json("preferences", raw)?;
    let categories = names
        .iter()
        .map(|n| n.parse::<Category>().map_err(ser))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Preferences::new(categories))
}

pub(crate) fn map_profile_row(row: &SqliteRow) -> Result<(UserId, UserProfile), StorageError> {
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?;
    let hint_usage_i64: i64 = row.try_get("hint_usage").map_err(ser)?;
    let hint_usage = u32::try_from(hint_usage_i64).map_err(|_| {
        StorageError::Serialization(format!("invalid hint_usage: {hint_usage_i64}"))
    })?;

    let profile = UserProfile {
        name: row.try_get("name").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        bio: row.try_get("bio").map_err(ser)?,
        avatar_url: row.try_get("avatar_url").map_err(ser)?,
        date_of_birth: row.try_get("date_of_birth").map_err(ser)?,
        preferences: preferences_from_json(
            &row.try_get::<String, _>("preferences").map_err(ser)?,
        )?,
        notifications_enabled: row
            .try_get::<i64, _>("notifications_enabled")
            .map_err(ser)?
            != 0,
        achievements: from_json(
            "achievements",
            &row.try_get::<String, _>("achievements").map_err(ser)?,
        )?,
        hint_usage,
    };
    Ok((user_id, profile))
}

pub(crate) fn map_feedback_row(row: &SqliteRow) -> Result<FeedbackEntry, StorageError> {
    let rating_i64: i64 = row.try_get("rating").map_err(ser)?;
    let rating = u8::try_from(rating_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid rating: {rating_i64}")))
        .and_then(|v| Rating::new(v).map_err(ser))?;

    Ok(FeedbackEntry::new(
        UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        LessonId::new(row.try_get::<String, _>("lesson_id").map_err(ser)?).map_err(ser)?,
        rating,
        row.try_get::<String, _>("comment").map_err(ser)?,
        row.try_get("submitted_at").map_err(ser)?,
    ))
}
