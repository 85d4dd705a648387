//! Demo data: the twelve-lesson starter catalog and two sample learners.

use chrono::{DateTime, Utc};
use learn_core::model::{
    Category, FeedbackEntry, Lesson, LessonId, Preferences, Rating, UserId, UserProfile,
};
use serde::Deserialize;

use crate::documents::{LessonDoc, ProgressDoc, SlotDoc, schedule_from_docs, ser};
use crate::repository::{ProgressPatch, Storage, StorageError};

const DEMO_LESSONS: &str = include_str!("../data/demo_lessons.json");
const DEMO_USERS: &str = include_str!("../data/demo_users.json");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DemoFeedbackDoc {
    lesson_id: String,
    rating: u8,
    #[serde(default)]
    comment: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DemoUserDoc {
    id: String,
    #[serde(default)]
    name: Option<String>,
    email: String,
    #[serde(default)]
    preferences: Vec<String>,
    #[serde(default)]
    notifications_enabled: bool,
    #[serde(default)]
    achievements: Vec<String>,
    #[serde(default)]
    progress: ProgressDoc,
    #[serde(default)]
    slots: Vec<SlotDoc>,
    #[serde(default)]
    feedback: Vec<DemoFeedbackDoc>,
}

/// Counts of what a seeding run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub lessons: usize,
    pub users: usize,
    pub feedback: usize,
}

/// Parse the bundled starter catalog.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the bundled JSON is malformed.
pub fn demo_catalog() -> Result<Vec<Lesson>, StorageError> {
    let docs: Vec<LessonDoc> = serde_json::from_str(DEMO_LESSONS).map_err(ser)?;
    docs.into_iter().map(LessonDoc::into_lesson).collect()
}

/// Write the demo catalog, and optionally the sample learners, into `storage`.
///
/// Re-running is safe: every write is an upsert.
///
/// # Errors
///
/// Returns `StorageError` if the bundled data is malformed or a write fails.
pub async fn seed_demo(storage: &Storage, with_users: bool) -> Result<SeedReport, StorageError> {
    let mut report = SeedReport::default();

    for lesson in demo_catalog()? {
        storage.lessons.upsert_lesson(&lesson).await?;
        report.lessons += 1;
    }

    if !with_users {
        tracing::info!(lessons = report.lessons, "seeded demo catalog");
        return Ok(report);
    }

    let users: Vec<DemoUserDoc> = serde_json::from_str(DEMO_USERS).map_err(ser)?;
    for doc in users {
        let user_id = UserId::new(doc.id).map_err(ser)?;
        let categories = doc
            .preferences
            .iter()
            .map(|c| c.parse::<Category>().map_err(ser))
            .collect::<Result<Vec<_>, _>>()?;

        let profile = UserProfile {
            name: doc.name,
            email: Some(doc.email),
            preferences: Preferences::new(categories),
            notifications_enabled: doc.notifications_enabled,
            achievements: doc.achievements,
            ..UserProfile::default()
        };
        storage.profiles.save_profile(&user_id, &profile).await?;

        let progress = doc.progress.into_state()?;
        storage
            .progress
            .merge_progress(&user_id, ProgressPatch::replace_all(progress))
            .await?;

        let schedule = schedule_from_docs(doc.slots)?;
        storage
            .schedules
            .save_schedule(&user_id, &schedule, Utc::now())
            .await?;

        for fb in doc.feedback {
            let entry = FeedbackEntry::new(
                user_id.clone(),
                LessonId::new(fb.lesson_id).map_err(ser)?,
                Rating::new(fb.rating).map_err(ser)?,
                fb.comment,
                fb.timestamp,
            );
            storage.feedback.upsert_feedback(&entry).await?;
            report.feedback += 1;
        }
        report.users += 1;
    }

    tracing::info!(
        lessons = report.lessons,
        users = report.users,
        feedback = report.feedback,
        "seeded demo data"
    );
    Ok(report)
}
