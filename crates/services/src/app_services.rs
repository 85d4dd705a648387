use std::sync::Arc;

use storage::repository::{ChangeFeed, LessonCatalogRepository, Storage};
use storage::seed::demo_catalog;

use crate::Clock;
use crate::error::AppServicesError;
use crate::feed_service::FeedService;
use crate::feedback_service::FeedbackService;
use crate::leaderboard_service::LeaderboardService;
use crate::profile_service::ProfileService;
use crate::progress_service::ProgressService;
use crate::schedule_service::ScheduleService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    catalog_seeded: bool,
    changes: ChangeFeed,
    feed: Arc<FeedService>,
    progress: Arc<ProgressService>,
    schedule: Arc<ScheduleService>,
    feedback: Arc<FeedbackService>,
    profiles: Arc<ProfileService>,
    leaderboard: Arc<LeaderboardService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// An empty catalog is filled with the starter lessons.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or catalog setup fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock).await
    }

    /// Build services over an already-open storage aggregate.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if catalog setup fails.
    pub async fn from_storage(storage: Storage, clock: Clock) -> Result<Self, AppServicesError> {
        let catalog_seeded = ensure_catalog(storage.lessons.as_ref()).await?;

        let feed = Arc::new(FeedService::new(
            clock,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.schedules),
            Arc::clone(&storage.feedback),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.profiles),
        ));
        let schedule = Arc::new(ScheduleService::new(clock, Arc::clone(&storage.schedules)));
        let feedback = Arc::new(FeedbackService::new(clock, Arc::clone(&storage.feedback)));
        let profiles = Arc::new(ProfileService::new(Arc::clone(&storage.profiles)));
        let leaderboard = Arc::new(LeaderboardService::new(
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.progress),
        ));

        Ok(Self {
            catalog_seeded,
            changes: storage.changes,
            feed,
            progress,
            schedule,
            feedback,
            profiles,
            leaderboard,
        })
    }

    /// Whether startup had to write the starter catalog.
    #[must_use]
    pub fn catalog_seeded(&self) -> bool {
        self.catalog_seeded
    }

    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    #[must_use]
    pub fn feed(&self) -> Arc<FeedService> {
        Arc::clone(&self.feed)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn schedule(&self) -> Arc<ScheduleService> {
        Arc::clone(&self.schedule)
    }

    #[must_use]
    pub fn feedback(&self) -> Arc<FeedbackService> {
        Arc::clone(&self.feedback)
    }

    #[must_use]
    pub fn profiles(&self) -> Arc<ProfileService> {
        Arc::clone(&self.profiles)
    }

    #[must_use]
    pub fn leaderboard(&self) -> Arc<LeaderboardService> {
        Arc::clone(&self.leaderboard)
    }
}

async fn ensure_catalog(lessons: &dyn LessonCatalogRepository) -> Result<bool, AppServicesError> {
    if !lessons.list_lessons().await?.is_empty() {
        return Ok(false);
    }

    let catalog = demo_catalog()?;
    for lesson in &catalog {
        lessons.upsert_lesson(lesson).await?;
    }
    tracing::info!(lessons = catalog.len(), "catalog was empty; wrote starter lessons");
    Ok(true)
}
