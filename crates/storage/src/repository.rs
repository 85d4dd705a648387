use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{
    Attempt, CompletedLessonRecord, FeedbackEntry, InProgressRecord, Lesson, LessonId,
    ProgressState, SavedQuizState, Schedule, UserId, UserProfile,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CHANGE FEED ───────────────────────────────────────────────────────────────
//

/// A committed write, announced to subscribers after it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Catalog,
    Profile(UserId),
    Progress(UserId),
    Schedule(UserId),
    Feedback(LessonId),
}

const CHANGE_FEED_CAPACITY: usize = 256;

/// In-process fan-out of [`StoreChange`]s.
///
/// Publishing with no subscribers is not an error; the change is dropped.
/// Slow subscribers observe `RecvError::Lagged` and should reload everything.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<StoreChange>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, change: StoreChange) {
        // zero receivers is the only failure
        let _ = self.sender.send(change);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(CHANGE_FEED_CAPACITY)
    }
}

//
// ─── PROGRESS PATCH ────────────────────────────────────────────────────────────
//

/// Partial update of a progress document. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressPatch {
    pub completed: Option<Vec<CompletedLessonRecord>>,
    pub in_progress: Option<Vec<InProgressRecord>>,
    pub attempts: Option<Vec<Attempt>>,
    pub saved_quizzes: Option<BTreeMap<LessonId, SavedQuizState>>,
}

impl ProgressPatch {
    /// Patch that overwrites all four collections.
    #[must_use]
    pub fn replace_all(state: ProgressState) -> Self {
        Self {
            completed: Some(state.completed),
            in_progress: Some(state.in_progress),
            attempts: Some(state.attempts),
            saved_quizzes: Some(state.saved_quizzes),
        }
    }

    #[must_use]
    pub fn saved_quizzes(saved: BTreeMap<LessonId, SavedQuizState>) -> Self {
        Self {
            saved_quizzes: Some(saved),
            ..Self::default()
        }
    }

    /// Merge into `base`, re-checking the completion invariant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the result would record a lesson as
    /// both completed and in progress, or `StorageError::Serialization` for
    /// out-of-range values.
    pub fn apply_to(self, base: ProgressState) -> Result<ProgressState, StorageError> {
        let ProgressState {
            completed,
            in_progress,
            attempts,
            saved_quizzes,
        } = base;
        ProgressState::from_persisted(
            self.completed.unwrap_or(completed),
            self.in_progress.unwrap_or(in_progress),
            self.attempts.unwrap_or(attempts),
            self.saved_quizzes.unwrap_or(saved_quizzes),
        )
        .map_err(|e| match e {
            learn_core::model::ProgressError::CompletedAndInProgress(_) => StorageError::Conflict,
            other => StorageError::Serialization(other.to_string()),
        })
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Read access to the lesson catalog, plus writes for seeding and authoring.
#[async_trait]
pub trait LessonCatalogRepository: Send + Sync {
    /// All lessons, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read or a lesson is malformed.
    async fn list_lessons(&self) -> Result<Vec<Lesson>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Persist or replace a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError>;

    /// Persist or replace a profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn save_profile(&self, user_id: &UserId, profile: &UserProfile)
    -> Result<(), StorageError>;

    /// Every stored profile, ordered by user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn list_profiles(&self) -> Result<Vec<(UserId, UserProfile)>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn get_progress(&self, user_id: &UserId) -> Result<Option<ProgressState>, StorageError>;

    /// Apply a partial patch, creating the document if missing. Returns the merged state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the merge breaks the completion
    /// invariant, or other storage errors.
    async fn merge_progress(
        &self,
        user_id: &UserId,
        patch: ProgressPatch,
    ) -> Result<ProgressState, StorageError>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn get_schedule(&self, user_id: &UserId) -> Result<Option<Schedule>, StorageError>;

    /// Persist the whole slot list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the schedule cannot be stored.
    async fn save_schedule(
        &self,
        user_id: &UserId,
        schedule: &Schedule,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Insert or replace the entry for its (user, lesson) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<(), StorageError>;

    /// A user's feedback, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn list_feedback_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FeedbackEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn list_feedback_for_lesson(
        &self,
        lesson_id: &LessonId,
    ) -> Result<Vec<FeedbackEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn list_feedback(&self) -> Result<Vec<FeedbackEntry>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn newest_first(entries: &mut [FeedbackEntry]) {
    entries.sort_by(|a, b| {
        b.submitted_at
            .cmp(&a.submitted_at)
            .then_with(|| a.lesson_id.cmp(&b.lesson_id))
    });
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    lessons: Arc<Mutex<BTreeMap<LessonId, Lesson>>>,
    profiles: Arc<Mutex<BTreeMap<UserId, UserProfile>>>,
    progress: Arc<Mutex<HashMap<UserId, ProgressState>>>,
    schedules: Arc<Mutex<HashMap<UserId, Schedule>>>,
    feedback: Arc<Mutex<HashMap<(UserId, LessonId), FeedbackEntry>>>,
    changes: ChangeFeed,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }
}

#[async_trait]
impl LessonCatalogRepository for InMemoryRepository {
    async fn list_lessons(&self) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lessons.lock().map_err(lock_err)?;
        Ok(guard.values().cloned().collect())
    }

    async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>, StorageError> {
        let guard = self.lessons.lock().map_err(lock_err)?;
        Ok(guard.get(id).cloned())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        {
            let mut guard = self.lessons.lock().map_err(lock_err)?;
            guard.insert(lesson.id().clone(), lesson.clone());
        }
        self.changes.publish(StoreChange::Catalog);
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let guard = self.profiles.lock().map_err(lock_err)?;
        Ok(guard.get(user_id).cloned())
    }

    async fn save_profile(
        &self,
        user_id: &UserId,
        profile: &UserProfile,
    ) -> Result<(), StorageError> {
        {
            let mut guard = self.profiles.lock().map_err(lock_err)?;
            guard.insert(user_id.clone(), profile.clone());
        }
        self.changes.publish(StoreChange::Profile(user_id.clone()));
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<(UserId, UserProfile)>, StorageError> {
        let guard = self.profiles.lock().map_err(lock_err)?;
        Ok(guard
            .iter()
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(&self, user_id: &UserId) -> Result<Option<ProgressState>, StorageError> {
        let guard = self.progress.lock().map_err(lock_err)?;
        Ok(guard.get(user_id).cloned())
    }

    async fn merge_progress(
        &self,
        user_id: &UserId,
        patch: ProgressPatch,
    ) -> Result<ProgressState, StorageError> {
        let merged = {
            let mut guard = self.progress.lock().map_err(lock_err)?;
            let base = guard.get(user_id).cloned().unwrap_or_default();
            let merged = patch.apply_to(base)?;
            guard.insert(user_id.clone(), merged.clone());
            merged
        };
        self.changes.publish(StoreChange::Progress(user_id.clone()));
        Ok(merged)
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryRepository {
    async fn get_schedule(&self, user_id: &UserId) -> Result<Option<Schedule>, StorageError> {
        let guard = self.schedules.lock().map_err(lock_err)?;
        Ok(guard.get(user_id).cloned())
    }

    async fn save_schedule(
        &self,
        user_id: &UserId,
        schedule: &Schedule,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        {
            let mut guard = self.schedules.lock().map_err(lock_err)?;
            guard.insert(user_id.clone(), schedule.clone());
        }
        self.changes.publish(StoreChange::Schedule(user_id.clone()));
        Ok(())
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryRepository {
    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<(), StorageError> {
        {
            let mut guard = self.feedback.lock().map_err(lock_err)?;
            guard.insert(
                (entry.user_id.clone(), entry.lesson_id.clone()),
                entry.clone(),
            );
        }
        self.changes
            .publish(StoreChange::Feedback(entry.lesson_id.clone()));
        Ok(())
    }

    async fn list_feedback_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FeedbackEntry>, StorageError> {
        let guard = self.feedback.lock().map_err(lock_err)?;
        let mut out: Vec<FeedbackEntry> = guard
            .values()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut out);
        Ok(out)
    }

    async fn list_feedback_for_lesson(
        &self,
        lesson_id: &LessonId,
    ) -> Result<Vec<FeedbackEntry>, StorageError> {
        let guard = self.feedback.lock().map_err(lock_err)?;
        let mut out: Vec<FeedbackEntry> = guard
            .values()
            .filter(|e| &e.lesson_id == lesson_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(out)
    }

    async fn list_feedback(&self) -> Result<Vec<FeedbackEntry>, StorageError> {
        let guard = self.feedback.lock().map_err(lock_err)?;
        let mut out: Vec<FeedbackEntry> = guard.values().cloned().collect();
        out.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.lesson_id.cmp(&b.lesson_id))
        });
        Ok(out)
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the store repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonCatalogRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub changes: ChangeFeed,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let changes = repo.changes().clone();
        let lessons: Arc<dyn LessonCatalogRepository> = Arc::new(repo.clone());
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let schedules: Arc<dyn ScheduleRepository> = Arc::new(repo.clone());
        let feedback: Arc<dyn FeedbackRepository> = Arc::new(repo);
        Self {
            lessons,
            profiles,
            progress,
            schedules,
            feedback,
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{Rating, Score, SlotDraft};
    use learn_core::time::fixed_now;

    fn uid(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn lid(id: &str) -> LessonId {
        LessonId::new(id).unwrap()
    }

    #[tokio::test]
    async fn merge_creates_missing_document_and_keeps_untouched_fields() {
        let repo = InMemoryRepository::new();
        let user = uid("u1");
        assert!(repo.get_progress(&user).await.unwrap().is_none());

        let state = ProgressState {
            attempts: vec![Attempt {
                lesson_id: lid("1"),
                score: Score::new(60).unwrap(),
                at: fixed_now(),
            }],
            in_progress: vec![InProgressRecord {
                lesson_id: lid("1"),
                progress: 60,
            }],
            ..ProgressState::default()
        };
        repo.merge_progress(&user, ProgressPatch::replace_all(state))
            .await
            .unwrap();

        let mut saved = BTreeMap::new();
        saved.insert(lid("2"), SavedQuizState::default());
        let merged = repo
            .merge_progress(&user, ProgressPatch::saved_quizzes(saved))
            .await
            .unwrap();
        assert_eq!(merged.attempts.len(), 1);
        assert_eq!(merged.in_progress.len(), 1);
        assert!(merged.saved_quizzes.contains_key(&lid("2")));
    }

    #[tokio::test]
    async fn merge_rejects_double_state() {
        let repo = InMemoryRepository::new();
        let patch = ProgressPatch {
            completed: Some(vec![CompletedLessonRecord::perfect(lid("1"))]),
            in_progress: Some(vec![InProgressRecord {
                lesson_id: lid("1"),
                progress: 20,
            }]),
            ..ProgressPatch::default()
        };
        let err = repo.merge_progress(&uid("u1"), patch).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn feedback_resubmission_replaces_and_lists_newest_first() {
        let repo = InMemoryRepository::new();
        let user = uid("u1");
        let first = FeedbackEntry::new(
            user.clone(),
            lid("1"),
            Rating::new(2).unwrap(),
            "meh",
            fixed_now(),
        );
        let other = FeedbackEntry::new(
            user.clone(),
            lid("2"),
            Rating::new(5).unwrap(),
            "great",
            fixed_now() + chrono::Duration::minutes(1),
        );
        let again = FeedbackEntry::new(
            user.clone(),
            lid("1"),
            Rating::new(4).unwrap(),
            "better on review",
            fixed_now() + chrono::Duration::minutes(2),
        );
        for entry in [&first, &other, &again] {
            repo.upsert_feedback(entry).await.unwrap();
        }

        let listed = repo.list_feedback_for_user(&user).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].lesson_id, lid("1"));
        assert_eq!(listed[0].rating.value(), 4);
        assert_eq!(repo.list_feedback_for_lesson(&lid("2")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn feedback_pairs_with_underscores_stay_distinct() {
        let repo = InMemoryRepository::new();
        let left = FeedbackEntry::new(
            uid("ann_1"),
            lid("2"),
            Rating::new(2).unwrap(),
            "",
            fixed_now(),
        );
        let right = FeedbackEntry::new(
            uid("ann"),
            lid("1_2"),
            Rating::new(5).unwrap(),
            "",
            fixed_now(),
        );
        assert_eq!(left.id(), right.id());
        repo.upsert_feedback(&left).await.unwrap();
        repo.upsert_feedback(&right).await.unwrap();

        assert_eq!(repo.list_feedback().await.unwrap().len(), 2);
        let ann = repo.list_feedback_for_user(&uid("ann")).await.unwrap();
        assert_eq!(ann.len(), 1);
        assert_eq!(ann[0].rating.value(), 5);
    }

    #[tokio::test]
    async fn schedule_writes_publish_a_change() {
        let storage = Storage::in_memory();
        let mut rx = storage.changes.subscribe();
        let user = uid("u1");
        let slot = SlotDraft::starting_at("Friday", "15:00")
            .unwrap()
            .validate()
            .unwrap();

        storage
            .schedules
            .save_schedule(&user, &Schedule::new(vec![slot]), fixed_now())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), StoreChange::Schedule(user.clone()));
        let stored = storage.schedules.get_schedule(&user).await.unwrap().unwrap();
        assert_eq!(stored.slots().len(), 1);
    }
}
