use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use learn_core::Clock;
use learn_core::model::{FeedbackEntry, Lesson, Preferences, Schedule, UserId};
use learn_core::personalization::{RefreshTrigger, SelectionInput, select_lessons};
use storage::repository::{
    ChangeFeed, FeedbackRepository, LessonCatalogRepository, ProfileRepository,
    ScheduleRepository, StoreChange,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::context::SessionContext;
use crate::error::FeedServiceError;

/// Everything the personalization engine reads, loaded once and refreshed piecemeal.
#[derive(Debug, Clone, Default)]
pub struct FeedInputs {
    pub catalog: Vec<Lesson>,
    pub preferences: Preferences,
    pub schedule: Schedule,
    pub feedback: Vec<FeedbackEntry>,
}

impl FeedInputs {
    #[must_use]
    pub fn select(&self, ctx: &SessionContext, clock: &Clock) -> Vec<Lesson> {
        select_lessons(&SelectionInput {
            catalog: &self.catalog,
            preferences: &self.preferences,
            schedule: &self.schedule,
            show_all: ctx.show_all(),
            now: ctx.moment(clock),
            feedback: &self.feedback,
        })
    }
}

/// A freshly computed lesson list and what caused it.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    pub lessons: Vec<Lesson>,
    pub trigger: Option<RefreshTrigger>,
    pub computed_at: DateTime<Utc>,
}

/// Builds the personalized lesson list for a session.
#[derive(Clone)]
pub struct FeedService {
    clock: Clock,
    lessons: Arc<dyn LessonCatalogRepository>,
    profiles: Arc<dyn ProfileRepository>,
    schedules: Arc<dyn ScheduleRepository>,
    feedback: Arc<dyn FeedbackRepository>,
}

impl FeedService {
    #[must_use]
    pub fn new(
        clock: Clock,
        lessons: Arc<dyn LessonCatalogRepository>,
        profiles: Arc<dyn ProfileRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        feedback: Arc<dyn FeedbackRepository>,
    ) -> Self {
        Self {
            clock,
            lessons,
            profiles,
            schedules,
            feedback,
        }
    }

    /// Load all inputs for `user_id`. Missing profile or schedule documents
    /// count as empty.
    ///
    /// # Errors
    ///
    /// Returns `FeedServiceError::Storage` if any store read fails.
    pub async fn load_inputs(&self, user_id: &UserId) -> Result<FeedInputs, FeedServiceError> {
        let catalog = self.lessons.list_lessons().await?;
        let preferences = self.load_preferences(user_id).await?;
        let schedule = self.schedules.get_schedule(user_id).await?.unwrap_or_default();
        let feedback = self.feedback.list_feedback().await?;
        Ok(FeedInputs {
            catalog,
            preferences,
            schedule,
            feedback,
        })
    }

    /// Re-read the part of `inputs` that `trigger` says has changed.
    ///
    /// A `Tick` re-reads everything, so writes made through another storage
    /// handle or process show up within one tick even though they never reach
    /// this process's change feed.
    ///
    /// # Errors
    ///
    /// Returns `FeedServiceError::Storage` if the store read fails; `inputs` is
    /// left untouched in that case.
    pub async fn refresh(
        &self,
        inputs: &mut FeedInputs,
        user_id: &UserId,
        trigger: RefreshTrigger,
    ) -> Result<(), FeedServiceError> {
        match trigger {
            RefreshTrigger::CatalogChanged => {
                inputs.catalog = self.lessons.list_lessons().await?;
            }
            RefreshTrigger::ScheduleChanged => {
                inputs.schedule = self.schedules.get_schedule(user_id).await?.unwrap_or_default();
            }
            RefreshTrigger::PreferencesChanged => {
                inputs.preferences = self.load_preferences(user_id).await?;
            }
            RefreshTrigger::FeedbackChanged => {
                inputs.feedback = self.feedback.list_feedback().await?;
            }
            RefreshTrigger::Tick => {
                *inputs = self.load_inputs(user_id).await?;
            }
        }
        Ok(())
    }

    /// One-shot personalized list for the session's user.
    ///
    /// An empty list is a valid answer; a store failure is an error.
    ///
    /// # Errors
    ///
    /// Returns `FeedServiceError::Storage` if any store read fails.
    pub async fn personalized_lessons(
        &self,
        ctx: &SessionContext,
    ) -> Result<Vec<Lesson>, FeedServiceError> {
        let inputs = self.load_inputs(ctx.user_id()).await?;
        let lessons = inputs.select(ctx, &self.clock);
        tracing::debug!(
            user = %ctx.user_id(),
            eligible = lessons.len(),
            catalog = inputs.catalog.len(),
            "computed lesson feed"
        );
        Ok(lessons)
    }

    /// Keep a lesson list current for `ctx`.
    ///
    /// The initial list is computed before this returns. After that the list
    /// is recomputed on every relevant store change and every `tick`, and
    /// published on the returned watcher's channel.
    ///
    /// # Errors
    ///
    /// Returns `FeedServiceError::Storage` if the initial load fails.
    pub async fn watch(
        &self,
        ctx: SessionContext,
        changes: &ChangeFeed,
        tick: Duration,
    ) -> Result<FeedWatcher, FeedServiceError> {
        // subscribe before loading so no change between the two is lost
        let rx = changes.subscribe();
        let inputs = self.load_inputs(ctx.user_id()).await?;
        let initial = FeedUpdate {
            lessons: inputs.select(&ctx, &self.clock),
            trigger: None,
            computed_at: self.clock.now(),
        };
        let (tx, updates) = watch::channel(initial);

        let service = self.clone();
        let handle = tokio::spawn(async move {
            service.run_watch(ctx, inputs, rx, tx, tick).await;
        });

        Ok(FeedWatcher { updates, handle })
    }

    async fn run_watch(
        self,
        ctx: SessionContext,
        mut inputs: FeedInputs,
        mut rx: broadcast::Receiver<StoreChange>,
        tx: watch::Sender<FeedUpdate>,
        tick: Duration,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                change = rx.recv() => match change {
                    Ok(change) => match trigger_for(&change, ctx.user_id()) {
                        Some(trigger) => trigger,
                        None => continue,
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "feed watcher lagged; reloading all inputs");
                        match self.load_inputs(ctx.user_id()).await {
                            Ok(fresh) => inputs = fresh,
                            Err(err) => tracing::warn!(error = %err, "feed reload failed"),
                        }
                        RefreshTrigger::Tick
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => RefreshTrigger::Tick,
                () = tx.closed() => break,
            };

            if let Err(err) = self.refresh(&mut inputs, ctx.user_id(), trigger).await {
                tracing::warn!(?trigger, error = %err, "feed refresh failed; keeping last list");
                continue;
            }

            let update = FeedUpdate {
                lessons: inputs.select(&ctx, &self.clock),
                trigger: Some(trigger),
                computed_at: self.clock.now(),
            };
            tracing::debug!(?trigger, eligible = update.lessons.len(), "feed recomputed");
            if tx.send(update).is_err() {
                break;
            }
        }
        tracing::debug!(user = %ctx.user_id(), "feed watcher stopped");
    }

    async fn load_preferences(&self, user_id: &UserId) -> Result<Preferences, FeedServiceError> {
        Ok(self
            .profiles
            .get_profile(user_id)
            .await?
            .map(|p| p.preferences)
            .unwrap_or_default())
    }
}

/// Map a store change to the refresh it requires for `user_id`, if any.
#[must_use]
pub fn trigger_for(change: &StoreChange, user_id: &UserId) -> Option<RefreshTrigger> {
    match change {
        StoreChange::Catalog => Some(RefreshTrigger::CatalogChanged),
        StoreChange::Schedule(u) if u == user_id => Some(RefreshTrigger::ScheduleChanged),
        StoreChange::Profile(u) if u == user_id => Some(RefreshTrigger::PreferencesChanged),
        StoreChange::Feedback(_) => Some(RefreshTrigger::FeedbackChanged),
        StoreChange::Schedule(_) | StoreChange::Profile(_) | StoreChange::Progress(_) => None,
    }
}

/// Handle to a running feed watcher. Dropping it stops the task.
pub struct FeedWatcher {
    updates: watch::Receiver<FeedUpdate>,
    handle: JoinHandle<()>,
}

impl FeedWatcher {
    /// A receiver that always holds the latest list.
    #[must_use]
    pub fn updates(&self) -> watch::Receiver<FeedUpdate> {
        self.updates.clone()
    }

    #[must_use]
    pub fn current(&self) -> Vec<Lesson> {
        self.updates.borrow().lessons.clone()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for FeedWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_users_changes_are_ignored() {
        let me = UserId::new("me").unwrap();
        let other = UserId::new("other").unwrap();
        assert_eq!(
            trigger_for(&StoreChange::Schedule(me.clone()), &me),
            Some(RefreshTrigger::ScheduleChanged)
        );
        assert_eq!(trigger_for(&StoreChange::Schedule(other.clone()), &me), None);
        assert_eq!(trigger_for(&StoreChange::Profile(other), &me), None);
        assert_eq!(trigger_for(&StoreChange::Progress(me.clone()), &me), None);
        assert_eq!(
            trigger_for(
                &StoreChange::Feedback(learn_core::model::LessonId::new("1").unwrap()),
                &me
            ),
            Some(RefreshTrigger::FeedbackChanged)
        );
    }
}
