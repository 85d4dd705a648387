use std::sync::Arc;

use learn_core::Clock;
use learn_core::model::{Schedule, ScheduleSlot, SlotDraft, UserId};
use storage::repository::ScheduleRepository;

use crate::error::ScheduleServiceError;

/// Validates and persists a user's weekly learning slots.
#[derive(Clone)]
pub struct ScheduleService {
    clock: Clock,
    schedules: Arc<dyn ScheduleRepository>,
}

impl ScheduleService {
    #[must_use]
    pub fn new(clock: Clock, schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self { clock, schedules }
    }

    /// The user's slots, empty if none were ever saved.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleServiceError::Storage` if the read fails.
    pub async fn schedule(&self, user_id: &UserId) -> Result<Schedule, ScheduleServiceError> {
        Ok(self.schedules.get_schedule(user_id).await?.unwrap_or_default())
    }

    /// Validate `draft` and append it. Nothing is written if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleServiceError::Schedule` for an invalid slot, or
    /// `ScheduleServiceError::Storage` if persistence fails.
    pub async fn add_slot(
        &self,
        user_id: &UserId,
        draft: &SlotDraft,
    ) -> Result<Schedule, ScheduleServiceError> {
        let slot = draft.validate()?;
        let mut schedule = self.schedule(user_id).await?;
        schedule.push(slot);
        self.schedules
            .save_schedule(user_id, &schedule, self.clock.now())
            .await?;
        tracing::info!(user = %user_id, slots = schedule.slots().len(), "slot added");
        Ok(schedule)
    }

    /// Remove the slot at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleServiceError::Schedule` if `index` is out of range, or
    /// `ScheduleServiceError::Storage` if persistence fails.
    pub async fn remove_slot(
        &self,
        user_id: &UserId,
        index: usize,
    ) -> Result<ScheduleSlot, ScheduleServiceError> {
        let mut schedule = self.schedule(user_id).await?;
        let removed = schedule.remove(index)?;
        self.schedules
            .save_schedule(user_id, &schedule, self.clock.now())
            .await?;
        tracing::info!(user = %user_id, index, "slot removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::ScheduleError;
    use learn_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn service() -> ScheduleService {
        ScheduleService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    fn draft(start: &str, end: &str, duration: u32) -> SlotDraft {
        SlotDraft {
            day: "Monday".into(),
            start: start.into(),
            end: end.into(),
            duration,
        }
    }

    #[tokio::test]
    async fn rejects_six_minute_slot_without_writing() {
        let svc = service();
        let user = UserId::new("u1").unwrap();
        let err = svc
            .add_slot(&user, &draft("09:00", "09:06", 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleServiceError::Schedule(ScheduleError::WrongLength)
        ));
        assert!(svc.schedule(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn appends_and_removes_by_index() {
        let svc = service();
        let user = UserId::new("u1").unwrap();
        svc.add_slot(&user, &draft("09:00", "09:05", 5)).await.unwrap();
        let schedule = svc
            .add_slot(&user, &draft("09:00", "09:05", 5))
            .await
            .unwrap();
        assert_eq!(schedule.slots().len(), 2);

        svc.remove_slot(&user, 0).await.unwrap();
        assert_eq!(svc.schedule(&user).await.unwrap().slots().len(), 1);

        let err = svc.remove_slot(&user, 5).await.unwrap_err();
        assert!(matches!(
            err,
            ScheduleServiceError::Schedule(ScheduleError::NoSuchSlot { index: 5 })
        ));
    }
}
