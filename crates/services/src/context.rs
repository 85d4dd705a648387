use chrono::{FixedOffset, Offset, Utc};
use learn_core::Clock;
use learn_core::model::UserId;
use learn_core::time::WeekMoment;

/// Who is using the app and how their wall clock relates to UTC.
///
/// Passed explicitly to every service call that depends on the current user,
/// instead of living in shared mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user_id: UserId,
    utc_offset: FixedOffset,
    show_all: bool,
}

impl SessionContext {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            utc_offset: Utc.fix(),
            show_all: false,
        }
    }

    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Bypass the schedule time-window gate.
    #[must_use]
    pub fn with_show_all(mut self, show_all: bool) -> Self {
        self.show_all = show_all;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    #[must_use]
    pub fn show_all(&self) -> bool {
        self.show_all
    }

    /// The user's current weekday and wall-clock minute.
    #[must_use]
    pub fn moment(&self, clock: &Clock) -> WeekMoment {
        WeekMoment::at_offset(clock.now(), self.utc_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use learn_core::time::fixed_clock;

    #[test]
    fn moment_uses_the_user_offset() {
        let ctx = SessionContext::new(UserId::new("u1").unwrap());
        let utc = ctx.moment(&fixed_clock());
        assert_eq!(utc.day, Weekday::Tue);
        assert_eq!(utc.minute.to_string(), "22:13");

        let east = ctx
            .clone()
            .with_utc_offset(FixedOffset::east_opt(2 * 3600).unwrap());
        let local = east.moment(&fixed_clock());
        assert_eq!(local.day, Weekday::Wed);
        assert_eq!(local.minute.to_string(), "00:13");
    }
}
