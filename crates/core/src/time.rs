use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, Timelike, Utc, Weekday};

use crate::model::MinuteOfDay;

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns true if this clock is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// A point in the weekly cycle: day of week plus wall-clock minute.
///
/// Schedule slots are expressed in the user's wall-clock time, so an instant is
/// projected through the user's UTC offset before it is compared to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekMoment {
    pub day: Weekday,
    pub minute: MinuteOfDay,
}

impl WeekMoment {
    #[must_use]
    pub fn new(day: Weekday, minute: MinuteOfDay) -> Self {
        Self { day, minute }
    }

    /// Project a UTC instant into wall-clock time at `offset`.
    #[must_use]
    pub fn at_offset(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = instant.with_timezone(&offset);
        // hour < 24 and minute < 60 always hold for a chrono time
        let minutes = u16::try_from(local.hour() * 60 + local.minute()).unwrap_or(0);
        Self {
            day: local.weekday(),
            minute: MinuteOfDay::from_minutes(minutes).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn utc(instant: DateTime<Utc>) -> Self {
        Self::at_offset(instant, Utc.fix())
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z, a Tuesday).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_now_is_tuesday_evening_utc() {
        let moment = WeekMoment::utc(fixed_now());
        assert_eq!(moment.day, Weekday::Tue);
        assert_eq!(moment.minute.to_string(), "22:13");
    }

    #[test]
    fn offset_can_move_the_weekday() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let moment = WeekMoment::at_offset(fixed_now(), plus_two);
        assert_eq!(moment.day, Weekday::Wed);
        assert_eq!(moment.minute.to_string(), "00:13");
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), fixed_now() + Duration::minutes(5));
        assert!(clock.is_fixed());
    }
}
