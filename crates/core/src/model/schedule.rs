use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use thiserror::Error;

use crate::model::lesson::MICRO_LESSON_MINUTES;
use crate::time::WeekMoment;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScheduleError {
    #[error("invalid time of day: {0} (expected HH:MM)")]
    InvalidTime(String),

    #[error("invalid day of week: {0}")]
    InvalidDay(String),

    #[error("time slot must be exactly 5 minutes")]
    WrongLength,

    #[error("end time must be after start time")]
    EndBeforeStart,

    #[error("no time slot at position {index}")]
    NoSuchSlot { index: usize },
}

//
// ─── MINUTE OF DAY ─────────────────────────────────────────────────────────────
//

/// Wall-clock time with minute resolution, `00:00..=23:59`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    pub const MINUTES_PER_DAY: u16 = 24 * 60;

    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidTime` if hour or minute is out of range.
    pub fn new(hour: u16, minute: u16) -> Result<Self, ScheduleError> {
        if hour >= 24 || minute >= 60 {
            return Err(ScheduleError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self(hour * 60 + minute))
    }

    #[must_use]
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < Self::MINUTES_PER_DAY).then_some(Self(minutes))
    }

    #[must_use]
    pub fn minutes(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    #[must_use]
    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// Signed same-day distance `self - earlier`, in minutes.
    #[must_use]
    pub fn minutes_since(self, earlier: MinuteOfDay) -> i32 {
        i32::from(self.0) - i32::from(earlier.0)
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for MinuteOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidTime(s.to_owned());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

//
// ─── SLOT ──────────────────────────────────────────────────────────────────────
//

/// Unvalidated slot as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDraft {
    pub day: String,
    pub start: String,
    pub end: String,
    pub duration: u32,
}

impl SlotDraft {
    /// Draft for a slot starting at `start` with the end computed five minutes later.
    ///
    /// The end wraps past midnight the way a clock would, which `validate` then rejects.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidTime` if `start` is not `HH:MM`.
    pub fn starting_at(day: impl Into<String>, start: &str) -> Result<Self, ScheduleError> {
        let parsed: MinuteOfDay = start.parse()?;
        let end_minutes = (parsed.minutes() + MICRO_LESSON_MINUTES as u16)
            % MinuteOfDay::MINUTES_PER_DAY;
        let end = MinuteOfDay(end_minutes);
        Ok(Self {
            day: day.into(),
            start: parsed.to_string(),
            end: end.to_string(),
            duration: MICRO_LESSON_MINUTES,
        })
    }

    /// Validate the draft into a slot. No partial acceptance.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError` if the day or times are malformed, the span or the
    /// declared duration is not exactly five minutes, or start is not before end.
    pub fn validate(&self) -> Result<ScheduleSlot, ScheduleError> {
        let day = self
            .day
            .trim()
            .parse::<Weekday>()
            .map_err(|_| ScheduleError::InvalidDay(self.day.clone()))?;
        let start: MinuteOfDay = self.start.parse()?;
        let end: MinuteOfDay = self.end.parse()?;

        let span = end.minutes_since(start);
        if span != MICRO_LESSON_MINUTES as i32 || self.duration != MICRO_LESSON_MINUTES {
            return Err(ScheduleError::WrongLength);
        }
        if start >= end {
            return Err(ScheduleError::EndBeforeStart);
        }

        Ok(ScheduleSlot {
            day,
            start,
            end,
            duration: self.duration,
        })
    }
}

/// A validated weekly recurring five-minute window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    day: Weekday,
    start: MinuteOfDay,
    end: MinuteOfDay,
    duration: u32,
}

impl ScheduleSlot {
    #[must_use]
    pub fn day(&self) -> Weekday {
        self.day
    }

    #[must_use]
    pub fn start(&self) -> MinuteOfDay {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> MinuteOfDay {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Start inclusive, end exclusive, same weekday.
    #[must_use]
    pub fn contains(&self, at: WeekMoment) -> bool {
        at.day == self.day && self.start <= at.minute && at.minute < self.end
    }

    /// Convert back to the draft shape used by the store.
    #[must_use]
    pub fn to_draft(&self) -> SlotDraft {
        SlotDraft {
            day: weekday_name(self.day).to_owned(),
            start: self.start.to_string(),
            end: self.end.to_string(),
            duration: self.duration,
        }
    }
}

/// Full English weekday name, matching what users pick in the schedule form.
#[must_use]
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

//
// ─── SCHEDULE ──────────────────────────────────────────────────────────────────
//

/// A user's ordered collection of slots. Overlaps are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    slots: Vec<ScheduleSlot>,
}

impl Schedule {
    #[must_use]
    pub fn new(slots: Vec<ScheduleSlot>) -> Self {
        Self { slots }
    }

    #[must_use]
    pub fn slots(&self) -> &[ScheduleSlot] {
        &self.slots
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn push(&mut self, slot: ScheduleSlot) {
        self.slots.push(slot);
    }

    /// Remove the slot at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::NoSuchSlot` if the index is out of range.
    pub fn remove(&mut self, index: usize) -> Result<ScheduleSlot, ScheduleError> {
        if index >= self.slots.len() {
            return Err(ScheduleError::NoSuchSlot { index });
        }
        Ok(self.slots.remove(index))
    }

    #[must_use]
    pub fn is_open_at(&self, at: WeekMoment) -> bool {
        self.slots.iter().any(|slot| slot.contains(at))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
