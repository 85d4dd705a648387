use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{FeedbackEntry, Lesson, LessonId, Preferences, Schedule};
use crate::time::WeekMoment;

//
// ─── REFRESH TRIGGERS ──────────────────────────────────────────────────────────
//

/// Reasons the lesson feed is recomputed.
///
/// Every input change and the periodic tick go through the same path, so a
/// consumer never has to know which mechanism fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTrigger {
    CatalogChanged,
    ScheduleChanged,
    PreferencesChanged,
    FeedbackChanged,
    Tick,
}

//
// ─── INPUTS ────────────────────────────────────────────────────────────────────
//

/// Everything the engine needs to decide what to show right now.
///
/// # Fields
///
/// * `catalog` - the full lesson set
/// * `preferences` - the user's categories, in preference order
/// * `schedule` - the user's weekly slots
/// * `show_all` - bypass the time-window gate
/// * `now` - the user's current weekday and wall-clock minute
/// * `feedback` - all feedback, only used for average ratings
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub catalog: &'a [Lesson],
    pub preferences: &'a Preferences,
    pub schedule: &'a Schedule,
    pub show_all: bool,
    pub now: WeekMoment,
    pub feedback: &'a [FeedbackEntry],
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Average rating per lesson. Lessons without feedback are absent.
#[must_use]
pub fn average_ratings(feedback: &[FeedbackEntry]) -> HashMap<LessonId, f64> {
    let mut sums: HashMap<LessonId, (u32, u32)> = HashMap::new();
    for entry in feedback {
        let slot = sums.entry(entry.lesson_id.clone()).or_insert((0, 0));
        slot.0 += u32::from(entry.rating.value());
        slot.1 += 1;
    }
    sums.into_iter()
        .map(|(id, (sum, count))| (id, f64::from(sum) / f64::from(count)))
        .collect()
}

/// True when the lesson passes the category, duration and time-window gates.
#[must_use]
pub fn is_eligible(lesson: &Lesson, input: &SelectionInput<'_>) -> bool {
    input.preferences.contains(lesson.category())
        && lesson.is_micro()
        && (input.show_all || input.schedule.is_open_at(input.now))
}

/// Choose and order the lessons to present.
///
/// Lessons must match a preferred category, last exactly one micro-lesson, and
/// (unless `show_all`) the current moment must fall inside a slot. Survivors are
/// ordered by average rating, highest first; equal ratings fall back to the
/// preference order of their category.
///
/// An empty result is a normal answer, not an error.
///
/// # Examples
///
/// ```
/// # use learn_core::model::{Preferences, Schedule};
/// # use learn_core::personalization::{select_lessons, SelectionInput};
/// # use learn_core::time::{fixed_now, WeekMoment};
/// let prefs = Preferences::default();
/// let schedule = Schedule::default();
/// let picked = select_lessons(&SelectionInput {
///     catalog: &[],
///     preferences: &prefs,
///     schedule: &schedule,
///     show_all: true,
///     now: WeekMoment::utc(fixed_now()),
///     feedback: &[],
/// });
/// assert!(picked.is_empty());
/// ```
#[must_use]
pub fn select_lessons(input: &SelectionInput<'_>) -> Vec<Lesson> {
    let ratings = average_ratings(input.feedback);

    let mut ranked: Vec<(f64, usize, &Lesson)> = input
        .catalog
        .iter()
        .filter(|lesson| is_eligible(lesson, input))
        .map(|lesson| {
            let rating = ratings.get(lesson.id()).copied().unwrap_or(0.0);
            let rank = input
                .preferences
                .rank_of(lesson.category())
                .unwrap_or(usize::MAX);
            (rating, rank, lesson)
        })
        .collect();

    // stable: catalog order survives full ties
    ranked.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    ranked.into_iter().map(|(_, _, lesson)| lesson.clone()).collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::lesson_fixtures::lesson;
    use crate::model::{Category, Rating, SlotDraft, UserId};
    use crate::time::fixed_now;
    use chrono::Weekday;

    fn feedback(lesson_id: &str, user: &str, rating: u8) -> FeedbackEntry {
        FeedbackEntry::new(
            UserId::new(user).unwrap(),
            LessonId::new(lesson_id).unwrap(),
            Rating::new(rating).unwrap(),
            "",
            fixed_now(),
        )
    }

    fn tuesday_slot(start: &str) -> Schedule {
        let slot = SlotDraft::starting_at("Tuesday", start)
            .unwrap()
            .validate()
            .unwrap();
        Schedule::new(vec![slot])
    }

    fn tuesday_at(hhmm: &str) -> WeekMoment {
        WeekMoment::new(Weekday::Tue, hhmm.parse().unwrap())
    }

    fn ids(lessons: &[Lesson]) -> Vec<&str> {
        lessons.iter().map(|l| l.id().as_str()).collect()
    }

    #[test]
    fn rated_lesson_sorts_before_unrated() {
        let catalog = vec![
            lesson("1", Category::Math, 5.0),
            lesson("2", Category::Math, 5.0),
        ];
        let prefs = Preferences::new([Category::Math]);
        let schedule = tuesday_slot("09:00");
        let fb = vec![feedback("2", "u1", 5)];

        let picked = select_lessons(&SelectionInput {
            catalog: &catalog,
            preferences: &prefs,
            schedule: &schedule,
            show_all: false,
            now: tuesday_at("09:02"),
            feedback: &fb,
        });
        assert_eq!(ids(&picked), vec!["2", "1"]);
    }

    #[test]
    fn rating_beats_preference_order() {
        let catalog = vec![
            lesson("a", Category::Science, 5.0),
            lesson("b", Category::History, 5.0),
        ];
        let prefs = Preferences::new([Category::Science, Category::History]);
        let schedule = Schedule::default();
        let fb = vec![
            feedback("a", "u1", 2),
            feedback("b", "u1", 4),
            feedback("b", "u2", 5),
        ];

        let picked = select_lessons(&SelectionInput {
            catalog: &catalog,
            preferences: &prefs,
            schedule: &schedule,
            show_all: true,
            now: tuesday_at("12:00"),
            feedback: &fb,
        });
        assert_eq!(ids(&picked), vec!["b", "a"]);
    }

    #[test]
    fn ties_break_on_preference_index() {
        let catalog = vec![
            lesson("lang", Category::Language, 5.0),
            lesson("mind", Category::Mindfulness, 5.0),
            lesson("sci", Category::Science, 5.0),
        ];
        let prefs = Preferences::new([Category::Science, Category::Mindfulness, Category::Language]);
        let schedule = Schedule::default();

        let picked = select_lessons(&SelectionInput {
            catalog: &catalog,
            preferences: &prefs,
            schedule: &schedule,
            show_all: true,
            now: tuesday_at("12:00"),
            feedback: &[],
        });
        assert_eq!(ids(&picked), vec!["sci", "mind", "lang"]);
    }

    #[test]
    fn output_categories_are_preferred_and_micro() {
        let catalog = vec![
            lesson("1", Category::Math, 5.0),
            lesson("2", Category::History, 5.0),
            lesson("3", Category::Math, 10.0),
            lesson("4", Category::Language, 5.0),
        ];
        let prefs = Preferences::new([Category::Math, Category::Language]);
        let schedule = Schedule::default();
        let input = SelectionInput {
            catalog: &catalog,
            preferences: &prefs,
            schedule: &schedule,
            show_all: true,
            now: tuesday_at("12:00"),
            feedback: &[],
        };
        let picked = select_lessons(&input);
        assert_eq!(ids(&picked), vec!["1", "4"]);
        assert!(picked.iter().all(|l| prefs.contains(l.category())));

        // pure: same inputs, same answer
        assert_eq!(select_lessons(&input), picked);
    }

    #[test]
    fn empty_preferences_yield_nothing() {
        let catalog = vec![lesson("1", Category::Math, 5.0)];
        let prefs = Preferences::default();
        let schedule = Schedule::default();
        let picked = select_lessons(&SelectionInput {
            catalog: &catalog,
            preferences: &prefs,
            schedule: &schedule,
            show_all: true,
            now: tuesday_at("12:00"),
            feedback: &[],
        });
        assert!(picked.is_empty());
    }

    #[test]
    fn time_window_gates_unless_show_all() {
        let catalog = vec![lesson("1", Category::Math, 5.0)];
        let prefs = Preferences::new([Category::Math]);
        let schedule = tuesday_slot("21:00");
        let mut input = SelectionInput {
            catalog: &catalog,
            preferences: &prefs,
            schedule: &schedule,
            show_all: false,
            now: tuesday_at("21:05"),
            feedback: &[],
        };
        assert!(select_lessons(&input).is_empty());

        input.now = tuesday_at("21:00");
        assert_eq!(select_lessons(&input).len(), 1);

        input.now = WeekMoment::new(Weekday::Wed, "21:00".parse().unwrap());
        assert!(select_lessons(&input).is_empty());

        input.show_all = true;
        assert_eq!(select_lessons(&input).len(), 1);
    }

    #[test]
    fn empty_schedule_without_show_all_yields_nothing() {
        let catalog = vec![lesson("1", Category::Math, 5.0)];
        let prefs = Preferences::new([Category::Math]);
        let schedule = Schedule::default();
        let picked = select_lessons(&SelectionInput {
            catalog: &catalog,
            preferences: &prefs,
            schedule: &schedule,
            show_all: false,
            now: tuesday_at("09:00"),
            feedback: &[],
        });
        assert!(picked.is_empty());
    }

    #[test]
    fn averages_feedback_per_lesson() {
        let fb = vec![
            feedback("1", "u1", 4),
            feedback("1", "u2", 5),
            feedback("2", "u1", 2),
        ];
        let avg = average_ratings(&fb);
        assert!((avg[&LessonId::new("1").unwrap()] - 4.5).abs() < f64::EPSILON);
        assert!((avg[&LessonId::new("2").unwrap()] - 2.0).abs() < f64::EPSILON);
        assert!(!avg.contains_key(&LessonId::new("3").unwrap()));
    }
}
