use chrono::NaiveDate;
use thiserror::Error;
use url::Url;

use crate::model::lesson::Category;

//
// ─── PREFERENCES ───────────────────────────────────────────────────────────────
//

/// Categories a user wants lessons from.
///
/// Membership is what matters; the first-seen order is kept because ranking
/// breaks ties on it. Duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    categories: Vec<Category>,
}

impl Preferences {
    #[must_use]
    pub fn new(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut out: Vec<Category> = Vec::new();
        for c in categories {
            if !out.contains(&c) {
                out.push(c);
            }
        }
        Self { categories: out }
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn contains(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    /// Position of `category` in the preference ordering.
    #[must_use]
    pub fn rank_of(&self, category: Category) -> Option<usize> {
        self.categories.iter().position(|c| *c == category)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Set equality, ignoring order.
    #[must_use]
    pub fn same_set(&self, other: &Preferences) -> bool {
        let mut a = self.categories.clone();
        let mut b = other.categories.clone();
        a.sort();
        b.sort();
        a == b
    }

    /// Add the category if absent, remove it if present.
    pub fn toggle(&mut self, category: Category) {
        if let Some(pos) = self.rank_of(category) {
            self.categories.remove(pos);
        } else {
            self.categories.push(category);
        }
    }
}

//
// ─── PROFILE ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("name and email are required")]
    MissingRequired,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid avatar URL")]
    InvalidAvatarUrl,
    #[error("invalid date of birth (expected YYYY-MM-DD)")]
    InvalidDateOfBirth,
}

/// Per-user profile document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub preferences: Preferences,
    pub notifications_enabled: bool,
    pub achievements: Vec<String>,
    pub hint_usage: u32,
}

impl UserProfile {
    /// Record an achievement unless it is already present. Returns true if added.
    pub fn award(&mut self, achievement: &str) -> bool {
        if self.achievements.iter().any(|a| a == achievement) {
            return false;
        }
        self.achievements.push(achievement.to_owned());
        true
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Anonymous")
    }

    /// Apply a validated edit. Achievements and hint usage are not user-editable.
    pub fn apply(&mut self, edit: ProfileEdit) {
        self.name = Some(edit.name);
        self.email = Some(edit.email);
        self.bio = edit.bio;
        self.avatar_url = edit.avatar_url;
        self.date_of_birth = edit.date_of_birth;
        self.preferences = edit.preferences;
    }
}

/// Unvalidated profile form.
#[derive(Clone, Debug, Default)]
pub struct ProfileDraft {
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub date_of_birth: Option<String>,
    pub preferences: Vec<Category>,
}

/// Validated profile edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileEdit {
    name: String,
    email: String,
    bio: Option<String>,
    avatar_url: Option<String>,
    date_of_birth: Option<NaiveDate>,
    preferences: Preferences,
}

impl ProfileDraft {
    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if name or email are missing or malformed, the avatar
    /// URL does not parse, or the date of birth is not `YYYY-MM-DD`.
    pub fn validate(self) -> Result<ProfileEdit, ProfileError> {
        let name = self.name.trim().to_owned();
        let email = self.email.trim().to_owned();
        if name.is_empty() || email.is_empty() {
            return Err(ProfileError::MissingRequired);
        }
        if !looks_like_email(&email) {
            return Err(ProfileError::InvalidEmail);
        }

        let avatar_url = normalize_optional(self.avatar_url);
        if let Some(url) = avatar_url.as_ref() {
            if Url::parse(url).is_err() {
                return Err(ProfileError::InvalidAvatarUrl);
            }
        }

        let date_of_birth = normalize_optional(self.date_of_birth)
            .map(|raw| {
                if raw.len() != 10 {
                    return Err(ProfileError::InvalidDateOfBirth);
                }
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| ProfileError::InvalidDateOfBirth)
            })
            .transpose()?;

        Ok(ProfileEdit {
            name,
            email,
            bio: normalize_optional(self.bio),
            avatar_url,
            date_of_birth,
            preferences: Preferences::new(self.preferences),
        })
    }
}

// local@domain.tld with no whitespace and a single @
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProfileDraft {
        ProfileDraft {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            ..ProfileDraft::default()
        }
    }

    #[test]
    fn preferences_drop_duplicates_and_keep_order() {
        let prefs = Preferences::new([Category::Science, Category::Math, Category::Science]);
        assert_eq!(prefs.categories(), &[Category::Science, Category::Math]);
        assert_eq!(prefs.rank_of(Category::Math), Some(1));
        assert_eq!(prefs.rank_of(Category::History), None);
    }

    #[test]
    fn preferences_compare_as_sets() {
        let a = Preferences::new([Category::Science, Category::Math]);
        let b = Preferences::new([Category::Math, Category::Science]);
        assert!(a.same_set(&b));
        assert!(!a.same_set(&Preferences::new([Category::Math])));
    }

    #[test]
    fn toggle_adds_and_removes() {
        let mut prefs = Preferences::default();
        prefs.toggle(Category::Language);
        assert!(prefs.contains(Category::Language));
        prefs.toggle(Category::Language);
        assert!(prefs.is_empty());
    }

    #[test]
    fn draft_requires_name_and_email() {
        let mut d = draft();
        d.name = "  ".into();
        assert_eq!(d.validate().unwrap_err(), ProfileError::MissingRequired);
    }

    #[test]
    fn draft_rejects_bad_email() {
        for bad in ["ada", "ada@", "ada@example", "a da@example.com", "a@b@c.com"] {
            let mut d = draft();
            d.email = bad.into();
            assert_eq!(d.validate().unwrap_err(), ProfileError::InvalidEmail, "{bad}");
        }
    }

    #[test]
    fn draft_rejects_bad_dates_and_urls() {
        let mut d = draft();
        d.date_of_birth = Some("1990-1-1".into());
        assert_eq!(d.validate().unwrap_err(), ProfileError::InvalidDateOfBirth);

        let mut d = draft();
        d.avatar_url = Some("not a url".into());
        assert_eq!(d.validate().unwrap_err(), ProfileError::InvalidAvatarUrl);
    }

    #[test]
    fn apply_keeps_achievements_and_hints() {
        let mut profile = UserProfile {
            achievements: vec!["First Quiz Completed".into()],
            hint_usage: 3,
            ..UserProfile::default()
        };
        let mut d = draft();
        d.date_of_birth = Some("1990-12-10".into());
        d.preferences = vec![Category::History];
        profile.apply(d.validate().unwrap());

        assert_eq!(profile.display_name(), "Ada");
        assert_eq!(profile.hint_usage, 3);
        assert_eq!(profile.achievements.len(), 1);
        assert!(profile.preferences.contains(Category::History));
    }

    #[test]
    fn award_is_idempotent() {
        let mut profile = UserProfile::default();
        assert!(profile.award("First Quiz Completed"));
        assert!(!profile.award("First Quiz Completed"));
        assert_eq!(profile.achievements.len(), 1);
    }
}
