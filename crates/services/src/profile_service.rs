use std::sync::Arc;

use learn_core::model::{Category, Preferences, ProfileDraft, UserId, UserProfile};
use storage::repository::ProfileRepository;

use crate::error::ProfileServiceError;

#[derive(Clone)]
pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    /// Load the profile, or defaults if missing.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Storage` on read failures.
    pub async fn load(&self, user_id: &UserId) -> Result<UserProfile, ProfileServiceError> {
        Ok(self
            .profiles
            .get_profile(user_id)
            .await?
            .unwrap_or_default())
    }

    /// Validate and apply a profile edit. Achievements and hint usage are kept.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Profile` if validation fails, or
    /// `ProfileServiceError::Storage` if persistence fails.
    pub async fn update(
        &self,
        user_id: &UserId,
        draft: ProfileDraft,
    ) -> Result<UserProfile, ProfileServiceError> {
        let edit = draft.validate()?;
        let mut profile = self.load(user_id).await?;
        profile.apply(edit);
        self.profiles.save_profile(user_id, &profile).await?;
        Ok(profile)
    }

    /// Add or remove one preferred category.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Storage` on read/write failures.
    pub async fn toggle_preference(
        &self,
        user_id: &UserId,
        category: Category,
    ) -> Result<Preferences, ProfileServiceError> {
        let mut profile = self.load(user_id).await?;
        profile.preferences.toggle(category);
        self.profiles.save_profile(user_id, &profile).await?;
        Ok(profile.preferences)
    }

    /// # Errors
    ///
    /// Returns `ProfileServiceError::Storage` on read/write failures.
    pub async fn set_notifications(
        &self,
        user_id: &UserId,
        enabled: bool,
    ) -> Result<(), ProfileServiceError> {
        let mut profile = self.load(user_id).await?;
        profile.notifications_enabled = enabled;
        self.profiles.save_profile(user_id, &profile).await?;
        Ok(())
    }
}
