use std::sync::Arc;

use learn_core::leaderboard::{Leaderboard, PeerRecord, build_leaderboard};
use learn_core::model::UserId;
use storage::repository::{ProfileRepository, ProgressRepository};

use crate::error::LeaderboardServiceError;

#[derive(Clone)]
pub struct LeaderboardService {
    profiles: Arc<dyn ProfileRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl LeaderboardService {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileRepository>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { profiles, progress }
    }

    /// Top peers of `user_id` by total score.
    ///
    /// # Errors
    ///
    /// Returns `LeaderboardServiceError::Storage` if any read fails.
    pub async fn leaderboard(&self, user_id: &UserId) -> Result<Leaderboard, LeaderboardServiceError> {
        let preferences = self
            .profiles
            .get_profile(user_id)
            .await?
            .map(|p| p.preferences)
            .unwrap_or_default();
        if preferences.is_empty() {
            return Ok(Leaderboard::default());
        }

        let profiles = self.profiles.list_profiles().await?;
        let mut progress = Vec::with_capacity(profiles.len());
        for (id, profile) in &profiles {
            if profile.preferences.same_set(&preferences) {
                progress.push(self.progress.get_progress(id).await?);
            } else {
                progress.push(None);
            }
        }

        let peers: Vec<PeerRecord<'_>> = profiles
            .iter()
            .zip(&progress)
            .map(|((id, profile), state)| PeerRecord {
                user_id: id,
                profile,
                progress: state.as_ref(),
            })
            .collect();

        Ok(build_leaderboard(user_id, &preferences, &peers))
    }
}
