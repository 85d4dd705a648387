use crate::model::{Preferences, ProgressState, UserId, UserProfile};

/// Number of entries shown on a leaderboard.
pub const LEADERBOARD_SIZE: usize = 5;

/// One row of the peer leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub name: String,
    pub total_score: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    /// 1-based position of the requesting user, when they made the list.
    pub user_rank: Option<usize>,
}

/// A candidate peer with the documents the ranking reads.
#[derive(Debug, Clone, Copy)]
pub struct PeerRecord<'a> {
    pub user_id: &'a UserId,
    pub profile: &'a UserProfile,
    pub progress: Option<&'a ProgressState>,
}

/// Rank users who share the requester's exact set of preferred categories.
///
/// Peers are compared by the sum of their stored attempt scores (retry
/// penalties included). Ties fall back to user id so the order is stable. A
/// requester without preferences has no peers.
#[must_use]
pub fn build_leaderboard(
    requester: &UserId,
    preferences: &Preferences,
    peers: &[PeerRecord<'_>],
) -> Leaderboard {
    if preferences.is_empty() {
        return Leaderboard::default();
    }

    let mut entries: Vec<LeaderboardEntry> = peers
        .iter()
        .filter(|p| {
            !p.profile.preferences.is_empty() && p.profile.preferences.same_set(preferences)
        })
        .map(|p| LeaderboardEntry {
            user_id: p.user_id.clone(),
            name: p.profile.display_name().to_owned(),
            total_score: p.progress.map_or(0, ProgressState::total_score),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries.truncate(LEADERBOARD_SIZE);

    let user_rank = entries
        .iter()
        .position(|e| &e.user_id == requester)
        .map(|i| i + 1);

    Leaderboard { entries, user_rank }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attempt, Category, LessonId, Score};
    use crate::time::fixed_now;

    fn uid(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn profile(name: Option<&str>, prefs: &[Category]) -> UserProfile {
        UserProfile {
            name: name.map(str::to_owned),
            preferences: Preferences::new(prefs.iter().copied()),
            ..UserProfile::default()
        }
    }

    fn progress(scores: &[u32]) -> ProgressState {
        ProgressState {
            attempts: scores
                .iter()
                .map(|s| Attempt {
                    lesson_id: LessonId::new("1").unwrap(),
                    score: Score::new(*s).unwrap(),
                    at: fixed_now(),
                })
                .collect(),
            ..ProgressState::default()
        }
    }

    #[test]
    fn only_same_preference_set_competes() {
        let prefs = Preferences::new([Category::Math, Category::Science]);
        let ids = [uid("a"), uid("b"), uid("c")];
        let profiles = [
            profile(Some("Ada"), &[Category::Science, Category::Math]),
            profile(Some("Bo"), &[Category::Math]),
            profile(None, &[Category::Math, Category::Science]),
        ];
        let progress = [progress(&[100]), progress(&[100, 100]), progress(&[54])];
        let peers: Vec<PeerRecord<'_>> = (0..3)
            .map(|i| PeerRecord {
                user_id: &ids[i],
                profile: &profiles[i],
                progress: Some(&progress[i]),
            })
            .collect();

        let board = build_leaderboard(&uid("c"), &prefs, &peers);
        let names: Vec<&str> = board.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Anonymous"]);
        assert_eq!(board.entries[1].total_score, 54);
        assert_eq!(board.user_rank, Some(2));
    }

    #[test]
    fn keeps_top_five_with_id_tiebreak() {
        let prefs = Preferences::new([Category::History]);
        let ids: Vec<UserId> = (0..7).map(|i| uid(&format!("u{i}"))).collect();
        let p = profile(Some("x"), &[Category::History]);
        let peers: Vec<PeerRecord<'_>> = ids
            .iter()
            .map(|id| PeerRecord {
                user_id: id,
                profile: &p,
                progress: None,
            })
            .collect();

        let board = build_leaderboard(&uid("u6"), &prefs, &peers);
        assert_eq!(board.entries.len(), LEADERBOARD_SIZE);
        assert_eq!(board.entries[0].user_id, uid("u0"));
        assert_eq!(board.user_rank, None);
    }

    #[test]
    fn empty_preferences_have_no_peers() {
        let id = uid("a");
        let p = profile(Some("Ada"), &[]);
        let peers = [PeerRecord {
            user_id: &id,
            profile: &p,
            progress: None,
        }];
        let board = build_leaderboard(&id, &Preferences::default(), &peers);
        assert!(board.entries.is_empty());
        assert_eq!(board.user_rank, None);
    }
}
