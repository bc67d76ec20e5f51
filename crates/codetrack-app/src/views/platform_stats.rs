//! # Platform Statistics View
//!
//! Aggregates a student's practice across every linked platform.

use serde::{Deserialize, Serialize};

use codetrack_core::records::{Platform, PlatformStat};
use codetrack_core::{Mutation, MutationAck, SyncResult, UserId};

use super::binding::ViewBinding;

/// Binding of the platform statistics domain.
pub type PlatformStatsView = ViewBinding<PlatformStat>;

/// Totals across platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeTotals {
    /// Linked platforms
    pub platforms: usize,
    /// Problems solved in total
    pub solved: u32,
    /// Easy problems solved
    pub easy: u32,
    /// Medium problems solved
    pub medium: u32,
    /// Hard problems solved
    pub hard: u32,
    /// Contests entered
    pub contests: u32,
    /// Highest current rating on any platform
    pub best_rating: Option<u32>,
    /// Longest current streak on any platform
    pub longest_streak: u32,
}

impl PracticeTotals {
    /// Sum `stats`.
    pub fn from_stats<'a>(stats: impl IntoIterator<Item = &'a PlatformStat>) -> Self {
        stats.into_iter().fold(Self::default(), |mut totals, stat| {
            totals.platforms += 1;
            totals.solved = totals.solved.saturating_add(stat.total_solved);
            totals.easy = totals.easy.saturating_add(stat.easy_solved);
            totals.medium = totals.medium.saturating_add(stat.medium_solved);
            totals.hard = totals.hard.saturating_add(stat.hard_solved);
            totals.contests = totals.contests.saturating_add(stat.contests);
            totals.best_rating = totals.best_rating.max(stat.rating);
            totals.longest_streak = totals.longest_streak.max(stat.streak_days);
            totals
        })
    }
}

impl ViewBinding<PlatformStat> {
    /// Totals over the signed-in user's own statistics.
    pub fn my_totals(&self) -> PracticeTotals {
        match self.session().user_id() {
            Some(owner) => self.totals_for(&owner),
            None => PracticeTotals::default(),
        }
    }

    /// Totals over `owner`'s statistics.
    pub fn totals_for(&self, owner: &UserId) -> PracticeTotals {
        let snapshot = self.current_snapshot();
        PracticeTotals::from_stats(snapshot.iter().filter(|stat| &stat.owner_id == owner))
    }

    /// `owner`'s statistics on `platform`.
    pub fn stat(&self, owner: &UserId, platform: Platform) -> Option<PlatformStat> {
        self.current_snapshot()
            .iter()
            .find(|stat| &stat.owner_id == owner && stat.platform == platform)
            .cloned()
    }

    /// Every owner's statistics on `platform`, most problems solved first.
    pub fn leaderboard(&self, platform: Platform) -> Vec<PlatformStat> {
        let mut stats: Vec<PlatformStat> = self
            .current_snapshot()
            .iter()
            .filter(|stat| stat.platform == platform)
            .cloned()
            .collect();
        stats.sort_by(|a, b| b.total_solved.cmp(&a.total_solved));
        stats
    }

    /// Link a handle on `platform` to the signed-in user.
    pub async fn link(&self, platform: Platform, handle: impl Into<String>) -> SyncResult<MutationAck> {
        self.mutate(Mutation::LinkPlatform {
            platform,
            handle: handle.into(),
        })
        .await
    }

    /// Remove the signed-in user's link to `platform`.
    pub async fn unlink(&self, platform: Platform) -> SyncResult<MutationAck> {
        self.mutate(Mutation::UnlinkPlatform { platform }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_take_sums_and_maxima() {
        let stats = [
            PlatformStat::linked("s1", Platform::LeetCode, "ada")
                .with_solved(50, 30, 5)
                .with_rating(1650, 1700, 12)
                .with_streak(4),
            PlatformStat::linked("s1", Platform::Codeforces, "ada_cf")
                .with_solved(10, 8, 2)
                .with_rating(1400, 1520, 20)
                .with_streak(9),
        ];

        let totals = PracticeTotals::from_stats(&stats);
        assert_eq!(totals.platforms, 2);
        assert_eq!(totals.solved, 105);
        assert_eq!((totals.easy, totals.medium, totals.hard), (60, 38, 7));
        assert_eq!(totals.contests, 32);
        assert_eq!(totals.best_rating, Some(1650));
        assert_eq!(totals.longest_streak, 9);
    }

    #[test]
    fn totals_of_nothing_are_zero() {
        assert_eq!(PracticeTotals::from_stats(&[]), PracticeTotals::default());
    }
}
