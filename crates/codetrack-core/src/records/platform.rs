//! # Platform Statistics Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::UserId;

/// External coding-practice platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// leetcode.com
    LeetCode,
    /// codeforces.com
    Codeforces,
    /// codechef.com
    CodeChef,
    /// hackerrank.com
    HackerRank,
    /// geeksforgeeks.org
    GeeksForGeeks,
}

impl Platform {
    /// Every supported platform.
    pub const ALL: [Platform; 5] = [
        Platform::LeetCode,
        Platform::Codeforces,
        Platform::CodeChef,
        Platform::HackerRank,
        Platform::GeeksForGeeks,
    ];

    /// Human-readable platform name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LeetCode => "LeetCode",
            Self::Codeforces => "Codeforces",
            Self::CodeChef => "CodeChef",
            Self::HackerRank => "HackerRank",
            Self::GeeksForGeeks => "GeeksforGeeks",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Practice statistics of one student on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStat {
    /// Student the statistics belong to
    pub owner_id: UserId,
    /// Platform the statistics were collected from
    pub platform: Platform,
    /// Account handle on the platform
    pub handle: String,
    /// Problems solved in total
    pub total_solved: u32,
    /// Easy problems solved
    pub easy_solved: u32,
    /// Medium problems solved
    pub medium_solved: u32,
    /// Hard problems solved
    pub hard_solved: u32,
    /// Current contest rating, if the platform rates contests
    #[serde(default)]
    pub rating: Option<u32>,
    /// Highest contest rating reached
    #[serde(default)]
    pub max_rating: Option<u32>,
    /// Contests entered
    pub contests: u32,
    /// Current daily streak
    pub streak_days: u32,
    /// When the platform was last scraped
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
}

impl PlatformStat {
    /// Freshly linked account with no recorded activity.
    pub fn linked(owner_id: impl Into<UserId>, platform: Platform, handle: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            platform,
            handle: handle.into(),
            total_solved: 0,
            easy_solved: 0,
            medium_solved: 0,
            hard_solved: 0,
            rating: None,
            max_rating: None,
            contests: 0,
            streak_days: 0,
            last_synced: None,
        }
    }

    /// Builder: set solved counts by difficulty; the total is their sum.
    #[must_use]
    pub fn with_solved(mut self, easy: u32, medium: u32, hard: u32) -> Self {
        self.easy_solved = easy;
        self.medium_solved = medium;
        self.hard_solved = hard;
        self.total_solved = easy + medium + hard;
        self
    }

    /// Builder: set the contest rating and contests entered.
    #[must_use]
    pub fn with_rating(mut self, rating: u32, max_rating: u32, contests: u32) -> Self {
        self.rating = Some(rating);
        self.max_rating = Some(max_rating.max(rating));
        self.contests = contests;
        self
    }

    /// Builder: set the streak.
    #[must_use]
    pub fn with_streak(mut self, days: u32) -> Self {
        self.streak_days = days;
        self
    }
}
