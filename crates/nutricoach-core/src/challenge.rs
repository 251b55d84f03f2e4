//! Challenges, daily streak logs and achievements.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::UserId;

/// Distinct logged days needed to complete a challenge.
pub const CHALLENGE_COMPLETION_DAYS: i32 = 7;

/// The catalog of challenges a user can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeKind {
    /// Drink 2 litres of water daily.
    #[serde(rename = "water_challenge")]
    Water,
    /// Walk 8k steps daily.
    #[serde(rename = "steps_challenge")]
    Steps,
    /// Eat healthily for 7 days.
    #[serde(rename = "diet_challenge")]
    Diet,
    /// Work out three times a week.
    #[serde(rename = "workout_challenge")]
    Workout,
    /// Track calories.
    #[serde(rename = "tracking_challenge")]
    Tracking,
    /// No sugar for 7 days.
    #[serde(rename = "nosugar_challenge")]
    NoSugar,
}

impl ChallengeKind {
    /// Every challenge, in display order.
    pub const ALL: [Self; 6] = [
        Self::Water,
        Self::Steps,
        Self::Diet,
        Self::Workout,
        Self::Tracking,
        Self::NoSugar,
    ];

    /// Stable identifier used in URLs and the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Water => "water_challenge",
            Self::Steps => "steps_challenge",
            Self::Diet => "diet_challenge",
            Self::Workout => "workout_challenge",
            Self::Tracking => "tracking_challenge",
            Self::NoSugar => "nosugar_challenge",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Water => "Drink 2L of water daily",
            Self::Steps => "8k steps daily",
            Self::Diet => "Healthy eating for 7 days",
            Self::Workout => "Workouts 3x a week",
            Self::Tracking => "Track calories",
            Self::NoSugar => "No sugar for 7 days",
        }
    }

    /// Badge awarded when the challenge is completed.
    #[must_use]
    pub fn badge(self) -> String {
        format!("Challenge: {}", self.display_name())
    }
}

impl FromStr for ChallengeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownChallenge(s.to_string()))
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's progress in one challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Participant.
    pub user_id: UserId,
    /// Which challenge.
    pub kind: ChallengeKind,
    /// When the challenge was started.
    pub start_date: DateTime<Utc>,
    /// Distinct days logged.
    pub progress: i32,
    /// Set once `progress` reaches the completion threshold.
    pub completed: bool,
}

/// Result of logging today's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StreakOutcome {
    /// Today was recorded.
    Logged {
        /// Progress after this log.
        progress: i32,
        /// Whether the challenge is now complete.
        completed: bool,
        /// Badge awarded by this log, if it completed the challenge.
        #[serde(skip_serializing_if = "Option::is_none")]
        badge: Option<String>,
    },
    /// Today was already recorded; nothing changed.
    AlreadyLoggedToday,
    /// The challenge has not been started.
    NotStarted,
}

/// A badge earned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    /// Holder.
    pub user_id: UserId,
    /// Badge name; unique per user.
    pub badge: String,
    /// When it was awarded.
    pub awarded_at: DateTime<Utc>,
}

/// Description shown next to a badge.
#[must_use]
pub fn achievement_description(badge: &str) -> &'static str {
    match badge {
        "Breakfast hero" => "Had breakfast 7 days in a row",
        "Water master" => "Drinks enough water",
        "7 days without sugar" => "A week without sweets",
        "First steps" => "Added the first meal to the diary",
        "Marathoner" => "Kept the diary for 30 days in a row",
        _ if badge.starts_with("Challenge: ") => "Completed a 7-day challenge",
        _ => "Special achievement",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_identifiers() {
        for kind in ChallengeKind::ALL {
            assert_eq!(kind.as_str().parse::<ChallengeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!(
            "juggling_challenge".parse::<ChallengeKind>(),
            Err(CoreError::UnknownChallenge("juggling_challenge".into()))
        );
    }

    #[test]
    fn serde_uses_identifiers() {
        let json = serde_json::to_string(&ChallengeKind::NoSugar).unwrap();
        assert_eq!(json, "\"nosugar_challenge\"");
    }

    #[test]
    fn badge_is_named_after_challenge() {
        assert_eq!(ChallengeKind::Water.badge(), "Challenge: Drink 2L of water daily");
        assert_eq!(
            achievement_description(&ChallengeKind::Water.badge()),
            "Completed a 7-day challenge"
        );
    }
}
