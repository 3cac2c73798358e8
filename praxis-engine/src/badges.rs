//! Badge registry and evaluation.
//!
//! Badges are ratchets: tiers unlock when a trigger value crosses a
//! threshold and are never revoked, even when undo later decrements the
//! metric that earned them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{Profile, Stat};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Silver,
    Gold,
    Diamond,
    Crimson,
}

impl BadgeTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Diamond => "diamond",
            Self::Crimson => "crimson",
        }
    }
}

impl fmt::Display for BadgeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    Progression,
    Combat,
    Warfare,
    Consistency,
    Resilience,
    Economy,
    Mastery,
    Special,
}

/// Which lifetime counter a metric-triggered badge watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    TotalTasksCompleted,
    TotalRaidsWon,
    TotalGoldEarned,
    TotalXpEarned,
    HighestStreak,
    HabitsFixed,
    ShieldsUsed,
}

impl MetricKey {
    #[must_use]
    pub fn read(self, profile: &Profile) -> i64 {
        let metrics = &profile.metrics;
        match self {
            Self::TotalTasksCompleted => i64::from(metrics.total_tasks_completed),
            Self::TotalRaidsWon => i64::from(metrics.total_raids_won),
            Self::TotalGoldEarned => metrics.total_gold_earned,
            Self::TotalXpEarned => metrics.total_xp_earned,
            Self::HighestStreak => i64::from(metrics.highest_streak),
            Self::HabitsFixed => i64::from(metrics.habits_fixed),
            Self::ShieldsUsed => i64::from(metrics.shields_used),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeTrigger {
    Metric { key: MetricKey },
    Stat { stat: Stat },
    Streak,
    Level,
}

impl BadgeTrigger {
    /// Current value of the watched quantity.
    #[must_use]
    pub fn read(self, profile: &Profile) -> i64 {
        match self {
            Self::Metric { key } => key.read(profile),
            #[allow(clippy::cast_possible_truncation)]
            Self::Stat { stat } => profile.stats.get(stat).floor() as i64,
            Self::Streak => i64::from(profile.streak),
            Self::Level => i64::from(profile.level),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeLevel {
    pub tier: BadgeTier,
    pub target: i64,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub gold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub category: BadgeCategory,
    pub trigger: BadgeTrigger,
    pub levels: Vec<BadgeLevel>,
}

/// One tier unlock produced by an evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeAward {
    pub badge_id: String,
    pub tier: BadgeTier,
}

/// Walk the registry and unlock every tier whose threshold is met and not
/// yet recorded, granting tier rewards through the normal profile path.
pub fn evaluate(
    profile: &mut Profile,
    registry: &[BadgeDefinition],
    now: DateTime<Utc>,
) -> Vec<BadgeAward> {
    let mut awards = Vec::new();
    for definition in registry {
        let value = definition.trigger.read(profile);
        for level in &definition.levels {
            if value < level.target {
                continue;
            }
            let already = profile
                .badge_history
                .get(&definition.id)
                .is_some_and(|tiers| tiers.contains_key(level.tier.as_str()));
            if already {
                continue;
            }

            profile
                .badge_history
                .entry(definition.id.clone())
                .or_default()
                .insert(level.tier.as_str().to_string(), now);
            let recorded = profile
                .badge_tiers
                .entry(definition.id.clone())
                .or_insert(level.tier);
            if *recorded < level.tier {
                *recorded = level.tier;
            }
            if !profile.badges.contains(&definition.id) {
                profile.badges.push(definition.id.clone());
            }

            profile.add_xp(level.xp);
            profile.add_gold(level.gold);
            awards.push(BadgeAward {
                badge_id: definition.id.clone(),
                tier: level.tier,
            });
        }
    }
    awards
}

/// The built-in registry. External packs can append via the injector.
#[must_use]
pub fn default_registry() -> Vec<BadgeDefinition> {
    fn levels(targets: [i64; 4]) -> Vec<BadgeLevel> {
        let tiers = [
            BadgeTier::Silver,
            BadgeTier::Gold,
            BadgeTier::Diamond,
            BadgeTier::Crimson,
        ];
        tiers
            .iter()
            .zip(targets)
            .zip(1i64..)
            .map(|((tier, target), rank)| BadgeLevel {
                tier: *tier,
                target,
                xp: 50 * rank,
                gold: 25 * rank,
            })
            .collect()
    }

    vec![
        BadgeDefinition {
            id: String::from("badge_veteran"),
            name: String::from("Veteran"),
            description: String::from("Missions completed."),
            icon: String::from("Swords"),
            category: BadgeCategory::Combat,
            trigger: BadgeTrigger::Metric {
                key: MetricKey::TotalTasksCompleted,
            },
            levels: levels([10, 50, 200, 500]),
        },
        BadgeDefinition {
            id: String::from("badge_conqueror"),
            name: String::from("Conqueror"),
            description: String::from("Operations brought to 100%."),
            icon: String::from("Flag"),
            category: BadgeCategory::Warfare,
            trigger: BadgeTrigger::Metric {
                key: MetricKey::TotalRaidsWon,
            },
            levels: levels([1, 5, 20, 50]),
        },
        BadgeDefinition {
            id: String::from("badge_unbroken"),
            name: String::from("Unbroken"),
            description: String::from("Longest daily streak."),
            icon: String::from("Flame"),
            category: BadgeCategory::Consistency,
            trigger: BadgeTrigger::Metric {
                key: MetricKey::HighestStreak,
            },
            levels: levels([7, 30, 90, 365]),
        },
        BadgeDefinition {
            id: String::from("badge_tycoon"),
            name: String::from("Tycoon"),
            description: String::from("Gold earned across all sources."),
            icon: String::from("Coins"),
            category: BadgeCategory::Economy,
            trigger: BadgeTrigger::Metric {
                key: MetricKey::TotalGoldEarned,
            },
            levels: levels([1_000, 10_000, 50_000, 200_000]),
        },
        BadgeDefinition {
            id: String::from("badge_ascendant"),
            name: String::from("Ascendant"),
            description: String::from("Character level reached."),
            icon: String::from("Crown"),
            category: BadgeCategory::Progression,
            trigger: BadgeTrigger::Level,
            levels: levels([5, 15, 30, 50]),
        },
        BadgeDefinition {
            id: String::from("badge_ironclad"),
            name: String::from("Ironclad"),
            description: String::from("Discipline score."),
            icon: String::from("Shield"),
            category: BadgeCategory::Mastery,
            trigger: BadgeTrigger::Stat {
                stat: Stat::Discipline,
            },
            levels: levels([10, 25, 50, 100]),
        },
    ]
}
