use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::badges::BadgeTier;
use crate::constants::{
    DAILY_TARGET_EASY, DAILY_TARGET_HARD, DAILY_TARGET_NORMAL, DEFAULT_DAY_START_HOUR,
    PROFILE_BASE_TARGET_XP, PROFILE_TARGET_GROWTH, SHIELD_MAX,
};
use crate::shop::PurchaseLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            _ => Err(()),
        }
    }
}

/// Global daily difficulty modifier chosen by the user ("war mode" etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DailyMode {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl DailyMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }

    /// Daily XP required to keep the streak alive under this mode.
    #[must_use]
    pub const fn daily_target(self) -> i64 {
        match self {
            Self::Easy => DAILY_TARGET_EASY,
            Self::Normal => DAILY_TARGET_NORMAL,
            Self::Hard => DAILY_TARGET_HARD,
        }
    }
}

impl fmt::Display for DailyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The seven character attributes every work item feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Stat {
    #[serde(rename = "DIS")]
    #[default]
    Discipline,
    #[serde(rename = "STR")]
    Strength,
    #[serde(rename = "INT")]
    Intellect,
    #[serde(rename = "PCE")]
    Peace,
    #[serde(rename = "EMT")]
    Emotion,
    #[serde(rename = "CAM")]
    Charisma,
    #[serde(rename = "CRT")]
    Creativity,
}

impl Stat {
    pub const ALL: [Self; 7] = [
        Self::Discipline,
        Self::Strength,
        Self::Intellect,
        Self::Peace,
        Self::Emotion,
        Self::Charisma,
        Self::Creativity,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discipline => "DIS",
            Self::Strength => "STR",
            Self::Intellect => "INT",
            Self::Peace => "PCE",
            Self::Emotion => "EMT",
            Self::Charisma => "CAM",
            Self::Creativity => "CRT",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DIS" => Ok(Self::Discipline),
            "STR" => Ok(Self::Strength),
            "INT" => Ok(Self::Intellect),
            "PCE" => Ok(Self::Peace),
            "EMT" => Ok(Self::Emotion),
            "CAM" => Ok(Self::Charisma),
            "CRT" => Ok(Self::Creativity),
            _ => Err(()),
        }
    }
}

/// Attribute scores. Floor 0, no ceiling; rewards come in 0.5 steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default = "default_stat_score")]
    pub discipline: f32,
    #[serde(default = "default_stat_score")]
    pub strength: f32,
    #[serde(default = "default_stat_score")]
    pub intellect: f32,
    #[serde(default = "default_stat_score")]
    pub peace: f32,
    #[serde(default = "default_stat_score")]
    pub emotion: f32,
    #[serde(default = "default_stat_score")]
    pub charisma: f32,
    #[serde(default = "default_stat_score")]
    pub creativity: f32,
}

const fn default_stat_score() -> f32 {
    1.0
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            discipline: 1.0,
            strength: 1.0,
            intellect: 1.0,
            peace: 1.0,
            emotion: 1.0,
            charisma: 1.0,
            creativity: 1.0,
        }
    }
}

impl Stats {
    #[must_use]
    pub const fn get(&self, stat: Stat) -> f32 {
        match stat {
            Stat::Discipline => self.discipline,
            Stat::Strength => self.strength,
            Stat::Intellect => self.intellect,
            Stat::Peace => self.peace,
            Stat::Emotion => self.emotion,
            Stat::Charisma => self.charisma,
            Stat::Creativity => self.creativity,
        }
    }

    fn slot(&mut self, stat: Stat) -> &mut f32 {
        match stat {
            Stat::Discipline => &mut self.discipline,
            Stat::Strength => &mut self.strength,
            Stat::Intellect => &mut self.intellect,
            Stat::Peace => &mut self.peace,
            Stat::Emotion => &mut self.emotion,
            Stat::Charisma => &mut self.charisma,
            Stat::Creativity => &mut self.creativity,
        }
    }

    pub fn add(&mut self, stat: Stat, points: f32) {
        let slot = self.slot(stat);
        *slot += points;
    }

    /// Subtract points, clamping at zero. Scores never go negative.
    pub fn sub_clamped(&mut self, stat: Stat, points: f32) {
        let slot = self.slot(stat);
        *slot = (*slot - points).max(0.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub minutes_before: u32,
    #[serde(default)]
    pub is_sent: bool,
}

/// Collapsible grouping shared by the task and habit boards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_collapsed: bool,
}

/// Per-difficulty completion counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DifficultyCounts {
    #[serde(default)]
    pub easy: u32,
    #[serde(default)]
    pub normal: u32,
    #[serde(default)]
    pub hard: u32,
}

impl DifficultyCounts {
    pub fn bump(&mut self, difficulty: Difficulty) {
        let slot = self.slot(difficulty);
        *slot = slot.saturating_add(1);
    }

    pub fn unbump(&mut self, difficulty: Difficulty) {
        let slot = self.slot(difficulty);
        *slot = slot.saturating_sub(1);
    }

    fn slot(&mut self, difficulty: Difficulty) -> &mut u32 {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Normal => &mut self.normal,
            Difficulty::Hard => &mut self.hard,
        }
    }
}

/// Lifetime counters feeding badge triggers and the profile screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserMetrics {
    #[serde(default)]
    pub total_tasks_completed: u32,
    #[serde(default)]
    pub tasks_by_difficulty: DifficultyCounts,
    #[serde(default)]
    pub total_raids_won: u32,
    #[serde(default)]
    pub raids_by_difficulty: DifficultyCounts,
    #[serde(default)]
    pub total_gold_earned: i64,
    #[serde(default)]
    pub total_xp_earned: i64,
    #[serde(default)]
    pub highest_streak: u32,
    #[serde(default)]
    pub habits_fixed: u32,
    #[serde(default)]
    pub shields_used: u32,
    #[serde(default)]
    pub resets_count: u32,
}

/// Outcome recorded for each processed virtual day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakMark {
    Success,
    Shield,
    Fail,
    Frozen,
}

fn default_day_start_hour() -> u8 {
    DEFAULT_DAY_START_HOUR
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub sound_enabled: bool,
    #[serde(default)]
    pub notifications_enabled: bool,
    /// Hour (0-23) at which the virtual day rolls over. Default 4am.
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u8,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            notifications_enabled: false,
            day_start_hour: DEFAULT_DAY_START_HOUR,
        }
    }
}

fn default_target_xp() -> i64 {
    PROFILE_BASE_TARGET_XP
}

fn default_honor() -> f32 {
    crate::constants::HONOR_MAX
}

/// The singleton user state. Every field added after v1 carries a serde
/// default so old snapshots backfill one field at a time on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub current_xp: i64,
    #[serde(default = "default_target_xp")]
    pub target_xp: i64,
    #[serde(default)]
    pub gold: i64,
    /// Trailing monthly honor average, recomputed whenever the log changes.
    #[serde(default = "default_honor")]
    pub honor: f32,
    /// Day key (YYYY-MM-DD) -> score. Entries exist only for touched days.
    #[serde(default)]
    pub honor_daily_log: BTreeMap<String, f32>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub shields: u8,
    #[serde(default)]
    pub consecutive_shields: u8,
    #[serde(default)]
    pub daily_xp: i64,
    #[serde(default = "default_daily_target")]
    pub daily_target: i64,
    #[serde(default)]
    pub current_mode: DailyMode,
    /// Tomorrow's mode, applied at the next rollover.
    #[serde(default)]
    pub pending_mode: DailyMode,
    /// Virtual day key of the last applied rollover; the idempotence guard.
    #[serde(default)]
    pub last_processed_day: Option<String>,
    #[serde(default)]
    pub streak_history: BTreeMap<String, StreakMark>,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub badge_tiers: BTreeMap<String, BadgeTier>,
    /// Badge id -> tier -> unlock timestamp.
    #[serde(default)]
    pub badge_history: BTreeMap<String, BTreeMap<String, DateTime<Utc>>>,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub purchase_history: Vec<PurchaseLog>,
    #[serde(default)]
    pub metrics: UserMetrics,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default = "Utc::now")]
    pub last_online: DateTime<Utc>,
    #[serde(default)]
    pub preferences: Preferences,
}

const fn default_level() -> u32 {
    1
}

const fn default_daily_target() -> i64 {
    DAILY_TARGET_NORMAL
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::from("Wanderer"),
            title: String::from("Initiate"),
            level: 1,
            current_xp: 0,
            target_xp: PROFILE_BASE_TARGET_XP,
            gold: 0,
            honor: crate::constants::HONOR_MAX,
            honor_daily_log: BTreeMap::new(),
            streak: 0,
            shields: 0,
            consecutive_shields: 0,
            daily_xp: 0,
            daily_target: DAILY_TARGET_NORMAL,
            current_mode: DailyMode::Normal,
            pending_mode: DailyMode::Normal,
            last_processed_day: None,
            streak_history: BTreeMap::new(),
            badges: Vec::new(),
            badge_tiers: BTreeMap::new(),
            badge_history: BTreeMap::new(),
            inventory: Vec::new(),
            purchase_history: Vec::new(),
            metrics: UserMetrics::default(),
            stats: Stats::default(),
            last_online: Utc::now(),
            preferences: Preferences::default(),
        }
    }
}

impl Profile {
    /// Accumulate XP and resolve level-ups. One large grant can span several
    /// levels, so this loops rather than checking once. Returns the number of
    /// levels gained.
    pub fn add_xp(&mut self, amount: i64) -> u32 {
        if amount <= 0 {
            return 0;
        }
        self.current_xp += amount;
        self.daily_xp += amount;
        let mut levels = 0u32;
        while self.current_xp >= self.target_xp {
            self.current_xp -= self.target_xp;
            self.level = self.level.saturating_add(1);
            levels += 1;
            self.target_xp = next_target_xp(self.target_xp);
        }
        levels
    }

    /// Reverse an XP grant. Clamps at zero and never de-levels: levels are
    /// a ratchet.
    pub fn remove_xp(&mut self, amount: i64) {
        if amount <= 0 {
            return;
        }
        self.current_xp = (self.current_xp - amount).max(0);
        self.daily_xp = (self.daily_xp - amount).max(0);
    }

    pub fn add_gold(&mut self, amount: i64) {
        self.gold += amount.max(0);
    }

    pub fn remove_gold(&mut self, amount: i64) {
        self.gold = (self.gold - amount.max(0)).max(0);
    }

    /// Add a shield, saturating at the capacity of three.
    pub fn add_shield(&mut self) {
        self.shields = (self.shields + 1).min(SHIELD_MAX);
    }

    #[must_use]
    pub const fn shields_at_capacity(&self) -> bool {
        self.shields >= SHIELD_MAX
    }
}

/// Target XP growth per level: x1.15, rounded, strictly increasing.
#[must_use]
pub fn next_target_xp(current_target: i64) -> i64 {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let grown = (current_target as f64 * PROFILE_TARGET_GROWTH).round() as i64;
    grown.max(current_target + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_xp_levels_up_across_multiple_levels() {
        let mut profile = Profile::default();
        assert_eq!(profile.target_xp, 1_000);

        // 1000 + 1150 + 50 = one grant spanning two level-ups.
        let levels = profile.add_xp(2_200);
        assert_eq!(levels, 2);
        assert_eq!(profile.level, 3);
        assert_eq!(profile.current_xp, 50);
        assert_eq!(profile.target_xp, 1_322);
        assert_eq!(profile.daily_xp, 2_200);
    }

    #[test]
    fn target_xp_strictly_increases() {
        let mut target = PROFILE_BASE_TARGET_XP;
        for _ in 0..50 {
            let next = next_target_xp(target);
            assert!(next > target);
            target = next;
        }
    }

    #[test]
    fn remove_xp_clamps_and_keeps_level() {
        let mut profile = Profile::default();
        profile.add_xp(1_100);
        assert_eq!(profile.level, 2);

        profile.remove_xp(5_000);
        assert_eq!(profile.level, 2);
        assert_eq!(profile.current_xp, 0);
        assert_eq!(profile.daily_xp, 0);
    }

    #[test]
    fn stats_floor_at_zero() {
        let mut stats = Stats::default();
        stats.sub_clamped(Stat::Strength, 10.0);
        assert!(stats.get(Stat::Strength).abs() <= f32::EPSILON);

        stats.add(Stat::Strength, 2.5);
        stats.sub_clamped(Stat::Strength, 0.5);
        assert!((stats.get(Stat::Strength) - 2.0).abs() <= f32::EPSILON);
    }

    #[test]
    fn shields_saturate_at_capacity() {
        let mut profile = Profile::default();
        for _ in 0..5 {
            profile.add_shield();
        }
        assert_eq!(profile.shields, SHIELD_MAX);
        assert!(profile.shields_at_capacity());
    }

    #[test]
    fn stat_round_trips_wire_names() {
        for stat in Stat::ALL {
            let parsed: Stat = stat.as_str().parse().expect("known stat code");
            assert_eq!(parsed, stat);
        }
        assert!("AGI".parse::<Stat>().is_err());
    }
}
