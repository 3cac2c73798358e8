//! Centralized balance and tuning constants for Praxis engine logic.
//!
//! These values define the deterministic math for the progression loop.
//! Keeping them together ensures that balance can only be adjusted via
//! code changes reviewed in version control, rather than through external
//! JSON assets.

// Reward tables ------------------------------------------------------------
pub(crate) const REWARD_XP_EASY: i64 = 20;
pub(crate) const REWARD_XP_NORMAL: i64 = 35;
pub(crate) const REWARD_XP_HARD: i64 = 50;
pub(crate) const REWARD_GOLD_EASY: i64 = 10;
pub(crate) const REWARD_GOLD_NORMAL: i64 = 20;
pub(crate) const REWARD_GOLD_HARD: i64 = 30;

pub(crate) const MODE_FACTOR_EASY: f64 = 0.75;
pub(crate) const MODE_FACTOR_NORMAL: f64 = 1.0;
pub(crate) const MODE_FACTOR_HARD: f64 = 1.25;

pub(crate) const STAT_POINTS_EASY: f32 = 0.5;
pub(crate) const STAT_POINTS_NORMAL: f32 = 1.0;
pub(crate) const STAT_POINTS_HARD: f32 = 2.0;

// Crit thresholds: a single uniform roll per completion event.
pub(crate) const TASK_CRIT_THRESHOLD_HARD: f64 = 0.85;
pub(crate) const TASK_CRIT_THRESHOLD_NORMAL: f64 = 0.90;
pub(crate) const HABIT_CRIT_THRESHOLD: f64 = 0.95;
pub(crate) const CRIT_MULTIPLIER: i64 = 2;

pub(crate) const CAMPAIGN_XP_FACTOR: f64 = 1.1;
pub(crate) const SKILL_XP_SHARE: f64 = 0.5;
pub(crate) const RAID_COMPLETION_MULTIPLIER: i64 = 5;

// Failure penalties (deleting an incomplete, non-archived task) ------------
pub(crate) const PENALTY_XP_EASY: i64 = 10;
pub(crate) const PENALTY_XP_NORMAL: i64 = 20;
pub(crate) const PENALTY_XP_HARD: i64 = 40;
pub(crate) const PENALTY_GOLD_EASY: i64 = 5;
pub(crate) const PENALTY_GOLD_NORMAL: i64 = 10;
pub(crate) const PENALTY_GOLD_HARD: i64 = 20;
pub(crate) const PENALTY_STAT_EASY: f32 = 0.5;
pub(crate) const PENALTY_STAT_NORMAL: f32 = 1.0;
pub(crate) const PENALTY_STAT_HARD: f32 = 2.0;

// Honor ledger -------------------------------------------------------------
pub(crate) const HONOR_MAX: f32 = 100.0;
pub(crate) const HONOR_PENALTY_EASY: f32 = 5.0;
pub(crate) const HONOR_PENALTY_NORMAL: f32 = 10.0;
pub(crate) const HONOR_PENALTY_HARD: f32 = 20.0;

// Streak system ------------------------------------------------------------
pub(crate) const DAILY_TARGET_EASY: i64 = 300;
pub(crate) const DAILY_TARGET_NORMAL: i64 = 400;
pub(crate) const DAILY_TARGET_HARD: i64 = 500;
pub(crate) const SHIELD_MAX: u8 = 3;
pub(crate) const CONSECUTIVE_SHIELD_CAP: u8 = 3;
pub(crate) const DEFAULT_DAY_START_HOUR: u8 = 4;

// Level curves -------------------------------------------------------------
pub(crate) const PROFILE_BASE_TARGET_XP: i64 = 1_000;
pub(crate) const PROFILE_TARGET_GROWTH: f64 = 1.15;
pub(crate) const SKILL_BASE_TARGET_XP: i64 = 100;
pub(crate) const SKILL_TARGET_GROWTH: f64 = 1.25;
pub(crate) const SKILL_RUST_DAYS: i64 = 7;

// Skill rank thresholds (level at which the tier begins) -------------------
pub(crate) const RANK_ADEPT_LEVEL: u32 = 5;
pub(crate) const RANK_EXPERT_LEVEL: u32 = 10;
pub(crate) const RANK_MASTER_LEVEL: u32 = 20;
pub(crate) const RANK_GRANDMASTER_LEVEL: u32 = 30;

// Shop ---------------------------------------------------------------------
pub(crate) const PURCHASE_LOG_CAP: usize = 50;

// Persistence --------------------------------------------------------------
pub(crate) const FLUSH_DELAY_MS: i64 = 750;

// Entity id prefixes (update-in-place detection in injected payloads) ------
pub(crate) const TASK_ID_PREFIX: &str = "t_";
pub(crate) const HABIT_ID_PREFIX: &str = "h_";
pub(crate) const RAID_ID_PREFIX: &str = "rd_";
pub(crate) const RAID_STEP_ID_PREFIX: &str = "rs_";
pub(crate) const SUBTASK_ID_PREFIX: &str = "st_";
pub(crate) const SKILL_ID_PREFIX: &str = "sk_";
pub(crate) const LAW_ID_PREFIX: &str = "law_";
pub(crate) const CATEGORY_ID_PREFIX: &str = "cat_";
pub(crate) const PURCHASE_ID_PREFIX: &str = "pl_";
