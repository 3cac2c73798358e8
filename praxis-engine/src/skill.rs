//! Skill engine: XP curve, rank tiers, and rust decay.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::constants::{
    RANK_ADEPT_LEVEL, RANK_EXPERT_LEVEL, RANK_GRANDMASTER_LEVEL, RANK_MASTER_LEVEL,
    SKILL_BASE_TARGET_XP, SKILL_RUST_DAYS, SKILL_TARGET_GROWTH,
};
use crate::state::Stat;

/// Rank tier derived from level. Ordered; ranks never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum SkillRank {
    #[default]
    Novice,
    Adept,
    Expert,
    Master,
    Grandmaster,
}

impl SkillRank {
    #[must_use]
    pub const fn from_level(level: u32) -> Self {
        if level >= RANK_GRANDMASTER_LEVEL {
            Self::Grandmaster
        } else if level >= RANK_MASTER_LEVEL {
            Self::Master
        } else if level >= RANK_EXPERT_LEVEL {
            Self::Expert
        } else if level >= RANK_ADEPT_LEVEL {
            Self::Adept
        } else {
            Self::Novice
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Novice => "Novice",
            Self::Adept => "Adept",
            Self::Expert => "Expert",
            Self::Master => "Master",
            Self::Grandmaster => "Grandmaster",
        }
    }
}

impl fmt::Display for SkillRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A practiced discipline with its own XP ledger, linked from tasks, habits,
/// and raids by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub related_stats: SmallVec<[Stat; 3]>,
    #[serde(default = "default_skill_level")]
    pub level: u32,
    #[serde(default)]
    pub current_xp: i64,
    #[serde(default = "default_skill_target")]
    pub target_xp: i64,
    #[serde(default)]
    pub rank: SkillRank,
    pub last_practiced: DateTime<Utc>,
    #[serde(default)]
    pub is_rusty: bool,
    pub created_at: DateTime<Utc>,
}

const fn default_skill_level() -> u32 {
    1
}

const fn default_skill_target() -> i64 {
    SKILL_BASE_TARGET_XP
}

impl Skill {
    #[must_use]
    pub fn new(id: String, title: String, related_stats: SmallVec<[Stat; 3]>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            related_stats,
            level: 1,
            current_xp: 0,
            target_xp: next_level_xp(1),
            rank: SkillRank::Novice,
            last_practiced: now,
            is_rusty: false,
            created_at: now,
        }
    }
}

/// Target XP to clear the given level: round(100 * 1.25^(level-1)).
/// Strictly increasing, so consecutive targets always grow.
#[must_use]
pub fn next_level_xp(level: u32) -> i64 {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    {
        let exponent = level.saturating_sub(1);
        (SKILL_BASE_TARGET_XP as f64 * SKILL_TARGET_GROWTH.powi(exponent as i32)).round() as i64
    }
}

/// True once the skill has sat untouched past the inactivity window.
#[must_use]
pub fn is_rusty(last_practiced: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(last_practiced) > Duration::days(SKILL_RUST_DAYS)
}

/// What one XP grant did to a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkillProgress {
    pub levels_gained: u32,
    pub cleared_rust: bool,
}

/// Accrue XP into a skill and resolve level-ups in a loop (one large grant
/// can span several levels). Any practice, even a zero-XP maintenance
/// touch, clears rust and stamps `last_practiced`.
pub fn add_skill_xp(skill: &mut Skill, amount: i64, now: DateTime<Utc>) -> SkillProgress {
    let cleared_rust = skill.is_rusty;
    skill.is_rusty = false;
    skill.last_practiced = now;

    let mut levels_gained = 0u32;
    if amount > 0 {
        skill.current_xp += amount;
        while skill.current_xp >= skill.target_xp {
            skill.current_xp -= skill.target_xp;
            skill.level = skill.level.saturating_add(1);
            skill.target_xp = next_level_xp(skill.level);
            levels_gained += 1;
        }
        skill.rank = SkillRank::from_level(skill.level);
    }

    SkillProgress {
        levels_gained,
        cleared_rust,
    }
}

/// Reverse a skill XP grant without de-leveling; levels are a ratchet, so
/// only the in-level progress is clawed back.
pub fn remove_skill_xp(skill: &mut Skill, amount: i64) {
    if amount > 0 {
        skill.current_xp = (skill.current_xp - amount).max(0);
    }
}

/// Recompute the rust flag from the clock. Called by the periodic sweep.
pub fn refresh_rust(skill: &mut Skill, now: DateTime<Utc>) {
    skill.is_rusty = is_rusty(skill.last_practiced, now);
}

/// Collection of skills, one XP ledger per id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SkillBook {
    #[serde(default)]
    pub skills: Vec<Skill>,
}

impl SkillBook {
    #[must_use]
    pub fn find(&self, skill_id: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == skill_id)
    }

    pub fn find_mut(&mut self, skill_id: &str) -> Option<&mut Skill> {
        self.skills.iter_mut().find(|s| s.id == skill_id)
    }

    /// Grant XP to a linked skill. Missing ids no-op: links can go stale
    /// between render and action.
    pub fn add_xp(&mut self, skill_id: &str, amount: i64, now: DateTime<Utc>) -> SkillProgress {
        self.find_mut(skill_id)
            .map_or_else(SkillProgress::default, |skill| {
                add_skill_xp(skill, amount, now)
            })
    }

    pub fn remove_xp(&mut self, skill_id: &str, amount: i64) {
        if let Some(skill) = self.find_mut(skill_id) {
            remove_skill_xp(skill, amount);
        }
    }

    pub fn delete(&mut self, skill_id: &str) {
        self.skills.retain(|s| s.id != skill_id);
    }

    pub fn refresh_rust_all(&mut self, now: DateTime<Utc>) {
        for skill in &mut self.skills {
            refresh_rust(skill, now);
        }
    }
}
