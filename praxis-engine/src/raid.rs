//! Raids: multi-phase operations with ordered, sequentially-unlocking steps.
//!
//! Steps inherit difficulty and stat from the raid through explicit
//! [`Attribute`] cells. Skill identity is never per-step: one raid feeds one
//! skill ledger, so the resolver always reads the raid's skill link and the
//! step model has no skill field to fragment it.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::attributes::Attribute;
use crate::constants::RAID_COMPLETION_MULTIPLIER;
use crate::reward::{self, GrantedReward, Reward, base_reward};
use crate::skill::SkillBook;
use crate::state::{Difficulty, Profile, Stat, Subtask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RaidStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidStep {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_completed: bool,
    /// Steps after index 0 start locked; completing step i unlocks i+1.
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default, skip_serializing_if = "Attribute::is_inherited")]
    pub difficulty: Attribute<Difficulty>,
    #[serde(default, skip_serializing_if = "Attribute::is_inherited")]
    pub stat: Attribute<Stat>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub granted: Option<GrantedReward>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raid {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Up to three stats; the first is what steps inherit.
    #[serde(default)]
    pub stats: SmallVec<[Stat; 3]>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub steps: Vec<RaidStep>,
    #[serde(default)]
    pub status: RaidStatus,
    /// 0-100, recomputed from completed steps on every toggle.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub is_campaign: bool,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// The x5 bonus actually granted when progress hit 100; reversed
    /// exactly when a completed raid loses a step.
    #[serde(default)]
    pub completion_bonus: Option<Reward>,
}

/// Resolved attributes a step acts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveAttributes {
    pub difficulty: Difficulty,
    pub stat: Stat,
    pub skill_id: Option<String>,
}

/// Resolve a step's effective difficulty, stat, and skill against its
/// parent raid. Pure; callable by any renderer that needs to distinguish
/// inherited from overridden badges.
#[must_use]
pub fn resolve_effective(step: &RaidStep, raid: &Raid) -> EffectiveAttributes {
    EffectiveAttributes {
        difficulty: step.difficulty.resolve(raid.difficulty),
        stat: step
            .stat
            .resolve(raid.stats.first().copied().unwrap_or_default()),
        skill_id: raid.skill_id.clone(),
    }
}

/// What toggling a step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub completed: bool,
    pub granted: GrantedReward,
    pub progress: u8,
    /// Set when this toggle pushed the raid to 100 and granted the bonus.
    pub bonus: Option<Reward>,
    /// Set when this toggle broke a completed raid and reversed the bonus.
    pub bonus_reversed: bool,
    pub levels_gained: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RaidBook {
    #[serde(default)]
    pub raids: Vec<Raid>,
}

impl Raid {
    /// Recompute progress as round(100 * completed / total). Empty raids
    /// count as zero progress.
    #[must_use]
    pub fn computed_progress(&self) -> u8 {
        if self.steps.is_empty() {
            return 0;
        }
        let completed = self.steps.iter().filter(|s| s.is_completed).count();
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
        {
            ((completed as f64 / self.steps.len() as f64) * 100.0).round() as u8
        }
    }
}

impl RaidBook {
    #[must_use]
    pub fn find(&self, raid_id: &str) -> Option<&Raid> {
        self.raids.iter().find(|r| r.id == raid_id)
    }

    pub fn find_mut(&mut self, raid_id: &str) -> Option<&mut Raid> {
        self.raids.iter_mut().find(|r| r.id == raid_id)
    }

    /// Toggle a step's completion. Completing grants the resolved reward,
    /// unlocks the immediately-following step, and pays the x5 completion
    /// bonus when progress reaches exactly 100. Un-completing mirrors every
    /// delta, including the stored bonus when the raid was complete.
    /// Missing ids no-op.
    pub fn toggle_step(
        &mut self,
        raid_id: &str,
        step_id: &str,
        profile: &mut Profile,
        skills: &mut SkillBook,
        now: DateTime<Utc>,
    ) -> Option<StepOutcome> {
        let raid = self.raids.iter_mut().find(|r| r.id == raid_id)?;
        let step_index = raid.steps.iter().position(|s| s.id == step_id)?;

        if raid.steps[step_index].is_completed {
            Some(undo_step(raid, step_index, profile, skills))
        } else {
            Some(complete_step(raid, step_index, profile, skills, now))
        }
    }

    pub fn archive(&mut self, raid_id: &str) {
        if let Some(raid) = self.find_mut(raid_id) {
            raid.status = RaidStatus::Archived;
        }
    }

    pub fn restore(&mut self, raid_id: &str) {
        if let Some(raid) = self.find_mut(raid_id) {
            raid.status = RaidStatus::Active;
        }
    }

    pub fn delete(&mut self, raid_id: &str) {
        self.raids.retain(|r| r.id != raid_id);
    }

    pub fn archive_step(&mut self, raid_id: &str, step_id: &str) {
        if let Some(raid) = self.find_mut(raid_id)
            && let Some(step) = raid.steps.iter_mut().find(|s| s.id == step_id)
        {
            step.is_archived = true;
        }
    }

    /// Remove a step outright and recompute progress. No rewards move;
    /// deleting is an edit, not a completion event.
    pub fn delete_step(&mut self, raid_id: &str, step_id: &str) {
        if let Some(raid) = self.find_mut(raid_id) {
            raid.steps.retain(|s| s.id != step_id);
            raid.progress = raid.computed_progress();
        }
    }

    pub fn toggle_step_subtask(&mut self, raid_id: &str, step_id: &str, subtask_id: &str) {
        if let Some(raid) = self.find_mut(raid_id)
            && let Some(step) = raid.steps.iter_mut().find(|s| s.id == step_id)
            && let Some(subtask) = step.subtasks.iter_mut().find(|s| s.id == subtask_id)
        {
            subtask.is_completed = !subtask.is_completed;
        }
    }
}

fn complete_step(
    raid: &mut Raid,
    step_index: usize,
    profile: &mut Profile,
    skills: &mut SkillBook,
    now: DateTime<Utc>,
) -> StepOutcome {
    let effective = resolve_effective(&raid.steps[step_index], raid);
    let base = base_reward(effective.difficulty, profile.current_mode);
    let mut granted = GrantedReward::compose(
        base,
        effective.difficulty,
        effective.stat,
        effective.skill_id,
        false,
        false,
    );
    if let Some(skill_id) = &granted.skill_id
        && skills.find(skill_id).is_some_and(|s| s.is_rusty)
    {
        granted.skill_xp = 0;
    }

    let mut levels_gained = profile.add_xp(granted.xp);
    profile.add_gold(granted.gold);
    profile.stats.add(granted.stat, granted.stat_points);
    if let Some(skill_id) = &granted.skill_id {
        skills.add_xp(skill_id, granted.skill_xp, now);
    }

    let step = &mut raid.steps[step_index];
    step.is_completed = true;
    step.granted = Some(granted.clone());
    // Only the immediately-following step unlocks; later steps stay gated
    // even if earlier ones get unchecked afterwards.
    if let Some(next) = raid.steps.get_mut(step_index + 1) {
        next.is_locked = false;
    }

    raid.progress = raid.computed_progress();
    let mut bonus = None;
    if raid.progress == 100 {
        let paid = Reward {
            xp: granted.xp * RAID_COMPLETION_MULTIPLIER,
            gold: granted.gold * RAID_COMPLETION_MULTIPLIER,
        };
        levels_gained += profile.add_xp(paid.xp);
        profile.add_gold(paid.gold);
        profile.metrics.total_raids_won = profile.metrics.total_raids_won.saturating_add(1);
        profile.metrics.raids_by_difficulty.bump(raid.difficulty);
        raid.status = RaidStatus::Completed;
        raid.completion_bonus = Some(paid);
        bonus = Some(paid);
    }

    StepOutcome {
        completed: true,
        granted,
        progress: raid.progress,
        bonus,
        bonus_reversed: false,
        levels_gained,
    }
}

fn undo_step(
    raid: &mut Raid,
    step_index: usize,
    profile: &mut Profile,
    skills: &mut SkillBook,
) -> StepOutcome {
    let was_completed_raid = raid.status == RaidStatus::Completed;
    let effective = resolve_effective(&raid.steps[step_index], raid);

    let step = &mut raid.steps[step_index];
    let granted = step.granted.take().unwrap_or_else(|| {
        GrantedReward::compose(
            base_reward(effective.difficulty, profile.current_mode),
            effective.difficulty,
            effective.stat,
            effective.skill_id,
            false,
            false,
        )
    });
    step.is_completed = false;

    reward::revoke(profile, &granted);
    if let Some(skill_id) = &granted.skill_id {
        skills.remove_xp(skill_id, granted.skill_xp);
    }

    let mut bonus_reversed = false;
    if was_completed_raid {
        // Reverse the exact bonus paid at completion time, regardless of
        // which step is being unchecked now.
        let paid = raid.completion_bonus.take().unwrap_or(Reward {
            xp: granted.xp * RAID_COMPLETION_MULTIPLIER,
            gold: granted.gold * RAID_COMPLETION_MULTIPLIER,
        });
        profile.remove_xp(paid.xp);
        profile.remove_gold(paid.gold);
        profile.metrics.total_raids_won = profile.metrics.total_raids_won.saturating_sub(1);
        profile.metrics.raids_by_difficulty.unbump(raid.difficulty);
        raid.status = RaidStatus::Active;
        bonus_reversed = true;
    }

    raid.progress = raid.computed_progress();
    StepOutcome {
        completed: false,
        granted,
        progress: raid.progress,
        bonus: None,
        bonus_reversed,
        levels_gained: 0,
    }
}
