//! Tasks, their categories, and the user-declared laws of the codex.
//!
//! The completion toggle here is the canonical mutation path: resolve the
//! reward against one snapshot of profile state, commit the deltas once,
//! and stash the granted amounts on the task so undo reverses exactly what
//! was granted — crit included.
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    PENALTY_GOLD_EASY, PENALTY_GOLD_HARD, PENALTY_GOLD_NORMAL, PENALTY_STAT_EASY,
    PENALTY_STAT_HARD, PENALTY_STAT_NORMAL, PENALTY_XP_EASY, PENALTY_XP_HARD, PENALTY_XP_NORMAL,
};
use crate::honor::{self, penalty_percent};
use crate::reward::{self, CompletionKind, GrantedReward, base_reward, roll_crit};
use crate::skill::SkillBook;
use crate::state::{Category, Difficulty, Profile, Reminder, Stat, Subtask};

/// A one-off mission. Toggles between complete and incomplete any number of
/// times; each direction is a full reward apply or reverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub stat: Stat,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_archived: bool,
    /// Campaign-linked tasks earn +10% xp.
    #[serde(default)]
    pub is_campaign: bool,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    /// What the last completion actually granted; reversed exactly on undo.
    #[serde(default)]
    pub granted: Option<GrantedReward>,
}

/// Penalty kind a law applies when broken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LawPenalty {
    Gold { value: i64 },
    Xp { value: i64 },
    Stat { target: Stat, value: f32 },
    Honor { value: f32 },
}

/// A self-imposed rule with a fixed cost for breaking it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Law {
    pub id: String,
    pub title: String,
    pub penalty: LawPenalty,
    #[serde(default)]
    pub times_broken: u32,
}

/// Tasks plus their categories and laws; persisted as one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskBook {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub laws: Vec<Law>,
}

/// What a completion toggle did, for the caller's presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    pub completed: bool,
    pub granted: GrantedReward,
    pub levels_gained: u32,
    pub skill_levels_gained: u32,
}

/// What deleting a task cost, if anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeleteOutcome {
    /// Task was complete or archived; removal is free.
    Clean,
    /// Failure penalty applied; carries the honor percent charged.
    Penalized { honor_percent: f32 },
}

impl TaskBook {
    #[must_use]
    pub fn find(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn find_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Toggle a task's completion, applying or reversing the full reward.
    /// Missing ids no-op (stale UI references are expected, not errors).
    pub fn toggle<R: Rng + ?Sized>(
        &mut self,
        task_id: &str,
        profile: &mut Profile,
        skills: &mut SkillBook,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<ToggleOutcome> {
        let task = self.tasks.iter_mut().find(|t| t.id == task_id)?;
        if task.is_completed {
            Some(undo_completion(task, profile, skills))
        } else {
            Some(apply_completion(task, profile, skills, rng, now))
        }
    }

    /// Delete a task. An incomplete, non-archived task is a failed
    /// obligation and costs the fixed penalty plus honor; completing or
    /// archiving first makes removal free.
    pub fn delete(
        &mut self,
        task_id: &str,
        profile: &mut Profile,
        today: NaiveDate,
    ) -> Option<DeleteOutcome> {
        let index = self.tasks.iter().position(|t| t.id == task_id)?;
        let task = self.tasks.remove(index);
        if task.is_completed || task.is_archived {
            return Some(DeleteOutcome::Clean);
        }

        let (xp, gold, stat_loss) = failure_penalty(task.difficulty);
        profile.remove_xp(xp);
        profile.remove_gold(gold);
        profile.stats.sub_clamped(task.stat, stat_loss);

        let percent = penalty_percent(task.difficulty);
        honor::penalize_profile(profile, today, percent);
        Some(DeleteOutcome::Penalized {
            honor_percent: percent,
        })
    }

    pub fn archive(&mut self, task_id: &str) {
        if let Some(task) = self.find_mut(task_id) {
            task.is_archived = true;
        }
    }

    pub fn restore(&mut self, task_id: &str) {
        if let Some(task) = self.find_mut(task_id) {
            task.is_archived = false;
        }
    }

    pub fn toggle_subtask(&mut self, task_id: &str, subtask_id: &str) {
        if let Some(task) = self.find_mut(task_id)
            && let Some(subtask) = task.subtasks.iter_mut().find(|s| s.id == subtask_id)
        {
            subtask.is_completed = !subtask.is_completed;
        }
    }

    pub fn move_to_category(&mut self, task_id: &str, category_id: Option<String>) {
        if let Some(task) = self.find_mut(task_id) {
            task.category_id = category_id;
        }
    }

    /// Remove a category; member tasks fall back to uncategorized.
    pub fn delete_category(&mut self, category_id: &str) {
        self.categories.retain(|c| c.id != category_id);
        for task in &mut self.tasks {
            if task.category_id.as_deref() == Some(category_id) {
                task.category_id = None;
            }
        }
    }

    /// Apply a broken law's penalty and bump its counter. All penalty kinds
    /// clamp at zero; the honor kind routes through the daily ledger.
    pub fn enforce_law(
        &mut self,
        law_id: &str,
        profile: &mut Profile,
        today: NaiveDate,
    ) -> Option<LawPenalty> {
        let law = self.laws.iter_mut().find(|l| l.id == law_id)?;
        law.times_broken = law.times_broken.saturating_add(1);
        let penalty = law.penalty.clone();
        match &penalty {
            LawPenalty::Gold { value } => profile.remove_gold(*value),
            LawPenalty::Xp { value } => profile.remove_xp(*value),
            LawPenalty::Stat { target, value } => profile.stats.sub_clamped(*target, *value),
            LawPenalty::Honor { value } => {
                honor::penalize_profile(profile, today, *value);
            }
        }
        Some(penalty)
    }

    pub fn update_law(&mut self, law_id: &str, title: Option<String>, penalty: Option<LawPenalty>) {
        if let Some(law) = self.laws.iter_mut().find(|l| l.id == law_id) {
            if let Some(title) = title {
                law.title = title;
            }
            if let Some(penalty) = penalty {
                law.penalty = penalty;
            }
        }
    }

    pub fn delete_law(&mut self, law_id: &str) {
        self.laws.retain(|l| l.id != law_id);
    }
}

fn apply_completion<R: Rng + ?Sized>(
    task: &mut Task,
    profile: &mut Profile,
    skills: &mut SkillBook,
    rng: &mut R,
    now: DateTime<Utc>,
) -> ToggleOutcome {
    let base = base_reward(task.difficulty, profile.current_mode);
    let crit = roll_crit(CompletionKind::Task, task.difficulty, rng);
    let mut granted = GrantedReward::compose(
        base,
        task.difficulty,
        task.stat,
        task.skill_id.clone(),
        task.is_campaign,
        crit,
    );
    // Rusty skills earn nothing from this completion; the practice itself
    // still clears the rust below.
    if let Some(skill_id) = &granted.skill_id
        && skills.find(skill_id).is_some_and(|s| s.is_rusty)
    {
        granted.skill_xp = 0;
    }

    let levels_gained = profile.add_xp(granted.xp);
    profile.add_gold(granted.gold);
    profile.stats.add(granted.stat, granted.stat_points);
    profile.metrics.total_tasks_completed = profile.metrics.total_tasks_completed.saturating_add(1);
    profile.metrics.tasks_by_difficulty.bump(task.difficulty);
    profile.metrics.total_xp_earned += granted.xp;
    profile.metrics.total_gold_earned += granted.gold;

    let skill_levels_gained = match &granted.skill_id {
        Some(skill_id) => skills.add_xp(skill_id, granted.skill_xp, now).levels_gained,
        None => 0,
    };

    task.is_completed = true;
    task.granted = Some(granted.clone());
    ToggleOutcome {
        completed: true,
        granted,
        levels_gained,
        skill_levels_gained,
    }
}

fn undo_completion(task: &mut Task, profile: &mut Profile, skills: &mut SkillBook) -> ToggleOutcome {
    // Pre-snapshot tasks fall back to the deterministic base reward; the
    // snapshot path reverses the real grant, crit included.
    let granted = task.granted.take().unwrap_or_else(|| {
        GrantedReward::compose(
            base_reward(task.difficulty, profile.current_mode),
            task.difficulty,
            task.stat,
            task.skill_id.clone(),
            task.is_campaign,
            false,
        )
    });

    reward::revoke(profile, &granted);
    profile.metrics.total_tasks_completed = profile.metrics.total_tasks_completed.saturating_sub(1);
    profile.metrics.tasks_by_difficulty.unbump(task.difficulty);
    profile.metrics.total_xp_earned = (profile.metrics.total_xp_earned - granted.xp).max(0);
    profile.metrics.total_gold_earned = (profile.metrics.total_gold_earned - granted.gold).max(0);

    if let Some(skill_id) = &granted.skill_id {
        skills.remove_xp(skill_id, granted.skill_xp);
    }

    task.is_completed = false;
    ToggleOutcome {
        completed: false,
        granted,
        levels_gained: 0,
        skill_levels_gained: 0,
    }
}

/// Fixed xp/gold/stat cost of abandoning a mission, by difficulty.
const fn failure_penalty(difficulty: Difficulty) -> (i64, i64, f32) {
    match difficulty {
        Difficulty::Easy => (PENALTY_XP_EASY, PENALTY_GOLD_EASY, PENALTY_STAT_EASY),
        Difficulty::Normal => (PENALTY_XP_NORMAL, PENALTY_GOLD_NORMAL, PENALTY_STAT_NORMAL),
        Difficulty::Hard => (PENALTY_XP_HARD, PENALTY_GOLD_HARD, PENALTY_STAT_HARD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn fixed_now() -> DateTime<Utc> {
        chrono::TimeZone::timestamp_opt(&Utc, 1_700_000_000, 0)
            .single()
            .expect("valid timestamp")
    }

    fn book_with(task: Task) -> TaskBook {
        TaskBook {
            tasks: vec![task],
            ..TaskBook::default()
        }
    }

    fn hard_task() -> Task {
        Task {
            id: String::from("t_1"),
            title: String::from("Forge ahead"),
            description: String::new(),
            difficulty: Difficulty::Hard,
            stat: Stat::Strength,
            skill_id: None,
            is_completed: false,
            is_archived: false,
            is_campaign: false,
            category_id: None,
            subtasks: Vec::new(),
            reminders: Vec::new(),
            deadline: None,
            scheduled_time: None,
            granted: None,
        }
    }

    /// Seed whose first task-crit draw stays under the hard threshold.
    fn non_crit_rng() -> SmallRng {
        let mut probe = SmallRng::seed_from_u64(11);
        let draw: f64 = probe.r#gen();
        assert!(draw <= 0.85, "seed no longer draws under threshold: {draw}");
        SmallRng::seed_from_u64(11)
    }

    #[test]
    fn complete_then_undo_restores_profile_exactly() {
        let mut book = book_with(hard_task());
        let mut profile = Profile::default();
        let mut skills = SkillBook::default();
        let before = profile.clone();
        let mut rng = non_crit_rng();

        let outcome = book
            .toggle("t_1", &mut profile, &mut skills, &mut rng, fixed_now())
            .expect("task exists");
        assert!(outcome.completed);
        assert_eq!(outcome.granted.xp, 50);
        assert_eq!(profile.gold, before.gold + 30);
        assert!((profile.stats.get(Stat::Strength) - before.stats.get(Stat::Strength) - 2.0).abs() <= f32::EPSILON);
        assert_eq!(profile.metrics.total_tasks_completed, 1);

        book.toggle("t_1", &mut profile, &mut skills, &mut rng, fixed_now())
            .expect("task exists");
        assert_eq!(profile, before);
        assert!(book.find("t_1").is_some_and(|t| t.granted.is_none()));
    }

    #[test]
    fn crit_undo_reverses_the_doubled_grant() {
        let mut book = book_with(hard_task());
        let mut profile = Profile::default();
        let mut skills = SkillBook::default();
        let before = profile.clone();

        // Find a seed whose first draw crits a hard task.
        let crit_seed = (0u64..)
            .find(|&seed| {
                let draw: f64 = SmallRng::seed_from_u64(seed).r#gen();
                draw > 0.85
            })
            .expect("some seed crits");
        let mut rng = SmallRng::seed_from_u64(crit_seed);

        let outcome = book
            .toggle("t_1", &mut profile, &mut skills, &mut rng, fixed_now())
            .expect("task exists");
        assert!(outcome.granted.crit);
        assert_eq!(outcome.granted.xp, 100);

        book.toggle("t_1", &mut profile, &mut skills, &mut rng, fixed_now())
            .expect("task exists");
        assert_eq!(profile, before);
    }

    #[test]
    fn toggle_missing_id_is_noop() {
        let mut book = TaskBook::default();
        let mut profile = Profile::default();
        let mut skills = SkillBook::default();
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(
            book.toggle("t_missing", &mut profile, &mut skills, &mut rng, fixed_now())
                .is_none()
        );
    }

    #[test]
    fn skill_linked_completion_feeds_half_xp() {
        let mut task = hard_task();
        task.skill_id = Some(String::from("sk_1"));
        let mut book = book_with(task);
        let mut profile = Profile::default();
        let mut skills = SkillBook::default();
        skills.skills.push(crate::skill::Skill::new(
            String::from("sk_1"),
            String::from("Smithing"),
            smallvec::SmallVec::new(),
            fixed_now(),
        ));
        let mut rng = non_crit_rng();

        let outcome = book
            .toggle("t_1", &mut profile, &mut skills, &mut rng, fixed_now())
            .expect("task exists");
        assert_eq!(outcome.granted.skill_xp, 25);
        assert_eq!(skills.find("sk_1").expect("skill").current_xp, 25);
    }

    #[test]
    fn rusty_skill_earns_nothing_but_wakes_up() {
        let mut task = hard_task();
        task.skill_id = Some(String::from("sk_1"));
        let mut book = book_with(task);
        let mut profile = Profile::default();
        let mut skills = SkillBook::default();
        let mut skill = crate::skill::Skill::new(
            String::from("sk_1"),
            String::from("Smithing"),
            smallvec::SmallVec::new(),
            fixed_now(),
        );
        skill.is_rusty = true;
        skills.skills.push(skill);
        let mut rng = non_crit_rng();

        let outcome = book
            .toggle("t_1", &mut profile, &mut skills, &mut rng, fixed_now())
            .expect("task exists");
        assert_eq!(outcome.granted.skill_xp, 0);
        let skill = skills.find("sk_1").expect("skill");
        assert!(!skill.is_rusty);
        assert_eq!(skill.current_xp, 0);
    }

    #[test]
    fn deleting_incomplete_task_applies_failure_penalty() {
        let mut book = book_with(hard_task());
        let mut profile = Profile::default();
        profile.add_xp(100);
        profile.add_gold(100);
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");

        let outcome = book.delete("t_1", &mut profile, today).expect("task exists");
        assert_eq!(
            outcome,
            DeleteOutcome::Penalized {
                honor_percent: 20.0
            }
        );
        assert_eq!(profile.current_xp, 60);
        assert_eq!(profile.gold, 80);
        assert!((profile.honor_daily_log["2024-06-15"] - 80.0).abs() <= f32::EPSILON);
        assert!(book.tasks.is_empty());
    }

    #[test]
    fn deleting_archived_task_is_free() {
        let mut task = hard_task();
        task.is_archived = true;
        let mut book = book_with(task);
        let mut profile = Profile::default();
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");

        let outcome = book.delete("t_1", &mut profile, today).expect("task exists");
        assert_eq!(outcome, DeleteOutcome::Clean);
        assert!(profile.honor_daily_log.is_empty());
    }

    #[test]
    fn law_enforcement_clamps_and_counts() {
        let mut book = TaskBook::default();
        book.laws.push(Law {
            id: String::from("law_1"),
            title: String::from("No doomscrolling"),
            penalty: LawPenalty::Gold { value: 500 },
            times_broken: 0,
        });
        let mut profile = Profile::default();
        profile.add_gold(100);
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");

        book.enforce_law("law_1", &mut profile, today).expect("law exists");
        assert_eq!(profile.gold, 0);
        assert_eq!(book.laws[0].times_broken, 1);
    }

    #[test]
    fn category_delete_uncategorizes_members() {
        let mut task = hard_task();
        task.category_id = Some(String::from("cat_work"));
        let mut book = book_with(task);
        book.categories.push(Category {
            id: String::from("cat_work"),
            title: String::from("Work"),
            is_collapsed: false,
        });

        book.delete_category("cat_work");
        assert!(book.categories.is_empty());
        assert!(book.tasks[0].category_id.is_none());
    }
}
