//! External payload application: imported or machine-generated packs.
//!
//! An injected payload is just another producer of the same mutation
//! contract the UI forms use: entries whose id carries the collection's
//! known prefix update in place, everything else creates. Step-level skill
//! fields in raid payloads are not part of the step model and deserialize
//! into nothing, which is exactly the inheritance rule.
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::attributes::Attribute;
use crate::constants::{
    HABIT_ID_PREFIX, RAID_ID_PREFIX, RAID_STEP_ID_PREFIX, SKILL_ID_PREFIX, SUBTASK_ID_PREFIX,
    TASK_ID_PREFIX,
};
use crate::habit::{Habit, HabitBook, HabitSchedule};
use crate::raid::{Raid, RaidBook, RaidStatus, RaidStep};
use crate::rng::mint_id;
use crate::shop::{ShopState, StoreItem};
use crate::skill::{Skill, SkillBook};
use crate::state::{Difficulty, Stat, Subtask};
use crate::task::{Task, TaskBook};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PayloadMeta {
    #[serde(default)]
    pub pack_name: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SubtaskDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub stat: Option<Stat>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub is_campaign: Option<bool>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub subtasks: Option<Vec<SubtaskDraft>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HabitDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub stat: Option<Stat>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub schedule: Option<HabitSchedule>,
    #[serde(default)]
    pub daily_target: Option<u32>,
    #[serde(default)]
    pub subtasks: Option<Vec<SubtaskDraft>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub is_locked: Option<bool>,
    /// Per-step overrides; absent means inherit from the raid.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub stat: Option<Stat>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub subtasks: Option<Vec<SubtaskDraft>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RaidDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub stats: Option<Vec<Stat>>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub is_campaign: Option<bool>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub steps: Option<Vec<StepDraft>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SkillDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub related_stats: Option<Vec<Stat>>,
}

/// The documented payload shape external producers hand the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InjectionPayload {
    #[serde(default)]
    pub meta: PayloadMeta,
    #[serde(default)]
    pub tasks: Vec<TaskDraft>,
    #[serde(default)]
    pub habits: Vec<HabitDraft>,
    #[serde(default)]
    pub raids: Vec<RaidDraft>,
    #[serde(default)]
    pub skills: Vec<SkillDraft>,
    #[serde(default)]
    pub store_items: Vec<StoreItem>,
}

/// Per-collection counts of what a payload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InjectionSummary {
    pub tasks_created: u32,
    pub tasks_updated: u32,
    pub habits_created: u32,
    pub habits_updated: u32,
    pub raids_created: u32,
    pub raids_updated: u32,
    pub skills_created: u32,
    pub skills_updated: u32,
    pub store_items: u32,
}

/// Apply a payload through the normal add/update entry points.
#[allow(clippy::too_many_arguments)]
pub fn apply_payload<R: Rng + ?Sized>(
    payload: InjectionPayload,
    tasks: &mut TaskBook,
    habits: &mut HabitBook,
    raids: &mut RaidBook,
    skills: &mut SkillBook,
    shop: &mut ShopState,
    rng: &mut R,
    now: DateTime<Utc>,
) -> InjectionSummary {
    let mut summary = InjectionSummary::default();

    for draft in payload.tasks {
        let existing = draft
            .id
            .as_deref()
            .filter(|id| id.starts_with(TASK_ID_PREFIX))
            .and_then(|id| tasks.find_mut(id));
        if let Some(task) = existing {
            patch_task(task, &draft, rng);
            summary.tasks_updated += 1;
        } else {
            tasks.tasks.insert(0, instantiate_task(draft, rng));
            summary.tasks_created += 1;
        }
    }

    for draft in payload.habits {
        let existing = draft
            .id
            .as_deref()
            .filter(|id| id.starts_with(HABIT_ID_PREFIX))
            .and_then(|id| habits.find_mut(id));
        if let Some(habit) = existing {
            patch_habit(habit, &draft, rng);
            summary.habits_updated += 1;
        } else {
            habits.habits.push(instantiate_habit(draft, rng, now));
            summary.habits_created += 1;
        }
    }

    for draft in payload.raids {
        let existing = draft
            .id
            .as_deref()
            .filter(|id| id.starts_with(RAID_ID_PREFIX))
            .and_then(|id| raids.find_mut(id));
        if let Some(raid) = existing {
            patch_raid(raid, &draft, rng);
            summary.raids_updated += 1;
        } else {
            raids.raids.insert(0, instantiate_raid(draft, rng));
            summary.raids_created += 1;
        }
    }

    for draft in payload.skills {
        let existing = draft
            .id
            .as_deref()
            .filter(|id| id.starts_with(SKILL_ID_PREFIX))
            .and_then(|id| skills.find_mut(id));
        if let Some(skill) = existing {
            if let Some(title) = &draft.title {
                skill.title = title.clone();
            }
            if let Some(description) = &draft.description {
                skill.description = description.clone();
            }
            if let Some(stats) = &draft.related_stats {
                skill.related_stats = SmallVec::from_slice(stats);
            }
            summary.skills_updated += 1;
        } else {
            let id = mint_id(SKILL_ID_PREFIX, rng);
            let mut skill = Skill::new(
                id,
                draft.title.unwrap_or_else(|| String::from("Unnamed Skill")),
                draft
                    .related_stats
                    .map(|s| SmallVec::from_slice(&s))
                    .unwrap_or_default(),
                now,
            );
            if let Some(description) = draft.description {
                skill.description = description;
            }
            skills.skills.push(skill);
            summary.skills_created += 1;
        }
    }

    for item in payload.store_items {
        shop.upsert(item);
        summary.store_items += 1;
    }

    summary
}

fn hydrate_subtasks<R: Rng + ?Sized>(drafts: Vec<SubtaskDraft>, rng: &mut R) -> Vec<Subtask> {
    drafts
        .into_iter()
        .map(|draft| Subtask {
            id: draft
                .id
                .unwrap_or_else(|| mint_id(SUBTASK_ID_PREFIX, rng)),
            title: draft.title,
            is_completed: draft.is_completed,
        })
        .collect()
}

/// Build a full task from a draft, the same constructor the add-task form
/// runs through.
pub fn instantiate_task<R: Rng + ?Sized>(draft: TaskDraft, rng: &mut R) -> Task {
    Task {
        id: mint_id(TASK_ID_PREFIX, rng),
        title: draft.title.unwrap_or_else(|| String::from("Unnamed Mission")),
        description: draft.description.unwrap_or_default(),
        difficulty: draft.difficulty.unwrap_or_default(),
        stat: draft.stat.unwrap_or_default(),
        skill_id: draft.skill_id,
        is_completed: false,
        is_archived: false,
        is_campaign: draft.is_campaign.unwrap_or(false),
        category_id: draft.category_id,
        subtasks: hydrate_subtasks(draft.subtasks.unwrap_or_default(), rng),
        reminders: Vec::new(),
        deadline: draft.deadline,
        scheduled_time: None,
        granted: None,
    }
}

pub(crate) fn patch_task<R: Rng + ?Sized>(task: &mut Task, draft: &TaskDraft, rng: &mut R) {
    if let Some(title) = &draft.title {
        task.title = title.clone();
    }
    if let Some(description) = &draft.description {
        task.description = description.clone();
    }
    if let Some(difficulty) = draft.difficulty {
        task.difficulty = difficulty;
    }
    if let Some(stat) = draft.stat {
        task.stat = stat;
    }
    if draft.skill_id.is_some() {
        task.skill_id = draft.skill_id.clone();
    }
    if let Some(is_campaign) = draft.is_campaign {
        task.is_campaign = is_campaign;
    }
    if draft.deadline.is_some() {
        task.deadline = draft.deadline;
    }
    if let Some(subtasks) = &draft.subtasks {
        task.subtasks = hydrate_subtasks(subtasks.clone(), rng);
    }
}

/// Build a full habit from a draft.
pub fn instantiate_habit<R: Rng + ?Sized>(
    draft: HabitDraft,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Habit {
    Habit {
        id: mint_id(HABIT_ID_PREFIX, rng),
        title: draft.title.unwrap_or_else(|| String::from("Unnamed Protocol")),
        description: draft.description.unwrap_or_default(),
        difficulty: draft.difficulty.unwrap_or_default(),
        stat: draft.stat.unwrap_or_default(),
        skill_id: draft.skill_id,
        schedule: draft.schedule.unwrap_or_default(),
        streak: 0,
        best_streak: 0,
        history: Vec::new(),
        checkpoint: 0,
        status: crate::habit::DailyStatus::Pending,
        daily_target: draft.daily_target.unwrap_or(1).max(1),
        daily_progress: 0,
        subtasks: hydrate_subtasks(draft.subtasks.unwrap_or_default(), rng),
        reminders: Vec::new(),
        shield_used: false,
        category_id: None,
        created_at: now,
        granted: None,
    }
}

pub(crate) fn patch_habit<R: Rng + ?Sized>(habit: &mut Habit, draft: &HabitDraft, rng: &mut R) {
    if let Some(title) = &draft.title {
        habit.title = title.clone();
    }
    if let Some(description) = &draft.description {
        habit.description = description.clone();
    }
    if let Some(difficulty) = draft.difficulty {
        habit.difficulty = difficulty;
    }
    if let Some(stat) = draft.stat {
        habit.stat = stat;
    }
    if draft.skill_id.is_some() {
        habit.skill_id = draft.skill_id.clone();
    }
    if let Some(schedule) = &draft.schedule {
        habit.schedule = schedule.clone();
    }
    if let Some(target) = draft.daily_target {
        habit.daily_target = target.max(1);
    }
    if let Some(subtasks) = &draft.subtasks {
        habit.subtasks = hydrate_subtasks(subtasks.clone(), rng);
    }
}

fn hydrate_step<R: Rng + ?Sized>(draft: StepDraft, index: usize, rng: &mut R) -> RaidStep {
    RaidStep {
        id: draft
            .id
            .unwrap_or_else(|| mint_id(RAID_STEP_ID_PREFIX, rng)),
        title: draft.title.unwrap_or_else(|| String::from("Unnamed Phase")),
        notes: draft.notes.unwrap_or_default(),
        is_completed: draft.is_completed.unwrap_or(false),
        // Sequential gating by default: everything after the first step
        // starts locked unless the payload says otherwise.
        is_locked: draft.is_locked.unwrap_or(index > 0),
        is_archived: false,
        difficulty: Attribute::from(draft.difficulty),
        stat: Attribute::from(draft.stat),
        subtasks: hydrate_subtasks(draft.subtasks.unwrap_or_default(), rng),
        deadline: draft.deadline,
        granted: None,
    }
}

/// Build a full raid from a draft.
pub fn instantiate_raid<R: Rng + ?Sized>(draft: RaidDraft, rng: &mut R) -> Raid {
    let steps: Vec<RaidStep> = draft
        .steps
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, step)| hydrate_step(step, index, rng))
        .collect();
    let mut raid = Raid {
        id: mint_id(RAID_ID_PREFIX, rng),
        title: draft.title.unwrap_or_else(|| String::from("Unnamed Operation")),
        description: draft.description.unwrap_or_default(),
        difficulty: draft.difficulty.unwrap_or(Difficulty::Hard),
        stats: draft
            .stats
            .map(|s| SmallVec::from_slice(&s))
            .unwrap_or_default(),
        skill_id: draft.skill_id,
        steps,
        status: RaidStatus::Active,
        progress: 0,
        is_campaign: draft.is_campaign.unwrap_or(false),
        deadline: draft.deadline,
        completion_bonus: None,
    };
    raid.progress = raid.computed_progress();
    raid
}

pub(crate) fn patch_raid<R: Rng + ?Sized>(raid: &mut Raid, draft: &RaidDraft, rng: &mut R) {
    if let Some(title) = &draft.title {
        raid.title = title.clone();
    }
    if let Some(description) = &draft.description {
        raid.description = description.clone();
    }
    if let Some(difficulty) = draft.difficulty {
        raid.difficulty = difficulty;
    }
    if let Some(stats) = &draft.stats {
        raid.stats = SmallVec::from_slice(stats);
    }
    if draft.skill_id.is_some() {
        raid.skill_id = draft.skill_id.clone();
    }
    if let Some(is_campaign) = draft.is_campaign {
        raid.is_campaign = is_campaign;
    }
    if let Some(steps) = &draft.steps {
        merge_steps(raid, steps.clone(), rng);
    }
}

/// Merge step drafts into an existing raid: known ids update in place
/// (preserving completion unless the draft says otherwise), new ones
/// append with the usual gating.
fn merge_steps<R: Rng + ?Sized>(raid: &mut Raid, drafts: Vec<StepDraft>, rng: &mut R) {
    for draft in drafts {
        let existing = draft
            .id
            .as_deref()
            .and_then(|id| raid.steps.iter_mut().find(|s| s.id == id));
        if let Some(step) = existing {
            if let Some(title) = &draft.title {
                step.title = title.clone();
            }
            if let Some(notes) = &draft.notes {
                step.notes = notes.clone();
            }
            if let Some(is_completed) = draft.is_completed {
                step.is_completed = is_completed;
            }
            if let Some(difficulty) = draft.difficulty {
                step.difficulty = Attribute::Override(difficulty);
            }
            if let Some(stat) = draft.stat {
                step.stat = Attribute::Override(stat);
            }
            if let Some(subtasks) = &draft.subtasks {
                step.subtasks = hydrate_subtasks(subtasks.clone(), rng);
            }
        } else {
            let index = raid.steps.len();
            raid.steps.push(hydrate_step(draft, index, rng));
        }
    }
    raid.progress = raid.computed_progress();
}
