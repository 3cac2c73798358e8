//! Session facade: one owner for the whole state tree.
//!
//! Sub-collections never reach into each other; every mutation resolves
//! its deltas against one snapshot of the profile and commits once. The
//! timer tick and the developer force-reset both funnel into the same
//! rollover processor, so the two paths cannot drift apart.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::rc::Rc;

use crate::badges::{BadgeDefinition, default_registry};
use crate::constants::{CATEGORY_ID_PREFIX, LAW_ID_PREFIX, SKILL_ID_PREFIX};
use crate::habit::{DailyStatus, HabitBook, HabitOutcome};
use crate::honor::day_key;
use crate::injector::{
    self, HabitDraft, InjectionPayload, InjectionSummary, RaidDraft, TaskDraft,
};
use crate::raid::{RaidBook, StepOutcome};
use crate::rng::{RngBundle, mint_id};
use crate::rollover::{RolloverDecision, process_day_boundary, virtual_date};
use crate::shop::{PurchaseOutcome, ShopState, default_stock};
use crate::skill::{Skill, SkillBook, SkillProgress};
use crate::state::{Category, Profile, Stat};
use crate::task::{DeleteOutcome, Law, LawPenalty, TaskBook, ToggleOutcome};

/// The authoritative state tree: profile plus the five sub-collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StateTree {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub tasks: TaskBook,
    #[serde(default)]
    pub habits: HabitBook,
    #[serde(default)]
    pub raids: RaidBook,
    #[serde(default)]
    pub skills: SkillBook,
    #[serde(default)]
    pub shop: ShopState,
}

/// Single-writer session over the state tree.
pub struct Session {
    pub state: StateTree,
    badge_registry: Vec<BadgeDefinition>,
    rng: Rc<RngBundle>,
}

impl Session {
    /// Fresh session with the built-in market and badge registry.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let state = StateTree {
            shop: ShopState {
                items: default_stock(),
            },
            ..StateTree::default()
        };
        Self::from_state(state, seed)
    }

    /// Resume a session from a loaded state tree.
    #[must_use]
    pub fn from_state(state: StateTree, seed: u64) -> Self {
        Self {
            state,
            badge_registry: default_registry(),
            rng: Rc::new(RngBundle::from_user_seed(seed)),
        }
    }

    /// The profile's current virtual day for "now".
    #[must_use]
    pub fn virtual_today(&self, now: DateTime<Utc>) -> NaiveDate {
        virtual_date(now, self.state.profile.preferences.day_start_hour)
    }

    // --- Task surface -----------------------------------------------------

    pub fn toggle_task_completion(
        &mut self,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Option<ToggleOutcome> {
        let mut rng = self.rng.task_crit();
        self.state.tasks.toggle(
            task_id,
            &mut self.state.profile,
            &mut self.state.skills,
            &mut *rng,
            now,
        )
    }

    pub fn delete_task(&mut self, task_id: &str, now: DateTime<Utc>) -> Option<DeleteOutcome> {
        self.state
            .tasks
            .delete(task_id, &mut self.state.profile, now.date_naive())
    }

    pub fn add_task(&mut self, draft: TaskDraft) -> String {
        let task = injector::instantiate_task(draft, &mut *self.rng.ids());
        let id = task.id.clone();
        self.state.tasks.tasks.insert(0, task);
        id
    }

    pub fn update_task(&mut self, task_id: &str, draft: &TaskDraft) {
        let mut rng = self.rng.ids();
        if let Some(task) = self.state.tasks.find_mut(task_id) {
            injector::patch_task(task, draft, &mut *rng);
        }
    }

    pub fn archive_task(&mut self, task_id: &str) {
        self.state.tasks.archive(task_id);
    }

    pub fn restore_task(&mut self, task_id: &str) {
        self.state.tasks.restore(task_id);
    }

    pub fn toggle_task_subtask(&mut self, task_id: &str, subtask_id: &str) {
        self.state.tasks.toggle_subtask(task_id, subtask_id);
    }

    pub fn add_task_category(&mut self, title: String) -> String {
        let id = mint_id(CATEGORY_ID_PREFIX, &mut *self.rng.ids());
        self.state.tasks.categories.push(Category {
            id: id.clone(),
            title,
            is_collapsed: false,
        });
        id
    }

    pub fn delete_task_category(&mut self, category_id: &str) {
        self.state.tasks.delete_category(category_id);
    }

    pub fn add_law(&mut self, title: String, penalty: LawPenalty) -> String {
        let id = mint_id(LAW_ID_PREFIX, &mut *self.rng.ids());
        self.state.tasks.laws.push(Law {
            id: id.clone(),
            title,
            penalty,
            times_broken: 0,
        });
        id
    }

    pub fn enforce_law(&mut self, law_id: &str, now: DateTime<Utc>) -> Option<LawPenalty> {
        self.state
            .tasks
            .enforce_law(law_id, &mut self.state.profile, now.date_naive())
    }

    pub fn update_law(
        &mut self,
        law_id: &str,
        title: Option<String>,
        penalty: Option<LawPenalty>,
    ) {
        self.state.tasks.update_law(law_id, title, penalty);
    }

    pub fn delete_law(&mut self, law_id: &str) {
        self.state.tasks.delete_law(law_id);
    }

    // --- Habit surface ----------------------------------------------------

    pub fn toggle_habit_status(
        &mut self,
        habit_id: &str,
        status: DailyStatus,
        now: DateTime<Utc>,
    ) -> Option<HabitOutcome> {
        let mut rng = self.rng.habit_crit();
        self.state.habits.process(
            habit_id,
            status,
            &mut self.state.profile,
            &mut self.state.skills,
            &mut *rng,
            now,
            now.date_naive(),
        )
    }

    pub fn add_habit(&mut self, draft: HabitDraft, now: DateTime<Utc>) -> String {
        let habit = injector::instantiate_habit(draft, &mut *self.rng.ids(), now);
        let id = habit.id.clone();
        self.state.habits.habits.push(habit);
        id
    }

    pub fn update_habit(&mut self, habit_id: &str, draft: &HabitDraft) {
        let mut rng = self.rng.ids();
        if let Some(habit) = self.state.habits.find_mut(habit_id) {
            injector::patch_habit(habit, draft, &mut *rng);
        }
    }

    pub fn delete_habit(&mut self, habit_id: &str) {
        self.state.habits.delete(habit_id);
    }

    pub fn toggle_habit_subtask(&mut self, habit_id: &str, subtask_id: &str) {
        self.state.habits.toggle_subtask(habit_id, subtask_id);
    }

    pub fn add_habit_category(&mut self, title: String) -> String {
        let id = mint_id(CATEGORY_ID_PREFIX, &mut *self.rng.ids());
        self.state.habits.categories.push(Category {
            id: id.clone(),
            title,
            is_collapsed: false,
        });
        id
    }

    pub fn delete_habit_category(&mut self, category_id: &str) {
        self.state.habits.delete_category(category_id);
    }

    // --- Raid surface -----------------------------------------------------

    pub fn toggle_raid_step(
        &mut self,
        raid_id: &str,
        step_id: &str,
        now: DateTime<Utc>,
    ) -> Option<StepOutcome> {
        self.state.raids.toggle_step(
            raid_id,
            step_id,
            &mut self.state.profile,
            &mut self.state.skills,
            now,
        )
    }

    pub fn add_raid(&mut self, draft: RaidDraft) -> String {
        let raid = injector::instantiate_raid(draft, &mut *self.rng.ids());
        let id = raid.id.clone();
        self.state.raids.raids.insert(0, raid);
        id
    }

    pub fn update_raid(&mut self, raid_id: &str, draft: &RaidDraft) {
        let mut rng = self.rng.ids();
        if let Some(raid) = self.state.raids.find_mut(raid_id) {
            injector::patch_raid(raid, draft, &mut *rng);
        }
    }

    pub fn archive_raid(&mut self, raid_id: &str) {
        self.state.raids.archive(raid_id);
    }

    pub fn restore_raid(&mut self, raid_id: &str) {
        self.state.raids.restore(raid_id);
    }

    pub fn delete_raid(&mut self, raid_id: &str) {
        self.state.raids.delete(raid_id);
    }

    pub fn delete_raid_step(&mut self, raid_id: &str, step_id: &str) {
        self.state.raids.delete_step(raid_id, step_id);
    }

    // --- Skill surface ----------------------------------------------------

    pub fn add_skill(
        &mut self,
        title: String,
        related_stats: &[Stat],
        now: DateTime<Utc>,
    ) -> String {
        let id = mint_id(SKILL_ID_PREFIX, &mut *self.rng.ids());
        self.state.skills.skills.push(Skill::new(
            id.clone(),
            title,
            SmallVec::from_slice(related_stats),
            now,
        ));
        id
    }

    pub fn add_skill_xp(
        &mut self,
        skill_id: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> SkillProgress {
        self.state.skills.add_xp(skill_id, amount, now)
    }

    /// Current rust state of a skill, `None` when the id is stale.
    #[must_use]
    pub fn check_is_rusty(&self, skill_id: &str, now: DateTime<Utc>) -> Option<bool> {
        self.state
            .skills
            .find(skill_id)
            .map(|skill| crate::skill::is_rusty(skill.last_practiced, now))
    }

    pub fn delete_skill(&mut self, skill_id: &str) {
        self.state.skills.delete(skill_id);
    }

    // --- Shop surface -----------------------------------------------------

    pub fn buy_item(&mut self, item_id: &str, now: DateTime<Utc>) -> Option<PurchaseOutcome> {
        let mut rng = self.rng.ids();
        self.state.shop.buy(
            item_id,
            &mut self.state.profile,
            now.date_naive(),
            now,
            &mut *rng,
        )
    }

    // --- Injection surface ------------------------------------------------

    /// Apply an external payload. Just another producer of the same
    /// mutation contract; nothing here is special-cased.
    pub fn apply_payload(
        &mut self,
        payload: InjectionPayload,
        now: DateTime<Utc>,
    ) -> InjectionSummary {
        let mut rng = self.rng.ids();
        injector::apply_payload(
            payload,
            &mut self.state.tasks,
            &mut self.state.habits,
            &mut self.state.raids,
            &mut self.state.skills,
            &mut self.state.shop,
            &mut *rng,
            now,
        )
    }

    // --- Day boundary -----------------------------------------------------

    /// Periodic poll tick: stamp presence, sweep skill rust, and run the
    /// day-boundary processor. Safe to call at any frequency; duplicate
    /// ticks after a rollover are no-ops.
    pub fn tick(&mut self, now: DateTime<Utc>) -> RolloverDecision {
        self.state.profile.last_online = now;
        self.state.skills.refresh_rust_all(now);
        process_day_boundary(
            &mut self.state.profile,
            &mut self.state.habits,
            &self.badge_registry,
            now,
        )
    }

    /// Developer force-reset: rewind the day cursor by one virtual day and
    /// run the identical rollover processor the timer uses. There is no
    /// simplified parallel path.
    pub fn force_daily_reset(&mut self, now: DateTime<Utc>) -> RolloverDecision {
        let yesterday = self.virtual_today(now) - chrono::Duration::days(1);
        self.state.profile.last_processed_day = Some(day_key(yesterday));
        process_day_boundary(
            &mut self.state.profile,
            &mut self.state.habits,
            &self.badge_registry,
            now,
        )
    }

    #[must_use]
    pub fn badge_registry(&self) -> &[BadgeDefinition] {
        &self.badge_registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollover::RolloverDecision;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn tick_and_force_reset_share_one_rollover_path() {
        let mut session = Session::new(42);
        let start = utc(2024, 6, 14, 12);
        assert_eq!(session.tick(start), RolloverDecision::FirstRun);

        // Same virtual day: nothing to do.
        assert_eq!(
            session.tick(utc(2024, 6, 14, 18)),
            RolloverDecision::AlreadyProcessed
        );

        // Force reset re-judges the day through the same processor.
        let forced = session.force_daily_reset(utc(2024, 6, 14, 18));
        assert!(matches!(forced, RolloverDecision::Applied(_)));

        // The natural next-day tick still works afterwards.
        let next = session.tick(utc(2024, 6, 15, 12));
        assert!(matches!(next, RolloverDecision::Applied(_)));
    }

    #[test]
    fn add_task_then_toggle_round_trips() {
        let mut session = Session::new(7);
        let now = utc(2024, 6, 14, 12);
        let id = session.add_task(TaskDraft {
            title: Some(String::from("Write tests")),
            ..TaskDraft::default()
        });

        let before = session.state.profile.clone();
        session
            .toggle_task_completion(&id, now)
            .expect("task exists");
        assert!(session.state.profile.current_xp > before.current_xp);
        session
            .toggle_task_completion(&id, now)
            .expect("task exists");
        assert_eq!(session.state.profile, before);
    }

    #[test]
    fn stale_ids_noop_across_the_surface() {
        let mut session = Session::new(7);
        let now = utc(2024, 6, 14, 12);
        assert!(session.toggle_task_completion("t_gone", now).is_none());
        assert!(session.delete_task("t_gone", now).is_none());
        assert!(
            session
                .toggle_habit_status("h_gone", DailyStatus::Completed, now)
                .is_none()
        );
        assert!(session.toggle_raid_step("rd_gone", "rs_gone", now).is_none());
        assert!(session.buy_item("item_gone", now).is_none());
        assert!(session.check_is_rusty("sk_gone", now).is_none());
    }

    #[test]
    fn daily_xp_accrues_toward_the_streak_target() {
        let mut session = Session::new(7);
        let now = utc(2024, 6, 14, 12);
        session.tick(now);

        let id = session.add_task(TaskDraft {
            title: Some(String::from("Big push")),
            difficulty: Some(crate::state::Difficulty::Hard),
            ..TaskDraft::default()
        });
        session
            .toggle_task_completion(&id, now)
            .expect("task exists");
        assert!(session.state.profile.daily_xp > 0);
    }
}
