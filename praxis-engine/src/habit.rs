//! Recurring habits: schedules, multi-rep daily targets, and the
//! complete/fail processing path. The daily reset state machine lives in
//! `rollover::habits`; this module owns the entities and user actions.
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::honor::{self, day_key, penalty_percent};
use crate::reward::{CompletionKind, GrantedReward, base_reward, roll_crit};
use crate::skill::SkillBook;
use crate::state::{Category, Difficulty, Profile, Reminder, Stat, Subtask};

/// Daily status of a habit; resets to pending at every virtual-day rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DailyStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// When a habit expects to be acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HabitSchedule {
    #[default]
    Daily,
    /// Weekday numbers, 0 = Monday .. 6 = Sunday.
    SpecificDays { days: SmallVec<[u8; 7]> },
    /// Every N days, anchored on the habit's creation date.
    Interval { every_days: u32 },
    /// Repeating on/off cycle anchored on the creation date.
    Pattern { on_days: Vec<bool> },
}

impl HabitSchedule {
    /// Whether the habit expects action on `date`.
    #[must_use]
    pub fn is_active_on(&self, created: NaiveDate, date: NaiveDate) -> bool {
        match self {
            Self::Daily => true,
            Self::SpecificDays { days } => {
                let weekday = date.weekday().num_days_from_monday();
                days.iter().any(|d| u32::from(*d) == weekday)
            }
            Self::Interval { every_days } => {
                let every = (*every_days).max(1);
                let elapsed = date.signed_duration_since(created).num_days();
                elapsed >= 0 && elapsed.rem_euclid(i64::from(every)) == 0
            }
            Self::Pattern { on_days } => {
                if on_days.is_empty() {
                    return true;
                }
                let elapsed = date.signed_duration_since(created).num_days();
                if elapsed < 0 {
                    return false;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let index = (elapsed.rem_euclid(on_days.len() as i64)) as usize;
                on_days[index]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
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
    pub schedule: HabitSchedule,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    /// Day keys of full completions, at most one entry per day.
    #[serde(default)]
    pub history: Vec<String>,
    /// Streak value banked the last time a shield absorbed a miss.
    #[serde(default)]
    pub checkpoint: u32,
    #[serde(default)]
    pub status: DailyStatus,
    /// Reps required for one full completion (multi-rep habits).
    #[serde(default = "default_daily_target")]
    pub daily_target: u32,
    #[serde(default)]
    pub daily_progress: u32,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub shield_used: bool,
    #[serde(default)]
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// What today's completion actually granted.
    #[serde(default)]
    pub granted: Option<GrantedReward>,
}

const fn default_daily_target() -> u32 {
    1
}

/// Streak fall on a missed day: halve rather than reset, so a long streak
/// survives one bad day with bruises instead of dying.
#[must_use]
pub const fn streak_fall(streak: u32) -> u32 {
    streak / 2
}

/// What processing a habit action did.
#[derive(Debug, Clone, PartialEq)]
pub enum HabitOutcome {
    /// One more rep banked; target not yet hit.
    Progress { reps: u32, target: u32 },
    Completed {
        granted: GrantedReward,
        levels_gained: u32,
        skill_levels_gained: u32,
        new_streak: u32,
    },
    Failed {
        honor_percent: f32,
        new_streak: u32,
    },
}

/// Habits plus their categories; persisted as one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HabitBook {
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl HabitBook {
    #[must_use]
    pub fn find(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == habit_id)
    }

    pub fn find_mut(&mut self, habit_id: &str) -> Option<&mut Habit> {
        self.habits.iter_mut().find(|h| h.id == habit_id)
    }

    /// Process an explicit user action on a habit for today. Missing ids
    /// no-op. `Completed` on a multi-rep habit banks a rep until the target
    /// is hit; the final rep triggers the full completion path.
    pub fn process<R: Rng + ?Sized>(
        &mut self,
        habit_id: &str,
        status: DailyStatus,
        profile: &mut Profile,
        skills: &mut SkillBook,
        rng: &mut R,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Option<HabitOutcome> {
        let habit = self.habits.iter_mut().find(|h| h.id == habit_id)?;
        match status {
            DailyStatus::Completed => {
                if habit.daily_target > 1 && habit.daily_progress + 1 < habit.daily_target {
                    habit.daily_progress += 1;
                    return Some(HabitOutcome::Progress {
                        reps: habit.daily_progress,
                        target: habit.daily_target,
                    });
                }
                Some(complete_habit(habit, profile, skills, rng, now, today))
            }
            DailyStatus::Failed => Some(fail_habit(habit, profile, today)),
            DailyStatus::Pending => None,
        }
    }

    pub fn toggle_subtask(&mut self, habit_id: &str, subtask_id: &str) {
        if let Some(habit) = self.find_mut(habit_id)
            && let Some(subtask) = habit.subtasks.iter_mut().find(|s| s.id == subtask_id)
        {
            subtask.is_completed = !subtask.is_completed;
        }
    }

    pub fn delete(&mut self, habit_id: &str) {
        self.habits.retain(|h| h.id != habit_id);
    }

    pub fn move_to_category(&mut self, habit_id: &str, category_id: Option<String>) {
        if let Some(habit) = self.find_mut(habit_id) {
            habit.category_id = category_id;
        }
    }

    pub fn delete_category(&mut self, category_id: &str) {
        self.categories.retain(|c| c.id != category_id);
        for habit in &mut self.habits {
            if habit.category_id.as_deref() == Some(category_id) {
                habit.category_id = None;
            }
        }
    }
}

fn complete_habit<R: Rng + ?Sized>(
    habit: &mut Habit,
    profile: &mut Profile,
    skills: &mut SkillBook,
    rng: &mut R,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> HabitOutcome {
    habit.streak += 1;
    habit.best_streak = habit.best_streak.max(habit.streak);
    let key = day_key(today);
    if !habit.history.contains(&key) {
        habit.history.push(key);
    }

    let base = base_reward(habit.difficulty, profile.current_mode);
    let crit = roll_crit(CompletionKind::Habit, habit.difficulty, rng);
    let mut granted = GrantedReward::compose(
        base,
        habit.difficulty,
        habit.stat,
        habit.skill_id.clone(),
        false,
        crit,
    );
    if let Some(skill_id) = &granted.skill_id
        && skills.find(skill_id).is_some_and(|s| s.is_rusty)
    {
        granted.skill_xp = 0;
    }

    let levels_gained = profile.add_xp(granted.xp);
    profile.add_gold(granted.gold);
    profile.stats.add(granted.stat, granted.stat_points);
    profile.metrics.habits_fixed = profile.metrics.habits_fixed.saturating_add(1);
    profile.metrics.total_xp_earned += granted.xp;
    profile.metrics.total_gold_earned += granted.gold;

    let skill_levels_gained = match &granted.skill_id {
        Some(skill_id) => skills.add_xp(skill_id, granted.skill_xp, now).levels_gained,
        None => 0,
    };

    habit.status = DailyStatus::Completed;
    habit.daily_progress = habit.daily_target;
    habit.granted = Some(granted.clone());
    HabitOutcome::Completed {
        granted,
        levels_gained,
        skill_levels_gained,
        new_streak: habit.streak,
    }
}

fn fail_habit(habit: &mut Habit, profile: &mut Profile, today: NaiveDate) -> HabitOutcome {
    habit.streak = streak_fall(habit.streak);
    habit.status = DailyStatus::Failed;

    let percent = penalty_percent(habit.difficulty);
    honor::penalize_profile(profile, today, percent);
    HabitOutcome::Failed {
        honor_percent: percent,
        new_streak: habit.streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("valid timestamp")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn daily_habit() -> Habit {
        Habit {
            id: String::from("h_1"),
            title: String::from("Morning pages"),
            description: String::new(),
            difficulty: Difficulty::Normal,
            stat: Stat::Discipline,
            skill_id: None,
            schedule: HabitSchedule::Daily,
            streak: 0,
            best_streak: 0,
            history: Vec::new(),
            checkpoint: 0,
            status: DailyStatus::Pending,
            daily_target: 1,
            daily_progress: 0,
            subtasks: Vec::new(),
            reminders: Vec::new(),
            shield_used: false,
            category_id: None,
            created_at: fixed_now(),
            granted: None,
        }
    }

    /// Seed whose first habit-crit draw stays under 0.95.
    fn non_crit_rng() -> SmallRng {
        let mut probe = SmallRng::seed_from_u64(3);
        let draw: f64 = probe.r#gen();
        assert!(draw <= 0.95, "seed no longer draws under threshold: {draw}");
        SmallRng::seed_from_u64(3)
    }

    #[test]
    fn completion_advances_streak_and_logs_history_once() {
        let mut book = HabitBook {
            habits: vec![daily_habit()],
            ..HabitBook::default()
        };
        let mut profile = Profile::default();
        let mut skills = SkillBook::default();
        let mut rng = non_crit_rng();
        let today = date(2024, 6, 15);

        let outcome = book
            .process(
                "h_1",
                DailyStatus::Completed,
                &mut profile,
                &mut skills,
                &mut rng,
                fixed_now(),
                today,
            )
            .expect("habit exists");
        let HabitOutcome::Completed { new_streak, .. } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(new_streak, 1);
        let habit = book.find("h_1").expect("habit");
        assert_eq!(habit.history, vec![String::from("2024-06-15")]);
        assert_eq!(habit.best_streak, 1);
        assert_eq!(profile.metrics.habits_fixed, 1);
    }

    #[test]
    fn multi_rep_habit_banks_reps_before_completing() {
        let mut habit = daily_habit();
        habit.daily_target = 3;
        let mut book = HabitBook {
            habits: vec![habit],
            ..HabitBook::default()
        };
        let mut profile = Profile::default();
        let mut skills = SkillBook::default();
        let mut rng = non_crit_rng();
        let today = date(2024, 6, 15);

        for expected in 1..=2u32 {
            let outcome = book
                .process(
                    "h_1",
                    DailyStatus::Completed,
                    &mut profile,
                    &mut skills,
                    &mut rng,
                    fixed_now(),
                    today,
                )
                .expect("habit exists");
            assert_eq!(
                outcome,
                HabitOutcome::Progress {
                    reps: expected,
                    target: 3
                }
            );
        }
        assert_eq!(profile.metrics.habits_fixed, 0);

        let outcome = book
            .process(
                "h_1",
                DailyStatus::Completed,
                &mut profile,
                &mut skills,
                &mut rng,
                fixed_now(),
                today,
            )
            .expect("habit exists");
        assert!(matches!(outcome, HabitOutcome::Completed { .. }));
        let habit = book.find("h_1").expect("habit");
        assert_eq!(habit.daily_progress, 3);
        assert_eq!(habit.status, DailyStatus::Completed);
    }

    #[test]
    fn explicit_failure_halves_streak_and_dings_honor() {
        let mut habit = daily_habit();
        habit.streak = 9;
        let mut book = HabitBook {
            habits: vec![habit],
            ..HabitBook::default()
        };
        let mut profile = Profile::default();
        let mut skills = SkillBook::default();
        let mut rng = non_crit_rng();
        let today = date(2024, 6, 15);

        let outcome = book
            .process(
                "h_1",
                DailyStatus::Failed,
                &mut profile,
                &mut skills,
                &mut rng,
                fixed_now(),
                today,
            )
            .expect("habit exists");
        assert_eq!(
            outcome,
            HabitOutcome::Failed {
                honor_percent: 10.0,
                new_streak: 4
            }
        );
        assert!((profile.honor_daily_log["2024-06-15"] - 90.0).abs() <= f32::EPSILON);
    }

    #[test]
    fn schedule_specific_days_matches_weekday() {
        let schedule = HabitSchedule::SpecificDays {
            days: SmallVec::from_slice(&[0, 4]), // Monday, Friday
        };
        let created = date(2024, 6, 1);
        assert!(schedule.is_active_on(created, date(2024, 6, 10))); // Monday
        assert!(schedule.is_active_on(created, date(2024, 6, 14))); // Friday
        assert!(!schedule.is_active_on(created, date(2024, 6, 12))); // Wednesday
    }

    #[test]
    fn schedule_interval_anchors_on_creation() {
        let schedule = HabitSchedule::Interval { every_days: 3 };
        let created = date(2024, 6, 1);
        assert!(schedule.is_active_on(created, date(2024, 6, 1)));
        assert!(!schedule.is_active_on(created, date(2024, 6, 2)));
        assert!(schedule.is_active_on(created, date(2024, 6, 4)));
        assert!(schedule.is_active_on(created, date(2024, 6, 7)));
    }

    #[test]
    fn schedule_pattern_cycles() {
        let schedule = HabitSchedule::Pattern {
            on_days: vec![true, false],
        };
        let created = date(2024, 6, 1);
        assert!(schedule.is_active_on(created, date(2024, 6, 1)));
        assert!(!schedule.is_active_on(created, date(2024, 6, 2)));
        assert!(schedule.is_active_on(created, date(2024, 6, 3)));
    }

    #[test]
    fn streak_fall_is_saturating() {
        assert_eq!(streak_fall(0), 0);
        assert_eq!(streak_fall(1), 0);
        assert_eq!(streak_fall(10), 5);
    }
}
