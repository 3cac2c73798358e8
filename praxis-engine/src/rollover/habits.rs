//! Per-habit daily reset, applied once per virtual-day rollover.
//!
//! Precedence per habit: acted-on habits simply reset; an untouched but
//! schedule-active habit is saved by partial progress, then by a shield,
//! and only then takes the streak fall and stat penalty.
use chrono::NaiveDate;

use crate::habit::{DailyStatus, Habit, HabitBook, streak_fall};
use crate::honor::day_key;
use crate::state::{Profile, Stat};

/// Tally of what one rollover did across the habit board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HabitResetSummary {
    /// Habits that were completed yesterday and went back to pending.
    pub completed: u32,
    /// Habits that were explicitly failed yesterday.
    pub failed: u32,
    /// Untouched habits saved by partial progress (rest day).
    pub graced: u32,
    /// Untouched habits saved by consuming a shield.
    pub shielded: u32,
    /// Untouched habits that took the streak fall and stat penalty.
    pub fell: u32,
}

/// Reset every habit for the new virtual day, judging `yesterday`.
/// All habits are processed in one batch; shields drain in board order.
pub fn reset_habits(
    book: &mut HabitBook,
    profile: &mut Profile,
    yesterday: NaiveDate,
) -> HabitResetSummary {
    let mut summary = HabitResetSummary::default();
    let yesterday_key = day_key(yesterday);

    for habit in &mut book.habits {
        match habit.status {
            DailyStatus::Completed => {
                summary.completed += 1;
                if !habit.history.contains(&yesterday_key) {
                    habit.history.push(yesterday_key.clone());
                }
                base_reset(habit);
            }
            DailyStatus::Failed => {
                summary.failed += 1;
                base_reset(habit);
            }
            DailyStatus::Pending => {
                let was_active = habit
                    .schedule
                    .is_active_on(habit.created_at.date_naive(), yesterday);
                if !was_active {
                    base_reset(habit);
                    continue;
                }

                if habit.daily_progress > 0 {
                    // Partial effort is a rest day, not neglect: no
                    // penalty, no shield spent.
                    summary.graced += 1;
                    base_reset(habit);
                } else if profile.shields > 0 {
                    profile.shields -= 1;
                    profile.metrics.shields_used =
                        profile.metrics.shields_used.saturating_add(1);
                    summary.shielded += 1;
                    habit.checkpoint = habit.streak;
                    base_reset(habit);
                    habit.shield_used = true;
                } else {
                    summary.fell += 1;
                    habit.streak = streak_fall(habit.streak);
                    profile.stats.sub_clamped(habit.stat, 1.0);
                    profile.stats.sub_clamped(Stat::Discipline, 1.0);
                    base_reset(habit);
                }
            }
        }
    }

    summary
}

/// The unconditional part of every branch: back to pending, progress and
/// daily plumbing cleared.
fn base_reset(habit: &mut Habit) {
    habit.status = DailyStatus::Pending;
    habit.daily_progress = 0;
    habit.shield_used = false;
    habit.granted = None;
    for reminder in &mut habit.reminders {
        reminder.is_sent = false;
    }
    for subtask in &mut habit.subtasks {
        subtask.is_completed = false;
    }
}
