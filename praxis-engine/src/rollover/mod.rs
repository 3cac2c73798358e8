//! Day-boundary processing: virtual-day detection, the streak guillotine,
//! and the habit daily reset, applied together exactly once per rollover.
//!
//! Every subsystem that needs "did the day roll over" semantics funnels
//! through [`virtual_date`]; there is deliberately no second, simplified
//! path, so the timer tick and the manual force-reset can never diverge.
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::badges::{BadgeAward, BadgeDefinition, evaluate};
use crate::constants::{CONSECUTIVE_SHIELD_CAP, HONOR_PENALTY_NORMAL};
use crate::habit::HabitBook;
use crate::honor::{self, day_key, monthly_average};
use crate::state::{Profile, StreakMark};

pub mod habits;
pub use habits::{HabitResetSummary, reset_habits};

/// Shift an instant back by the configured day-start hour and take its
/// calendar date. 2am with a 4am start still counts as "yesterday".
#[must_use]
pub fn virtual_date(instant: DateTime<Utc>, day_start_hour: u8) -> NaiveDate {
    (instant - Duration::hours(i64::from(day_start_hour))).date_naive()
}

/// Whether a new virtual day lies between two dates. Compares day-of-month
/// and month, not elapsed hours, so arbitrary reset hours and month
/// boundaries behave; the year is deliberately not consulted.
#[must_use]
pub fn is_new_virtual_day(last: NaiveDate, current: NaiveDate) -> bool {
    last.day() != current.day() || last.month() != current.month()
}

/// Everything one rollover application did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloverOutcome {
    /// Day key of the virtual day that was judged (yesterday).
    pub judged_day: String,
    pub streak_mark: StreakMark,
    pub streak: u32,
    pub habits: HabitSummary,
    #[serde(skip)]
    pub badge_awards: Vec<BadgeAward>,
}

/// Serializable mirror of [`HabitResetSummary`] carried in the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HabitSummary {
    pub completed: u32,
    pub failed: u32,
    pub graced: u32,
    pub shielded: u32,
    pub fell: u32,
}

impl From<HabitResetSummary> for HabitSummary {
    fn from(summary: HabitResetSummary) -> Self {
        Self {
            completed: summary.completed,
            failed: summary.failed,
            graced: summary.graced,
            shielded: summary.shielded,
            fell: summary.fell,
        }
    }
}

/// Result of a day-boundary check. Duplicate ticks after the rollover has
/// been applied are expected and must be no-ops.
#[derive(Debug, Clone, PartialEq)]
pub enum RolloverDecision {
    /// First boot: nothing to judge yet, the day cursor was initialized.
    FirstRun,
    /// The current virtual day was already processed.
    AlreadyProcessed,
    Applied(Box<RolloverOutcome>),
}

/// Run the day-boundary state machine against "now". Called by the
/// periodic tick and by the manual force-reset alike; idempotence comes
/// from comparing against the stored day cursor, never from counting timer
/// firings, so any number of missed days collapses into one application.
pub fn process_day_boundary(
    profile: &mut Profile,
    habits: &mut HabitBook,
    registry: &[BadgeDefinition],
    now: DateTime<Utc>,
) -> RolloverDecision {
    let today = virtual_date(now, profile.preferences.day_start_hour);
    let today_key = day_key(today);

    let Some(cursor) = profile.last_processed_day.clone() else {
        profile.last_processed_day = Some(today_key);
        return RolloverDecision::FirstRun;
    };
    let rolled = NaiveDate::parse_from_str(&cursor, "%Y-%m-%d")
        .map_or(true, |last| is_new_virtual_day(last, today));
    if !rolled {
        return RolloverDecision::AlreadyProcessed;
    }

    let yesterday = today - Duration::days(1);
    let judged_day = day_key(yesterday);

    let streak_mark = judge_streak_day(profile, yesterday);
    profile.streak_history.insert(judged_day.clone(), streak_mark);

    let habit_summary = reset_habits(habits, profile, yesterday);

    // Tomorrow's chosen mode takes effect; the day counters reset.
    profile.current_mode = profile.pending_mode;
    profile.daily_target = profile.current_mode.daily_target();
    profile.daily_xp = 0;
    profile.honor = monthly_average(&profile.honor_daily_log, today);
    profile.last_processed_day = Some(today_key);

    let badge_awards = evaluate(profile, registry, now);

    log::debug!(
        "rollover applied: judged {judged_day}, mark {streak_mark:?}, streak {}",
        profile.streak
    );

    RolloverDecision::Applied(Box::new(RolloverOutcome {
        judged_day,
        streak_mark,
        streak: profile.streak,
        habits: habit_summary.into(),
        badge_awards,
    }))
}

/// The guillotine: decide yesterday's fate from the daily XP counter.
fn judge_streak_day(profile: &mut Profile, yesterday: NaiveDate) -> StreakMark {
    if profile.daily_xp >= profile.daily_target {
        profile.streak = profile.streak.saturating_add(1);
        profile.consecutive_shields = 0;
        profile.metrics.highest_streak = profile.metrics.highest_streak.max(profile.streak);
        return StreakMark::Success;
    }

    // An idle day with no streak at risk neither penalizes nor spends.
    if profile.streak == 0 && profile.daily_xp == 0 {
        return StreakMark::Frozen;
    }

    if profile.shields > 0 && profile.consecutive_shields < CONSECUTIVE_SHIELD_CAP {
        profile.shields -= 1;
        profile.consecutive_shields += 1;
        profile.metrics.shields_used = profile.metrics.shields_used.saturating_add(1);
        return StreakMark::Shield;
    }

    profile.streak = 0;
    profile.consecutive_shields = 0;
    profile.metrics.resets_count = profile.metrics.resets_count.saturating_add(1);
    honor::penalize_profile(profile, yesterday, HONOR_PENALTY_NORMAL);
    StreakMark::Fail
}
