//! Honor ledger: a per-day score log with lazy perfect defaults.
//!
//! Days start at 100 and only get an entry when a penalty or redemption
//! touches them. The displayed honor is the average over the current
//! calendar month's elapsed days.
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::constants::{HONOR_MAX, HONOR_PENALTY_EASY, HONOR_PENALTY_HARD, HONOR_PENALTY_NORMAL};
use crate::state::Difficulty;

pub type HonorLog = BTreeMap<String, f32>;

/// Calendar day key, `YYYY-MM-DD`. Shared by the honor ledger and the
/// streak history so the two subsystems can never disagree on a day.
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Honor cost of failing an item, steepening with difficulty.
#[must_use]
pub const fn penalty_percent(difficulty: Difficulty) -> f32 {
    match difficulty {
        Difficulty::Easy => HONOR_PENALTY_EASY,
        Difficulty::Normal => HONOR_PENALTY_NORMAL,
        Difficulty::Hard => HONOR_PENALTY_HARD,
    }
}

/// Subtract `percent` from the day's score (lazily 100), floor 0. Returns
/// the new score for the day.
pub fn apply_daily_penalty(log: &mut HonorLog, day: &str, percent: f32) -> f32 {
    let current = log.get(day).copied().unwrap_or(HONOR_MAX);
    let next = (current - percent).max(0.0);
    log.insert(day.to_string(), next);
    next
}

/// Average score over the current month's days that have already occurred
/// by `reference`, counting unlogged days as perfect. Entries outside the
/// reference month are ignored.
#[must_use]
pub fn monthly_average(log: &HonorLog, reference: NaiveDate) -> f32 {
    let elapsed_days = reference.day();
    let mut sum = 0.0f32;
    for day in 1..=elapsed_days {
        let date = reference
            .with_day(day)
            .expect("day <= reference day is valid for the month");
        sum += log.get(&day_key(date)).copied().unwrap_or(HONOR_MAX);
    }
    #[allow(clippy::cast_precision_loss)]
    {
        sum / elapsed_days as f32
    }
}

/// Result of an honor redemption attempt. A perfect month is an expected,
/// reportable state, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Redemption {
    Redeemed { day: String, previous_score: f32 },
    AlreadyPerfect,
}

/// Restore the single worst day of the reference month to 100. Ties break
/// on the earliest date. No-op when nothing is below perfect.
pub fn redeem_lowest_score(log: &mut HonorLog, reference: NaiveDate) -> Redemption {
    let month_prefix = reference.format("%Y-%m-").to_string();
    let mut worst: Option<(String, f32)> = None;
    for (day, score) in log.iter() {
        if !day.starts_with(&month_prefix) || *score >= HONOR_MAX {
            continue;
        }
        // Strict comparison keeps the earliest day on ties; the map
        // iterates in ascending date order.
        if worst.as_ref().is_none_or(|(_, s)| *score < *s) {
            worst = Some((day.clone(), *score));
        }
    }
    match worst {
        Some((day, previous_score)) => {
            log.insert(day.clone(), HONOR_MAX);
            Redemption::Redeemed {
                day,
                previous_score,
            }
        }
        None => Redemption::AlreadyPerfect,
    }
}

/// Penalize the profile's honor for `date` and refresh the displayed
/// monthly average in one step. Returns the day's new score.
pub fn penalize_profile(profile: &mut crate::state::Profile, date: NaiveDate, percent: f32) -> f32 {
    let key = day_key(date);
    let score = apply_daily_penalty(&mut profile.honor_daily_log, &key, percent);
    profile.honor = monthly_average(&profile.honor_daily_log, date);
    score
}

/// Redeem the profile's worst day this month and refresh the average.
pub fn redeem_profile(profile: &mut crate::state::Profile, reference: NaiveDate) -> Redemption {
    let outcome = redeem_lowest_score(&mut profile.honor_daily_log, reference);
    if matches!(outcome, Redemption::Redeemed { .. }) {
        profile.honor = monthly_average(&profile.honor_daily_log, reference);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn penalty_curve_is_monotonic() {
        assert!(penalty_percent(Difficulty::Easy) < penalty_percent(Difficulty::Normal));
        assert!(penalty_percent(Difficulty::Normal) < penalty_percent(Difficulty::Hard));
    }

    #[test]
    fn penalties_stack_and_floor_at_zero() {
        let mut log = HonorLog::new();
        assert!((apply_daily_penalty(&mut log, "2024-06-10", 10.0) - 90.0).abs() <= f32::EPSILON);
        assert!((apply_daily_penalty(&mut log, "2024-06-10", 95.0)).abs() <= f32::EPSILON);
    }

    #[test]
    fn average_counts_unlogged_elapsed_days_as_perfect() {
        let mut log = HonorLog::new();
        apply_daily_penalty(&mut log, "2024-06-10", 10.0);
        apply_daily_penalty(&mut log, "2024-06-12", 10.0);

        // 13 implicit-perfect days plus two at 90, over 15 elapsed days.
        let average = monthly_average(&log, date(2024, 6, 15));
        let expected = (13.0 * 100.0 + 90.0 + 90.0) / 15.0;
        assert!((average - expected).abs() <= 1e-4);
    }

    #[test]
    fn average_ignores_other_months_and_future_days() {
        let mut log = HonorLog::new();
        apply_daily_penalty(&mut log, "2024-05-30", 50.0);
        apply_daily_penalty(&mut log, "2024-06-20", 50.0);

        // Reference mid-month: May's entry and June 20 are both out of range.
        let average = monthly_average(&log, date(2024, 6, 15));
        assert!((average - 100.0).abs() <= f32::EPSILON);
    }

    #[test]
    fn redeem_restores_single_worst_day_earliest_on_tie() {
        let mut log = HonorLog::new();
        apply_daily_penalty(&mut log, "2024-06-05", 20.0);
        apply_daily_penalty(&mut log, "2024-06-09", 20.0);
        apply_daily_penalty(&mut log, "2024-06-11", 10.0);

        let outcome = redeem_lowest_score(&mut log, date(2024, 6, 15));
        assert_eq!(
            outcome,
            Redemption::Redeemed {
                day: String::from("2024-06-05"),
                previous_score: 80.0,
            }
        );
        assert!((log["2024-06-05"] - 100.0).abs() <= f32::EPSILON);
        assert!((log["2024-06-09"] - 80.0).abs() <= f32::EPSILON);
    }

    #[test]
    fn redeem_twice_reports_already_perfect_second_time() {
        let mut log = HonorLog::new();
        apply_daily_penalty(&mut log, "2024-06-05", 20.0);

        assert!(matches!(
            redeem_lowest_score(&mut log, date(2024, 6, 15)),
            Redemption::Redeemed { .. }
        ));
        let snapshot = log.clone();
        assert_eq!(
            redeem_lowest_score(&mut log, date(2024, 6, 15)),
            Redemption::AlreadyPerfect
        );
        assert_eq!(log, snapshot);
    }
}
