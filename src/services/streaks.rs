use chrono::NaiveDate;
use serde::Serialize;

use super::schedule::{is_scheduled_day, Schedule};

/// How far back the walk looks. Streaks longer than this are capped.
pub const DEFAULT_HORIZON_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakResult {
    pub current: u32,
    pub best: u32,
}

/// Fixed-horizon shorthand; the service always passes its configured horizon.
#[cfg(test)]
pub fn calculate_streak(schedule: &Schedule, completions: &[NaiveDate], today: NaiveDate) -> StreakResult {
    calculate_streak_with_horizon(schedule, completions, today, DEFAULT_HORIZON_DAYS)
}

/// Walks backward from `today` over `horizon_days` calendar days.
///
/// Unscheduled days are skipped. A scheduled day is credited when a
/// completion falls on it; each completion is credited once. A scheduled but
/// still pending `today` fixes `current` at 0. Past that, `current` is fixed
/// by the first miss that ends a nonzero run; misses before any run (say a
/// Friday missed, seen from Saturday) only reset the counter.
pub fn calculate_streak_with_horizon(
    schedule: &Schedule,
    completions: &[NaiveDate],
    today: NaiveDate,
    horizon_days: u32,
) -> StreakResult {
    let mut dates = completions.to_vec();
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();

    let mut current: Option<u32> = None;
    let mut best = 0u32;
    let mut streak = 0u32;
    let mut cursor = 0usize;
    let mut day = today;

    for offset in 0..horizon_days {
        if offset > 0 {
            day = match day.pred_opt() {
                Some(prev) => prev,
                None => break,
            };
        }

        if !is_scheduled_day(schedule, day) {
            continue;
        }

        // Entries newer than `day` can never match again.
        while cursor < dates.len() && dates[cursor] > day {
            cursor += 1;
        }

        if dates.get(cursor) == Some(&day) {
            cursor += 1;
            streak += 1;
            best = best.max(streak);
        } else {
            if offset == 0 || streak > 0 {
                current.get_or_insert(streak);
            }
            streak = 0;
        }
    }

    StreakResult {
        current: current.unwrap_or(streak),
        best,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn days_back(today: NaiveDate, offsets: impl IntoIterator<Item = i64>) -> Vec<NaiveDate> {
        offsets
            .into_iter()
            .map(|o| today - Duration::days(o))
            .collect()
    }

    // Friday
    fn friday() -> NaiveDate {
        date(2026, 10, 16)
    }

    #[test]
    fn test_empty_history_is_zero_for_every_schedule() {
        for schedule in [
            Schedule::daily(),
            Schedule::weekdays(),
            Schedule::custom(vec![2, 4]),
            Schedule::custom(Vec::new()),
        ] {
            assert_eq!(calculate_streak(&schedule, &[], friday()), StreakResult::default());
        }
    }

    #[test]
    fn test_daily_consecutive_including_today() {
        let today = friday();
        let completions = days_back(today, 0..6);
        let result = calculate_streak(&Schedule::daily(), &completions, today);
        assert_eq!(result, StreakResult { current: 6, best: 6 });
    }

    #[test]
    fn test_daily_streak_that_ended_two_days_ago() {
        let today = friday();
        let completions = days_back(today, 2..=5);
        let result = calculate_streak(&Schedule::daily(), &completions, today);
        assert_eq!(result, StreakResult { current: 0, best: 4 });
    }

    #[test]
    fn test_pending_today_reports_zero_current_but_keeps_best() {
        let today = friday();
        let completions = days_back(today, 1..=3);
        let result = calculate_streak(&Schedule::daily(), &completions, today);
        assert_eq!(result, StreakResult { current: 0, best: 3 });
    }

    #[test]
    fn test_current_is_most_recent_run_not_the_longest() {
        let today = friday();
        // run of 2 ending today, gap at 2, run of 5 before it
        let mut completions = days_back(today, 0..2);
        completions.extend(days_back(today, 3..8));
        let result = calculate_streak(&Schedule::daily(), &completions, today);
        assert_eq!(result, StreakResult { current: 2, best: 5 });
    }

    #[test]
    fn test_weekdays_ten_business_days() {
        let today = friday();
        // Mon 2026-10-05 .. Fri 2026-10-16, weekends skipped
        let completions: Vec<_> =
            crate::services::schedule::scheduled_dates_between(&Schedule::weekdays(), date(2026, 10, 5), today)
                .collect();
        assert_eq!(completions.len(), 10);
        let result = calculate_streak(&Schedule::weekdays(), &completions, today);
        assert_eq!(result, StreakResult { current: 10, best: 10 });
    }

    #[test]
    fn test_weekend_does_not_break_weekday_streak() {
        // Monday, with Friday and Thursday completed
        let today = date(2026, 10, 19);
        let completions = vec![today, date(2026, 10, 16), date(2026, 10, 15)];
        let result = calculate_streak(&Schedule::weekdays(), &completions, today);
        assert_eq!(result, StreakResult { current: 3, best: 3 });
    }

    #[test]
    fn test_custom_mon_wed_fri_ignores_tuesday() {
        let today = friday();
        let schedule = Schedule::custom(vec![1, 3, 5]);
        let completions = vec![date(2026, 10, 16), date(2026, 10, 14), date(2026, 10, 12)];
        let baseline = calculate_streak(&schedule, &completions, today);
        assert_eq!(baseline, StreakResult { current: 3, best: 3 });

        let mut with_tuesday = completions.clone();
        with_tuesday.push(date(2026, 10, 13));
        assert_eq!(calculate_streak(&schedule, &with_tuesday, today), baseline);
    }

    #[test]
    fn test_duplicate_completions_are_idempotent() {
        let today = friday();
        let once = days_back(today, 0..4);
        let mut twice = once.clone();
        twice.extend(once.iter().copied());
        twice.push(today);
        let schedule = Schedule::daily();
        assert_eq!(calculate_streak(&schedule, &twice, today), calculate_streak(&schedule, &once, today));
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let today = friday();
        let mut completions = days_back(today, [3, 0, 1, 5, 4]);
        let forward = calculate_streak(&Schedule::daily(), &completions, today);
        completions.reverse();
        assert_eq!(calculate_streak(&Schedule::daily(), &completions, today), forward);
        assert_eq!(forward, StreakResult { current: 2, best: 3 });
    }

    #[test]
    fn test_future_completions_are_ignored() {
        let today = friday();
        let mut completions = days_back(today, 0..3);
        completions.push(today + Duration::days(1));
        let result = calculate_streak(&Schedule::daily(), &completions, today);
        assert_eq!(result, StreakResult { current: 3, best: 3 });
    }

    #[test]
    fn test_missed_last_scheduled_day_when_today_is_off() {
        // Saturday; Friday missed, Wednesday and Thursday completed
        let today = date(2026, 10, 17);
        let completions = vec![date(2026, 10, 15), date(2026, 10, 14)];
        let result = calculate_streak(&Schedule::weekdays(), &completions, today);
        assert_eq!(result, StreakResult { current: 2, best: 2 });
    }

    #[test]
    fn test_custom_missed_wednesday_seen_from_thursday() {
        // Thursday; Wednesday missed, Monday and the previous Friday completed
        let today = date(2026, 10, 15);
        let completions = vec![date(2026, 10, 12), date(2026, 10, 9)];
        let result = calculate_streak(&Schedule::custom(vec![1, 3, 5]), &completions, today);
        assert_eq!(result, StreakResult { current: 2, best: 2 });
    }

    #[test]
    fn test_run_after_leading_misses_is_ended_by_next_miss() {
        // Saturday; Fri and Thu missed, Wed and Tue completed, Mon missed, older run of 3
        let today = date(2026, 10, 17);
        let completions = vec![
            date(2026, 10, 14),
            date(2026, 10, 13),
            date(2026, 10, 9),
            date(2026, 10, 8),
            date(2026, 10, 7),
        ];
        let result = calculate_streak(&Schedule::weekdays(), &completions, today);
        assert_eq!(result, StreakResult { current: 2, best: 3 });
    }

    #[test]
    fn test_unscheduled_today_keeps_yesterdays_streak() {
        // Sunday; Mon..Fri completed
        let today = date(2026, 10, 18);
        let completions: Vec<_> = (12..=16).map(|d| date(2026, 10, d)).collect();
        let result = calculate_streak(&Schedule::weekdays(), &completions, today);
        assert_eq!(result, StreakResult { current: 5, best: 5 });
    }

    #[test]
    fn test_malformed_schedules_yield_zero() {
        let today = friday();
        let completions = days_back(today, 0..10);
        assert_eq!(
            calculate_streak(&Schedule::custom(Vec::new()), &completions, today),
            StreakResult::default()
        );
        let unknown = Schedule::new(crate::services::schedule::ScheduleType::Unrecognized, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(calculate_streak(&unknown, &completions, today), StreakResult::default());
    }

    #[test]
    fn test_history_beyond_horizon_is_capped() {
        let today = friday();
        let completions = days_back(today, 0..400);
        let result = calculate_streak(&Schedule::daily(), &completions, today);
        assert_eq!(result, StreakResult { current: 365, best: 365 });

        let short = calculate_streak_with_horizon(&Schedule::daily(), &completions, today, 30);
        assert_eq!(short, StreakResult { current: 30, best: 30 });
    }

    #[test]
    fn test_completions_older_than_horizon_do_not_count() {
        let today = friday();
        let completions = days_back(today, 370..380);
        assert_eq!(calculate_streak(&Schedule::daily(), &completions, today), StreakResult::default());
    }

    #[test]
    fn test_zero_horizon_is_zero() {
        let today = friday();
        let completions = days_back(today, 0..3);
        let result = calculate_streak_with_horizon(&Schedule::daily(), &completions, today, 0);
        assert_eq!(result, StreakResult::default());
    }

    /// Scheduled days in the horizon, newest first, paired with completion.
    fn scheduled_history(
        schedule: &Schedule,
        completions: &HashSet<NaiveDate>,
        today: NaiveDate,
    ) -> Vec<(NaiveDate, bool)> {
        (0..i64::from(DEFAULT_HORIZON_DAYS))
            .map(|o| today - Duration::days(o))
            .filter(|d| is_scheduled_day(schedule, *d))
            .map(|d| (d, completions.contains(&d)))
            .collect()
    }

    fn expected_current(history: &[(NaiveDate, bool)], today: NaiveDate) -> u32 {
        match history.first() {
            Some(&(day, false)) if day == today => 0,
            _ => history
                .iter()
                .skip_while(|(_, done)| !done)
                .take_while(|(_, done)| *done)
                .count() as u32,
        }
    }

    fn expected_best(history: &[(NaiveDate, bool)]) -> u32 {
        history
            .split(|(_, done)| !done)
            .map(|run| run.len() as u32)
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_random_histories_match_reference_walk() {
        let mut rng = StdRng::seed_from_u64(0x5EED_2026);
        let base = date(2026, 10, 19);
        let schedules = [
            Schedule::daily(),
            Schedule::weekdays(),
            Schedule::custom(vec![1, 3, 5]),
            Schedule::custom(vec![0, 6]),
        ];

        for _ in 0..300 {
            // today ranges over a full week, so it lands on unscheduled days too
            let today = base - Duration::days(rng.gen_range(0..7));
            let density = rng.gen_range(0.3..0.95);
            let mut completions: Vec<NaiveDate> = (-2..90)
                .filter(|_| rng.gen_bool(density))
                .map(|o| today - Duration::days(o))
                .collect();
            // duplicates and shuffled order must not matter
            if let Some(&dup) = completions.first() {
                completions.push(dup);
            }
            completions.shuffle(&mut rng);

            let seen: HashSet<NaiveDate> = completions.iter().copied().filter(|d| *d <= today).collect();

            for schedule in &schedules {
                let result = calculate_streak(schedule, &completions, today);
                let history = scheduled_history(schedule, &seen, today);
                assert!(result.current <= result.best, "{result:?} for {schedule:?} on {today}");
                assert_eq!(
                    result.current,
                    expected_current(&history, today),
                    "current for {schedule:?} on {today}"
                );
                assert_eq!(result.best, expected_best(&history), "best for {schedule:?} on {today}");
            }
        }
    }
}
