use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Recurrence rule for a goal. Stored as text so that rows written by older
/// clients with an unknown value still load; those are never scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Daily,
    Weekdays,
    Custom,
    #[serde(other)]
    Unrecognized,
}

impl ScheduleType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "daily" => Self::Daily,
            "weekdays" => Self::Weekdays,
            "custom" => Self::Custom,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekdays => "weekdays",
            Self::Custom => "custom",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl Default for ScheduleType {
    fn default() -> Self {
        Self::Daily
    }
}

/// Which calendar days a goal is active on.
///
/// `schedule_days` holds weekday indices with 0 = Sunday .. 6 = Saturday and
/// only matters for [`ScheduleType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub schedule_days: Vec<i16>,
}

impl Schedule {
    pub fn new(schedule_type: ScheduleType, schedule_days: Vec<i16>) -> Self {
        Self {
            schedule_type,
            schedule_days,
        }
    }

    pub fn daily() -> Self {
        Self::new(ScheduleType::Daily, Vec::new())
    }

    pub fn weekdays() -> Self {
        Self::new(ScheduleType::Weekdays, Vec::new())
    }

    pub fn custom(days: impl Into<Vec<i16>>) -> Self {
        Self::new(ScheduleType::Custom, days.into())
    }
}

pub fn is_scheduled_day(schedule: &Schedule, date: NaiveDate) -> bool {
    match schedule.schedule_type {
        ScheduleType::Daily => true,
        ScheduleType::Weekdays => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        ScheduleType::Custom => {
            let index = date.weekday().num_days_from_sunday() as i16;
            schedule.schedule_days.contains(&index)
        }
        ScheduleType::Unrecognized => false,
    }
}

/// Ascending iterator over the scheduled dates of an inclusive range.
#[derive(Debug, Clone)]
pub struct ScheduledDates<'a> {
    schedule: &'a Schedule,
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for ScheduledDates<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            let day = self.next.filter(|day| *day <= self.end)?;
            self.next = day.succ_opt();
            if is_scheduled_day(self.schedule, day) {
                return Some(day);
            }
        }
    }
}

/// Every date in `[start, end]` the schedule is active on. Empty when
/// `start > end`.
pub fn scheduled_dates_between(schedule: &Schedule, start: NaiveDate, end: NaiveDate) -> ScheduledDates<'_> {
    ScheduledDates {
        schedule,
        next: Some(start),
        end,
    }
}

/// First scheduled date on or after `from`. Any valid schedule recurs within a
/// week, so `None` means the goal is never due.
pub fn next_occurrence(schedule: &Schedule, from: NaiveDate) -> Option<NaiveDate> {
    let end = from
        .checked_add_signed(Duration::days(6))
        .unwrap_or(NaiveDate::MAX);
    scheduled_dates_between(schedule, from, end).next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monday() -> NaiveDate {
        date(2026, 10, 12)
    }

    #[test]
    fn test_daily_is_always_scheduled() {
        let schedule = Schedule::daily();
        for offset in 0..7 {
            assert!(is_scheduled_day(&schedule, monday() + Duration::days(offset)));
        }
    }

    #[test]
    fn test_weekdays_excludes_weekend() {
        let schedule = Schedule::weekdays();
        let flags: Vec<bool> = (0..7)
            .map(|offset| is_scheduled_day(&schedule, monday() + Duration::days(offset)))
            .collect();
        assert_eq!(flags, vec![true, true, true, true, true, false, false]);
    }

    #[test]
    fn test_custom_uses_sunday_based_indices() {
        let schedule = Schedule::custom(vec![0, 3]);
        assert!(is_scheduled_day(&schedule, date(2026, 10, 18))); // Sunday
        assert!(is_scheduled_day(&schedule, date(2026, 10, 14))); // Wednesday
        assert!(!is_scheduled_day(&schedule, monday()));
    }

    #[test]
    fn test_custom_with_no_days_is_never_scheduled() {
        let schedule = Schedule::custom(Vec::new());
        assert!((0..7).all(|o| !is_scheduled_day(&schedule, monday() + Duration::days(o))));
    }

    #[test]
    fn test_unrecognized_is_never_scheduled() {
        let schedule = Schedule::new(ScheduleType::parse("fortnightly"), vec![1, 2, 3]);
        assert_eq!(schedule.schedule_type, ScheduleType::Unrecognized);
        assert!(!is_scheduled_day(&schedule, monday()));
    }

    #[test]
    fn test_parse_round_trips_known_values() {
        for ty in [ScheduleType::Daily, ScheduleType::Weekdays, ScheduleType::Custom] {
            assert_eq!(ScheduleType::parse(ty.as_str()), ty);
        }
    }

    #[test]
    fn test_unknown_schedule_type_deserializes() {
        let schedule: Schedule =
            serde_json::from_str(r#"{"scheduleType":"hourly","scheduleDays":[1]}"#).unwrap();
        assert_eq!(schedule.schedule_type, ScheduleType::Unrecognized);
    }

    #[test]
    fn test_weekdays_over_a_week_window() {
        let schedule = Schedule::weekdays();
        // Wednesday .. Tuesday
        let dates: Vec<_> =
            scheduled_dates_between(&schedule, date(2026, 10, 14), date(2026, 10, 20)).collect();
        assert_eq!(
            dates,
            vec![
                date(2026, 10, 14),
                date(2026, 10, 15),
                date(2026, 10, 16),
                date(2026, 10, 19),
                date(2026, 10, 20),
            ]
        );
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let schedule = Schedule::daily();
        let dates: Vec<_> = scheduled_dates_between(&schedule, monday(), monday()).collect();
        assert_eq!(dates, vec![monday()]);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let schedule = Schedule::daily();
        let mut dates = scheduled_dates_between(&schedule, monday(), monday() - Duration::days(1));
        assert_eq!(dates.next(), None);
    }

    #[test]
    fn test_enumeration_is_restartable() {
        let schedule = Schedule::custom(vec![1, 5]);
        let iter = scheduled_dates_between(&schedule, monday(), monday() + Duration::days(13));
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_next_occurrence_skips_to_scheduled_day() {
        let saturday = date(2026, 10, 17);
        assert_eq!(next_occurrence(&Schedule::weekdays(), saturday), Some(monday() + Duration::days(7)));
        assert_eq!(next_occurrence(&Schedule::daily(), saturday), Some(saturday));
        assert_eq!(next_occurrence(&Schedule::custom(Vec::new()), saturday), None);
    }
}
