//! Attendance aggregation and analytics.
//!
//! Everything here is a pure function of a record list or a monthly
//! summary: presence percentages, present streaks, a coarse trend signal,
//! absence-reason tallies, and the per-day views used by month and week
//! displays. The weekend exclusion applies only to those display views,
//! never to the raw statistics.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::record::AttendanceRecord;

/// Tally bucket for absences without a stated reason.
pub const UNSPECIFIED_REASON: &str = "unspecified";

/// Coarse two-state trend: whether the most recent record was present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// The last processed record was present.
    Improving,
    /// The last processed record was absent, or there were no records.
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Declining => write!(f, "declining"),
        }
    }
}

/// Statistical summary of a record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    /// Number of present records.
    pub present_count: usize,
    /// Number of absent records.
    pub absent_count: usize,
    /// Rounded presence percentage, 0 for an empty set.
    pub percentage: u32,
    /// Longest run of consecutive present records in date order.
    pub longest_present_streak: usize,
    /// Present run ending at the last record.
    pub current_streak: usize,
    /// Whether the last record was present.
    pub current_trend: Trend,
    /// Absent records grouped by reason.
    pub absence_reason_tally: BTreeMap<String, usize>,
}

impl AttendanceSummary {
    /// Total number of records summarized.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.present_count + self.absent_count
    }
}

/// Round `part / total * 100` half up; 0 when `total` is 0.
#[must_use]
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rounded = (part * 200 + total) / (2 * total);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Summarize a record set.
///
/// Records are processed in ascending date order regardless of input order.
#[must_use]
pub fn summarize(records: &[AttendanceRecord]) -> AttendanceSummary {
    let mut sorted: Vec<&AttendanceRecord> = records.iter().collect();
    sorted.sort_by_key(|record| record.date);

    let mut present_count = 0;
    let mut streak = 0;
    let mut longest = 0;
    let mut tally: BTreeMap<String, usize> = BTreeMap::new();

    for record in &sorted {
        if record.is_present {
            present_count += 1;
            streak += 1;
            longest = longest.max(streak);
        } else {
            streak = 0;
            let reason = record.absence_reason.trim();
            let bucket = if reason.is_empty() {
                UNSPECIFIED_REASON
            } else {
                reason
            };
            *tally.entry(bucket.to_string()).or_default() += 1;
        }
    }

    let current_trend = match sorted.last() {
        Some(record) if record.is_present => Trend::Improving,
        _ => Trend::Declining,
    };

    AttendanceSummary {
        present_count,
        absent_count: sorted.len() - present_count,
        percentage: percentage(present_count, sorted.len()),
        longest_present_streak: longest,
        current_streak: streak,
        current_trend,
        absence_reason_tally: tally,
    }
}

/// Keep only records dated within `[start, end]`, both bounds inclusive.
#[must_use]
pub fn filter_window(
    records: &[AttendanceRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<AttendanceRecord> {
    records
        .iter()
        .filter(|record| record.date >= start && record.date <= end)
        .cloned()
        .collect()
}

/// Iterate every calendar day in `[start, end]`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// English weekday name of a date.
#[must_use]
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// One day of a per-day trend sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// The calendar day.
    pub date: NaiveDate,
    /// Present iff a present record exists for the day.
    pub is_present: bool,
    /// Whether any record exists for the day.
    pub has_record: bool,
}

/// Per-day presence sequence covering every day in `[start, end]`.
///
/// Days without a record are coded absent, so a gap in data reads as an
/// absence.
#[must_use]
pub fn daily_trend(
    records: &[AttendanceRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<TrendPoint> {
    let mut by_day: BTreeMap<NaiveDate, bool> = BTreeMap::new();
    for record in records {
        let present = by_day.entry(record.date).or_insert(false);
        *present |= record.is_present;
    }

    days_between(start, end)
        .map(|date| TrendPoint {
            date,
            is_present: by_day.get(&date).copied().unwrap_or(false),
            has_record: by_day.contains_key(&date),
        })
        .collect()
}

/// Present counts per day for one month.
///
/// Derived data: either received from the remote aggregate endpoint or
/// recomputed client-side with [`MonthlySummary::from_records`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    year: i32,
    month: u32,
    counts: BTreeMap<NaiveDate, u32>,
}

impl MonthlySummary {
    /// Create an empty summary for a month.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            counts: BTreeMap::new(),
        }
    }

    /// Recompute a summary from raw records, counting present records only.
    ///
    /// Records outside the month are ignored.
    #[must_use]
    pub fn from_records(year: i32, month: u32, records: &[AttendanceRecord]) -> Self {
        let mut summary = Self::new(year, month);
        for record in records.iter().filter(|r| r.is_present) {
            if summary.contains_date(record.date) {
                *summary.counts.entry(record.date).or_default() += 1;
            }
        }
        summary
    }

    /// Year of the summarized month.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month number, 1-12.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month, if the month is valid.
    #[must_use]
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Every calendar day of the month.
    #[must_use]
    pub fn days(&self) -> Vec<NaiveDate> {
        let Some(first) = self.first_day() else {
            return Vec::new();
        };
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.checked_sub_days(Days::new(1)))
            .unwrap_or(first);
        days_between(first, last).collect()
    }

    /// Check whether a date falls inside this month.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Record the present count for a day. Dates outside the month are ignored.
    pub fn set(&mut self, date: NaiveDate, present: u32) {
        if self.contains_date(date) {
            self.counts.insert(date, present);
        }
    }

    /// Present count for a day, 0 when no entry exists.
    #[must_use]
    pub fn present_on(&self, date: NaiveDate) -> u32 {
        self.counts.get(&date).copied().unwrap_or(0)
    }

    /// Number of days with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if no day has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate entries in date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.counts.iter().map(|(date, count)| (*date, *count))
    }
}

/// The two weekday indices excluded from working-day views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekendDays([Weekday; 2]);

impl WeekendDays {
    /// Create a weekend from two weekdays.
    #[must_use]
    pub fn new(first: Weekday, second: Weekday) -> Self {
        Self([first, second])
    }

    /// Check if a date falls on the weekend.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.contains(&date.weekday())
    }
}

impl Default for WeekendDays {
    fn default() -> Self {
        Self::new(Weekday::Sat, Weekday::Sun)
    }
}

/// Presence percentage for one day of a month or week view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayPercentage {
    /// The calendar day.
    pub date: NaiveDate,
    /// English weekday name.
    pub weekday: &'static str,
    /// Children marked present.
    pub present_count: u32,
    /// Present count over roster size, rounded; 0 for an empty roster.
    pub percentage: u32,
}

/// Aggregates monthly summaries into working-day display views.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationEngine {
    weekend: WeekendDays,
}

impl AggregationEngine {
    /// Create an engine with the given weekend policy.
    #[must_use]
    pub fn new(weekend: WeekendDays) -> Self {
        Self { weekend }
    }

    /// The weekend policy in use.
    #[must_use]
    pub fn weekend(&self) -> WeekendDays {
        self.weekend
    }

    /// Summarize a record set; see [`summarize`].
    #[must_use]
    pub fn summarize(&self, records: &[AttendanceRecord]) -> AttendanceSummary {
        summarize(records)
    }

    /// Per-day percentages for every day of the month, weekends included.
    #[must_use]
    pub fn day_percentages(
        &self,
        summary: &MonthlySummary,
        roster_size: usize,
    ) -> Vec<DayPercentage> {
        summary
            .days()
            .into_iter()
            .map(|date| Self::day_percentage(date, summary.present_on(date), roster_size))
            .collect()
    }

    /// Working-day view of a month: weekends excluded.
    #[must_use]
    pub fn month_view(&self, summary: &MonthlySummary, roster_size: usize) -> Vec<DayPercentage> {
        self.day_percentages(summary, roster_size)
            .into_iter()
            .filter(|day| !self.weekend.contains(day.date))
            .collect()
    }

    /// Working-day view of the Monday-to-Sunday week containing `day`.
    ///
    /// Only days covered by `summary`'s month carry counts; the others read 0.
    #[must_use]
    pub fn week_view(
        &self,
        summary: &MonthlySummary,
        day: NaiveDate,
        roster_size: usize,
    ) -> Vec<DayPercentage> {
        let offset = u64::from(day.weekday().num_days_from_monday());
        let Some(monday) = day.checked_sub_days(Days::new(offset)) else {
            return Vec::new();
        };
        let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);

        days_between(monday, sunday)
            .filter(|date| !self.weekend.contains(*date))
            .map(|date| Self::day_percentage(date, summary.present_on(date), roster_size))
            .collect()
    }

    /// Mean of the day percentages, rounded; 0 for no days.
    #[must_use]
    pub fn average_percentage(days: &[DayPercentage]) -> u32 {
        if days.is_empty() {
            return 0;
        }
        let total: usize = days.iter().map(|d| d.percentage as usize).sum();
        percentage(total, days.len() * 100)
    }

    fn day_percentage(date: NaiveDate, present_count: u32, roster_size: usize) -> DayPercentage {
        DayPercentage {
            date,
            weekday: weekday_name(date),
            present_count,
            percentage: percentage(present_count as usize, roster_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(day: u32, present: bool, reason: &str) -> AttendanceRecord {
        AttendanceRecord::new(1, date(2024, 3, day), present, reason, 9)
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.percentage, 0);
        assert_eq!(summary.present_count, 0);
        assert_eq!(summary.absent_count, 0);
        assert_eq!(summary.longest_present_streak, 0);
        assert_eq!(summary.current_trend, Trend::Declining);
        assert!(summary.absence_reason_tally.is_empty());
    }

    #[test]
    fn test_streak_with_gap() {
        let records = vec![
            record(1, true, ""),
            record(2, true, ""),
            record(3, true, ""),
            record(4, false, ""),
            record(5, true, ""),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.longest_present_streak, 3);
        assert_eq!(summary.current_streak, 1);
        assert_eq!(summary.current_trend, Trend::Improving);
        assert_eq!(summary.present_count, 4);
        assert_eq!(summary.percentage, 80);
    }

    #[test]
    fn test_streak_ignores_input_order() {
        let records = vec![
            record(5, true, ""),
            record(4, false, ""),
            record(2, true, ""),
            record(1, true, ""),
            record(3, true, ""),
        ];
        assert_eq!(summarize(&records).longest_present_streak, 3);
    }

    #[test]
    fn test_trend_declining_when_last_absent() {
        let records = vec![record(1, true, ""), record(2, false, "cold")];
        assert_eq!(summarize(&records).current_trend, Trend::Declining);
    }

    #[test]
    fn test_reason_tally() {
        let records = vec![
            record(1, false, "flu"),
            record(2, false, " flu "),
            record(3, false, ""),
            record(4, false, "holiday"),
            record(5, true, ""),
        ];
        let tally = summarize(&records).absence_reason_tally;
        assert_eq!(tally.get("flu"), Some(&2));
        assert_eq!(tally.get(UNSPECIFIED_REASON), Some(&1));
        assert_eq!(tally.get("holiday"), Some(&1));
        assert_eq!(tally.len(), 3);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn test_filter_window_inclusive() {
        let records = vec![
            record(1, true, ""),
            record(2, true, ""),
            record(5, true, ""),
            record(6, true, ""),
        ];
        let filtered = filter_window(&records, date(2024, 3, 2), date(2024, 3, 5));
        let days: Vec<_> = filtered.iter().map(|r| r.date.day()).collect();
        assert_eq!(days, vec![2, 5]);
    }

    #[test]
    fn test_daily_trend_zero_fills_gaps() {
        let records = vec![record(1, true, ""), record(3, false, "")];
        let trend = daily_trend(&records, date(2024, 3, 1), date(2024, 3, 4));
        assert_eq!(trend.len(), 4);
        assert!(trend[0].is_present && trend[0].has_record);
        assert!(!trend[1].is_present && !trend[1].has_record);
        assert!(!trend[2].is_present && trend[2].has_record);
        assert!(!trend[3].is_present);
    }

    #[test]
    fn test_daily_trend_empty_window() {
        assert!(daily_trend(&[], date(2024, 3, 5), date(2024, 3, 1)).is_empty());
    }

    #[test]
    fn test_weekday_name() {
        assert_eq!(weekday_name(date(2024, 3, 1)), "Friday");
        assert_eq!(weekday_name(date(2024, 3, 2)), "Saturday");
        assert_eq!(weekday_name(date(2024, 3, 4)), "Monday");
    }

    #[test]
    fn test_monthly_summary_from_records() {
        let records = vec![
            AttendanceRecord::new(1, date(2024, 3, 1), true, "", 9),
            AttendanceRecord::new(2, date(2024, 3, 1), true, "", 9),
            AttendanceRecord::new(3, date(2024, 3, 1), false, "", 9),
            AttendanceRecord::new(1, date(2024, 4, 1), true, "", 9),
        ];
        let summary = MonthlySummary::from_records(2024, 3, &records);
        assert_eq!(summary.present_on(date(2024, 3, 1)), 2);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary.present_on(date(2024, 4, 1)), 0);
    }

    #[test]
    fn test_monthly_summary_days() {
        assert_eq!(MonthlySummary::new(2024, 2).days().len(), 29);
        assert_eq!(MonthlySummary::new(2023, 2).days().len(), 28);
        assert_eq!(MonthlySummary::new(2024, 12).days().len(), 31);
        assert!(MonthlySummary::new(2024, 13).days().is_empty());
    }

    #[test]
    fn test_monthly_summary_set_ignores_other_months() {
        let mut summary = MonthlySummary::new(2024, 3);
        summary.set(date(2024, 4, 1), 3);
        assert!(summary.is_empty());
    }

    #[test]
    fn test_month_view_excludes_weekends() {
        let mut summary = MonthlySummary::new(2024, 3);
        summary.set(date(2024, 3, 1), 3);
        summary.set(date(2024, 3, 2), 1);

        let engine = AggregationEngine::default();
        let view = engine.month_view(&summary, 4);

        // March 2024 has 21 working days.
        assert_eq!(view.len(), 21);
        assert!(view.iter().all(|d| d.weekday != "Saturday" && d.weekday != "Sunday"));
        assert_eq!(view[0].date, date(2024, 3, 1));
        assert_eq!(view[0].percentage, 75);
        assert_eq!(view[0].weekday, "Friday");
        assert_eq!(view[1].date, date(2024, 3, 4));

        let all_days = engine.day_percentages(&summary, 4);
        assert_eq!(all_days.len(), 31);
        assert_eq!(all_days[1].percentage, 25);
    }

    #[test]
    fn test_month_view_zero_roster() {
        let mut summary = MonthlySummary::new(2024, 3);
        summary.set(date(2024, 3, 1), 3);
        let view = AggregationEngine::default().month_view(&summary, 0);
        assert!(view.iter().all(|d| d.percentage == 0));
    }

    #[test]
    fn test_custom_weekend() {
        let engine = AggregationEngine::new(WeekendDays::new(Weekday::Fri, Weekday::Sat));
        let view = engine.month_view(&MonthlySummary::new(2024, 3), 10);
        assert!(view.iter().all(|d| d.weekday != "Friday" && d.weekday != "Saturday"));
        assert!(view.iter().any(|d| d.weekday == "Sunday"));
    }

    #[test]
    fn test_week_view() {
        let mut summary = MonthlySummary::new(2024, 3);
        summary.set(date(2024, 3, 6), 2);

        let view = AggregationEngine::default().week_view(&summary, date(2024, 3, 7), 4);
        let dates: Vec<_> = view.iter().map(|d| d.date.day()).collect();
        assert_eq!(dates, vec![4, 5, 6, 7, 8]);
        assert_eq!(view[2].percentage, 50);
    }

    #[test]
    fn test_average_percentage() {
        let mut summary = MonthlySummary::new(2024, 3);
        summary.set(date(2024, 3, 4), 4);
        summary.set(date(2024, 3, 5), 2);
        let view = AggregationEngine::default().week_view(&summary, date(2024, 3, 4), 4);
        // 100 + 50 + 0 + 0 + 0 over five days
        assert_eq!(AggregationEngine::average_percentage(&view), 30);
        assert_eq!(AggregationEngine::average_percentage(&[]), 0);
    }

    #[test]
    fn test_trend_display() {
        assert_eq!(Trend::Improving.to_string(), "improving");
        assert_eq!(Trend::Declining.to_string(), "declining");
    }
}
