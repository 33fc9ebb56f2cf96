//! Month grid generation.
//!
//! A grid covers whole weeks: it starts on the configured first weekday on
//! or before the 1st of the month and ends on the last weekday on or after
//! the month's final day, so its length is always a multiple of seven.

use crate::components::event_remote::MonthKey;
use crate::error::CalResult;
use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// One rendered day of the month grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_current_month: bool,
    pub is_today: bool,
}

/// Grid generator for a fixed week-start convention
#[derive(Debug, Clone, Copy)]
pub struct DateGrid {
    week_starts_on: Weekday,
}

impl Default for DateGrid {
    fn default() -> Self {
        Self::new(Weekday::Sun)
    }
}

impl DateGrid {
    pub fn new(week_starts_on: Weekday) -> Self {
        Self { week_starts_on }
    }

    pub fn week_starts_on(&self) -> Weekday {
        self.week_starts_on
    }

    /// Cells for `month` (1-12) of `year`. `today` decides `is_today`.
    pub fn generate(&self, month: u32, year: i32, today: NaiveDate) -> CalResult<Vec<DayCell>> {
        let key = MonthKey::new(month, year)?;
        Ok(self.cells(key, today))
    }

    /// Cells for an already validated month
    pub fn cells(&self, key: MonthKey, today: NaiveDate) -> Vec<DayCell> {
        let (start, end) = self.bounds(key);

        start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|date| DayCell {
                date,
                in_current_month: key.contains(date),
                is_today: date == today,
            })
            .collect()
    }

    /// First and last day shown for the month
    pub fn bounds(&self, key: MonthKey) -> (NaiveDate, NaiveDate) {
        let first = key.first_day();
        let last = key.last_day();

        let lead = days_into_week(first.weekday(), self.week_starts_on);
        let trail = 6 - days_into_week(last.weekday(), self.week_starts_on);

        let start = first
            .checked_sub_signed(Duration::days(lead))
            .unwrap_or(first);
        let end = last
            .checked_add_signed(Duration::days(trail))
            .unwrap_or(last);
        (start, end)
    }

    /// Weekday header labels in grid order
    pub fn weekday_labels(&self) -> Vec<String> {
        let mut day = self.week_starts_on;
        (0..7)
            .map(|_| {
                let label = format!("{:?}", day);
                day = day.succ();
                label
            })
            .collect()
    }
}

/// Position of `day` within a week starting on `week_start`, 0-6
fn days_into_week(day: Weekday, week_start: Weekday) -> i64 {
    let day = day.num_days_from_monday() as i64;
    let start = week_start.num_days_from_monday() as i64;
    (day - start).rem_euclid(7)
}
