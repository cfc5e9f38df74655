//! Rebalance date generation.

use chrono::{Datelike, Days, Months, NaiveDate};

/// The `day` of every month within `[start, end]`, ascending.
///
/// `day` is expected to be in 1..=28 so every month has it; config
/// validation rejects anything else.
pub fn rebalance_dates(start: NaiveDate, end: NaiveDate, day: u32) -> Vec<NaiveDate> {
    let Some(mut cursor) = NaiveDate::from_ymd_opt(start.year(), start.month(), day) else {
        return Vec::new();
    };
    let mut dates = Vec::new();
    while cursor <= end {
        if cursor >= start {
            dates.push(cursor);
        }
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    dates
}

/// Every calendar day within `[start, end]`.
pub fn daily_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        dates.push(cursor);
        match cursor.checked_add_days(Days::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    dates
}

/// Start of a horizon of `years` whole years ending at `end`.
pub fn years_before(end: NaiveDate, years: u32) -> Option<NaiveDate> {
    end.checked_sub_months(Months::new(years.checked_mul(12)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_monthly_dates_within_window() {
        let dates = rebalance_dates(d(2020, 1, 1), d(2020, 4, 20), 15);
        assert_eq!(
            dates,
            vec![d(2020, 1, 15), d(2020, 2, 15), d(2020, 3, 15), d(2020, 4, 15)]
        );
    }

    #[test]
    fn test_start_after_day_skips_first_month() {
        let dates = rebalance_dates(d(2020, 1, 20), d(2020, 3, 31), 15);
        assert_eq!(dates, vec![d(2020, 2, 15), d(2020, 3, 15)]);
    }

    #[test]
    fn test_end_before_day_excludes_last_month() {
        let dates = rebalance_dates(d(2020, 1, 1), d(2020, 3, 14), 15);
        assert_eq!(dates, vec![d(2020, 1, 15), d(2020, 2, 15)]);
    }

    #[test]
    fn test_boundaries_inclusive() {
        let dates = rebalance_dates(d(2020, 1, 15), d(2020, 2, 15), 15);
        assert_eq!(dates, vec![d(2020, 1, 15), d(2020, 2, 15)]);
    }

    #[test]
    fn test_crosses_year_end() {
        let dates = rebalance_dates(d(2019, 11, 1), d(2020, 2, 1), 28);
        assert_eq!(dates, vec![d(2019, 11, 28), d(2019, 12, 28), d(2020, 1, 28)]);
    }

    #[test]
    fn test_empty_when_window_inverted() {
        assert!(rebalance_dates(d(2020, 5, 1), d(2020, 1, 1), 15).is_empty());
    }

    #[test]
    fn test_daily_dates_inclusive() {
        let dates = daily_dates(d(2020, 2, 27), d(2020, 3, 1));
        assert_eq!(
            dates,
            vec![d(2020, 2, 27), d(2020, 2, 28), d(2020, 2, 29), d(2020, 3, 1)]
        );
    }

    #[test]
    fn test_years_before() {
        assert_eq!(years_before(d(2024, 6, 30), 10), Some(d(2014, 6, 30)));
        assert_eq!(years_before(d(2024, 2, 29), 1), Some(d(2023, 2, 28)));
    }
}
