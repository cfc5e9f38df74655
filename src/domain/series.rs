//! Date-indexed scalar series with as-of lookup.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Samples sorted ascending by date, one per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<PricePoint>,
}

impl TimeSeries {
    /// Builds a series from provider samples. Providers hand over sorted,
    /// deduplicated rows; the sort here only guards hand-built fixtures.
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self { points }
    }

    pub fn from_values(start: NaiveDate, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| PricePoint::new(start + chrono::Duration::days(i as i64), v))
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last(&self) -> Option<PricePoint> {
        self.points.last().copied()
    }

    /// Index of the latest sample dated on or before `date`.
    pub fn as_of_index(&self, date: NaiveDate) -> Option<usize> {
        let after = self.points.partition_point(|p| p.date <= date);
        after.checked_sub(1)
    }

    pub fn as_of(&self, date: NaiveDate) -> Option<f64> {
        self.as_of_index(date).map(|i| self.points[i].value)
    }

    /// Value of the sample dated exactly `date`.
    pub fn exact(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    /// Up to `n` values ending at index `end` (inclusive).
    pub fn trailing(&self, end: usize, n: usize) -> impl Iterator<Item = f64> + '_ {
        let stop = (end + 1).min(self.points.len());
        let start = stop.saturating_sub(n);
        self.points[start..stop].iter().map(|p| p.value)
    }

    /// Up to `n` values strictly before `date`.
    pub fn before(&self, date: NaiveDate, n: usize) -> &[PricePoint] {
        let stop = self.points.partition_point(|p| p.date < date);
        let start = stop.saturating_sub(n);
        &self.points[start..stop]
    }

    /// Mean of the last `n` samples on or before `date`; when fewer exist,
    /// the mean of all of them.
    pub fn trailing_mean(&self, date: NaiveDate, n: usize) -> Option<f64> {
        let end = self.as_of_index(date)?;
        let (sum, count) = self
            .trailing(end, n)
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Highest value on or before `date`.
    pub fn max_until(&self, date: NaiveDate) -> Option<f64> {
        let end = self.as_of_index(date)?;
        self.points[..=end].iter().map(|p| p.value).reduce(f64::max)
    }
}
