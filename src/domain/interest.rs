//! Interest accrual for stable holdings.

/// Compounding convention of an interest-bearing instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compounding {
    /// value * (1 + rate/365)^days
    Daily,
    /// value * (1 + rate)^(days/365)
    Annual,
}

impl Compounding {
    /// Grow `value` at `annual_rate` over `days` elapsed calendar days.
    pub fn accrue(&self, value: f64, annual_rate: f64, days: i64) -> f64 {
        if days <= 0 {
            return value;
        }
        match self {
            Compounding::Daily => value * (1.0 + annual_rate / 365.0).powi(days as i32),
            Compounding::Annual => value * (1.0 + annual_rate).powf(days as f64 / 365.0),
        }
    }
}
