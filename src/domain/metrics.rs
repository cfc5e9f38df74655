//! Summary statistics per strategy.

use chrono::NaiveDate;

use super::asset::Asset;
use super::portfolio::HistoryRecord;

pub const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySummary {
    pub strategy: String,
    pub total_contributed: f64,
    pub final_value: f64,
    pub cumulative_return_pct: f64,
    pub cagr: f64,
    /// Worst peak-to-trough move, as a non-positive fraction.
    pub max_drawdown: f64,
    pub calmar: f64,
    /// Longest run of consecutive events below a prior peak.
    pub max_drawdown_duration: usize,
    pub skipped_events: usize,
}

impl StrategySummary {
    pub fn compute(
        strategy: &str,
        history: &[HistoryRecord],
        total_contributed: f64,
        skipped_events: usize,
        years: f64,
    ) -> Self {
        let final_value = history.last().map(|r| r.total_value).unwrap_or(0.0);

        let cumulative_return_pct = if total_contributed > 0.0 {
            (final_value / total_contributed - 1.0) * 100.0
        } else {
            0.0
        };

        let cagr = if total_contributed > 0.0 && final_value > 0.0 && years > 0.0 {
            (final_value / total_contributed).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(history);
        let calmar = if max_drawdown < 0.0 {
            cagr / max_drawdown.abs()
        } else {
            0.0
        };

        StrategySummary {
            strategy: strategy.to_string(),
            total_contributed,
            final_value,
            cumulative_return_pct,
            cagr,
            max_drawdown,
            calmar,
            max_drawdown_duration,
            skipped_events,
        }
    }
}

/// Years spanned by `[start, end]`.
pub fn horizon_years(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / DAYS_PER_YEAR
}

/// `min((v - running_max) / running_max)` over the history, and the longest
/// stretch of events spent below a running max.
fn compute_drawdown(history: &[HistoryRecord]) -> (f64, usize) {
    let Some(first) = history.first() else {
        return (0.0, 0);
    };

    let mut peak = first.total_value;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for record in history {
        let value = record.total_value;
        if value >= peak {
            peak = value;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

/// Smallest, largest and latest portfolio share of one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRange {
    pub asset: Asset,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
}

/// Share ranges of every asset that appears in `history`.
pub fn weight_ranges(history: &[HistoryRecord]) -> Vec<WeightRange> {
    let mut assets: Vec<Asset> = history
        .iter()
        .flat_map(|r| r.valuations.keys().copied())
        .collect();
    assets.sort();
    assets.dedup();

    assets
        .into_iter()
        .map(|asset| {
            let shares: Vec<f64> = history.iter().map(|r| r.share(asset)).collect();
            WeightRange {
                asset,
                min: shares.iter().copied().fold(f64::INFINITY, f64::min),
                max: shares.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                latest: shares.last().copied().unwrap_or(0.0),
            }
        })
        .collect()
}
