//! Per-asset cut-loss state machine driving out-of-cycle rebalances.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::domain::asset::{Asset, Indicator};
use crate::domain::market::MarketData;
use crate::domain::series::TimeSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutLossState {
    #[default]
    Normal,
    CutLoss,
}

/// Thresholds of the crash detector.
#[derive(Debug, Clone, PartialEq)]
pub struct CutLossRule {
    /// Samples before the date whose maximum is the reference high.
    pub high_window: usize,
    /// Samples before the date averaged for the trend filter.
    pub mean_window: usize,
    pub drop_ratio: f64,
    pub vix_threshold: f64,
    pub deep_drop_ratio: f64,
    pub deep_vix_threshold: f64,
}

impl Default for CutLossRule {
    fn default() -> Self {
        CutLossRule {
            high_window: 60,
            mean_window: 20,
            drop_ratio: 0.85,
            vix_threshold: 25.0,
            deep_drop_ratio: 0.80,
            deep_vix_threshold: 22.0,
        }
    }
}

impl CutLossRule {
    /// Whether `series` signals a crash on `date`. `None` when the date has
    /// no exact sample or the lookback windows are not full yet.
    pub fn triggered(&self, series: &TimeSeries, vix: Option<f64>, date: NaiveDate) -> Option<bool> {
        let price = series.exact(date)?;
        let highs = series.before(date, self.high_window);
        let recent = series.before(date, self.mean_window);
        if highs.len() < self.high_window || recent.len() < self.mean_window {
            return None;
        }
        let high = highs.iter().map(|p| p.value).fold(f64::MIN, f64::max);
        if high <= 0.0 {
            return None;
        }
        let ratio = price / high;
        let mean = recent.iter().map(|p| p.value).sum::<f64>() / recent.len() as f64;

        let Some(vix) = vix else {
            return Some(false);
        };
        let sharp = ratio < self.drop_ratio && vix > self.vix_threshold;
        let deep = ratio < self.deep_drop_ratio && vix > self.deep_vix_threshold && price < mean;
        Some(sharp || deep)
    }

    /// Whether an asset in cut-loss has recovered: price back at or above
    /// the mean of the preceding `mean_window` samples.
    pub fn recovered(&self, series: &TimeSeries, date: NaiveDate) -> Option<bool> {
        let price = series.exact(date)?;
        let recent = series.before(date, self.mean_window);
        if recent.len() < self.mean_window {
            return None;
        }
        let mean = recent.iter().map(|p| p.value).sum::<f64>() / recent.len() as f64;
        Some(price >= mean)
    }
}

/// Cut-loss state of every growth asset, advanced once per calendar day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutLossBook {
    states: BTreeMap<Asset, CutLossState>,
}

impl CutLossBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, asset: Asset) -> CutLossState {
        self.states.get(&asset).copied().unwrap_or_default()
    }

    pub fn is_cut_loss(&self, asset: Asset) -> bool {
        self.state(asset) == CutLossState::CutLoss
    }

    pub fn set(&mut self, asset: Asset, state: CutLossState) {
        self.states.insert(asset, state);
    }

    /// Advances every asset in `assets` for `date`; returns whether any
    /// state changed. Days without an exact sample leave the state as is.
    pub fn advance(
        &mut self,
        rule: &CutLossRule,
        market: &MarketData,
        assets: &[Asset],
        date: NaiveDate,
    ) -> bool {
        let vix = market
            .indicator(Indicator::VixQuote)
            .and_then(|s| s.as_of(date));
        let mut changed = false;

        for &asset in assets {
            let Some(series) = market.series(asset) else {
                continue;
            };
            let next = match self.state(asset) {
                CutLossState::Normal => match rule.triggered(series, vix, date) {
                    Some(true) => CutLossState::CutLoss,
                    _ => CutLossState::Normal,
                },
                CutLossState::CutLoss => match rule.recovered(series, date) {
                    Some(true) => CutLossState::Normal,
                    _ => CutLossState::CutLoss,
                },
            };
            if next != self.state(asset) {
                info!(asset = %asset, %date, state = ?next, "cut-loss state changed");
                self.set(asset, next);
                changed = true;
            }
        }
        changed
    }
}
