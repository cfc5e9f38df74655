//! Moving-average zone policies.
//!
//! The trailing `[min, max]` range of a window is cut into five equal zones;
//! zone 1 sits at the low and gets the largest growth weight.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::allocation::TargetAllocation;
use crate::domain::asset::Asset;
use crate::domain::error::RebalancerError;
use crate::domain::series::TimeSeries;
use crate::domain::universe::parse_ratio;

use super::{AllocationPolicy, MarketContext};

pub const ZONE_COUNT: u8 = 5;
pub const NEUTRAL_ZONE: u8 = 3;
pub const DEFAULT_WINDOWS: [usize; 4] = [5, 20, 60, 120];

/// Zone (1..=5) of the latest price on or before `date` within the last
/// `window` samples. Neutral when the window is not full or flat.
pub fn ma_zone(series: &TimeSeries, date: NaiveDate, window: usize) -> u8 {
    let Some(idx) = series.as_of_index(date) else {
        return NEUTRAL_ZONE;
    };
    if window == 0 || idx + 1 < window {
        return NEUTRAL_ZONE;
    }
    let values: Vec<f64> = series.trailing(idx, window).collect();
    let low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if low == high {
        return NEUTRAL_ZONE;
    }
    let price = values[values.len() - 1];
    let step = (high - low) / f64::from(ZONE_COUNT);
    (1..=ZONE_COUNT)
        .find(|&zone| price <= low + step * f64::from(zone))
        .unwrap_or(ZONE_COUNT)
}

/// Growth weight per zone, index 0 is zone 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneWeights(pub [f64; 5]);

impl Default for ZoneWeights {
    fn default() -> Self {
        ZoneWeights([0.25, 0.22, 0.20, 0.18, 0.15])
    }
}

impl ZoneWeights {
    pub fn weight(&self, zone: u8) -> f64 {
        let idx = usize::from(zone.clamp(1, ZONE_COUNT)) - 1;
        self.0[idx]
    }

    /// Parses `zone:weight` pairs; every zone 1..=5 must appear once.
    pub fn parse(section: &str, key: &str, input: &str) -> Result<Self, RebalancerError> {
        let mut weights = [None; 5];
        for token in input.split(',') {
            let parsed = token.split_once(':').and_then(|(z, w)| {
                let zone: usize = z.trim().parse().ok()?;
                Some((zone, parse_ratio(w)?))
            });
            match parsed {
                Some((zone, weight)) if (1..=5).contains(&zone) && (0.0..=1.0).contains(&weight) => {
                    weights[zone - 1] = Some(weight);
                }
                _ => {
                    return Err(RebalancerError::config_invalid(
                        section,
                        key,
                        format!("expected zone:weight with zone 1-5, got '{}'", token.trim()),
                    ));
                }
            }
        }
        let mut out = [0.0; 5];
        for (i, w) in weights.iter().enumerate() {
            out[i] = w.ok_or_else(|| {
                RebalancerError::config_invalid(section, key, format!("missing weight for zone {}", i + 1))
            })?;
        }
        Ok(ZoneWeights(out))
    }
}

/// Parses a comma-separated list of positive window lengths.
pub fn parse_windows(section: &str, key: &str, input: &str) -> Result<Vec<usize>, RebalancerError> {
    input
        .split(',')
        .map(|t| match t.trim().parse::<usize>() {
            Ok(w) if w > 0 => Ok(w),
            _ => Err(RebalancerError::config_invalid(
                section,
                key,
                format!("invalid window '{}'", t.trim()),
            )),
        })
        .collect()
}

fn growth_by_zone(
    ctx: &MarketContext<'_>,
    growth: &[Asset],
    window: usize,
    weights: &ZoneWeights,
) -> Result<BTreeMap<Asset, f64>, RebalancerError> {
    growth
        .iter()
        .map(|&asset| {
            let zone = ma_zone(ctx.series(asset)?, ctx.date, window);
            Ok((asset, weights.weight(zone)))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ZonePolicy {
    name: String,
    window: usize,
    weights: ZoneWeights,
    growth: Vec<Asset>,
    defense: Vec<(Asset, f64)>,
}

impl ZonePolicy {
    pub fn new(
        window: usize,
        weights: ZoneWeights,
        growth: Vec<Asset>,
        defense: Vec<(Asset, f64)>,
    ) -> Self {
        ZonePolicy {
            name: format!("dynamic_{window}ma_based_rebalance"),
            window,
            weights,
            growth,
            defense,
        }
    }
}

impl AllocationPolicy for ZonePolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_allocation(
        &mut self,
        ctx: &MarketContext<'_>,
    ) -> Result<TargetAllocation, RebalancerError> {
        let growth = growth_by_zone(ctx, &self.growth, self.window, &self.weights)?;
        Ok(TargetAllocation::with_defense(&growth, &self.defense))
    }
}

/// Equal-weighted average of the per-window growth weights.
#[derive(Debug, Clone)]
pub struct ZoneEnsemble {
    windows: Vec<usize>,
    weights: ZoneWeights,
    growth: Vec<Asset>,
    defense: Vec<(Asset, f64)>,
}

impl ZoneEnsemble {
    pub fn new(
        windows: Vec<usize>,
        weights: ZoneWeights,
        growth: Vec<Asset>,
        defense: Vec<(Asset, f64)>,
    ) -> Self {
        ZoneEnsemble {
            windows,
            weights,
            growth,
            defense,
        }
    }
}

impl AllocationPolicy for ZoneEnsemble {
    fn name(&self) -> &str {
        "dynamic_ensemble_ma_based_rebalance"
    }

    fn target_allocation(
        &mut self,
        ctx: &MarketContext<'_>,
    ) -> Result<TargetAllocation, RebalancerError> {
        let mut totals: BTreeMap<Asset, f64> = BTreeMap::new();
        for &window in &self.windows {
            for (asset, weight) in growth_by_zone(ctx, &self.growth, window, &self.weights)? {
                *totals.entry(asset).or_insert(0.0) += weight;
            }
        }
        let n = self.windows.len().max(1) as f64;
        let growth = totals.into_iter().map(|(a, w)| (a, w / n)).collect();
        Ok(TargetAllocation::with_defense(&growth, &self.defense))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cut_loss::CutLossBook;
    use crate::domain::market::MarketData;
    use approx::assert_abs_diff_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_rising_series_is_top_zone() {
        let s = TimeSeries::from_values(d(2020, 1, 1), &[100.0, 110.0, 120.0, 130.0, 140.0]);
        assert_eq!(ma_zone(&s, d(2020, 1, 5), 5), 5);
    }

    #[test]
    fn test_falling_series_is_bottom_zone() {
        let s = TimeSeries::from_values(d(2020, 1, 1), &[140.0, 130.0, 120.0, 110.0, 100.0]);
        assert_eq!(ma_zone(&s, d(2020, 1, 5), 5), 1);
    }

    #[test]
    fn test_middle_of_range() {
        // range 100..150, step 10; 125 falls in (120, 130]
        let s = TimeSeries::from_values(d(2020, 1, 1), &[100.0, 150.0, 125.0]);
        assert_eq!(ma_zone(&s, d(2020, 1, 3), 3), 3);
        let s = TimeSeries::from_values(d(2020, 1, 1), &[100.0, 150.0, 131.0]);
        assert_eq!(ma_zone(&s, d(2020, 1, 3), 3), 4);
    }

    #[test]
    fn test_short_history_is_neutral() {
        let s = TimeSeries::from_values(d(2020, 1, 1), &[100.0, 200.0]);
        assert_eq!(ma_zone(&s, d(2020, 1, 2), 5), NEUTRAL_ZONE);
        assert_eq!(ma_zone(&s, d(2019, 1, 2), 1), NEUTRAL_ZONE);
    }

    #[test]
    fn test_flat_window_is_neutral() {
        let s = TimeSeries::from_values(d(2020, 1, 1), &[100.0; 6]);
        assert_eq!(ma_zone(&s, d(2020, 1, 6), 5), NEUTRAL_ZONE);
    }

    #[test]
    fn test_zone_uses_as_of_sample_on_gap() {
        let s = TimeSeries::from_values(d(2020, 1, 1), &[100.0, 110.0, 120.0, 130.0, 140.0]);
        assert_eq!(ma_zone(&s, d(2020, 3, 1), 5), 5);
    }

    #[test]
    fn test_parse_zone_weights() {
        let w = ZoneWeights::parse("zone", "weights", "1:0.3,2:0.25,3:0.2,4:0.15,5:0.1").unwrap();
        assert_eq!(w.weight(1), 0.3);
        assert_eq!(w.weight(5), 0.1);
        assert!(ZoneWeights::parse("zone", "weights", "1:0.3,2:0.25").is_err());
        assert!(ZoneWeights::parse("zone", "weights", "6:0.3").is_err());
    }

    #[test]
    fn test_parse_windows() {
        assert_eq!(parse_windows("zone", "windows", "5, 20,60").unwrap(), vec![5, 20, 60]);
        assert!(parse_windows("zone", "windows", "5,0").is_err());
        assert!(parse_windows("zone", "windows", "5,x").is_err());
    }

    #[test]
    fn test_ensemble_averages_windows() {
        // window 5 sees the rally (zone 5), window 3 sees a flat tail (zone 3)
        let spy = TimeSeries::from_values(d(2020, 1, 1), &[100.0, 110.0, 120.0, 120.0, 120.0]);
        let market = MarketData::new().with_prices(Asset::Spy, spy);
        let prices = BTreeMap::from([(Asset::Spy, 120.0)]);
        let book = CutLossBook::new();
        let ctx = MarketContext {
            date: d(2020, 1, 5),
            market: &market,
            prices: &prices,
            macro_row: None,
            cut_loss: &book,
        };
        let defense = vec![(Asset::Usdt, 1.0)];
        let mut ensemble = ZoneEnsemble::new(
            vec![5, 3],
            ZoneWeights::default(),
            vec![Asset::Spy],
            defense.clone(),
        );
        let allocation = ensemble.target_allocation(&ctx).unwrap();
        assert_abs_diff_eq!(allocation.weight(Asset::Spy), (0.15 + 0.20) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(allocation.sum(), 1.0, epsilon = 1e-12);

        let mut single = ZonePolicy::new(5, ZoneWeights::default(), vec![Asset::Spy], defense);
        assert_eq!(single.name(), "dynamic_5ma_based_rebalance");
        let allocation = single.target_allocation(&ctx).unwrap();
        assert_abs_diff_eq!(allocation.weight(Asset::Usdt), 0.85, epsilon = 1e-12);
    }
}
