//! Macro-index-driven policy.
//!
//! A risk score in [0, 1] built from price trend signals and macro
//! readings positions each growth asset inside its `[min, max]` band.
//! Higher rates, inflation, unemployment or volatility push the score down.

use std::collections::BTreeMap;

use crate::domain::allocation::{normalize, normalize_inverse, weight_in_band, TargetAllocation};
use crate::domain::asset::{Asset, Indicator};
use crate::domain::error::RebalancerError;

use super::{AllocationPolicy, MarketContext};

const INDICATORS: [Indicator; 4] = [
    Indicator::TreasuryYield,
    Indicator::Cpi,
    Indicator::Unemployment,
    Indicator::Vix,
];

/// Weight of each signal in the composite score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCoefficients {
    pub momentum: f64,
    pub midterm: f64,
    pub longterm: f64,
    pub all_time_high: f64,
    pub interest: f64,
    pub inflation: f64,
    pub unemployment: f64,
    pub volatility: f64,
}

impl Default for ScoreCoefficients {
    fn default() -> Self {
        ScoreCoefficients {
            momentum: 0.0,
            midterm: 0.4,
            longterm: 0.0,
            all_time_high: 0.0,
            interest: 0.3,
            inflation: 0.1,
            unemployment: 0.1,
            volatility: 0.1,
        }
    }
}

/// Raw signal values for one asset on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub momentum: f64,
    pub midterm: f64,
    pub longterm: f64,
    pub all_time_high: f64,
    pub interest: f64,
    pub inflation: f64,
    pub unemployment: f64,
    pub volatility: f64,
}

impl Signals {
    pub fn score(&self, c: &ScoreCoefficients) -> f64 {
        let raw = c.momentum * self.momentum
            + c.midterm * self.midterm
            + c.longterm * self.longterm
            + c.all_time_high * self.all_time_high
            + c.interest * self.interest
            + c.inflation * self.inflation
            + c.unemployment * self.unemployment
            + c.volatility * self.volatility;
        raw.clamp(0.0, 1.0)
    }
}

pub fn default_bands() -> BTreeMap<Asset, (f64, f64)> {
    BTreeMap::from([
        (Asset::Spy, (0.15, 0.25)),
        (Asset::Qqq, (0.15, 0.25)),
        (Asset::Schd, (0.15, 0.25)),
        (Asset::Btc, (0.0, 0.0)),
    ])
}

#[derive(Debug, Clone)]
pub struct MacroScorePolicy {
    bands: BTreeMap<Asset, (f64, f64)>,
    coefficients: ScoreCoefficients,
    defense: Vec<(Asset, f64)>,
}

impl MacroScorePolicy {
    pub fn new(
        bands: BTreeMap<Asset, (f64, f64)>,
        coefficients: ScoreCoefficients,
        defense: Vec<(Asset, f64)>,
    ) -> Self {
        MacroScorePolicy {
            bands,
            coefficients,
            defense,
        }
    }

    fn signals(&self, ctx: &MarketContext<'_>, asset: Asset) -> Result<Signals, RebalancerError> {
        let price = ctx.price(asset)?;
        let series = ctx.series(asset)?;
        let unavailable = || RebalancerError::DataUnavailable {
            symbol: asset.symbol().to_string(),
            date: ctx.date,
        };
        let ma20 = series.trailing_mean(ctx.date, 20).ok_or_else(unavailable)?;
        let ma60 = series.trailing_mean(ctx.date, 60).ok_or_else(unavailable)?;
        let ma120 = series.trailing_mean(ctx.date, 120).ok_or_else(unavailable)?;
        let high = series.max_until(ctx.date).ok_or_else(unavailable)?;

        let ratio = |num: f64, den: f64| if den != 0.0 { num / den } else { 1.0 };
        Ok(Signals {
            momentum: normalize(ratio(price, ma20), 0.8, 1.2),
            midterm: normalize_inverse(ratio(price, ma60), 0.8, 1.2),
            longterm: 1.0 - ratio(ma20, ma120),
            all_time_high: normalize(ratio(price, high), 0.8, 1.2),
            interest: normalize_inverse(ctx.macro_value(Indicator::TreasuryYield)?, 1.0, 4.0),
            inflation: normalize_inverse(ctx.macro_value(Indicator::Cpi)?, 250.0, 300.0),
            unemployment: normalize_inverse(ctx.macro_value(Indicator::Unemployment)?, 4.0, 14.0),
            volatility: normalize_inverse(ctx.macro_value(Indicator::Vix)?, 10.0, 80.0),
        })
    }
}

impl AllocationPolicy for MacroScorePolicy {
    fn name(&self) -> &str {
        "index_based_rebalance"
    }

    fn required_indicators(&self) -> &[Indicator] {
        &INDICATORS
    }

    fn target_allocation(
        &mut self,
        ctx: &MarketContext<'_>,
    ) -> Result<TargetAllocation, RebalancerError> {
        let mut growth = BTreeMap::new();
        for (&asset, &band) in &self.bands {
            let score = self.signals(ctx, asset)?.score(&self.coefficients);
            growth.insert(asset, weight_in_band(band, score));
        }
        Ok(TargetAllocation::with_defense(&growth, &self.defense))
    }
}
