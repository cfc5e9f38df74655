//! Allocation policies: market state in, target weights out.
//!
//! Every policy sizes the universe's growth assets on its own terms and
//! hands the remainder to the defense assets by fixed ratios. Stateful
//! policies (the drawdown tracker) stage their updates in
//! `target_allocation` and make them permanent in `commit`, which the engine
//! calls only for events that end up recorded.

pub mod drawdown;
pub mod macro_score;
pub mod macro_zone;
pub mod static_weights;
pub mod zone;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::allocation::TargetAllocation;
use crate::domain::asset::{Asset, Indicator};
use crate::domain::cut_loss::CutLossBook;
use crate::domain::error::RebalancerError;
use crate::domain::market::{MacroRow, MarketData};
use crate::domain::series::TimeSeries;

/// How a run applies a target allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebalanceMode {
    /// Resize every holding to the target.
    #[default]
    Rebalance,
    /// Leave holdings alone and split only new cash by the target.
    Accumulate,
}

/// Everything a policy may look at on one event date.
#[derive(Debug, Clone, Copy)]
pub struct MarketContext<'a> {
    pub date: NaiveDate,
    pub market: &'a MarketData,
    /// As-of prices of the market-priced assets the run holds or targets.
    pub prices: &'a BTreeMap<Asset, f64>,
    pub macro_row: Option<&'a MacroRow>,
    pub cut_loss: &'a CutLossBook,
}

impl MarketContext<'_> {
    pub fn price(&self, asset: Asset) -> Result<f64, RebalancerError> {
        match self.prices.get(&asset) {
            Some(p) => Ok(*p),
            None => self.market.price_as_of(asset, self.date),
        }
    }

    pub fn series(&self, asset: Asset) -> Result<&TimeSeries, RebalancerError> {
        self.market
            .series(asset)
            .ok_or_else(|| RebalancerError::DataUnavailable {
                symbol: asset.symbol().to_string(),
                date: self.date,
            })
    }

    pub fn macro_value(&self, indicator: Indicator) -> Result<f64, RebalancerError> {
        self.macro_row
            .ok_or(RebalancerError::MacroUnavailable { date: self.date })?
            .get(indicator)
    }
}

pub trait AllocationPolicy {
    /// Column name of the strategy in reports.
    fn name(&self) -> &str;

    fn mode(&self) -> RebalanceMode {
        RebalanceMode::Rebalance
    }

    /// Indicators that must be present in the event's macro row.
    fn required_indicators(&self) -> &[Indicator] {
        &[]
    }

    /// Whether the policy takes out-of-cycle rebalances on cut-loss changes.
    fn reacts_to_cut_loss(&self) -> bool {
        false
    }

    fn target_allocation(
        &mut self,
        ctx: &MarketContext<'_>,
    ) -> Result<TargetAllocation, RebalancerError>;

    /// Keeps the state staged by the last `target_allocation` call.
    fn commit(&mut self) {}
}

/// Parses `min:max` into a weight band.
pub fn parse_band(section: &str, key: &str, input: &str) -> Result<(f64, f64), RebalancerError> {
    let invalid = || {
        RebalancerError::config_invalid(section, key, format!("expected min:max, got '{}'", input.trim()))
    };
    let (lo, hi) = input.split_once(':').ok_or_else(invalid)?;
    let lo: f64 = lo.trim().parse().map_err(|_| invalid())?;
    let hi: f64 = hi.trim().parse().map_err(|_| invalid())?;
    if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
        return Err(RebalancerError::config_invalid(
            section,
            key,
            "band must satisfy 0 <= min <= max <= 1",
        ));
    }
    Ok((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_band() {
        assert_eq!(parse_band("macro", "spy", "0.15:0.25").unwrap(), (0.15, 0.25));
        assert_eq!(parse_band("macro", "btc", " 0 : 0 ").unwrap(), (0.0, 0.0));
    }

    #[test]
    fn test_parse_band_rejects_inverted_and_garbage() {
        assert!(parse_band("macro", "spy", "0.3:0.2").is_err());
        assert!(parse_band("macro", "spy", "0.3").is_err());
        assert!(parse_band("macro", "spy", "a:b").is_err());
        assert!(parse_band("macro", "spy", "0.5:1.5").is_err());
    }

    #[test]
    fn test_context_macro_value_without_row() {
        let market = MarketData::new();
        let prices = BTreeMap::new();
        let book = CutLossBook::new();
        let ctx = MarketContext {
            date: NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(),
            market: &market,
            prices: &prices,
            macro_row: None,
            cut_loss: &book,
        };
        assert!(matches!(
            ctx.macro_value(Indicator::Cpi),
            Err(RebalancerError::MacroUnavailable { .. })
        ));
        assert!(ctx.price(Asset::Spy).is_err());
    }
}
