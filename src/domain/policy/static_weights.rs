//! Fixed-weight policies: static rebalance, buy-and-hold and all-in.

use crate::domain::allocation::TargetAllocation;
use crate::domain::asset::Asset;
use crate::domain::error::RebalancerError;

use super::{AllocationPolicy, MarketContext, RebalanceMode};

#[derive(Debug, Clone)]
pub struct StaticPolicy {
    name: String,
    weights: TargetAllocation,
    mode: RebalanceMode,
}

impl StaticPolicy {
    pub fn new(name: impl Into<String>, weights: &[(Asset, f64)], mode: RebalanceMode) -> Self {
        StaticPolicy {
            name: name.into(),
            weights: TargetAllocation::from_weights(weights.iter().copied()),
            mode,
        }
    }

    /// Resizes every holding back to `weights` on each event.
    pub fn rebalancing(weights: &[(Asset, f64)]) -> Self {
        Self::new("static_rebalance", weights, RebalanceMode::Rebalance)
    }

    /// Buys `weights` with new cash and never trades existing holdings.
    pub fn buy_and_hold(weights: &[(Asset, f64)]) -> Self {
        Self::new("buy_and_hold", weights, RebalanceMode::Accumulate)
    }

    /// Puts every contribution into `asset`.
    pub fn single_asset(asset: Asset) -> Self {
        Self::new(
            format!("{}_only", asset.name().to_lowercase()),
            &[(asset, 1.0)],
            RebalanceMode::Accumulate,
        )
    }
}

impl AllocationPolicy for StaticPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> RebalanceMode {
        self.mode
    }

    fn target_allocation(
        &mut self,
        _ctx: &MarketContext<'_>,
    ) -> Result<TargetAllocation, RebalancerError> {
        Ok(self.weights.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cut_loss::CutLossBook;
    use crate::domain::market::MarketData;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    #[test]
    fn test_static_returns_configured_weights() {
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
        let mut policy = StaticPolicy::rebalancing(&[(Asset::Spy, 0.6), (Asset::Usdt, 0.4)]);
        let allocation = policy.target_allocation(&ctx).unwrap();
        assert_eq!(allocation.weight(Asset::Spy), 0.6);
        assert_eq!(allocation.weight(Asset::Usdt), 0.4);
        assert_eq!(policy.mode(), RebalanceMode::Rebalance);
    }

    #[test]
    fn test_buy_and_hold_accumulates() {
        let policy = StaticPolicy::buy_and_hold(&[(Asset::Spy, 1.0)]);
        assert_eq!(policy.name(), "buy_and_hold");
        assert_eq!(policy.mode(), RebalanceMode::Accumulate);
        assert!(!policy.reacts_to_cut_loss());
    }

    #[test]
    fn test_single_asset_names() {
        assert_eq!(StaticPolicy::single_asset(Asset::Gold).name(), "gold_only");
        assert_eq!(
            StaticPolicy::single_asset(Asset::BondAnnual35).name(),
            "bond_annual_3_5_only"
        );
    }
}
