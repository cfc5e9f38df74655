//! Holdings of one strategy run and its value history.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::asset::{Asset, Valuation};
use super::error::RebalancerError;

/// Market assets hold unit quantities, accrual assets hold currency value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    holdings: BTreeMap<Asset, f64>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding(&self, asset: Asset) -> f64 {
        self.holdings.get(&asset).copied().unwrap_or(0.0)
    }

    pub fn set_holding(&mut self, asset: Asset, amount: f64) {
        self.holdings.insert(asset, amount);
    }

    pub fn add_holding(&mut self, asset: Asset, amount: f64) {
        *self.holdings.entry(asset).or_insert(0.0) += amount;
    }

    pub fn assets(&self) -> impl Iterator<Item = Asset> + '_ {
        self.holdings.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.values().all(|v| *v == 0.0)
    }

    /// Grows every accrual holding over `days`.
    pub fn accrue(&mut self, rates: &BTreeMap<Asset, f64>, days: i64) {
        for (asset, amount) in self.holdings.iter_mut() {
            if let Valuation::Accrual(compounding) = asset.valuation() {
                let rate = rates.get(asset).copied().unwrap_or(0.0);
                *amount = compounding.accrue(*amount, rate, days);
            }
        }
    }

    /// Currency value of a holding at `prices`.
    pub fn value_of(
        &self,
        asset: Asset,
        prices: &BTreeMap<Asset, f64>,
        date: NaiveDate,
    ) -> Result<f64, RebalancerError> {
        let amount = self.holding(asset);
        match asset.valuation() {
            Valuation::Accrual(_) => Ok(amount),
            Valuation::Market if amount == 0.0 => Ok(0.0),
            Valuation::Market => prices
                .get(&asset)
                .map(|p| amount * p)
                .ok_or_else(|| RebalancerError::DataUnavailable {
                    symbol: asset.symbol().to_string(),
                    date,
                }),
        }
    }

    pub fn valuations(
        &self,
        prices: &BTreeMap<Asset, f64>,
        date: NaiveDate,
    ) -> Result<BTreeMap<Asset, f64>, RebalancerError> {
        self.holdings
            .keys()
            .map(|&asset| self.value_of(asset, prices, date).map(|v| (asset, v)))
            .collect()
    }

    pub fn total_value(
        &self,
        prices: &BTreeMap<Asset, f64>,
        date: NaiveDate,
    ) -> Result<f64, RebalancerError> {
        Ok(self.valuations(prices, date)?.values().sum())
    }
}

/// Snapshot appended after each successful rebalance event.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub date: NaiveDate,
    pub total_value: f64,
    pub valuations: BTreeMap<Asset, f64>,
}

impl HistoryRecord {
    /// Share of the portfolio value held in `asset`.
    pub fn share(&self, asset: Asset) -> f64 {
        if self.total_value > 0.0 {
            self.valuations.get(&asset).copied().unwrap_or(0.0) / self.total_value
        } else {
            0.0
        }
    }
}
