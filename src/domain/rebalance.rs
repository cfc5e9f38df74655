//! Rebalance engine: one policy, one portfolio, one history.
//!
//! Each event runs accrue, price, reallocate and record against a working
//! copy of the holdings. The copy replaces the portfolio only once the
//! record is built, so a skipped event leaves no trace beyond the skip log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::allocation::TargetAllocation;
use crate::domain::asset::Asset;
use crate::domain::cut_loss::CutLossBook;
use crate::domain::error::RebalancerError;
use crate::domain::market::{MacroRow, MarketData};
use crate::domain::policy::{AllocationPolicy, MarketContext, RebalanceMode};
use crate::domain::portfolio::{HistoryRecord, Portfolio};

/// An event a run could not complete, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEvent {
    pub date: NaiveDate,
    pub reason: String,
}

/// Shared, read-only inputs of one event date.
#[derive(Debug, Clone, Copy)]
pub struct EventInputs<'a> {
    pub date: NaiveDate,
    pub market: &'a MarketData,
    pub macro_row: Option<&'a MacroRow>,
    pub cut_loss: &'a CutLossBook,
}

pub struct StrategyRun {
    policy: Box<dyn AllocationPolicy>,
    rates: BTreeMap<Asset, f64>,
    portfolio: Portfolio,
    history: Vec<HistoryRecord>,
    skipped: Vec<SkippedEvent>,
    last_accrual: Option<NaiveDate>,
    pending_cash: f64,
    contributed: f64,
}

impl StrategyRun {
    pub fn new(policy: Box<dyn AllocationPolicy>, rates: BTreeMap<Asset, f64>) -> Self {
        StrategyRun {
            policy,
            rates,
            portfolio: Portfolio::new(),
            history: Vec::new(),
            skipped: Vec::new(),
            last_accrual: None,
            pending_cash: 0.0,
            contributed: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        self.policy.name()
    }

    pub fn policy(&self) -> &dyn AllocationPolicy {
        self.policy.as_ref()
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    pub fn skipped(&self) -> &[SkippedEvent] {
        &self.skipped
    }

    /// Sum of every contribution offered to this run.
    pub fn contributed(&self) -> f64 {
        self.contributed
    }

    /// Cash from skipped events waiting for the next successful one.
    pub fn pending_cash(&self) -> f64 {
        self.pending_cash
    }

    /// Runs one rebalance event. Recoverable data gaps skip the event and
    /// carry its cash forward; structural errors are returned.
    pub fn step(&mut self, inputs: &EventInputs<'_>, contribution: f64) -> Result<(), RebalancerError> {
        self.contributed += contribution;
        let cash = self.pending_cash + contribution;

        match self.attempt(inputs, cash) {
            Ok((portfolio, record)) => {
                debug!(
                    strategy = self.policy.name(),
                    date = %inputs.date,
                    value = record.total_value,
                    "rebalanced"
                );
                self.policy.commit();
                self.portfolio = portfolio;
                self.history.push(record);
                self.last_accrual = Some(inputs.date);
                self.pending_cash = 0.0;
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!(
                    strategy = self.policy.name(),
                    date = %inputs.date,
                    error = %e,
                    "skipping rebalance"
                );
                self.skipped.push(SkippedEvent {
                    date: inputs.date,
                    reason: e.to_string(),
                });
                self.pending_cash = cash;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn attempt(
        &mut self,
        inputs: &EventInputs<'_>,
        cash: f64,
    ) -> Result<(Portfolio, HistoryRecord), RebalancerError> {
        let date = inputs.date;

        let required = self.policy.required_indicators();
        if !required.is_empty() {
            let row = inputs
                .macro_row
                .ok_or(RebalancerError::MacroUnavailable { date })?;
            for &indicator in required {
                row.get(indicator)?;
            }
        }

        // accruing
        let mut working = self.portfolio.clone();
        let days = self
            .last_accrual
            .map(|last| (date - last).num_days())
            .unwrap_or(0);
        debug_assert!(days >= 0, "events must be visited in date order");
        working.accrue(&self.rates, days.max(0));

        // pricing
        let mut prices = price_assets(inputs.market, working.assets(), date)?;

        // reallocating
        let allocation = {
            let ctx = MarketContext {
                date,
                market: inputs.market,
                prices: &prices,
                macro_row: inputs.macro_row,
                cut_loss: inputs.cut_loss,
            };
            self.policy.target_allocation(&ctx)?
        };
        allocation.validate(self.policy.name(), date)?;
        prices.extend(price_assets(inputs.market, allocation.assets(), date)?);

        match self.policy.mode() {
            RebalanceMode::Rebalance => {
                let total = working.total_value(&prices, date)? + cash;
                let held: BTreeSet<Asset> = working.assets().chain(allocation.assets()).collect();
                for asset in held {
                    let target = total * allocation.weight(asset);
                    working.set_holding(asset, to_holding(asset, target, &prices));
                }
            }
            RebalanceMode::Accumulate => {
                for (asset, weight) in allocation.iter() {
                    working.add_holding(asset, to_holding(asset, cash * weight, &prices));
                }
            }
        }

        // recording
        let valuations = working.valuations(&prices, date)?;
        let record = HistoryRecord {
            date,
            total_value: valuations.values().sum(),
            valuations,
        };
        Ok((working, record))
    }
}

/// Positive as-of prices for the market-priced assets among `assets`.
fn price_assets(
    market: &MarketData,
    assets: impl IntoIterator<Item = Asset>,
    date: NaiveDate,
) -> Result<BTreeMap<Asset, f64>, RebalancerError> {
    let prices = market.prices_as_of(assets, date)?;
    if let Some((asset, _)) = prices.iter().find(|(_, p)| p.is_nan() || **p <= 0.0) {
        return Err(RebalancerError::DataUnavailable {
            symbol: asset.symbol().to_string(),
            date,
        });
    }
    Ok(prices)
}

/// Converts a currency amount into the unit the portfolio holds.
fn to_holding(asset: Asset, value: f64, prices: &BTreeMap<Asset, f64>) -> f64 {
    match prices.get(&asset) {
        Some(price) if asset.is_market_priced() => value / price,
        _ => value,
    }
}

/// Target weights of `policy` for `date` outside any run.
pub fn allocation_on(
    policy: &mut dyn AllocationPolicy,
    inputs: &EventInputs<'_>,
    assets: &[Asset],
) -> Result<TargetAllocation, RebalancerError> {
    let prices = price_assets(inputs.market, assets.iter().copied(), inputs.date)?;
    let ctx = MarketContext {
        date: inputs.date,
        market: inputs.market,
        prices: &prices,
        macro_row: inputs.macro_row,
        cut_loss: inputs.cut_loss,
    };
    let allocation = policy.target_allocation(&ctx)?;
    allocation.validate(policy.name(), inputs.date)?;
    Ok(allocation)
}
