//! Backtest orchestrator.
//!
//! Drives every strategy run over the shared rebalance calendar (or over
//! every calendar day in the cut-loss variant), then merges the histories
//! into one date-indexed table.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::info;

use crate::domain::allocation::TargetAllocation;
use crate::domain::asset::Asset;
use crate::domain::calendar::{daily_dates, rebalance_dates};
use crate::domain::cut_loss::{CutLossBook, CutLossRule};
use crate::domain::error::RebalancerError;
use crate::domain::market::MarketData;
use crate::domain::metrics::{horizon_years, StrategySummary};
use crate::domain::policy::AllocationPolicy;
use crate::domain::portfolio::HistoryRecord;
use crate::domain::rebalance::{allocation_on, EventInputs, SkippedEvent, StrategyRun};

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rebalance_day: u32,
    pub initial_capital: f64,
    pub monthly_contribution: f64,
    pub cut_loss: Option<CutLossRule>,
}

impl BacktestConfig {
    pub fn rebalance_dates(&self) -> Vec<NaiveDate> {
        rebalance_dates(self.start_date, self.end_date, self.rebalance_day)
    }
}

/// What one strategy run leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub name: String,
    pub history: Vec<HistoryRecord>,
    pub skipped: Vec<SkippedEvent>,
    pub contributed: f64,
}

impl From<StrategyRun> for StrategyOutcome {
    fn from(run: StrategyRun) -> Self {
        StrategyOutcome {
            name: run.name().to_string(),
            history: run.history().to_vec(),
            skipped: run.skipped().to_vec(),
            contributed: run.contributed(),
        }
    }
}

/// Total value per strategy, outer-joined on date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTable {
    pub columns: Vec<String>,
    pub rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
}

impl ValueTable {
    pub fn from_outcomes(outcomes: &[StrategyOutcome]) -> Self {
        let width = outcomes.len();
        let mut rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for (col, outcome) in outcomes.iter().enumerate() {
            for record in &outcome.history {
                rows.entry(record.date).or_insert_with(|| vec![None; width])[col] =
                    Some(record.total_value);
            }
        }
        ValueTable {
            columns: outcomes.iter().map(|o| o.name.clone()).collect(),
            rows: rows.into_iter().collect(),
        }
    }

    pub fn value(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        let idx = self.rows.binary_search_by_key(&date, |(d, _)| *d).ok()?;
        self.rows[idx].1[col]
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub strategies: Vec<StrategyOutcome>,
    pub table: ValueTable,
}

impl BacktestResult {
    fn new(config: &BacktestConfig, runs: Vec<StrategyRun>) -> Self {
        let strategies: Vec<StrategyOutcome> = runs.into_iter().map(StrategyOutcome::from).collect();
        let table = ValueTable::from_outcomes(&strategies);
        BacktestResult {
            start_date: config.start_date,
            end_date: config.end_date,
            strategies,
            table,
        }
    }

    pub fn strategy(&self, name: &str) -> Option<&StrategyOutcome> {
        self.strategies.iter().find(|s| s.name == name)
    }

    pub fn summaries(&self) -> Vec<StrategySummary> {
        let years = horizon_years(self.start_date, self.end_date);
        self.strategies
            .iter()
            .map(|s| StrategySummary::compute(&s.name, &s.history, s.contributed, s.skipped.len(), years))
            .collect()
    }
}

fn step_all<'a>(
    runs: impl Iterator<Item = &'a mut StrategyRun>,
    inputs: &EventInputs<'_>,
    contribution: f64,
) -> Result<(), RebalancerError> {
    for run in runs {
        run.step(inputs, contribution)?;
    }
    Ok(())
}

/// Steps every run on each rebalance date. The first date injects the
/// initial capital, each later one the monthly contribution.
pub fn run_backtest(
    config: &BacktestConfig,
    market: &MarketData,
    mut runs: Vec<StrategyRun>,
) -> Result<BacktestResult, RebalancerError> {
    let dates = config.rebalance_dates();
    info!(
        strategies = runs.len(),
        events = dates.len(),
        start = %config.start_date,
        end = %config.end_date,
        "running backtest"
    );
    let book = CutLossBook::new();

    for (i, &date) in dates.iter().enumerate() {
        let contribution = if i == 0 {
            config.initial_capital
        } else {
            config.monthly_contribution
        };
        let macro_row = market.macro_row(date).ok();
        let inputs = EventInputs {
            date,
            market,
            macro_row: macro_row.as_ref(),
            cut_loss: &book,
        };
        step_all(runs.iter_mut(), &inputs, contribution)?;
    }

    Ok(BacktestResult::new(config, runs))
}

/// Walks every calendar day. Regular dates step every run; a day on which
/// some growth asset changes cut-loss state steps only the runs that react
/// to cut-loss, with no new cash. Each day is visited once.
pub fn run_backtest_with_cut_loss(
    config: &BacktestConfig,
    market: &MarketData,
    growth: &[Asset],
    mut runs: Vec<StrategyRun>,
) -> Result<BacktestResult, RebalancerError> {
    let rule = config.cut_loss.clone().unwrap_or_default();
    let regular: BTreeSet<NaiveDate> = config.rebalance_dates().into_iter().collect();
    let mut book = CutLossBook::new();
    let mut invested = false;
    let mut exceptional = 0usize;

    info!(
        strategies = runs.len(),
        events = regular.len(),
        start = %config.start_date,
        end = %config.end_date,
        "running backtest with cut-loss"
    );

    for date in daily_dates(config.start_date, config.end_date) {
        let changed = book.advance(&rule, market, growth, date);
        let is_regular = regular.contains(&date);
        if !is_regular && !(changed && invested) {
            continue;
        }

        let macro_row = market.macro_row(date).ok();
        let inputs = EventInputs {
            date,
            market,
            macro_row: macro_row.as_ref(),
            cut_loss: &book,
        };

        if is_regular {
            let contribution = if invested {
                config.monthly_contribution
            } else {
                config.initial_capital
            };
            invested = true;
            step_all(runs.iter_mut(), &inputs, contribution)?;
        } else {
            exceptional += 1;
            step_all(
                runs.iter_mut().filter(|r| r.policy().reacts_to_cut_loss()),
                &inputs,
                0.0,
            )?;
        }
    }

    info!(exceptional, "cut-loss rebalances");
    Ok(BacktestResult::new(config, runs))
}

/// Target weights of `policy` on the latest date any price is known.
pub fn latest_allocation(
    policy: &mut dyn AllocationPolicy,
    market: &MarketData,
    assets: &[Asset],
) -> Result<(NaiveDate, TargetAllocation), RebalancerError> {
    let date = assets
        .iter()
        .filter_map(|a| market.series(*a).and_then(|s| s.last()))
        .map(|p| p.date)
        .max()
        .ok_or_else(|| RebalancerError::DataUnavailable {
            symbol: "any".to_string(),
            date: NaiveDate::MIN,
        })?;
    let macro_row = market.macro_row(date).ok();
    let book = CutLossBook::new();
    let inputs = EventInputs {
        date,
        market,
        macro_row: macro_row.as_ref(),
        cut_loss: &book,
    };
    let allocation = allocation_on(policy, &inputs, assets)?;
    Ok((date, allocation))
}
