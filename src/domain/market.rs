//! In-memory market history shared by every strategy run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::asset::{Asset, Indicator, IndicatorSource};
use crate::domain::error::RebalancerError;
use crate::domain::series::TimeSeries;
use crate::domain::universe::Universe;
use crate::ports::price_port::PricePort;

/// Indicator values as of one date. Only built when every loaded indicator
/// has a sample on or before that date.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroRow {
    pub date: NaiveDate,
    values: BTreeMap<Indicator, f64>,
}

impl MacroRow {
    pub fn new(date: NaiveDate, values: BTreeMap<Indicator, f64>) -> Self {
        Self { date, values }
    }

    pub fn get(&self, indicator: Indicator) -> Result<f64, RebalancerError> {
        self.values
            .get(&indicator)
            .copied()
            .ok_or(RebalancerError::MacroUnavailable { date: self.date })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketData {
    prices: BTreeMap<Asset, TimeSeries>,
    indicators: BTreeMap<Indicator, TimeSeries>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(mut self, asset: Asset, series: TimeSeries) -> Self {
        self.prices.insert(asset, series);
        self
    }

    pub fn with_indicator(mut self, indicator: Indicator, series: TimeSeries) -> Self {
        self.indicators.insert(indicator, series);
        self
    }

    pub fn series(&self, asset: Asset) -> Option<&TimeSeries> {
        self.prices.get(&asset)
    }

    pub fn indicator(&self, indicator: Indicator) -> Option<&TimeSeries> {
        self.indicators.get(&indicator)
    }

    pub fn price_as_of(&self, asset: Asset, date: NaiveDate) -> Result<f64, RebalancerError> {
        self.series(asset)
            .and_then(|s| s.as_of(date))
            .ok_or_else(|| RebalancerError::DataUnavailable {
                symbol: asset.symbol().to_string(),
                date,
            })
    }

    /// As-of prices for every market-priced asset among `assets`.
    pub fn prices_as_of(
        &self,
        assets: impl IntoIterator<Item = Asset>,
        date: NaiveDate,
    ) -> Result<BTreeMap<Asset, f64>, RebalancerError> {
        assets
            .into_iter()
            .filter(|a| a.is_market_priced())
            .map(|a| self.price_as_of(a, date).map(|p| (a, p)))
            .collect()
    }

    /// Each loaded indicator resolved independently as of `date`.
    pub fn macro_row(&self, date: NaiveDate) -> Result<MacroRow, RebalancerError> {
        let values = self
            .indicators
            .iter()
            .map(|(indicator, series)| {
                series
                    .as_of(date)
                    .map(|v| (*indicator, v))
                    .ok_or(RebalancerError::MacroUnavailable { date })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(MacroRow::new(date, values))
    }
}

/// Loads every market asset of `universe` and the requested indicators for
/// `[start, end]`. A symbol with no samples at all fails the load.
pub fn load_market_data(
    port: &dyn PricePort,
    universe: &Universe,
    indicators: &[Indicator],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<MarketData, RebalancerError> {
    let mut market = MarketData::new();

    for asset in universe.market_assets() {
        let points = port.fetch_prices(asset.symbol(), start, end)?;
        if points.is_empty() {
            return Err(RebalancerError::DataUnavailable {
                symbol: asset.symbol().to_string(),
                date: end,
            });
        }
        debug!(symbol = asset.symbol(), samples = points.len(), "loaded prices");
        market = market.with_prices(asset, TimeSeries::new(points));
    }

    for &indicator in indicators {
        let points = match indicator.source() {
            IndicatorSource::Macro => port.fetch_indicator(indicator.symbol(), start, end)?,
            IndicatorSource::Price => port.fetch_prices(indicator.symbol(), start, end)?,
        };
        if points.is_empty() {
            return Err(RebalancerError::DataUnavailable {
                symbol: indicator.symbol().to_string(),
                date: end,
            });
        }
        debug!(symbol = indicator.symbol(), samples = points.len(), "loaded indicator");
        market = market.with_indicator(indicator, TimeSeries::new(points));
    }

    info!(
        assets = market.prices.len(),
        indicators = market.indicators.len(),
        %start,
        %end,
        "market data loaded"
    );
    Ok(market)
}
