#![allow(dead_code)]

use chrono::NaiveDate;
use rebalancer::domain::asset::{Asset, Indicator};
use rebalancer::domain::error::RebalancerError;
pub use rebalancer::domain::series::PricePoint;
use rebalancer::ports::price_port::PricePort;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct MockPriceProvider {
    pub prices: HashMap<String, Vec<PricePoint>>,
    pub indicators: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceProvider {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            indicators: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_asset(mut self, asset: Asset, points: Vec<PricePoint>) -> Self {
        self.prices.insert(asset.symbol().to_string(), points);
        self
    }

    /// Registers an indicator under the table its source reads from.
    pub fn with_indicator(mut self, indicator: Indicator, points: Vec<PricePoint>) -> Self {
        use rebalancer::domain::asset::IndicatorSource;
        match indicator.source() {
            IndicatorSource::Macro => self.indicators.insert(indicator.symbol().to_string(), points),
            IndicatorSource::Price => self.prices.insert(indicator.symbol().to_string(), points),
        };
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn lookup(
        &self,
        table: &HashMap<String, Vec<PricePoint>>,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RebalancerError::Database {
                reason: reason.clone(),
            });
        }
        Ok(table
            .get(symbol)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.date >= start && p.date <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl PricePort for MockPriceProvider {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        self.lookup(&self.prices, symbol, start, end)
    }

    fn fetch_indicator(
        &self,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        self.lookup(&self.indicators, name, start, end)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One sample per calendar day starting at `start`.
pub fn daily(start: NaiveDate, values: &[f64]) -> Vec<PricePoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| PricePoint::new(start + chrono::Duration::days(i as i64), v))
        .collect()
}

pub fn flat(start: NaiveDate, days: usize, value: f64) -> Vec<PricePoint> {
    daily(start, &vec![value; days])
}

/// A gently trending, oscillating positive series.
pub fn wave(start: NaiveDate, days: usize, base: f64, phase: f64) -> Vec<PricePoint> {
    let values: Vec<f64> = (0..days)
        .map(|i| {
            let t = i as f64;
            base * (1.0 + 0.1 * ((t / 17.0) + phase).sin() + 0.0005 * t)
        })
        .collect();
    daily(start, &values)
}

/// Provider with every default asset and indicator populated from `start`.
pub fn full_provider(start: NaiveDate, days: usize) -> MockPriceProvider {
    let mut provider = MockPriceProvider::new();
    for (i, asset) in [Asset::Spy, Asset::Qqq, Asset::Schd, Asset::Btc, Asset::Gold]
        .into_iter()
        .enumerate()
    {
        provider = provider.with_asset(asset, wave(start, days, 100.0 * (i + 1) as f64, i as f64));
    }
    provider
        .with_indicator(Indicator::TreasuryYield, flat(start, days, 2.5))
        .with_indicator(Indicator::Cpi, flat(start, days, 270.0))
        .with_indicator(Indicator::Unemployment, flat(start, days, 6.0))
        .with_indicator(Indicator::Vix, flat(start, days, 20.0))
        .with_indicator(Indicator::TreasuryYieldQuote, flat(start, days, 2.5))
        .with_indicator(Indicator::VixQuote, flat(start, days, 20.0))
}

/// Writes `points` to `<dir>/<symbol>.csv` in the `date,value` layout.
pub fn write_csv(dir: &Path, symbol: &str, points: &[PricePoint]) {
    let mut content = String::from("date,value\n");
    for p in points {
        content.push_str(&format!("{},{}\n", p.date.format("%Y-%m-%d"), p.value));
    }
    fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}

/// Dumps every series of `provider` into CSV files under `dir`.
pub fn write_provider_csv(dir: &Path, provider: &MockPriceProvider) {
    for (symbol, points) in provider.prices.iter().chain(provider.indicators.iter()) {
        write_csv(dir, symbol, points);
    }
}
