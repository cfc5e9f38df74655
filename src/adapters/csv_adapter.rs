//! CSV file price and indicator adapter.
//!
//! One file per symbol, `<dir>/<SYMBOL>.csv`, with a `date,value` header.
//! Prices and macro indicators share the layout; FRED-style `.` cells mark
//! missing observations and are skipped.

use crate::domain::error::RebalancerError;
use crate::domain::series::PricePoint;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn read_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| RebalancerError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut points = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| RebalancerError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str = record.get(0).ok_or_else(|| RebalancerError::Database {
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                RebalancerError::Database {
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            let raw = record
                .get(1)
                .ok_or_else(|| RebalancerError::Database {
                    reason: "missing value column".into(),
                })?
                .trim();
            if raw.is_empty() || raw == "." {
                continue;
            }
            let value: f64 = raw.parse().map_err(|e| RebalancerError::Database {
                reason: format!("invalid value for {} on {}: {}", symbol, date, e),
            })?;

            points.push(PricePoint::new(date, value));
        }

        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Ok(points)
    }
}

impl PricePort for CsvAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        self.read_series(symbol, start, end)
    }

    fn fetch_indicator(
        &self,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        self.read_series(name, start, end)
    }
}
