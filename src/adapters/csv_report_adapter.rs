//! CSV report adapter implementing ReportPort.
//!
//! Writes four files into the output directory: `history.csv` (total value
//! per strategy, outer-joined on date), `summary.csv`, `skipped.csv` and
//! `weights.csv` (min/max/latest share of each asset per strategy).

use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RebalancerError;
use crate::domain::metrics::{weight_ranges, StrategySummary};
use crate::ports::report_port::ReportPort;

fn csv_error(e: csv::Error) -> RebalancerError {
    RebalancerError::Io(std::io::Error::other(e.to_string()))
}

fn fmt_value(v: f64) -> String {
    format!("{:.6}", v)
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_history(&self, result: &BacktestResult, dir: &Path) -> Result<(), RebalancerError> {
        let mut wtr = csv::Writer::from_path(dir.join("history.csv")).map_err(csv_error)?;
        let mut header = vec!["date".to_string()];
        header.extend(result.table.columns.iter().cloned());
        wtr.write_record(&header).map_err(csv_error)?;

        for (date, values) in &result.table.rows {
            let mut row = vec![date.format("%Y-%m-%d").to_string()];
            row.extend(values.iter().map(|v| v.map(fmt_value).unwrap_or_default()));
            wtr.write_record(&row).map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_summary(&self, summaries: &[StrategySummary], dir: &Path) -> Result<(), RebalancerError> {
        let mut wtr = csv::Writer::from_path(dir.join("summary.csv")).map_err(csv_error)?;
        wtr.write_record([
            "strategy",
            "total_contributed",
            "final_value",
            "cumulative_return_pct",
            "cagr",
            "max_drawdown",
            "calmar",
            "max_drawdown_duration",
            "skipped_events",
        ])
        .map_err(csv_error)?;

        for s in summaries {
            wtr.write_record([
                s.strategy.clone(),
                fmt_value(s.total_contributed),
                fmt_value(s.final_value),
                fmt_value(s.cumulative_return_pct),
                fmt_value(s.cagr),
                fmt_value(s.max_drawdown),
                fmt_value(s.calmar),
                s.max_drawdown_duration.to_string(),
                s.skipped_events.to_string(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_skipped(&self, result: &BacktestResult, dir: &Path) -> Result<(), RebalancerError> {
        let mut wtr = csv::Writer::from_path(dir.join("skipped.csv")).map_err(csv_error)?;
        wtr.write_record(["strategy", "date", "reason"]).map_err(csv_error)?;
        for outcome in &result.strategies {
            for skip in &outcome.skipped {
                let date = skip.date.format("%Y-%m-%d").to_string();
                wtr.write_record([outcome.name.as_str(), date.as_str(), skip.reason.as_str()])
                .map_err(csv_error)?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_weights(&self, result: &BacktestResult, dir: &Path) -> Result<(), RebalancerError> {
        let mut wtr = csv::Writer::from_path(dir.join("weights.csv")).map_err(csv_error)?;
        wtr.write_record(["strategy", "asset", "min", "max", "latest"])
            .map_err(csv_error)?;
        for outcome in &result.strategies {
            for range in weight_ranges(&outcome.history) {
                wtr.write_record([
                    outcome.name.clone(),
                    range.asset.to_string(),
                    fmt_value(range.min),
                    fmt_value(range.max),
                    fmt_value(range.latest),
                ])
                .map_err(csv_error)?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        summaries: &[StrategySummary],
        output_path: &str,
    ) -> Result<(), RebalancerError> {
        let dir = Path::new(output_path);
        fs::create_dir_all(dir).map_err(RebalancerError::Io)?;

        self.write_history(result, dir)?;
        self.write_summary(summaries, dir)?;
        self.write_skipped(result, dir)?;
        self.write_weights(result, dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::Asset;
    use crate::domain::backtest::{StrategyOutcome, ValueTable};
    use crate::domain::portfolio::HistoryRecord;
    use crate::domain::rebalance::SkippedEvent;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_result() -> BacktestResult {
        let record = |date, value: f64| HistoryRecord {
            date,
            total_value: value,
            valuations: BTreeMap::from([(Asset::Spy, value * 0.5), (Asset::Usdt, value * 0.5)]),
        };
        let strategies = vec![
            StrategyOutcome {
                name: "static_rebalance".into(),
                history: vec![record(d(2024, 1, 15), 100.0), record(d(2024, 2, 15), 110.0)],
                skipped: vec![],
                contributed: 100.0,
            },
            StrategyOutcome {
                name: "index_based_rebalance".into(),
                history: vec![record(d(2024, 2, 15), 100.0)],
                skipped: vec![SkippedEvent {
                    date: d(2024, 1, 15),
                    reason: "no complete macro row at or before 2024-01-15".into(),
                }],
                contributed: 100.0,
            },
        ];
        let table = ValueTable::from_outcomes(&strategies);
        BacktestResult {
            start_date: d(2024, 1, 1),
            end_date: d(2024, 2, 28),
            strategies,
            table,
        }
    }

    #[test]
    fn csv_report_writes_all_files() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out");
        let result = sample_result();
        let summaries = result.summaries();

        CsvReportAdapter::new()
            .write(&result, &summaries, output.to_str().unwrap())
            .unwrap();

        for name in ["history.csv", "summary.csv", "skipped.csv", "weights.csv"] {
            assert!(output.join(name).exists(), "{name} missing");
        }
    }

    #[test]
    fn history_is_outer_joined() {
        let dir = tempdir().unwrap();
        let result = sample_result();
        CsvReportAdapter::new()
            .write(&result, &result.summaries(), dir.path().to_str().unwrap())
            .unwrap();

        let contents = fs::read_to_string(dir.path().join("history.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "date,static_rebalance,index_based_rebalance");
        assert_eq!(lines[1], "2024-01-15,100.000000,");
        assert_eq!(lines[2], "2024-02-15,110.000000,100.000000");
    }

    #[test]
    fn skipped_lists_reasons() {
        let dir = tempdir().unwrap();
        let result = sample_result();
        CsvReportAdapter::new()
            .write(&result, &result.summaries(), dir.path().to_str().unwrap())
            .unwrap();

        let contents = fs::read_to_string(dir.path().join("skipped.csv")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("index_based_rebalance,2024-01-15"));
    }
}
