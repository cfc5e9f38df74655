//! CLI integration tests for the command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, build_policies)
//! - Dry-run, validate and allocation with real INI files on disk
//! - Full backtest over a CSV data directory, report files included

mod common;

use common::*;
use rebalancer::adapters::file_config_adapter::FileConfigAdapter;
use rebalancer::cli;
use rebalancer::domain::error::RebalancerError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Two years of daily data from 2019-01-01 for every default symbol.
fn seeded_data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_provider_csv(dir.path(), &full_provider(date(2019, 1, 1), 731));
    dir
}

fn ini_for(data_dir: &Path, extra: &str) -> String {
    format!(
        r#"
[backtest]
start_date = 2020-01-01
end_date = 2020-12-31
rebalance_day = 15
initial_capital = 1000
monthly_contribution = 100
warmup_days = 365

[data]
source = csv
dir = {}
{}"#,
        data_dir.display(),
        extra
    )
}

mod config_loading {
    use super::*;

    #[test]
    fn build_backtest_config_reads_values() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2021-03-01\nend_date = 2022-03-01\nrebalance_day = 3\ninitial_capital = 5000\nmonthly_contribution = 250\n",
        )
        .unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.start_date, date(2021, 3, 1));
        assert_eq!(config.end_date, date(2022, 3, 1));
        assert_eq!(config.rebalance_day, 3);
        assert!((config.initial_capital - 5000.0).abs() < f64::EPSILON);
        assert!((config.monthly_contribution - 250.0).abs() < f64::EPSILON);
        assert!(config.cut_loss.is_none());
    }

    #[test]
    fn years_counts_back_from_end_date() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nend_date = 2024-06-30\nyears = 2\n").unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        assert_eq!(config.start_date, date(2022, 6, 30));
    }

    #[test]
    fn missing_end_date_is_reported() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nstart_date = 2020-01-01\n").unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn cut_loss_flag_in_config_builds_rule() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2020-01-01\nend_date = 2020-12-31\ncut_loss = true\n[cut_loss]\nvix_threshold = 30\n",
        )
        .unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        let rule = config.cut_loss.unwrap();
        assert!((rule.vix_threshold - 30.0).abs() < f64::EPSILON);
        assert_eq!(rule.high_window, 60);
    }
}

mod dry_run {
    use super::*;

    #[test]
    fn dry_run_valid_config_succeeds() {
        let data = seeded_data_dir();
        let file = write_temp_ini(&ini_for(data.path(), ""));
        assert!(cli::run_dry_run(&file.path().to_path_buf()).is_ok());
    }

    #[test]
    fn dry_run_missing_file_fails() {
        let err = cli::run_dry_run(&PathBuf::from("/nonexistent/rebalancer.ini")).unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigParse { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn dry_run_invalid_rebalance_day_fails() {
        let data = seeded_data_dir();
        let ini = ini_for(data.path(), "").replace("rebalance_day = 15", "rebalance_day = 31");
        let file = write_temp_ini(&ini);
        let err = cli::run_dry_run(&file.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { .. }));
    }

    #[test]
    fn dry_run_unknown_strategy_fails() {
        let data = seeded_data_dir();
        let file = write_temp_ini(&ini_for(data.path(), "\n[strategies]\nenabled = static, momentum\n"));
        let err = cli::run_dry_run(&file.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { .. }));
    }

    #[test]
    fn validate_accepts_valid_config() {
        let data = seeded_data_dir();
        let file = write_temp_ini(&ini_for(data.path(), ""));
        assert!(cli::run_validate(&file.path().to_path_buf()).is_ok());
    }

    #[test]
    fn validate_rejects_conflicting_roles() {
        let data = seeded_data_dir();
        let file = write_temp_ini(&ini_for(
            data.path(),
            "\n[universe]\ngrowth = SPY, GOLD\ndefense = USDT:5/7, GOLD:2/7\n",
        ));
        let err = cli::run_validate(&file.path().to_path_buf()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}

mod pipeline_csv {
    use super::*;

    #[test]
    fn backtest_writes_report_files() {
        let data = seeded_data_dir();
        let out = tempfile::tempdir().unwrap();
        let report = out.path().join("report");
        let file = write_temp_ini(&ini_for(data.path(), ""));

        cli::run_backtest(&file.path().to_path_buf(), Some(&report), false).unwrap();

        for name in ["history.csv", "summary.csv", "skipped.csv", "weights.csv"] {
            assert!(report.join(name).exists(), "{name} missing");
        }
        let history = fs::read_to_string(report.join("history.csv")).unwrap();
        let lines: Vec<&str> = history.lines().collect();
        assert_eq!(lines.len(), 13);
        assert!(lines[0].starts_with("date,buy_and_hold,static_rebalance"));
        assert!(lines[1].starts_with("2020-01-15,"));

        let summary = fs::read_to_string(report.join("summary.csv")).unwrap();
        assert_eq!(summary.lines().count(), 11);
        assert!(summary.contains("dynamic_ensemble_ma_based_rebalance"));
    }

    #[test]
    fn output_dir_falls_back_to_config() {
        let data = seeded_data_dir();
        let out = tempfile::tempdir().unwrap();
        let report = out.path().join("from_config");
        let extra = format!(
            "\n[strategies]\nenabled = static\n[report]\noutput_dir = {}\n",
            report.display()
        );
        let file = write_temp_ini(&ini_for(data.path(), &extra));

        cli::run_backtest(&file.path().to_path_buf(), None, false).unwrap();

        let summary = fs::read_to_string(report.join("summary.csv")).unwrap();
        assert_eq!(summary.lines().count(), 2);
        assert!(summary.contains("static_rebalance"));
    }

    #[test]
    fn cut_loss_flag_runs_daily_walk() {
        let data = seeded_data_dir();
        let out = tempfile::tempdir().unwrap();
        let file = write_temp_ini(&ini_for(
            data.path(),
            "\n[strategies]\nenabled = static, macro_zone\n",
        ));

        cli::run_backtest(&file.path().to_path_buf(), Some(&out.path().to_path_buf()), true).unwrap();

        let history = fs::read_to_string(out.path().join("history.csv")).unwrap();
        let header = history.lines().next().unwrap();
        assert_eq!(header, "date,static_rebalance,index_ma_based_rebalance");
    }

    #[test]
    fn missing_symbol_file_fails_the_run() {
        let data = seeded_data_dir();
        fs::remove_file(data.path().join("SCHD.csv")).unwrap();
        let out = tempfile::tempdir().unwrap();
        let file = write_temp_ini(&ini_for(data.path(), ""));

        let err = cli::run_backtest(&file.path().to_path_buf(), Some(&out.path().to_path_buf()), false)
            .unwrap_err();
        assert!(matches!(err, RebalancerError::Database { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn allocation_reports_latest_weights() {
        let data = seeded_data_dir();
        let file = write_temp_ini(&ini_for(data.path(), ""));
        assert!(cli::run_allocation(&file.path().to_path_buf()).is_ok());
    }
}
