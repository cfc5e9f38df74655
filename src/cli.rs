//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::asset::{Asset, Indicator};
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    backtest_dates, data_source, enabled_strategies, validate_backtest_config,
    validate_data_config, validate_strategies_config,
};
use crate::domain::cut_loss::CutLossRule;
use crate::domain::error::RebalancerError;
use crate::domain::market::load_market_data;
use crate::domain::metrics::{weight_ranges, StrategySummary};
use crate::domain::policy::drawdown::{DrawdownPolicy, StepTable};
use crate::domain::policy::macro_score::{default_bands, MacroScorePolicy, ScoreCoefficients};
use crate::domain::policy::macro_zone::{MacroZonePolicy, MacroZoneSettings};
use crate::domain::policy::parse_band;
use crate::domain::policy::static_weights::StaticPolicy;
use crate::domain::policy::zone::{parse_windows, ZoneEnsemble, ZonePolicy, ZoneWeights, DEFAULT_WINDOWS};
use crate::domain::policy::AllocationPolicy;
use crate::domain::rebalance::StrategyRun;
use crate::domain::universe::Universe;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;

const HYBRID_STRATEGY: &str = "index_ma_based_rebalance";

#[derive(Parser, Debug)]
#[command(name = "rebalancer", about = "Portfolio rebalancing backtester")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every enabled strategy over the configured horizon
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Enable out-of-cycle cut-loss rebalances
        #[arg(long)]
        cut_loss: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the hybrid strategy's target weights on the latest data
    Allocation {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            cut_loss,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_ref(), cut_loss)
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Allocation { config } => run_allocation(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, RebalancerError> {
    FileConfigAdapter::from_file(path).map_err(|e| RebalancerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Runs every config check and returns the validated universe.
pub fn validate_config(adapter: &dyn ConfigPort) -> Result<Universe, RebalancerError> {
    validate_backtest_config(adapter)?;
    validate_strategies_config(adapter)?;
    validate_data_config(adapter)?;
    Universe::from_config(adapter)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, RebalancerError> {
    let (start_date, end_date) = backtest_dates(adapter)?;
    let cut_loss = if adapter.get_bool("backtest", "cut_loss", false) {
        Some(build_cut_loss_rule(adapter)?)
    } else {
        None
    };

    Ok(BacktestConfig {
        start_date,
        end_date,
        rebalance_day: adapter.get_int("backtest", "rebalance_day", 15).clamp(1, 28) as u32,
        initial_capital: adapter.get_double("backtest", "initial_capital", 100.0),
        monthly_contribution: adapter.get_double("backtest", "monthly_contribution", 0.0),
        cut_loss,
    })
}

pub fn build_cut_loss_rule(adapter: &dyn ConfigPort) -> Result<CutLossRule, RebalancerError> {
    let defaults = CutLossRule::default();
    let window = |key: &str, default: usize| -> Result<usize, RebalancerError> {
        let value = adapter.get_int("cut_loss", key, default as i64);
        if value < 1 {
            return Err(RebalancerError::config_invalid("cut_loss", key, "window must be at least 1"));
        }
        Ok(value as usize)
    };
    let ratio = |key: &str, default: f64| -> Result<f64, RebalancerError> {
        let value = adapter.get_double("cut_loss", key, default);
        if value <= 0.0 || value > 1.0 {
            return Err(RebalancerError::config_invalid("cut_loss", key, "ratio must be in (0, 1]"));
        }
        Ok(value)
    };

    Ok(CutLossRule {
        high_window: window("high_window", defaults.high_window)?,
        mean_window: window("mean_window", defaults.mean_window)?,
        drop_ratio: ratio("drop_ratio", defaults.drop_ratio)?,
        vix_threshold: adapter.get_double("cut_loss", "vix_threshold", defaults.vix_threshold),
        deep_drop_ratio: ratio("deep_drop_ratio", defaults.deep_drop_ratio)?,
        deep_vix_threshold: adapter.get_double(
            "cut_loss",
            "deep_vix_threshold",
            defaults.deep_vix_threshold,
        ),
    })
}

fn asset_key(asset: Asset) -> String {
    asset.name().to_lowercase()
}

pub fn build_drawdown_tables(
    adapter: &dyn ConfigPort,
    growth: &[Asset],
) -> Result<BTreeMap<Asset, StepTable>, RebalancerError> {
    let mut tables = BTreeMap::new();
    for &asset in growth {
        let key = asset_key(asset);
        let table = match adapter.get_string("drawdown", &key) {
            Some(raw) => StepTable::parse("drawdown", &key, &raw)?,
            None => StepTable::default_for(asset).ok_or(RebalancerError::ConfigMissing {
                section: "drawdown".to_string(),
                key,
            })?,
        };
        tables.insert(asset, table);
    }
    Ok(tables)
}

pub fn build_macro_bands(
    adapter: &dyn ConfigPort,
    growth: &[Asset],
) -> Result<BTreeMap<Asset, (f64, f64)>, RebalancerError> {
    let defaults = default_bands();
    let mut bands = BTreeMap::new();
    for &asset in growth {
        let key = asset_key(asset);
        let band = match adapter.get_string("macro", &key) {
            Some(raw) => parse_band("macro", &key, &raw)?,
            None => *defaults.get(&asset).ok_or(RebalancerError::ConfigMissing {
                section: "macro".to_string(),
                key,
            })?,
        };
        bands.insert(asset, band);
    }
    Ok(bands)
}

pub fn build_score_coefficients(adapter: &dyn ConfigPort) -> ScoreCoefficients {
    let d = ScoreCoefficients::default();
    let get = |key: &str, default: f64| adapter.get_double("macro", key, default);
    ScoreCoefficients {
        momentum: get("momentum", d.momentum),
        midterm: get("midterm", d.midterm),
        longterm: get("longterm", d.longterm),
        all_time_high: get("all_time_high", d.all_time_high),
        interest: get("interest", d.interest),
        inflation: get("inflation", d.inflation),
        unemployment: get("unemployment", d.unemployment),
        volatility: get("volatility", d.volatility),
    }
}

pub fn build_macro_zone_settings(
    adapter: &dyn ConfigPort,
    growth: &[Asset],
) -> Result<MacroZoneSettings, RebalancerError> {
    let mut settings = MacroZoneSettings::default();

    let window = adapter.get_int("macro_zone", "window", settings.window as i64);
    if window < 1 {
        return Err(RebalancerError::config_invalid("macro_zone", "window", "window must be at least 1"));
    }
    settings.window = window as usize;

    for (i, band) in settings.zone_bands.iter_mut().enumerate() {
        let key = format!("zone{}", i + 1);
        if let Some(raw) = adapter.get_string("macro_zone", &key) {
            *band = parse_band("macro_zone", &key, &raw)?;
        }
    }
    for &asset in growth {
        let key = asset_key(asset);
        if let Some(raw) = adapter.get_string("macro_zone", &key) {
            settings.overrides.insert(asset, parse_band("macro_zone", &key, &raw)?);
        }
    }
    if let Some(raw) = adapter.get_string("macro_zone", "cut_loss_band") {
        settings.cut_loss_band = parse_band("macro_zone", "cut_loss_band", &raw)?;
    }

    let zone_keys = settings.zone_bands.len();
    for key in adapter.keys("macro_zone") {
        let known = key == "window"
            || key == "cut_loss_band"
            || (1..=zone_keys).any(|i| key == format!("zone{i}"))
            || growth.iter().any(|a| asset_key(*a) == key);
        if !known {
            return Err(RebalancerError::config_invalid(
                "macro_zone",
                &key,
                "expected window, zone1..zone5, cut_loss_band or a growth asset",
            ));
        }
    }
    Ok(settings)
}

pub fn build_hybrid_policy(
    adapter: &dyn ConfigPort,
    universe: &Universe,
) -> Result<MacroZonePolicy, RebalancerError> {
    Ok(MacroZonePolicy::new(
        build_macro_zone_settings(adapter, &universe.growth)?,
        universe.growth.clone(),
        universe.defense.clone(),
    ))
}

/// One policy per enabled strategy, in config order, followed by the
/// single-asset strategies.
pub fn build_policies(
    adapter: &dyn ConfigPort,
    universe: &Universe,
) -> Result<Vec<Box<dyn AllocationPolicy>>, RebalancerError> {
    let growth = &universe.growth;
    let defense = &universe.defense;
    let mut policies: Vec<Box<dyn AllocationPolicy>> = Vec::new();

    for name in enabled_strategies(adapter)? {
        match name.as_str() {
            "buy_and_hold" => {
                policies.push(Box::new(StaticPolicy::buy_and_hold(&universe.static_weights)))
            }
            "static" => policies.push(Box::new(StaticPolicy::rebalancing(&universe.static_weights))),
            "drawdown" => policies.push(Box::new(DrawdownPolicy::new(
                build_drawdown_tables(adapter, growth)?,
                defense.clone(),
            ))),
            "zone" => {
                let windows = match adapter.get_string("zone", "windows") {
                    Some(raw) => parse_windows("zone", "windows", &raw)?,
                    None => DEFAULT_WINDOWS.to_vec(),
                };
                let weights = match adapter.get_string("zone", "weights") {
                    Some(raw) => ZoneWeights::parse("zone", "weights", &raw)?,
                    None => ZoneWeights::default(),
                };
                for &window in &windows {
                    policies.push(Box::new(ZonePolicy::new(
                        window,
                        weights,
                        growth.clone(),
                        defense.clone(),
                    )));
                }
                policies.push(Box::new(ZoneEnsemble::new(
                    windows,
                    weights,
                    growth.clone(),
                    defense.clone(),
                )));
            }
            "macro" => policies.push(Box::new(MacroScorePolicy::new(
                build_macro_bands(adapter, growth)?,
                build_score_coefficients(adapter),
                defense.clone(),
            ))),
            "macro_zone" => policies.push(Box::new(build_hybrid_policy(adapter, universe)?)),
            _ => {}
        }
    }

    for &asset in &universe.single_assets {
        policies.push(Box::new(StaticPolicy::single_asset(asset)));
    }
    Ok(policies)
}

pub fn build_runs(
    adapter: &dyn ConfigPort,
    universe: &Universe,
) -> Result<Vec<StrategyRun>, RebalancerError> {
    Ok(build_policies(adapter, universe)?
        .into_iter()
        .map(|policy| StrategyRun::new(policy, universe.rates.clone()))
        .collect())
}

/// Indicators any run needs, plus ^VIX when cut-loss detection is on.
pub fn required_indicators(runs: &[StrategyRun], cut_loss: bool) -> Vec<Indicator> {
    let mut indicators: BTreeSet<Indicator> = runs
        .iter()
        .flat_map(|r| r.policy().required_indicators().iter().copied())
        .collect();
    if cut_loss {
        indicators.insert(Indicator::VixQuote);
    }
    indicators.into_iter().collect()
}

pub fn open_price_port(adapter: &dyn ConfigPort) -> Result<Box<dyn PricePort>, RebalancerError> {
    match data_source(adapter)?.as_str() {
        "sqlite" => open_sqlite(adapter),
        _ => {
            let dir = adapter
                .get_string("data", "dir")
                .ok_or_else(|| RebalancerError::ConfigMissing {
                    section: "data".to_string(),
                    key: "dir".to_string(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir.trim()))))
        }
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(adapter: &dyn ConfigPort) -> Result<Box<dyn PricePort>, RebalancerError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    Ok(Box::new(SqliteAdapter::from_config(adapter)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_adapter: &dyn ConfigPort) -> Result<Box<dyn PricePort>, RebalancerError> {
    Err(RebalancerError::config_invalid(
        "data",
        "source",
        "sqlite feature is required for source = sqlite",
    ))
}

fn warmup_days(adapter: &dyn ConfigPort) -> i64 {
    adapter.get_int("backtest", "warmup_days", 365).max(0)
}

pub fn run_backtest(
    config_path: &PathBuf,
    output_path: Option<&PathBuf>,
    cut_loss_flag: bool,
) -> Result<(), RebalancerError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let universe = validate_config(&adapter)?;

    let mut bt_config = build_backtest_config(&adapter)?;
    if cut_loss_flag && bt_config.cut_loss.is_none() {
        bt_config.cut_loss = Some(build_cut_loss_rule(&adapter)?);
    }
    let runs = build_runs(&adapter, &universe)?;
    let indicators = required_indicators(&runs, bt_config.cut_loss.is_some());

    let port = open_price_port(&adapter)?;
    let load_start = bt_config.start_date - chrono::Duration::days(warmup_days(&adapter));
    let market = load_market_data(port.as_ref(), &universe, &indicators, load_start, bt_config.end_date)?;

    eprintln!(
        "Running {} strategies: {} to {}{}",
        runs.len(),
        bt_config.start_date,
        bt_config.end_date,
        if bt_config.cut_loss.is_some() { " (cut-loss)" } else { "" },
    );

    let result = if bt_config.cut_loss.is_some() {
        backtest_engine::run_backtest_with_cut_loss(&bt_config, &market, &universe.growth, runs)?
    } else {
        backtest_engine::run_backtest(&bt_config, &market, runs)?
    };
    let summaries = result.summaries();
    print_summary(&summaries);
    print_weight_ranges(&result);

    let output = output_path
        .cloned()
        .or_else(|| adapter.get_string("report", "output_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("report"));
    CsvReportAdapter::new().write(&result, &summaries, &output.display().to_string())?;
    eprintln!("\nReport written to: {}", output.display());
    Ok(())
}

fn print_summary(summaries: &[StrategySummary]) {
    eprintln!("\n=== Strategy Summary ===");
    eprintln!(
        "{:<40} {:>12} {:>12} {:>9} {:>7} {:>7} {:>7} {:>6}",
        "strategy", "contributed", "final", "return%", "CAGR%", "MDD%", "calmar", "skips"
    );
    for s in summaries {
        eprintln!(
            "{:<40} {:>12.2} {:>12.2} {:>9.2} {:>7.2} {:>7.2} {:>7.2} {:>6}",
            s.strategy,
            s.total_contributed,
            s.final_value,
            s.cumulative_return_pct,
            s.cagr * 100.0,
            s.max_drawdown * 100.0,
            s.calmar,
            s.skipped_events,
        );
    }
}

fn print_weight_ranges(result: &BacktestResult) {
    let Some(hybrid) = result.strategy(HYBRID_STRATEGY) else {
        return;
    };
    eprintln!("\n=== {} weight ranges ===", HYBRID_STRATEGY);
    for range in weight_ranges(&hybrid.history) {
        eprintln!(
            "  {:<16} min {:>6.2}%  max {:>6.2}%  latest {:>6.2}%",
            range.asset.to_string(),
            range.min * 100.0,
            range.max * 100.0,
            range.latest * 100.0,
        );
    }
}

pub fn run_dry_run(config_path: &PathBuf) -> Result<(), RebalancerError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let universe = validate_config(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;
    let runs = build_runs(&adapter, &universe)?;
    eprintln!("Config validated successfully");

    eprintln!("\nHorizon: {} to {}", bt_config.start_date, bt_config.end_date);
    eprintln!("  rebalance events: {}", bt_config.rebalance_dates().len());
    eprintln!("  initial capital:  {:.2}", bt_config.initial_capital);
    eprintln!("  monthly:          {:.2}", bt_config.monthly_contribution);

    print_universe(&universe);

    eprintln!("\nStrategies:");
    for run in &runs {
        eprintln!("  {}", run.name());
    }

    let indicators = required_indicators(&runs, bt_config.cut_loss.is_some());
    if !indicators.is_empty() {
        let symbols: Vec<&str> = indicators.iter().map(|i| i.symbol()).collect();
        eprintln!("\nIndicators: {}", symbols.join(", "));
    }

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn print_universe(universe: &Universe) {
    let growth: Vec<String> = universe.growth.iter().map(|a| a.to_string()).collect();
    let defense: Vec<String> = universe
        .defense
        .iter()
        .map(|(a, r)| format!("{a}:{r:.4}"))
        .collect();
    eprintln!("\nUniverse:");
    eprintln!("  growth:  {}", growth.join(", "));
    eprintln!("  defense: {}", defense.join(", "));
}

pub fn run_validate(config_path: &PathBuf) -> Result<(), RebalancerError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    let universe = validate_config(&adapter)?;
    build_backtest_config(&adapter)?;
    build_runs(&adapter, &universe)?;
    print_universe(&universe);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

pub fn run_allocation(config_path: &PathBuf) -> Result<(), RebalancerError> {
    let adapter = load_config(config_path)?;
    let universe = validate_config(&adapter)?;
    let (_, end_date) = backtest_dates(&adapter)?;
    let mut policy = build_hybrid_policy(&adapter, &universe)?;

    let port = open_price_port(&adapter)?;
    let start = end_date - chrono::Duration::days(warmup_days(&adapter).max(1));
    let market = load_market_data(
        port.as_ref(),
        &universe,
        policy.required_indicators(),
        start,
        end_date,
    )?;

    let (date, allocation) = backtest_engine::latest_allocation(&mut policy, &market, &universe.growth)?;
    println!("{} allocation on {}", policy.name(), date);
    for (asset, weight) in allocation.iter() {
        println!("{:<16} {:>6.2}%", asset.to_string(), weight * 100.0);
    }
    Ok(())
}
