//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RebalancerError;
use crate::domain::metrics::StrategySummary;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        summaries: &[StrategySummary],
        output_path: &str,
    ) -> Result<(), RebalancerError>;
}
