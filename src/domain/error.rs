//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for rebalancer.
#[derive(Debug, thiserror::Error)]
pub enum RebalancerError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("asset {asset} is configured as both growth and defense")]
    AssetConflict { asset: String },

    #[error("no {symbol} sample at or before {date}")]
    DataUnavailable { symbol: String, date: NaiveDate },

    #[error("no complete macro row at or before {date}")]
    MacroUnavailable { date: NaiveDate },

    #[error("{strategy} allocation on {date} sums to {sum:.8}, expected 1.0")]
    AllocationInvariant {
        strategy: String,
        date: NaiveDate,
        sum: f64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RebalancerError {
    /// Missing samples only cost the affected rebalance event; everything
    /// else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RebalancerError::DataUnavailable { .. } | RebalancerError::MacroUnavailable { .. }
        )
    }

    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RebalancerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl RebalancerError {
    /// Process exit status for this error group.
    pub fn exit_code(&self) -> u8 {
        match self {
            RebalancerError::Io(_) => 1,
            RebalancerError::ConfigParse { .. }
            | RebalancerError::ConfigMissing { .. }
            | RebalancerError::ConfigInvalid { .. }
            | RebalancerError::AssetConflict { .. } => 2,
            RebalancerError::Database { .. } | RebalancerError::DatabaseQuery { .. } => 3,
            RebalancerError::AllocationInvariant { .. } => 4,
            RebalancerError::DataUnavailable { .. } | RebalancerError::MacroUnavailable { .. } => 5,
        }
    }
}

impl From<&RebalancerError> for std::process::ExitCode {
    fn from(err: &RebalancerError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}
