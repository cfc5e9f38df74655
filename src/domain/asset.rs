//! Asset and macro indicator identifiers.
//!
//! Both are closed enums so allocation tables and holdings maps are checked
//! exhaustively; free-form symbols only exist at the data-provider boundary.

use std::fmt;
use std::str::FromStr;

use super::interest::Compounding;

/// How a holding of an asset is valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valuation {
    /// Holding is a unit quantity priced from the market series.
    Market,
    /// Holding is a currency value grown by an interest rule.
    Accrual(Compounding),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    Qqq,
    Spy,
    Schd,
    Btc,
    Gold,
    Tlt,
    BondAnnual35,
    Usdt,
}

impl Asset {
    pub const ALL: [Asset; 8] = [
        Asset::Qqq,
        Asset::Spy,
        Asset::Schd,
        Asset::Btc,
        Asset::Gold,
        Asset::Tlt,
        Asset::BondAnnual35,
        Asset::Usdt,
    ];

    /// Symbol used by the price provider.
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Qqq => "QQQ",
            Asset::Spy => "SPY",
            Asset::Schd => "SCHD",
            Asset::Btc => "BTC-USD",
            Asset::Gold => "GLD",
            Asset::Tlt => "TLT",
            Asset::BondAnnual35 => "BOND_ANNUAL_3_5",
            Asset::Usdt => "USDT",
        }
    }

    /// Short name, also the config key for per-asset settings.
    pub fn name(&self) -> &'static str {
        match self {
            Asset::Qqq => "QQQ",
            Asset::Spy => "SPY",
            Asset::Schd => "SCHD",
            Asset::Btc => "BTC",
            Asset::Gold => "GOLD",
            Asset::Tlt => "TLT",
            Asset::BondAnnual35 => "BOND_ANNUAL_3_5",
            Asset::Usdt => "USDT",
        }
    }

    pub fn valuation(&self) -> Valuation {
        match self {
            Asset::Usdt => Valuation::Accrual(Compounding::Daily),
            Asset::BondAnnual35 => Valuation::Accrual(Compounding::Annual),
            _ => Valuation::Market,
        }
    }

    pub fn is_market_priced(&self) -> bool {
        self.valuation() == Valuation::Market
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown asset: {0}")]
pub struct UnknownAsset(pub String);

impl FromStr for Asset {
    type Err = UnknownAsset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Asset::ALL
            .into_iter()
            .find(|a| a.symbol() == wanted || a.name() == wanted)
            .ok_or_else(|| UnknownAsset(s.trim().to_string()))
    }
}

/// Where an indicator series is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorSource {
    Macro,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Indicator {
    /// 10-year treasury yield (FRED DGS10).
    TreasuryYield,
    /// Consumer price index (FRED CPIAUCSL).
    Cpi,
    /// Unemployment rate (FRED UNRATE).
    Unemployment,
    /// CBOE volatility index close (FRED VIXCLS).
    Vix,
    /// 10-year yield as quoted on the market (^TNX).
    TreasuryYieldQuote,
    /// Volatility index as quoted on the market (^VIX).
    VixQuote,
}

impl Indicator {
    pub const ALL: [Indicator; 6] = [
        Indicator::TreasuryYield,
        Indicator::Cpi,
        Indicator::Unemployment,
        Indicator::Vix,
        Indicator::TreasuryYieldQuote,
        Indicator::VixQuote,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Indicator::TreasuryYield => "DGS10",
            Indicator::Cpi => "CPIAUCSL",
            Indicator::Unemployment => "UNRATE",
            Indicator::Vix => "VIXCLS",
            Indicator::TreasuryYieldQuote => "^TNX",
            Indicator::VixQuote => "^VIX",
        }
    }

    pub fn source(&self) -> IndicatorSource {
        match self {
            Indicator::TreasuryYieldQuote | Indicator::VixQuote => IndicatorSource::Price,
            _ => IndicatorSource::Macro,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
