//! Asset universe: growth and defense roles, static weights and interest
//! rates, parsed from the `[universe]`, `[rates]` and `[strategies]`
//! sections.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::allocation::WEIGHT_TOLERANCE;
use crate::domain::asset::{Asset, UnknownAsset, Valuation};
use crate::domain::error::RebalancerError;
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "universe";

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    /// Assets the policies size individually.
    pub growth: Vec<Asset>,
    /// Assets sharing the remainder, with ratios summing to 1.
    pub defense: Vec<(Asset, f64)>,
    /// Weights of the static and buy-and-hold strategies.
    pub static_weights: Vec<(Asset, f64)>,
    /// Assets that each get an all-in strategy.
    pub single_assets: Vec<Asset>,
    /// Annual interest rate per accrual asset.
    pub rates: BTreeMap<Asset, f64>,
}

impl Default for Universe {
    fn default() -> Self {
        Universe {
            growth: vec![Asset::Spy, Asset::Qqq, Asset::Schd, Asset::Btc],
            defense: vec![(Asset::Usdt, 5.0 / 7.0), (Asset::Gold, 2.0 / 7.0)],
            static_weights: vec![
                (Asset::Spy, 0.30),
                (Asset::Qqq, 0.30),
                (Asset::Schd, 0.30),
                (Asset::Btc, 0.05),
                (Asset::Gold, 0.025),
                (Asset::Usdt, 0.025),
            ],
            single_assets: Vec::new(),
            rates: BTreeMap::from([(Asset::Usdt, 0.07), (Asset::BondAnnual35, 0.035)]),
        }
    }
}

impl Universe {
    /// Every asset any strategy may hold, sorted.
    pub fn tracked_assets(&self) -> Vec<Asset> {
        let mut assets = BTreeSet::new();
        assets.extend(self.growth.iter().copied());
        assets.extend(self.defense.iter().map(|(a, _)| *a));
        assets.extend(self.static_weights.iter().map(|(a, _)| *a));
        assets.extend(self.single_assets.iter().copied());
        assets.into_iter().collect()
    }

    pub fn market_assets(&self) -> Vec<Asset> {
        self.tracked_assets()
            .into_iter()
            .filter(|a| a.is_market_priced())
            .collect()
    }

    pub fn rate(&self, asset: Asset) -> Option<f64> {
        self.rates.get(&asset).copied()
    }

    /// Reads the universe, falling back to the default portfolio for any
    /// absent key, and validates it.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RebalancerError> {
        let defaults = Universe::default();

        let growth = match config.get_string(SECTION, "growth") {
            Some(s) => parse_asset_list(SECTION, "growth", &s)?,
            None => defaults.growth,
        };
        let defense = match config.get_string(SECTION, "defense") {
            Some(s) => parse_weight_list(SECTION, "defense", &s)?,
            None => defaults.defense,
        };
        let static_weights = match config.get_string(SECTION, "static") {
            Some(s) => parse_weight_list(SECTION, "static", &s)?,
            None => defaults.static_weights,
        };
        let single_assets = match config.get_string("strategies", "single_assets") {
            Some(s) if !s.trim().is_empty() => parse_asset_list("strategies", "single_assets", &s)?,
            _ => Vec::new(),
        };

        let mut rates = defaults.rates;
        for key in config.keys("rates") {
            let asset: Asset = key.parse().map_err(|e: UnknownAsset| {
                RebalancerError::config_invalid("rates", &key, e.to_string())
            })?;
            if asset.is_market_priced() {
                return Err(RebalancerError::config_invalid(
                    "rates",
                    &key,
                    format!("{asset} is priced by the market, not by a rate"),
                ));
            }
            let raw = config.get_string("rates", &key).unwrap_or_default();
            let rate = parse_ratio(&raw).ok_or_else(|| {
                RebalancerError::config_invalid("rates", &key, format!("not a number: {raw}"))
            })?;
            rates.insert(asset, rate);
        }

        let universe = Universe {
            growth,
            defense,
            static_weights,
            single_assets,
            rates,
        };
        universe.validate()?;
        Ok(universe)
    }

    pub fn validate(&self) -> Result<(), RebalancerError> {
        if self.growth.is_empty() {
            return Err(RebalancerError::config_invalid(
                SECTION,
                "growth",
                "at least one growth asset is required",
            ));
        }
        if let Some((asset, _)) = self.defense.iter().find(|(a, _)| self.growth.contains(a)) {
            return Err(RebalancerError::AssetConflict {
                asset: asset.to_string(),
            });
        }
        if self.defense.is_empty() {
            return Err(RebalancerError::config_invalid(
                SECTION,
                "defense",
                "at least one defense asset is required",
            ));
        }
        check_weights(SECTION, "defense", &self.defense)?;
        check_weights(SECTION, "static", &self.static_weights)?;

        for asset in self.tracked_assets() {
            if let Valuation::Accrual(_) = asset.valuation() {
                match self.rate(asset) {
                    None => {
                        return Err(RebalancerError::ConfigMissing {
                            section: "rates".to_string(),
                            key: asset.name().to_lowercase(),
                        });
                    }
                    Some(rate) if !rate.is_finite() || rate < 0.0 => {
                        return Err(RebalancerError::config_invalid(
                            "rates",
                            &asset.name().to_lowercase(),
                            "rate must be non-negative",
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

fn check_weights(section: &str, key: &str, weights: &[(Asset, f64)]) -> Result<(), RebalancerError> {
    if let Some((asset, _)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
        return Err(RebalancerError::config_invalid(
            section,
            key,
            format!("negative weight for {asset}"),
        ));
    }
    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(RebalancerError::config_invalid(
            section,
            key,
            format!("weights sum to {sum:.6}, expected 1"),
        ));
    }
    Ok(())
}

/// Parses a plain number or an `a/b` fraction.
pub fn parse_ratio(input: &str) -> Option<f64> {
    let input = input.trim();
    match input.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 { None } else { Some(num / den) }
        }
        None => input.parse().ok(),
    }
}

/// Parses `QQQ, SPY, BTC` into assets, rejecting blanks and duplicates.
pub fn parse_asset_list(section: &str, key: &str, input: &str) -> Result<Vec<Asset>, RebalancerError> {
    let mut assets = Vec::new();
    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(RebalancerError::config_invalid(section, key, "empty token in asset list"));
        }
        let asset: Asset = trimmed
            .parse()
            .map_err(|e| RebalancerError::config_invalid(section, key, format!("{e}")))?;
        if assets.contains(&asset) {
            return Err(RebalancerError::config_invalid(
                section,
                key,
                format!("duplicate asset: {asset}"),
            ));
        }
        assets.push(asset);
    }
    Ok(assets)
}

/// Parses `USDT:5/7, GOLD:2/7` into asset weights.
pub fn parse_weight_list(
    section: &str,
    key: &str,
    input: &str,
) -> Result<Vec<(Asset, f64)>, RebalancerError> {
    let mut weights: Vec<(Asset, f64)> = Vec::new();
    for token in input.split(',') {
        let (name, value) = token.split_once(':').ok_or_else(|| {
            RebalancerError::config_invalid(section, key, format!("expected ASSET:weight, got '{}'", token.trim()))
        })?;
        let asset: Asset = name
            .parse()
            .map_err(|e| RebalancerError::config_invalid(section, key, format!("{e}")))?;
        let weight = parse_ratio(value).ok_or_else(|| {
            RebalancerError::config_invalid(section, key, format!("invalid weight '{}'", value.trim()))
        })?;
        if weights.iter().any(|(a, _)| *a == asset) {
            return Err(RebalancerError::config_invalid(
                section,
                key,
                format!("duplicate asset: {asset}"),
            ));
        }
        weights.push((asset, weight));
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn test_default_universe_is_valid() {
        assert!(Universe::default().validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let universe = Universe::from_config(&make_config("[universe]\n")).unwrap();
        assert_eq!(universe, Universe::default());
    }

    #[test]
    fn test_parse_ratio_fraction_and_decimal() {
        assert_eq!(parse_ratio("0.25"), Some(0.25));
        assert_eq!(parse_ratio(" 1/4 "), Some(0.25));
        assert_eq!(parse_ratio("1/0"), None);
        assert_eq!(parse_ratio("abc"), None);
    }

    #[test]
    fn test_parse_asset_list() {
        let assets = parse_asset_list("universe", "growth", " qqq, SPY ,btc").unwrap();
        assert_eq!(assets, vec![Asset::Qqq, Asset::Spy, Asset::Btc]);
    }

    #[test]
    fn test_parse_asset_list_rejects_empty_and_duplicate() {
        assert!(parse_asset_list("universe", "growth", "QQQ,,SPY").is_err());
        let err = parse_asset_list("universe", "growth", "QQQ,SPY,qqq").unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { reason, .. } if reason.contains("duplicate")));
    }

    #[test]
    fn test_parse_weight_list_with_fractions() {
        let weights = parse_weight_list("universe", "defense", "USDT:5/7, GLD:2/7").unwrap();
        assert_eq!(weights[0].0, Asset::Usdt);
        assert!((weights[0].1 - 5.0 / 7.0).abs() < 1e-12);
        assert_eq!(weights[1].0, Asset::Gold);
    }

    #[test]
    fn test_parse_weight_list_rejects_missing_colon() {
        let err = parse_weight_list("universe", "static", "SPY 0.5").unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { key, .. } if key == "static"));
    }

    #[test]
    fn test_growth_and_defense_overlap_is_conflict() {
        let config = make_config("[universe]\ngrowth = SPY,GLD\ndefense = USDT:1/2,GLD:1/2\n");
        let err = Universe::from_config(&config).unwrap_err();
        assert!(matches!(err, RebalancerError::AssetConflict { asset } if asset == "GOLD"));
    }

    #[test]
    fn test_defense_ratios_must_sum_to_one() {
        let config = make_config("[universe]\ndefense = USDT:0.5,GLD:0.4\n");
        let err = Universe::from_config(&config).unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { key, .. } if key == "defense"));
    }

    #[test]
    fn test_static_weights_must_sum_to_one() {
        let config = make_config("[universe]\nstatic = SPY:0.5,QQQ:0.6\n");
        let err = Universe::from_config(&config).unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { key, .. } if key == "static"));
    }

    #[test]
    fn test_rates_override_and_invalid() {
        let config = make_config("[rates]\nusdt = 0.05\n");
        let universe = Universe::from_config(&config).unwrap();
        assert_eq!(universe.rate(Asset::Usdt), Some(0.05));
        assert_eq!(universe.rate(Asset::BondAnnual35), Some(0.035));

        let config = make_config("[rates]\nusdt = -0.01\n");
        let err = Universe::from_config(&config).unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { section, .. } if section == "rates"));
    }

    #[test]
    fn test_rates_reject_unknown_and_market_assets() {
        let err = Universe::from_config(&make_config("[rates]\ndoge = 0.1\n")).unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { key, .. } if key == "doge"));

        let err = Universe::from_config(&make_config("[rates]\nspy = 0.1\n")).unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigInvalid { key, .. } if key == "spy"));
    }

    #[test]
    fn test_missing_rate_for_tracked_accrual_asset() {
        let mut universe = Universe::default();
        universe.single_assets.push(Asset::BondAnnual35);
        universe.rates.remove(&Asset::BondAnnual35);
        let err = universe.validate().unwrap_err();
        assert!(matches!(err, RebalancerError::ConfigMissing { key, .. } if key == "bond_annual_3_5"));
    }

    #[test]
    fn test_tracked_assets_include_single_assets() {
        let config = make_config("[strategies]\nsingle_assets = TLT, BOND_ANNUAL_3_5\n");
        let universe = Universe::from_config(&config).unwrap();
        let tracked = universe.tracked_assets();
        assert!(tracked.contains(&Asset::Tlt));
        assert!(tracked.contains(&Asset::BondAnnual35));
        assert!(universe.market_assets().contains(&Asset::Tlt));
        assert!(!universe.market_assets().contains(&Asset::Usdt));
    }
}
