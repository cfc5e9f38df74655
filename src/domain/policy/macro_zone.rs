//! Macro + moving-average hybrid policy.
//!
//! The asset's 60-sample zone picks its weight band, a macro-only score
//! positions the weight inside that band. While an asset is in the cut-loss
//! state its band is capped by `cut_loss_band`.

use std::collections::BTreeMap;

use crate::domain::allocation::{normalize_inverse, weight_in_band, TargetAllocation};
use crate::domain::asset::{Asset, Indicator};
use crate::domain::error::RebalancerError;

use super::zone::ma_zone;
use super::{AllocationPolicy, MarketContext};

const INDICATORS: [Indicator; 4] = [
    Indicator::TreasuryYieldQuote,
    Indicator::Cpi,
    Indicator::Unemployment,
    Indicator::VixQuote,
];

#[derive(Debug, Clone, PartialEq)]
pub struct MacroZoneSettings {
    pub window: usize,
    /// Band per zone, index 0 is zone 1.
    pub zone_bands: [(f64, f64); 5],
    /// Assets with a fixed band regardless of zone.
    pub overrides: BTreeMap<Asset, (f64, f64)>,
    pub cut_loss_band: (f64, f64),
}

impl Default for MacroZoneSettings {
    fn default() -> Self {
        MacroZoneSettings {
            window: 60,
            zone_bands: [
                (0.27, 0.30),
                (0.24, 0.27),
                (0.21, 0.24),
                (0.18, 0.21),
                (0.15, 0.18),
            ],
            overrides: BTreeMap::from([(Asset::Btc, (0.05, 0.05))]),
            cut_loss_band: (0.15, 0.15),
        }
    }
}

impl MacroZoneSettings {
    /// Override or zone band, capped endpoint-wise by `cut_loss_band` while
    /// the asset is in cut-loss. The cap only ever lowers a band.
    fn band(&self, asset: Asset, zone: u8, cut_loss: bool) -> (f64, f64) {
        let band = match self.overrides.get(&asset) {
            Some(band) => *band,
            None => self.zone_bands[usize::from(zone.clamp(1, 5)) - 1],
        };
        if !cut_loss {
            return band;
        }
        let (cap_lo, cap_hi) = self.cut_loss_band;
        (band.0.min(cap_lo), band.1.min(cap_hi))
    }
}

/// Macro risk appetite shared by every growth asset.
pub fn macro_score(
    treasury_yield: f64,
    cpi: f64,
    unemployment: f64,
    vix: f64,
) -> f64 {
    let score = 0.4 * normalize_inverse(treasury_yield, 1.0, 4.0)
        + 0.2 * normalize_inverse(cpi, 250.0, 300.0)
        + 0.2 * normalize_inverse(unemployment, 5.0, 14.0)
        + 0.2 * normalize_inverse(vix, 10.0, 80.0);
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct MacroZonePolicy {
    settings: MacroZoneSettings,
    growth: Vec<Asset>,
    defense: Vec<(Asset, f64)>,
}

impl MacroZonePolicy {
    pub fn new(settings: MacroZoneSettings, growth: Vec<Asset>, defense: Vec<(Asset, f64)>) -> Self {
        MacroZonePolicy {
            settings,
            growth,
            defense,
        }
    }
}

impl AllocationPolicy for MacroZonePolicy {
    fn name(&self) -> &str {
        "index_ma_based_rebalance"
    }

    fn required_indicators(&self) -> &[Indicator] {
        &INDICATORS
    }

    fn reacts_to_cut_loss(&self) -> bool {
        true
    }

    fn target_allocation(
        &mut self,
        ctx: &MarketContext<'_>,
    ) -> Result<TargetAllocation, RebalancerError> {
        let score = macro_score(
            ctx.macro_value(Indicator::TreasuryYieldQuote)?,
            ctx.macro_value(Indicator::Cpi)?,
            ctx.macro_value(Indicator::Unemployment)?,
            ctx.macro_value(Indicator::VixQuote)?,
        );

        let mut growth = BTreeMap::new();
        for &asset in &self.growth {
            let zone = ma_zone(ctx.series(asset)?, ctx.date, self.settings.window);
            let band = self
                .settings
                .band(asset, zone, ctx.cut_loss.is_cut_loss(asset));
            growth.insert(asset, weight_in_band(band, score));
        }
        Ok(TargetAllocation::with_defense(&growth, &self.defense))
    }
}
