//! Target allocations and the normalization primitives the policies share.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::asset::Asset;
use super::error::RebalancerError;

/// Allowed deviation of an allocation's weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Fractional weight per asset for one rebalance event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetAllocation {
    weights: BTreeMap<Asset, f64>,
}

impl TargetAllocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (Asset, f64)>,
    {
        let mut allocation = Self::new();
        for (asset, weight) in weights {
            allocation.add(asset, weight);
        }
        allocation
    }

    /// Growth weights plus the remainder split across `defense` by ratio.
    ///
    /// When the growth weights already reach 1.0 the defense assets get
    /// nothing; an over-allocation then surfaces in [`validate`](Self::validate).
    pub fn with_defense(growth: &BTreeMap<Asset, f64>, defense: &[(Asset, f64)]) -> Self {
        let mut allocation = Self::from_weights(growth.iter().map(|(a, w)| (*a, *w)));
        let remainder = (1.0 - allocation.sum()).max(0.0);
        for &(asset, ratio) in defense {
            allocation.add(asset, remainder * ratio);
        }
        allocation
    }

    /// Adds `weight` to whatever `asset` already holds.
    pub fn add(&mut self, asset: Asset, weight: f64) {
        *self.weights.entry(asset).or_insert(0.0) += weight;
    }

    pub fn weight(&self, asset: Asset) -> f64 {
        self.weights.get(&asset).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Asset, f64)> + '_ {
        self.weights.iter().map(|(a, w)| (*a, *w))
    }

    pub fn assets(&self) -> impl Iterator<Item = Asset> + '_ {
        self.weights.keys().copied()
    }

    pub fn validate(&self, strategy: &str, date: NaiveDate) -> Result<(), RebalancerError> {
        let sum = self.sum();
        let in_range = self.weights.values().all(|w| w.is_finite() && *w >= -WEIGHT_TOLERANCE);
        let deviation = (sum - 1.0).abs();
        if !in_range || deviation.is_nan() || deviation > WEIGHT_TOLERANCE {
            return Err(RebalancerError::AllocationInvariant {
                strategy: strategy.to_string(),
                date,
                sum,
            });
        }
        Ok(())
    }
}

/// Position of `value` between `low` (0) and `high` (1), clamped.
///
/// A degenerate band maps everything to the neutral midpoint.
pub fn normalize(value: f64, low: f64, high: f64) -> f64 {
    if low == high {
        return 0.5;
    }
    ((low - value) / (low - high)).clamp(0.0, 1.0)
}

/// Position of `value` between `high` (0) and `low` (1), clamped.
pub fn normalize_inverse(value: f64, low: f64, high: f64) -> f64 {
    if low == high {
        return 0.5;
    }
    ((high - value) / (high - low)).clamp(0.0, 1.0)
}

/// Linear interpolation inside a `[min, max]` weight band.
pub fn weight_in_band(band: (f64, f64), score: f64) -> f64 {
    let (min, max) = band;
    min + (max - min) * score
}
