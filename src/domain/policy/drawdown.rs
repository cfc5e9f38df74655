//! Drawdown-responsive policy.
//!
//! Each growth asset carries a [`PeakTracker`] that measures the signed
//! percentage move since its reference price. A [`StepTable`] maps that move
//! to the asset's weight: lighter after long rallies, heavier deep in a
//! drawdown.

use std::collections::BTreeMap;

use crate::domain::allocation::TargetAllocation;
use crate::domain::asset::Asset;
use crate::domain::error::RebalancerError;
use crate::domain::universe::parse_ratio;

use super::{AllocationPolicy, MarketContext};

/// Weight steps keyed by percentage change, sorted by threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTable {
    steps: Vec<(f64, f64)>,
}

impl StepTable {
    pub fn new(mut steps: Vec<(f64, f64)>) -> Self {
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));
        StepTable { steps }
    }

    /// Weight of the step with the greatest threshold at or below `change`;
    /// below every threshold, the lowest step applies.
    pub fn weight_for(&self, change: f64) -> f64 {
        self.steps
            .iter()
            .rev()
            .find(|(threshold, _)| *threshold <= change)
            .or_else(|| self.steps.first())
            .map(|(_, weight)| *weight)
            .unwrap_or(0.0)
    }

    /// Parses `threshold:weight` pairs, e.g. `0:0.20, 5:0.18, -5:0.135`.
    pub fn parse(section: &str, key: &str, input: &str) -> Result<Self, RebalancerError> {
        let mut steps = Vec::new();
        for token in input.split(',') {
            let parsed = token.split_once(':').and_then(|(t, w)| {
                let threshold: f64 = t.trim().parse().ok()?;
                let weight = parse_ratio(w)?;
                Some((threshold, weight))
            });
            let Some((threshold, weight)) = parsed else {
                return Err(RebalancerError::config_invalid(
                    section,
                    key,
                    format!("expected threshold:weight, got '{}'", token.trim()),
                ));
            };
            if !(0.0..=1.0).contains(&weight) {
                return Err(RebalancerError::config_invalid(
                    section,
                    key,
                    format!("weight {weight} outside [0, 1]"),
                ));
            }
            steps.push((threshold, weight));
        }
        Ok(StepTable::new(steps))
    }

    /// Built-in table for the default growth assets.
    pub fn default_for(asset: Asset) -> Option<Self> {
        let rally = [(0.0, 0.20), (5.0, 0.18), (10.0, 0.16), (15.0, 0.14), (20.0, 0.12)];
        let steps: Vec<(f64, f64)> = match asset {
            Asset::Qqq => rally
                .into_iter()
                .chain([
                    (-5.0, 0.135),
                    (-10.0, 0.15),
                    (-15.0, 0.165),
                    (-20.0, 0.18),
                    (-25.0, 0.195),
                    (-30.0, 0.20),
                ])
                .collect(),
            Asset::Spy | Asset::Schd => rally
                .into_iter()
                .chain([
                    (-5.0, 0.14),
                    (-10.0, 0.16),
                    (-15.0, 0.18),
                    (-20.0, 0.20),
                    (-25.0, 0.20),
                    (-30.0, 0.20),
                ])
                .collect(),
            Asset::Btc => vec![
                (20.0, 0.04),
                (15.0, 0.05),
                (10.0, 0.05),
                (5.0, 0.05),
                (0.0, 0.05),
                (-5.0, 0.04),
                (-10.0, 0.04),
                (-15.0, 0.04),
                (-20.0, 0.04),
                (-25.0, 0.05),
                (-30.0, 0.05),
            ],
            _ => return None,
        };
        Some(StepTable::new(steps))
    }
}

/// Reference-price state of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PeakTracker {
    #[default]
    Unset,
    /// Making new highs; change is measured from where the rally started.
    Rising { anchor: f64, high: f64 },
    /// Below the last high; change is measured from that peak.
    Drawdown { peak: f64 },
}

impl PeakTracker {
    /// Feeds the event's price and returns the signed change in percent.
    pub fn observe(&mut self, price: f64) -> f64 {
        let next = match *self {
            PeakTracker::Unset => PeakTracker::Rising {
                anchor: price,
                high: price,
            },
            PeakTracker::Rising { anchor, high } if price >= high => {
                PeakTracker::Rising { anchor, high: price }
            }
            PeakTracker::Rising { high, .. } => PeakTracker::Drawdown { peak: high },
            PeakTracker::Drawdown { peak } if price >= peak => PeakTracker::Rising {
                anchor: price,
                high: price,
            },
            drawdown @ PeakTracker::Drawdown { .. } => drawdown,
        };
        *self = next;

        let reference = match next {
            PeakTracker::Rising { anchor, .. } => anchor,
            PeakTracker::Drawdown { peak } => peak,
            PeakTracker::Unset => price,
        };
        if reference > 0.0 {
            (price - reference) / reference * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrawdownPolicy {
    tables: BTreeMap<Asset, StepTable>,
    trackers: BTreeMap<Asset, PeakTracker>,
    /// Trackers after the last evaluation, pending commit.
    staged: BTreeMap<Asset, PeakTracker>,
    defense: Vec<(Asset, f64)>,
}

impl DrawdownPolicy {
    pub fn new(tables: BTreeMap<Asset, StepTable>, defense: Vec<(Asset, f64)>) -> Self {
        DrawdownPolicy {
            tables,
            trackers: BTreeMap::new(),
            staged: BTreeMap::new(),
            defense,
        }
    }

    /// Committed tracker state of `asset`.
    pub fn tracker(&self, asset: Asset) -> PeakTracker {
        self.trackers.get(&asset).copied().unwrap_or_default()
    }
}

impl AllocationPolicy for DrawdownPolicy {
    fn name(&self) -> &str {
        "dynamic_rebalance"
    }

    fn target_allocation(
        &mut self,
        ctx: &MarketContext<'_>,
    ) -> Result<TargetAllocation, RebalancerError> {
        let mut staged = BTreeMap::new();
        let mut growth = BTreeMap::new();
        for (&asset, table) in &self.tables {
            let mut tracker = self.tracker(asset);
            let change = tracker.observe(ctx.price(asset)?);
            staged.insert(asset, tracker);
            growth.insert(asset, table.weight_for(change));
        }
        self.staged = staged;
        Ok(TargetAllocation::with_defense(&growth, &self.defense))
    }

    fn commit(&mut self) {
        self.trackers.append(&mut self.staged);
    }
}
