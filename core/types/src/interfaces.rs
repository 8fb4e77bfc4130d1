// guardsim/core/types/src/interfaces.rs

//! Narrow interfaces to the external data sources.

use crate::types::{AsToken, Coordinate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

/// Inferred AS-level routing
pub trait PathOracle: Send + Sync {
    /// ASes on the path from `from` to `to`, or `None` if no inference exists
    fn path_between(&self, from: &AsToken, to: &AsToken) -> Option<HashSet<AsToken>>;

    /// Union of the forward and reverse paths; `None` only when neither
    /// direction could be inferred.
    fn bidirectional_path(&self, a: &AsToken, b: &AsToken) -> Option<HashSet<AsToken>> {
        match (self.path_between(a, b), self.path_between(b, a)) {
            (None, None) => None,
            (forward, reverse) => {
                let mut union = forward.unwrap_or_default();
                union.extend(reverse.unwrap_or_default());
                Some(union)
            }
        }
    }
}

/// Network address to geographic coordinate
pub trait GeoLookup: Send + Sync {
    fn coordinate_of(&self, address: &IpAddr) -> Option<Coordinate>;
}

/// Monthly cost of running a relay of a given bandwidth weight.
///
/// Implementations must be monotonic in bandwidth and strictly positive.
pub trait CostModel: Send + Sync {
    fn monthly_cost(&self, bandwidth: f64) -> f64;
}

/// In-memory path table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticPathOracle {
    paths: HashMap<AsToken, HashMap<AsToken, HashSet<AsToken>>>,
}

impl StaticPathOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: AsToken, to: AsToken, path: impl IntoIterator<Item = AsToken>) {
        self.paths
            .entry(from)
            .or_default()
            .insert(to, path.into_iter().collect());
    }

    pub fn len(&self) -> usize {
        self.paths.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PathOracle for StaticPathOracle {
    fn path_between(&self, from: &AsToken, to: &AsToken) -> Option<HashSet<AsToken>> {
        self.paths.get(from).and_then(|m| m.get(to)).cloned()
    }
}

/// In-memory geolocation table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticGeoLookup {
    coordinates: HashMap<IpAddr, Coordinate>,
}

impl StaticGeoLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: IpAddr, coordinate: Coordinate) {
        self.coordinates.insert(address, coordinate);
    }
}

impl GeoLookup for StaticGeoLookup {
    fn coordinate_of(&self, address: &IpAddr) -> Option<Coordinate> {
        self.coordinates.get(address).copied()
    }
}

/// Empirical hosting-cost model.
///
/// Bandwidth weights are converted to real throughput with a linear
/// regression, then priced by the cheapest provider offering that
/// throughput (a non-increasing step table in Mbps).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepCostModel {
    /// Bytes/second per unit of bandwidth weight
    pub slope: f64,
    /// Bytes/second at zero weight
    pub intercept: f64,
}

/// (lower bound in Mbps, exclusive; monthly USD), highest first
const COST_STEPS: &[(f64, f64)] = &[
    (500.0, 11.4),
    (333.333_333_333_333_3, 5.7),
    (250.0, 4.56),
    (200.0, 3.42),
    (166.666_666_666_666_66, 3.192),
    (142.857_142_857_142_86, 2.66),
    (125.0, 2.605_714_285_714_286),
    (111.111_111_111_111_11, 2.280_000_000_000_000_2),
    (100.0, 2.28),
    (83.333_333_333_333_33, 2.052),
    (71.428_571_428_571_43, 1.899_999_999_999_999_7),
    (62.5, 1.791_428_571_428_571_4),
    (55.555_555_555_555_56, 1.71),
    (50.0, 1.646_666_666_666_666_7),
    (33.333_333_333_333_336, 1.14),
    (25.0, 1.138_333_333_333_333_4),
    (16.666_666_666_666_668, 0.855),
    (12.5, 0.759_999_999_999_999_9),
    (10.0, 0.712_499_999_999_999_9),
    (8.333_333_333_333_334, 0.683_999_999_999_999_9),
    (7.142_857_142_857_143, 0.664_999_999_999_999_9),
    (6.25, 0.651_428_571_428_571_4),
    (5.555_555_555_555_555, 0.641_25),
    (5.0, 0.633_333_333_333_333_3),
    (4.545_454_545_454_546, 0.627),
    (4.166_666_666_666_667, 0.621_818_181_818_181_7),
    (3.846_153_846_153_846_3, 0.617_499_999_999_999_9),
    (3.571_428_571_428_571_6, 0.613_846_153_846_153_8),
    (3.333_333_333_333_333_5, 0.610_714_285_714_285_7),
    (3.125, 0.608),
];

const FLOOR_COST: f64 = 0.605_625;
const GIGABIT_COST: f64 = 11.4;

impl StepCostModel {
    /// Throughput in Mbps for a bandwidth weight
    pub fn real_mbps(&self, bandwidth: f64) -> f64 {
        let bytes_per_sec = bandwidth * self.slope + self.intercept;
        bytes_per_sec * 8.0 / 1e6
    }

    /// Monthly USD for a given throughput
    pub fn cost_for_mbps(mbps: f64) -> f64 {
        if mbps >= 1000.0 {
            return GIGABIT_COST * (mbps / 1000.0).ceil();
        }
        COST_STEPS
            .iter()
            .find(|(bound, _)| mbps > *bound)
            .map(|(_, cost)| *cost)
            .unwrap_or(FLOOR_COST)
    }
}

impl Default for StepCostModel {
    fn default() -> Self {
        Self {
            slope: 763.80,
            intercept: 2_098_271.21,
        }
    }
}

impl CostModel for StepCostModel {
    fn monthly_cost(&self, bandwidth: f64) -> f64 {
        Self::cost_for_mbps(self.real_mbps(bandwidth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asn(s: &str) -> AsToken {
        AsToken::new(s)
    }

    #[test]
    fn test_bidirectional_union() {
        let mut oracle = StaticPathOracle::new();
        oracle.insert(asn("1"), asn("2"), vec![asn("1"), asn("7"), asn("2")]);
        oracle.insert(asn("2"), asn("1"), vec![asn("2"), asn("8"), asn("1")]);
        oracle.insert(asn("1"), asn("3"), vec![asn("1"), asn("3")]);

        let both = oracle.bidirectional_path(&asn("1"), &asn("2")).unwrap();
        assert!(both.contains(&asn("7")) && both.contains(&asn("8")));

        // Only the forward direction is known
        let forward = oracle.bidirectional_path(&asn("1"), &asn("3")).unwrap();
        assert_eq!(forward.len(), 2);

        assert!(oracle.bidirectional_path(&asn("4"), &asn("5")).is_none());
    }

    #[test]
    fn test_step_cost_is_monotonic() {
        let model = StepCostModel::default();
        let mut last = 0.0;
        for weight in (0..200_000).step_by(250) {
            let cost = model.monthly_cost(weight as f64);
            assert!(cost > 0.0);
            assert!(cost >= last, "cost decreased at weight {}", weight);
            last = cost;
        }
    }

    #[test]
    fn test_step_cost_boundaries() {
        assert_eq!(StepCostModel::cost_for_mbps(0.0), FLOOR_COST);
        assert_eq!(StepCostModel::cost_for_mbps(3.125), FLOOR_COST);
        assert_eq!(StepCostModel::cost_for_mbps(3.2), 0.608);
        assert_eq!(StepCostModel::cost_for_mbps(600.0), 11.4);
        assert_eq!(StepCostModel::cost_for_mbps(1000.0), 11.4);
        assert!((StepCostModel::cost_for_mbps(2500.0) - 34.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_uses_intercept() {
        let model = StepCostModel::default();
        // 2098271.21 B/s is about 16.8 Mbps
        let mbps = model.real_mbps(0.0);
        assert!((mbps - 16.786).abs() < 0.01);
        assert_eq!(model.monthly_cost(0.0), 0.855);
    }
}
