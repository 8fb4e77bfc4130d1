// guardsim/core/defense/src/lib.rs

//! Cost-normalized redistribution of guard-selection probability and the
//! analyses built on it.

pub mod analysis;
pub mod error;
pub mod redistribution;

pub use analysis::{
    expected_distance_sweep, initial_ratios, max_ratio, resilience_safety, safe_mass_sweep,
    usability_safety, ClientScore, ThresholdSweep,
};
pub use error::DefenseError;
pub use redistribution::{pool_costs, Redistribution, RedistributionConfig, RedistributionEngine};
