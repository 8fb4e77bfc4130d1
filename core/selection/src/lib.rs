// guardsim/core/selection/src/lib.rs

//! Guard-selection policies and the capped proportional allocator they share.

pub mod allocator;
pub mod cache;
pub mod error;
pub mod geo_cluster;
pub mod model;
pub mod path_topology;
pub mod resilience;
pub mod vanilla;

#[cfg(test)]
mod test_support;

pub use allocator::CappedAllocator;
pub use cache::{UsabilityCache, UsabilityEntry};
pub use error::SelectionError;
pub use geo_cluster::{CellGrid, GeoClusterConfig, GeoClusterModel};
pub use model::{bandwidth_proportional, DistributionModel, PolicyKind};
pub use path_topology::{PathTopologyConfig, PathTopologyModel};
pub use resilience::{ResilienceConfig, ResilienceWeightedModel, SampleSize};
pub use vanilla::VanillaModel;
