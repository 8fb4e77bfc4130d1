// guardsim/core/types/src/lib.rs

//! Shared data model for guard-selection simulation: guards, client
//! contexts, selection distributions and the narrow interfaces to the
//! external data sources (path inference, geolocation, relay cost).

pub mod error;
pub mod interfaces;
pub mod registry;
pub mod types;

pub use error::RegistryError;
pub use interfaces::{
    CostModel, GeoLookup, PathOracle, StaticGeoLookup, StaticPathOracle, StepCostModel,
};
pub use registry::{GuardRegistry, RegistryOverlay, SnapshotRecord};
pub use types::*;
