// guardsim/core/placement/src/lib.rs

//! Greedy search for the attacker relay placements that best capture
//! guard selection for a set of target clients.

pub mod error;
pub mod report;
pub mod search;

pub use error::PlacementError;
pub use report::{ClientProbability, PlacementReport, TargetingAdvantage};
pub use search::{Aggregation, Placement, PlacementConfig, PlacementOutcome, PlacementSearch};
