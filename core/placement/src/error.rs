// guardsim/core/placement/src/error.rs

use guardsim_selection::SelectionError;
use guardsim_types::RegistryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("No target clients given")]
    EmptyTargets,

    #[error("No candidate locations given")]
    EmptyCandidates,

    #[error("Invalid bandwidth budget: {0}")]
    InvalidBudget(f64),

    #[error("Relay count must be positive")]
    InvalidRelayCount,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
