// guardsim/core/selection/src/error.rs

use guardsim_types::{AsToken, RegistryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Guard pool is empty")]
    EmptyPool,

    #[error("Sample size must be a finite positive value, got {0}")]
    InvalidSampleSize(f64),

    #[error("Invalid weight {value} at index {index}")]
    InvalidWeight { index: usize, value: f64 },

    #[error("All weights are zero")]
    DegenerateWeights,

    #[error("{model} cannot evaluate client {client}")]
    ClientKindMismatch { model: &'static str, client: String },

    #[error("No resilience data for client {0}")]
    UnknownClient(AsToken),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Usability cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
