// guardsim/core/defense/src/error.rs

use guardsim_selection::SelectionError;
use guardsim_types::{GuardId, RegistryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefenseError {
    #[error("Invalid threshold {0}: must be at least 1")]
    InvalidThreshold(f64),

    #[error("Invalid cost {cost} for guard {id}")]
    InvalidCost { id: GuardId, cost: f64 },

    #[error("Redistribution did not converge after {rounds} rounds (residual mass {residual})")]
    NonConvergence { rounds: usize, residual: f64 },

    #[error("Guard pool is empty")]
    EmptyPool,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
