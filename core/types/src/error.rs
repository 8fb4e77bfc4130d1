// guardsim/core/types/src/error.rs

use crate::types::{AsToken, GuardId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Duplicate guard identifier: {0}")]
    DuplicateGuard(GuardId),

    #[error("Guard not found: {0}")]
    UnknownGuard(GuardId),

    #[error("Invalid bandwidth {value} for guard {id}")]
    InvalidBandwidth { id: GuardId, value: f64 },

    #[error("Coordinate out of range: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Cap threshold must be a finite value >= 1, got {0}")]
    InvalidThreshold(f64),

    #[error("Resilience for AS {asn} must lie in [0, 1], got {value}")]
    InvalidResilience { asn: AsToken, value: f64 },

    #[error("Cannot parse client context: {0}")]
    ParseClient(String),
}
