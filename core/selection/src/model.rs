// guardsim/core/selection/src/model.rs

use crate::error::SelectionError;
use guardsim_types::{ClientContext, Guard, SelectionDistribution};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A guard-selection policy.
///
/// Evaluation is pure with respect to the pool: the returned distribution
/// covers exactly the guards passed in and sums to 1.
pub trait DistributionModel: Send + Sync {
    /// Short policy name for logs
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        client: &ClientContext,
        pool: &[&Guard],
    ) -> Result<SelectionDistribution, SelectionError>;
}

/// Selection policy identifiers used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Bandwidth-proportional baseline
    Vanilla,
    Resilience,
    Path,
    Geo,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyKind::Vanilla => "vanilla",
            PolicyKind::Resilience => "resilience",
            PolicyKind::Path => "path",
            PolicyKind::Geo => "geo",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vanilla" => Ok(PolicyKind::Vanilla),
            "resilience" | "counter-raptor" => Ok(PolicyKind::Resilience),
            "path" | "denasa" => Ok(PolicyKind::Path),
            "geo" | "lastor" => Ok(PolicyKind::Geo),
            other => Err(SelectionError::InvalidParameter(format!(
                "unknown policy '{}'",
                other
            ))),
        }
    }
}

/// Bandwidth-proportional distribution over `pool`, uniform when every
/// guard has zero bandwidth.
pub fn bandwidth_proportional(pool: &[&Guard]) -> SelectionDistribution {
    let total: f64 = pool.iter().map(|g| g.bandwidth).sum();
    if total <= 0.0 {
        warn!("All {} guards have zero bandwidth, using uniform selection", pool.len());
        return SelectionDistribution::uniform(pool.iter().map(|g| &g.id));
    }
    pool.iter()
        .map(|g| (g.id.clone(), g.bandwidth / total))
        .collect()
}

pub(crate) fn ensure_nonempty(pool: &[&Guard]) -> Result<(), SelectionError> {
    if pool.is_empty() {
        return Err(SelectionError::EmptyPool);
    }
    Ok(())
}
