// guardsim/core/selection/src/resilience.rs

use crate::allocator::CappedAllocator;
use crate::error::SelectionError;
use crate::model::{bandwidth_proportional, ensure_nonempty, DistributionModel};
use guardsim_types::{ClientContext, Guard, ResilienceTable, SelectionDistribution};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Expected sample sum `k` handed to the allocator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSize {
    /// Fixed `k`; 1 means no sampling
    Absolute(f64),
    /// `k = fraction * |pool|`, re-derived for every pool evaluated
    FractionOfPool(f64),
}

impl SampleSize {
    pub fn resolve(&self, pool_len: usize) -> f64 {
        match *self {
            SampleSize::Absolute(k) => k,
            SampleSize::FractionOfPool(g) => g * pool_len as f64,
        }
    }
}

/// Resilience-weighted selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Weight of resilience against bandwidth share (0..=1)
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    #[serde(default = "default_sample_size")]
    pub sample_size: SampleSize,
}

fn default_alpha() -> f64 {
    0.5
}

fn default_sample_size() -> SampleSize {
    SampleSize::FractionOfPool(0.1)
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            sample_size: default_sample_size(),
        }
    }
}

impl ResilienceConfig {
    pub fn validate(&self) -> Result<(), SelectionError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(SelectionError::InvalidParameter(format!(
                "alpha must lie in [0, 1], got {}",
                self.alpha
            )));
        }
        let raw = match self.sample_size {
            SampleSize::Absolute(k) | SampleSize::FractionOfPool(k) => k,
        };
        if !raw.is_finite() || raw <= 0.0 {
            return Err(SelectionError::InvalidSampleSize(raw));
        }
        Ok(())
    }
}

/// Blends each guard's (capped) AS resilience with its bandwidth share:
/// `weight = alpha * resilience + (1 - alpha) * bandwidthShare`.
pub struct ResilienceWeightedModel {
    config: ResilienceConfig,
    table: Arc<ResilienceTable>,
    allocator: CappedAllocator,
}

impl ResilienceWeightedModel {
    pub fn new(config: ResilienceConfig, table: Arc<ResilienceTable>) -> Result<Self, SelectionError> {
        config.validate()?;
        table.validate()?;
        Ok(Self {
            config,
            table,
            allocator: CappedAllocator::new(),
        })
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Resilience values after capped allocation, in pool order
    fn adjusted_resilience(
        &self,
        client: &ClientContext,
        pool: &[&Guard],
    ) -> Result<Vec<f64>, SelectionError> {
        let client_as = client
            .as_token()
            .ok_or_else(|| SelectionError::ClientKindMismatch {
                model: self.name(),
                client: client.to_string(),
            })?;
        let map = self
            .table
            .for_client(client_as)
            .ok_or_else(|| SelectionError::UnknownClient(client_as.clone()))?;

        let mut missing = 0usize;
        let raw: Vec<f64> = pool
            .iter()
            .map(|g| match g.asn.as_ref().and_then(|asn| map.get(asn)) {
                Some(r) => r,
                None => {
                    missing += 1;
                    0.0
                }
            })
            .collect();
        if missing > 0 {
            warn!(
                "{} of {} guards have no resilience from {}, treating as 0",
                missing,
                pool.len(),
                client_as
            );
        }

        if raw.iter().sum::<f64>() <= 0.0 {
            warn!("All resiliences from {} are zero, using uniform resilience", client_as);
            return Ok(vec![1.0 / pool.len() as f64; pool.len()]);
        }

        let k = self.config.sample_size.resolve(pool.len());
        self.allocator.allocate(&raw, k)
    }
}

impl DistributionModel for ResilienceWeightedModel {
    fn name(&self) -> &'static str {
        "resilience"
    }

    fn evaluate(
        &self,
        client: &ClientContext,
        pool: &[&Guard],
    ) -> Result<SelectionDistribution, SelectionError> {
        ensure_nonempty(pool)?;

        let resilience = self.adjusted_resilience(client, pool)?;
        let bandwidth = bandwidth_proportional(pool);
        let alpha = self.config.alpha;

        let weights: Vec<f64> = pool
            .iter()
            .zip(&resilience)
            .map(|(g, r)| alpha * r + (1.0 - alpha) * bandwidth.get(&g.id))
            .collect();
        let total: f64 = weights.iter().sum();
        debug!("Resilience weights for {} sum to {}", client, total);

        if total <= 0.0 {
            return Ok(SelectionDistribution::uniform(pool.iter().map(|g| &g.id)));
        }

        Ok(pool
            .iter()
            .zip(weights)
            .map(|(g, w)| (g.id.clone(), w / total))
            .collect())
    }
}
