// guardsim/core/defense/src/redistribution.rs

use crate::error::DefenseError;
use guardsim_selection::DistributionModel;
use guardsim_types::{CapThreshold, ClientContext, CostModel, Guard, GuardId, SelectionDistribution};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Redistribution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedistributionConfig {
    /// Ceiling on selection probability over fractional network cost
    #[serde(default)]
    pub threshold: CapThreshold,

    /// Round budget; never taken below the pool size plus one
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Leftover mass below which the rounds stop
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_max_rounds() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-12
}

impl Default for RedistributionConfig {
    fn default() -> Self {
        Self {
            threshold: CapThreshold::default(),
            max_rounds: default_max_rounds(),
            tolerance: default_tolerance(),
        }
    }
}

impl RedistributionConfig {
    pub fn with_threshold(threshold: f64) -> Result<Self, DefenseError> {
        let threshold =
            CapThreshold::new(threshold).map_err(|_| DefenseError::InvalidThreshold(threshold))?;
        Ok(Self {
            threshold,
            ..Default::default()
        })
    }

    pub fn validate(&self) -> Result<(), DefenseError> {
        if self.max_rounds == 0 {
            return Err(DefenseError::InvalidParameter(
                "max_rounds must be positive".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(DefenseError::InvalidParameter(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Result of a redistribution
#[derive(Debug, Clone, Serialize)]
pub struct Redistribution {
    pub distribution: SelectionDistribution,
    /// Model evaluations performed
    pub rounds: usize,
    /// Guards pinned at the ceiling, in the order they were capped
    pub capped: Vec<GuardId>,
    /// Mass left unassigned when the rounds stopped
    pub residual: f64,
}

/// Per-guard monthly cost in pool order, with the network total.
///
/// Every cost must be strictly positive.
pub fn pool_costs(pool: &[&Guard], cost: &dyn CostModel) -> Result<(Vec<f64>, f64), DefenseError> {
    let costs = pool
        .iter()
        .map(|g| {
            let c = cost.monthly_cost(g.bandwidth);
            if !c.is_finite() || c <= 0.0 {
                return Err(DefenseError::InvalidCost {
                    id: g.id.clone(),
                    cost: c,
                });
            }
            Ok(c)
        })
        .collect::<Result<Vec<f64>, DefenseError>>()?;
    let total = costs.iter().sum();
    Ok((costs, total))
}

/// Re-solves a selection model over a shrinking pool so that no guard's
/// probability-to-cost ratio exceeds `threshold / totalCost`.
///
/// Each round hands the mass clipped from capped guards back to the guards
/// still active, in the proportions the model gives over that active set.
pub struct RedistributionEngine {
    config: RedistributionConfig,
}

impl RedistributionEngine {
    pub fn new(config: RedistributionConfig) -> Result<Self, DefenseError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RedistributionConfig {
        &self.config
    }

    pub fn redistribute(
        &self,
        model: &dyn DistributionModel,
        client: &ClientContext,
        pool: &[&Guard],
        cost: &dyn CostModel,
    ) -> Result<Redistribution, DefenseError> {
        if pool.is_empty() {
            return Err(DefenseError::EmptyPool);
        }

        let (costs, total_cost) = pool_costs(pool, cost)?;
        let ceiling = self.config.threshold.value() / total_cost;

        let mut ratios = vec![0.0; pool.len()];
        let mut active: Vec<usize> = (0..pool.len()).collect();
        let mut capped = Vec::new();
        let mut excess = 1.0;
        let mut rounds = 0usize;
        // Every round but the last caps at least one guard
        let round_limit = self.config.max_rounds.max(pool.len() + 1);

        while excess > self.config.tolerance && !active.is_empty() {
            if rounds == round_limit {
                return Err(DefenseError::NonConvergence {
                    rounds,
                    residual: excess,
                });
            }
            rounds += 1;

            let subset: Vec<&Guard> = active.iter().map(|&i| pool[i]).collect();
            let dist = model.evaluate(client, &subset)?;

            let norm = excess;
            excess = 0.0;
            let mut still_active = Vec::with_capacity(active.len());
            for &i in &active {
                ratios[i] += dist.get(&pool[i].id) / costs[i] * norm;
                if ratios[i] > ceiling {
                    excess += (ratios[i] - ceiling) * costs[i];
                    ratios[i] = ceiling;
                    capped.push(pool[i].id.clone());
                } else {
                    still_active.push(i);
                }
            }

            debug!(
                "Round {}: {} capped, {} active, excess {}",
                rounds,
                active.len() - still_active.len(),
                still_active.len(),
                excess
            );
            active = still_active;
        }

        if excess > self.config.tolerance {
            warn!(
                "Every guard capped with {} mass unassigned for {}",
                excess, client
            );
        }

        let distribution: SelectionDistribution = pool
            .iter()
            .zip(ratios.iter().zip(&costs))
            .map(|(g, (ratio, c))| (g.id.clone(), ratio * c))
            .collect();

        info!(
            "Redistributed {} for {} (T={}) in {} rounds, {} guards capped",
            model.name(),
            client,
            self.config.threshold.value(),
            rounds,
            capped.len()
        );

        Ok(Redistribution {
            distribution,
            rounds,
            capped,
            residual: excess,
        })
    }
}
