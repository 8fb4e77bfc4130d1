// guardsim/core/defense/src/analysis.rs

//! Threshold sweeps over the redistribution engine.

use crate::error::DefenseError;
use crate::redistribution::{pool_costs, RedistributionConfig, RedistributionEngine};
use guardsim_selection::{DistributionModel, PathTopologyModel};
use guardsim_types::{
    CapThreshold, ClientContext, CostModel, Guard, GuardId, ResilienceTable, SelectionDistribution,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// One client's aggregate score at a given threshold
#[derive(Debug, Clone, Serialize)]
pub struct ClientScore {
    pub client: ClientContext,
    pub score: f64,
}

/// Scores for every client at one threshold
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdSweep {
    pub threshold: f64,
    pub clients: Vec<ClientScore>,
}

impl ThresholdSweep {
    pub fn mean(&self) -> f64 {
        if self.clients.is_empty() {
            return 0.0;
        }
        self.clients.iter().map(|c| c.score).sum::<f64>() / self.clients.len() as f64
    }
}

/// Probability-to-cost ratios before any redistribution, scaled by the
/// total network cost (1.0 means a guard is selected exactly in proportion
/// to what it costs).
pub fn initial_ratios(
    model: &dyn DistributionModel,
    client: &ClientContext,
    pool: &[&Guard],
    cost: &dyn CostModel,
) -> Result<BTreeMap<GuardId, f64>, DefenseError> {
    if pool.is_empty() {
        return Err(DefenseError::EmptyPool);
    }
    let (costs, total) = pool_costs(pool, cost)?;
    let dist = model.evaluate(client, pool)?;
    Ok(pool
        .iter()
        .zip(costs)
        .map(|(g, c)| (g.id.clone(), dist.get(&g.id) * total / c))
        .collect())
}

/// Largest `p / cost * totalCost` achieved by `distribution` over `pool`
pub fn max_ratio(
    distribution: &SelectionDistribution,
    pool: &[&Guard],
    cost: &dyn CostModel,
) -> Result<f64, DefenseError> {
    let (costs, total) = pool_costs(pool, cost)?;
    Ok(pool
        .iter()
        .zip(costs)
        .map(|(g, c)| distribution.get(&g.id) / c * total)
        .fold(0.0, f64::max))
}

/// Probability mass each client puts on guards it considers safe, clamped
/// to 1, for every threshold.
///
/// `safety` scores a (client, guard) pair in [0, 1]; see
/// [`resilience_safety`] and [`usability_safety`].
pub fn safe_mass_sweep<F>(
    base: &RedistributionConfig,
    model: &dyn DistributionModel,
    clients: &[ClientContext],
    pool: &[&Guard],
    cost: &dyn CostModel,
    thresholds: &[f64],
    safety: F,
) -> Result<Vec<ThresholdSweep>, DefenseError>
where
    F: Fn(&ClientContext, &Guard) -> f64,
{
    sweep(base, model, clients, pool, cost, thresholds, safety, true)
}

/// Expected great-circle distance in km from each client to its chosen
/// guard, for every threshold. Guards without a coordinate contribute 0.
pub fn expected_distance_sweep(
    base: &RedistributionConfig,
    model: &dyn DistributionModel,
    clients: &[ClientContext],
    pool: &[&Guard],
    cost: &dyn CostModel,
    thresholds: &[f64],
) -> Result<Vec<ThresholdSweep>, DefenseError> {
    let distance = |client: &ClientContext, guard: &Guard| match (client.coordinate(), guard.coordinate) {
        (Some(a), Some(b)) => a.great_circle_km(&b),
        _ => 0.0,
    };
    sweep(base, model, clients, pool, cost, thresholds, distance, false)
}

#[allow(clippy::too_many_arguments)]
fn sweep<F>(
    base: &RedistributionConfig,
    model: &dyn DistributionModel,
    clients: &[ClientContext],
    pool: &[&Guard],
    cost: &dyn CostModel,
    thresholds: &[f64],
    score: F,
    clamp: bool,
) -> Result<Vec<ThresholdSweep>, DefenseError>
where
    F: Fn(&ClientContext, &Guard) -> f64,
{
    let mut sweeps = Vec::with_capacity(thresholds.len());
    for &threshold in thresholds {
        let threshold_value =
            CapThreshold::new(threshold).map_err(|_| DefenseError::InvalidThreshold(threshold))?;
        let engine = RedistributionEngine::new(RedistributionConfig {
            threshold: threshold_value,
            ..base.clone()
        })?;

        let mut scores = Vec::with_capacity(clients.len());
        for client in clients {
            let result = engine.redistribute(model, client, pool, cost)?;
            let total: f64 = pool
                .iter()
                .map(|g| result.distribution.get(&g.id) * score(client, g))
                .sum();
            scores.push(ClientScore {
                client: client.clone(),
                score: if clamp { total.min(1.0) } else { total },
            });
        }

        let sweep = ThresholdSweep {
            threshold,
            clients: scores,
        };
        info!(
            "Threshold {}: mean score {} over {} clients",
            threshold,
            sweep.mean(),
            clients.len()
        );
        sweeps.push(sweep);
    }
    Ok(sweeps)
}

/// Safety as the client's resilience toward the guard's AS (0 when unknown)
pub fn resilience_safety(table: &ResilienceTable) -> impl Fn(&ClientContext, &Guard) -> f64 + '_ {
    move |client: &ClientContext, guard: &Guard| {
        let resilience = client
            .as_token()
            .and_then(|c| table.for_client(c))
            .zip(guard.asn.as_ref())
            .and_then(|(map, asn)| map.get(asn));
        resilience.unwrap_or(0.0)
    }
}

/// Safety as 1 for guards reachable without crossing a suspect AS, else 0
pub fn usability_safety(model: &PathTopologyModel) -> impl Fn(&ClientContext, &Guard) -> f64 + '_ {
    move |client: &ClientContext, guard: &Guard| match client.as_token() {
        Some(asn) if model.is_usable(asn, guard) => 1.0,
        _ => 0.0,
    }
}
