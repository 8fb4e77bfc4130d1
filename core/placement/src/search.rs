// guardsim/core/placement/src/search.rs

use crate::error::PlacementError;
use crate::report::{ClientProbability, PlacementReport, TargetingAdvantage};
use guardsim_selection::DistributionModel;
use guardsim_types::{
    ClientContext, Coordinate, Guard, GuardId, GuardRegistry, Location, RegistryOverlay,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How per-client success probabilities are combined when ranking
/// candidate locations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    /// Rank by the hardest target
    Minimum,
}

/// Placement search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default)]
    pub aggregation: Aggregation,

    /// Equal-scoring candidates nearer this point win
    #[serde(default)]
    pub reference_point: Option<Coordinate>,

    /// Scores closer than this are treated as equal
    #[serde(default = "default_tie_tolerance")]
    pub tie_tolerance: f64,
}

fn default_tie_tolerance() -> f64 {
    1e-12
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            aggregation: Aggregation::default(),
            reference_point: None,
            tie_tolerance: default_tie_tolerance(),
        }
    }
}

impl PlacementConfig {
    pub fn validate(&self) -> Result<(), PlacementError> {
        if !self.tie_tolerance.is_finite() || self.tie_tolerance < 0.0 {
            return Err(PlacementError::InvalidParameter(format!(
                "tie tolerance must be a non-negative number, got {}",
                self.tie_tolerance
            )));
        }
        Ok(())
    }
}

/// One committed attacker relay
#[derive(Debug, Clone, Serialize)]
pub struct Placement {
    pub location: Location,
    pub guard: GuardId,
    pub bandwidth: f64,
    /// Aggregate probability of this relay being picked when it was placed
    pub probability: f64,
}

/// Ordered placements from a search
#[derive(Debug, Clone, Serialize)]
pub struct PlacementOutcome {
    pub placements: Vec<Placement>,
    pub total_probability: f64,
}

impl PlacementOutcome {
    pub fn locations(&self) -> Vec<Location> {
        self.placements.iter().map(|p| p.location.clone()).collect()
    }
}

struct Candidate {
    index: usize,
    score: f64,
    distance: Option<f64>,
}

/// Greedy attacker placement over a base registry.
///
/// Relays are placed one at a time; each goes to the candidate location
/// that maximises the aggregate probability of the new relay being chosen,
/// given every relay committed before it. Nothing is backtracked.
pub struct PlacementSearch<'a> {
    model: &'a dyn DistributionModel,
    registry: &'a GuardRegistry,
    config: PlacementConfig,
}

impl<'a> PlacementSearch<'a> {
    pub fn new(
        model: &'a dyn DistributionModel,
        registry: &'a GuardRegistry,
        config: PlacementConfig,
    ) -> Result<Self, PlacementError> {
        config.validate()?;
        Ok(Self {
            model,
            registry,
            config,
        })
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn search(
        &self,
        targets: &[ClientContext],
        candidates: &[Location],
        budget: f64,
        relay_count: usize,
    ) -> Result<PlacementOutcome, PlacementError> {
        validate_request(targets, budget, relay_count)?;
        if candidates.is_empty() {
            return Err(PlacementError::EmptyCandidates);
        }

        let bandwidth = budget / relay_count as f64;
        let mut overlay = RegistryOverlay::new(self.registry);
        let mut placements = Vec::with_capacity(relay_count);

        for ordinal in 0..relay_count {
            let mut best: Option<Candidate> = None;

            for (index, location) in candidates.iter().enumerate() {
                let trial = Guard::synthetic(ordinal as u32, bandwidth, location);
                let pool = overlay.pool_with(&trial);
                let score = self.aggregate(targets, &pool, &trial.id)?;
                let candidate = Candidate {
                    index,
                    score,
                    distance: self.distance_to_reference(location),
                };
                debug!("Relay {} at {}: aggregate {}", ordinal, location, score);

                if best.as_ref().map_or(true, |b| self.beats(&candidate, b)) {
                    best = Some(candidate);
                }
            }

            let Some(best) = best else {
                return Err(PlacementError::EmptyCandidates);
            };
            let location = candidates[best.index].clone();
            let guard = Guard::synthetic(ordinal as u32, bandwidth, &location);
            let id = guard.id.clone();
            overlay.commit(guard)?;

            info!(
                "Placed relay {} of {} at {} (aggregate {})",
                ordinal + 1,
                relay_count,
                location,
                best.score
            );
            placements.push(Placement {
                location,
                guard: id,
                bandwidth,
                probability: best.score,
            });
        }

        let total_probability = placements.iter().map(|p| p.probability).sum();
        Ok(PlacementOutcome {
            placements,
            total_probability,
        })
    }

    /// Per-client probability of picking any attacker relay when the budget
    /// is split evenly over `placements`
    pub fn evaluate_placement(
        &self,
        targets: &[ClientContext],
        placements: &[Location],
        budget: f64,
    ) -> Result<PlacementReport, PlacementError> {
        validate_request(targets, budget, placements.len())?;

        let bandwidth = budget / placements.len() as f64;
        let mut overlay = RegistryOverlay::new(self.registry);
        for (ordinal, location) in placements.iter().enumerate() {
            overlay.commit(Guard::synthetic(ordinal as u32, bandwidth, location))?;
        }
        let pool = overlay.pool();

        let clients = targets
            .iter()
            .map(|client| {
                let dist = self.model.evaluate(client, &pool)?;
                Ok(ClientProbability {
                    client: client.clone(),
                    probability: dist.synthetic_mass(),
                })
            })
            .collect::<Result<Vec<_>, PlacementError>>()?;

        Ok(PlacementReport::new(clients))
    }

    /// The target least likely to pick an attacker relay under `placements`
    pub fn worst_case_client(
        &self,
        targets: &[ClientContext],
        placements: &[Location],
        budget: f64,
    ) -> Result<ClientProbability, PlacementError> {
        let report = self.evaluate_placement(targets, placements, budget)?;
        report.hardest().cloned().ok_or(PlacementError::EmptyTargets)
    }

    /// The target most likely to pick an attacker relay under `placements`
    pub fn easiest_client(
        &self,
        targets: &[ClientContext],
        placements: &[Location],
        budget: f64,
    ) -> Result<ClientProbability, PlacementError> {
        let report = self.evaluate_placement(targets, placements, budget)?;
        report.easiest().cloned().ok_or(PlacementError::EmptyTargets)
    }

    /// Compares, for each target, a placement searched for that client alone
    /// against the one searched for all targets together.
    pub fn targeting_advantage(
        &self,
        targets: &[ClientContext],
        candidates: &[Location],
        budget: f64,
        relay_count: usize,
    ) -> Result<Vec<TargetingAdvantage>, PlacementError> {
        let untargeted = self.search(targets, candidates, budget, relay_count)?.locations();

        let mut results = Vec::with_capacity(targets.len());
        for client in targets {
            let single = std::slice::from_ref(client);
            let targeted = self.search(single, candidates, budget, relay_count)?.locations();

            let untargeted_p = self.evaluate_placement(single, &untargeted, budget)?.mean;
            let targeted_p = self.evaluate_placement(single, &targeted, budget)?.mean;
            debug!(
                "{}: untargeted {} targeted {}",
                client, untargeted_p, targeted_p
            );
            results.push(TargetingAdvantage::new(client.clone(), untargeted_p, targeted_p));
        }
        Ok(results)
    }

    fn aggregate(
        &self,
        targets: &[ClientContext],
        pool: &[&Guard],
        relay: &GuardId,
    ) -> Result<f64, PlacementError> {
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        for client in targets {
            let p = self.model.evaluate(client, pool)?.get(relay);
            sum += p;
            min = min.min(p);
        }
        Ok(match self.config.aggregation {
            Aggregation::Mean => sum / targets.len() as f64,
            Aggregation::Minimum => min,
        })
    }

    fn distance_to_reference(&self, location: &Location) -> Option<f64> {
        let reference = self.config.reference_point?;
        location.coordinate().map(|c| reference.great_circle_km(&c))
    }

    fn beats(&self, candidate: &Candidate, best: &Candidate) -> bool {
        let tolerance = self.config.tie_tolerance;
        if candidate.score > best.score + tolerance {
            return true;
        }
        if (candidate.score - best.score).abs() > tolerance {
            return false;
        }
        match (candidate.distance, best.distance) {
            (Some(d), Some(b)) => d < b,
            _ => false,
        }
    }
}

fn validate_request(
    targets: &[ClientContext],
    budget: f64,
    relay_count: usize,
) -> Result<(), PlacementError> {
    if targets.is_empty() {
        return Err(PlacementError::EmptyTargets);
    }
    if !budget.is_finite() || budget <= 0.0 {
        return Err(PlacementError::InvalidBudget(budget));
    }
    if relay_count == 0 {
        return Err(PlacementError::InvalidRelayCount);
    }
    Ok(())
}
