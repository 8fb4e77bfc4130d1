// guardsim/core/placement/src/report.rs

use guardsim_types::ClientContext;
use serde::Serialize;

/// Probability that one client picks any attacker relay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientProbability {
    pub client: ClientContext,
    pub probability: f64,
}

/// Attack success for a fixed placement, per target client
#[derive(Debug, Clone, Serialize)]
pub struct PlacementReport {
    pub clients: Vec<ClientProbability>,
    pub mean: f64,
}

impl PlacementReport {
    pub fn new(clients: Vec<ClientProbability>) -> Self {
        let mean = if clients.is_empty() {
            0.0
        } else {
            clients.iter().map(|c| c.probability).sum::<f64>() / clients.len() as f64
        };
        Self { clients, mean }
    }

    /// Hardest client to attack; the earliest one wins ties
    pub fn hardest(&self) -> Option<&ClientProbability> {
        self.clients
            .iter()
            .reduce(|best, c| if c.probability < best.probability { c } else { best })
    }

    /// Easiest client to attack; the earliest one wins ties
    pub fn easiest(&self) -> Option<&ClientProbability> {
        self.clients
            .iter()
            .reduce(|best, c| if c.probability > best.probability { c } else { best })
    }
}

/// How much a client-specific placement beats the population-optimal one
#[derive(Debug, Clone, Serialize)]
pub struct TargetingAdvantage {
    pub client: ClientContext,
    /// Success under the placement optimised for every target together
    pub untargeted: f64,
    /// Success under the placement optimised for this client alone
    pub targeted: f64,
    /// `targeted / untargeted`, absent when the untargeted placement never wins
    pub advantage: Option<f64>,
}

impl TargetingAdvantage {
    pub fn new(client: ClientContext, untargeted: f64, targeted: f64) -> Self {
        let advantage = (untargeted > 0.0).then(|| targeted / untargeted);
        Self {
            client,
            untargeted,
            targeted,
            advantage,
        }
    }
}
