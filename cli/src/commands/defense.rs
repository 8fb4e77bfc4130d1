// guardsim/cli/src/commands/defense.rs

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use guardsim_defense::{
    expected_distance_sweep, initial_ratios, max_ratio, resilience_safety, safe_mass_sweep,
    usability_safety, RedistributionConfig, RedistributionEngine, ThresholdSweep,
};
use guardsim_selection::PolicyKind;
use guardsim_types::{CapThreshold, ClientContext, GuardId, SelectionDistribution, StepCostModel};
use serde::Serialize;

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum DefenseCommands {
    /// Selection distribution of a policy for one client
    Distribution {
        #[arg(short, long, default_value = "vanilla")]
        policy: PolicyKind,

        /// Client AS number or `lat,lon`
        #[arg(short, long)]
        client: ClientContext,
    },

    /// Cap a policy's distribution by relay cost
    Redistribute {
        #[arg(short, long, default_value = "vanilla")]
        policy: PolicyKind,

        #[arg(short, long)]
        client: ClientContext,

        /// Cap threshold, overriding `[defense] threshold`
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Score redistributed distributions over a range of thresholds
    Sweep {
        #[arg(short, long, default_value = "vanilla")]
        policy: PolicyKind,

        #[arg(short, long, num_args = 1.., required = true)]
        clients: Vec<ClientContext>,

        #[arg(short, long, num_args = 1.., required = true)]
        thresholds: Vec<f64>,

        #[arg(short, long, value_enum, default_value_t = SweepMetric::Resilience)]
        metric: SweepMetric,
    },
}

/// What a sweep measures for each client
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SweepMetric {
    /// Mass weighted by resilience toward the guard's AS
    Resilience,
    /// Mass on guards reachable without crossing a suspect AS
    Usability,
    /// Expected distance to the chosen guard in km
    Distance,
}

#[derive(Serialize)]
struct DistributionOutput {
    policy: PolicyKind,
    client: ClientContext,
    distribution: SelectionDistribution,
}

#[derive(Serialize)]
struct RedistributionOutput {
    policy: PolicyKind,
    client: ClientContext,
    threshold: f64,
    rounds: usize,
    capped: Vec<GuardId>,
    residual: f64,
    max_ratio_before: f64,
    max_ratio_after: f64,
    distribution: SelectionDistribution,
}

pub fn execute(cmd: DefenseCommands, session: &Session) -> Result<()> {
    match cmd {
        DefenseCommands::Distribution { policy, client } => {
            let output = distribution(session, policy, client)?;
            print_json(&output)?;
        }
        DefenseCommands::Redistribute {
            policy,
            client,
            threshold,
        } => {
            let output = redistribute(session, policy, client, threshold)?;
            eprintln!(
                "{} {} guards capped after {} rounds (max ratio {:.3} -> {:.3})",
                "✓".green(),
                output.capped.len().to_string().bold(),
                output.rounds,
                output.max_ratio_before,
                output.max_ratio_after
            );
            print_json(&output)?;
        }
        DefenseCommands::Sweep {
            policy,
            clients,
            thresholds,
            metric,
        } => {
            let sweeps = sweep(session, policy, &clients, &thresholds, metric)?;
            for s in &sweeps {
                eprintln!(
                    "{} T = {:<6} mean {:.4}",
                    "•".cyan(),
                    s.threshold,
                    s.mean()
                );
            }
            print_json(&sweeps)?;
        }
    }
    Ok(())
}

fn distribution(
    session: &Session,
    kind: PolicyKind,
    client: ClientContext,
) -> Result<DistributionOutput> {
    let policy = session.policy(kind)?;
    let distribution = policy
        .as_model()
        .evaluate(&client, &session.registry.pool())
        .with_context(|| format!("evaluating {} policy for {}", kind, client))?;
    session.finish(&policy)?;
    Ok(DistributionOutput {
        policy: kind,
        client,
        distribution,
    })
}

fn redistribute(
    session: &Session,
    kind: PolicyKind,
    client: ClientContext,
    threshold: Option<f64>,
) -> Result<RedistributionOutput> {
    let mut config = session.config.defense.clone();
    if let Some(t) = threshold {
        config.threshold = CapThreshold::new(t)?;
    }
    let engine = RedistributionEngine::new(config.clone())?;
    let policy = session.policy(kind)?;
    let model = policy.as_model();
    let pool = session.registry.pool();
    let cost = StepCostModel::default();

    let before = initial_ratios(model, &client, &pool, &cost)?
        .into_values()
        .fold(0.0, f64::max);
    let result = engine
        .redistribute(model, &client, &pool, &cost)
        .with_context(|| format!("redistributing {} policy for {}", kind, client))?;
    let after = max_ratio(&result.distribution, &pool, &cost)?;
    session.finish(&policy)?;

    Ok(RedistributionOutput {
        policy: kind,
        client,
        threshold: config.threshold.value(),
        rounds: result.rounds,
        capped: result.capped,
        residual: result.residual,
        max_ratio_before: before,
        max_ratio_after: after,
        distribution: result.distribution,
    })
}

fn sweep(
    session: &Session,
    kind: PolicyKind,
    clients: &[ClientContext],
    thresholds: &[f64],
    metric: SweepMetric,
) -> Result<Vec<ThresholdSweep>> {
    let base: &RedistributionConfig = &session.config.defense;
    let policy = session.policy(kind)?;
    let model = policy.as_model();
    let pool = session.registry.pool();
    let cost = StepCostModel::default();

    let sweeps = match metric {
        SweepMetric::Resilience => {
            let table = session.dataset.resilience_table()?;
            safe_mass_sweep(
                base,
                model,
                clients,
                &pool,
                &cost,
                thresholds,
                resilience_safety(&table),
            )?
        }
        SweepMetric::Usability => {
            let path = session.path_model()?;
            safe_mass_sweep(
                base,
                model,
                clients,
                &pool,
                &cost,
                thresholds,
                usability_safety(&path),
            )?
        }
        SweepMetric::Distance => {
            expected_distance_sweep(base, model, clients, &pool, &cost, thresholds)?
        }
    };
    session.finish(&policy)?;
    Ok(sweeps)
}
