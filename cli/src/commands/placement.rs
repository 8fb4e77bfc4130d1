// guardsim/cli/src/commands/placement.rs

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use guardsim_placement::{
    ClientProbability, PlacementOutcome, PlacementReport, PlacementSearch, TargetingAdvantage,
};
use guardsim_selection::PolicyKind;
use guardsim_types::ClientContext;
use serde::Serialize;

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum PlacementCommands {
    /// Place attacker relays to maximise the chance targets pick one
    Place {
        #[arg(short, long, default_value = "vanilla")]
        policy: PolicyKind,

        /// Target clients, AS numbers or `lat,lon`
        #[arg(short, long, num_args = 1.., required = true)]
        targets: Vec<ClientContext>,

        /// Total bandwidth split evenly over the relays
        #[arg(short, long)]
        budget: f64,

        #[arg(short, long, default_value_t = 1)]
        relays: usize,
    },

    /// Hardest and easiest target for the best placement
    WorstCase {
        #[arg(short, long, default_value = "vanilla")]
        policy: PolicyKind,

        #[arg(short, long, num_args = 1.., required = true)]
        targets: Vec<ClientContext>,

        #[arg(short, long)]
        budget: f64,

        #[arg(short, long, default_value_t = 1)]
        relays: usize,
    },

    /// Gain from placing relays for one client instead of all targets
    Advantage {
        #[arg(short, long, default_value = "vanilla")]
        policy: PolicyKind,

        #[arg(short, long, num_args = 1.., required = true)]
        targets: Vec<ClientContext>,

        #[arg(short, long)]
        budget: f64,

        #[arg(short, long, default_value_t = 1)]
        relays: usize,
    },
}

#[derive(Serialize)]
struct PlaceOutput {
    policy: PolicyKind,
    outcome: PlacementOutcome,
    report: PlacementReport,
}

#[derive(Serialize)]
struct WorstCaseOutput {
    policy: PolicyKind,
    outcome: PlacementOutcome,
    hardest: ClientProbability,
    easiest: ClientProbability,
}

pub fn execute(cmd: PlacementCommands, session: &Session) -> Result<()> {
    match cmd {
        PlacementCommands::Place {
            policy,
            targets,
            budget,
            relays,
        } => {
            let output = place(session, policy, &targets, budget, relays)?;
            eprintln!(
                "{} placed {} relays, mean probability {:.4}",
                "✓".green(),
                output.outcome.placements.len(),
                output.report.mean
            );
            print_json(&output)?;
        }
        PlacementCommands::WorstCase {
            policy,
            targets,
            budget,
            relays,
        } => {
            let output = worst_case(session, policy, &targets, budget, relays)?;
            eprintln!(
                "{} hardest {} ({:.4}), easiest {} ({:.4})",
                "✓".green(),
                output.hardest.client.to_string().bold(),
                output.hardest.probability,
                output.easiest.client.to_string().bold(),
                output.easiest.probability
            );
            print_json(&output)?;
        }
        PlacementCommands::Advantage {
            policy,
            targets,
            budget,
            relays,
        } => {
            let results = advantage(session, policy, &targets, budget, relays)?;
            for r in &results {
                let ratio = match r.advantage {
                    Some(a) => format!("{:.3}x", a),
                    None => "n/a".yellow().to_string(),
                };
                eprintln!("{} {:<24} {}", "•".cyan(), r.client.to_string(), ratio);
            }
            print_json(&results)?;
        }
    }
    Ok(())
}

fn place(
    session: &Session,
    kind: PolicyKind,
    targets: &[ClientContext],
    budget: f64,
    relays: usize,
) -> Result<PlaceOutput> {
    let policy = session.policy(kind)?;
    let search = PlacementSearch::new(
        policy.as_model(),
        &session.registry,
        session.config.placement.clone(),
    )?;
    let outcome = search.search(targets, &session.dataset.candidates, budget, relays)?;
    let report = search.evaluate_placement(targets, &outcome.locations(), budget)?;
    session.finish(&policy)?;
    Ok(PlaceOutput {
        policy: kind,
        outcome,
        report,
    })
}

fn worst_case(
    session: &Session,
    kind: PolicyKind,
    targets: &[ClientContext],
    budget: f64,
    relays: usize,
) -> Result<WorstCaseOutput> {
    let policy = session.policy(kind)?;
    let search = PlacementSearch::new(
        policy.as_model(),
        &session.registry,
        session.config.placement.clone(),
    )?;
    let outcome = search.search(targets, &session.dataset.candidates, budget, relays)?;
    let locations = outcome.locations();
    let hardest = search.worst_case_client(targets, &locations, budget)?;
    let easiest = search.easiest_client(targets, &locations, budget)?;
    session.finish(&policy)?;
    Ok(WorstCaseOutput {
        policy: kind,
        outcome,
        hardest,
        easiest,
    })
}

fn advantage(
    session: &Session,
    kind: PolicyKind,
    targets: &[ClientContext],
    budget: f64,
    relays: usize,
) -> Result<Vec<TargetingAdvantage>> {
    let policy = session.policy(kind)?;
    let search = PlacementSearch::new(
        policy.as_model(),
        &session.registry,
        session.config.placement.clone(),
    )?;
    let results =
        search.targeting_advantage(targets, &session.dataset.candidates, budget, relays)?;
    session.finish(&policy)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::session;
    use super::*;
    use guardsim_types::{AsToken, Location};
    use tempfile::TempDir;

    fn targets() -> Vec<ClientContext> {
        vec![ClientContext::As(AsToken::new("100"))]
    }

    #[test]
    fn test_path_placement_avoids_suspect_candidate() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let output = place(&session, PolicyKind::Path, &targets(), 100.0, 1).unwrap();

        // AS 1 and AS 3 both give 1/2; the earlier candidate is kept
        assert_eq!(output.outcome.placements[0].location, Location::As(AsToken::new("1")));
        assert!((output.report.mean - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_worst_case_with_single_target() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let output = worst_case(&session, PolicyKind::Vanilla, &targets(), 200.0, 2).unwrap();

        assert_eq!(output.hardest, output.easiest);
        assert!((output.hardest.probability - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_advantage_is_one_for_single_target() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let results = advantage(&session, PolicyKind::Path, &targets(), 100.0, 1).unwrap();

        assert_eq!(results.len(), 1);
        assert!((results[0].advantage.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        assert!(place(&session, PolicyKind::Vanilla, &targets(), 0.0, 1).is_err());
    }
}
