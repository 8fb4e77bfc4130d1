// guardsim/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod dataset;
mod logging;

use commands::{defense, placement, Session};
use config::SimulatorConfig;
use logging::LogConfig;

#[derive(Parser)]
#[command(
    name = "guardsim",
    version,
    about = "Guard-selection simulator: location-aware policies, cost-capped redistribution and attacker placement",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(long, global = true, env = "GUARDSIM_CONFIG")]
    config: Option<PathBuf>,

    /// Dataset path, overriding `[data] dataset`
    #[arg(long, global = true, env = "GUARDSIM_DATASET")]
    dataset: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Defense(defense::DefenseCommands),

    #[command(flatten)]
    Placement(placement::PlacementCommands),

    /// Write a default configuration file
    Init {
        #[arg(default_value = "guardsim.toml")]
        path: PathBuf,

        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SimulatorConfig::from_file(path)?,
        None => SimulatorConfig::default(),
    };
    config.validate()?;

    let mut log_config =
        LogConfig::from_names(&config.logging.level, &config.logging.format).with_env();
    if cli.verbose {
        log_config = log_config.verbose();
    }
    logging::init_logging(&log_config)?;

    match cli.command {
        Commands::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists, use --force to overwrite", path.display());
            }
            config
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        Commands::Defense(cmd) => {
            let session = Session::open(config, cli.dataset)?;
            defense::execute(cmd, &session)?;
        }
        Commands::Placement(cmd) => {
            let session = Session::open(config, cli.dataset)?;
            placement::execute(cmd, &session)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_place_arguments() {
        let cli = Cli::try_parse_from([
            "guardsim", "place", "--policy", "geo", "--targets", "52.5,13.4", "48.8,2.3",
            "--budget", "5000", "--relays", "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Placement(placement::PlacementCommands::Place {
                targets, relays, ..
            }) => {
                assert_eq!(targets.len(), 2);
                assert_eq!(relays, 3);
            }
            _ => panic!("expected place"),
        }
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = Cli::try_parse_from([
            "guardsim", "distribution", "--policy", "random", "--client", "100",
        ]);
        assert!(result.is_err());
    }
}
