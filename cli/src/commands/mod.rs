// guardsim/cli/src/commands/mod.rs

pub mod defense;
pub mod placement;

use crate::config::SimulatorConfig;
use crate::dataset::Dataset;
use anyhow::{Context, Result};
use guardsim_selection::{
    DistributionModel, GeoClusterModel, PathTopologyModel, PolicyKind, ResilienceWeightedModel,
    UsabilityCache, VanillaModel,
};
use guardsim_types::GuardRegistry;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Loaded configuration, dataset and guard registry shared by every command
pub struct Session {
    pub config: SimulatorConfig,
    pub dataset: Dataset,
    pub registry: GuardRegistry,
}

impl Session {
    pub fn open(config: SimulatorConfig, dataset_override: Option<PathBuf>) -> Result<Self> {
        let path = dataset_override.unwrap_or_else(|| config.data.dataset.clone());
        let dataset = Dataset::from_file(&path)?;
        let registry = dataset.registry()?;
        Ok(Self {
            config,
            dataset,
            registry,
        })
    }

    pub fn policy(&self, kind: PolicyKind) -> Result<PolicyModel> {
        let selection = &self.config.selection;
        let model = match kind {
            PolicyKind::Vanilla => PolicyModel::Vanilla(VanillaModel),
            PolicyKind::Resilience => {
                let table = self.dataset.resilience_table()?;
                PolicyModel::Resilience(ResilienceWeightedModel::new(
                    selection.resilience.clone(),
                    Arc::new(table),
                )?)
            }
            PolicyKind::Path => PolicyModel::Path(self.path_model()?),
            PolicyKind::Geo => PolicyModel::Geo(GeoClusterModel::new(selection.geo.clone())?),
        };
        info!("Using {} policy over {} guards", kind, self.registry.len());
        Ok(model)
    }

    /// Path-topology model backed by the configured usability cache
    pub fn path_model(&self) -> Result<PathTopologyModel> {
        let suspects = &self.config.selection.path.suspects;
        let cache = match &self.config.data.usability_cache {
            Some(path) if path.exists() => UsabilityCache::load(path, suspects)
                .with_context(|| format!("loading usability cache {}", path.display()))?,
            Some(path) => {
                warn!("Usability cache {} not found, starting empty", path.display());
                UsabilityCache::new()
            }
            None => UsabilityCache::new(),
        };
        Ok(PathTopologyModel::with_cache(
            self.config.selection.path.clone(),
            Arc::new(self.dataset.paths.clone()),
            cache,
        ))
    }

    /// Write back the usability cache when the path policy filled it
    pub fn finish(&self, policy: &PolicyModel) -> Result<()> {
        if let (PolicyModel::Path(model), Some(path)) = (policy, &self.config.data.usability_cache) {
            model
                .persist_cache(path)
                .with_context(|| format!("saving usability cache {}", path.display()))?;
        }
        Ok(())
    }
}

/// A selection policy built from configuration and dataset
pub enum PolicyModel {
    Vanilla(VanillaModel),
    Resilience(ResilienceWeightedModel),
    Path(PathTopologyModel),
    Geo(GeoClusterModel),
}

impl PolicyModel {
    pub fn as_model(&self) -> &dyn DistributionModel {
        match self {
            PolicyModel::Vanilla(m) => m,
            PolicyModel::Resilience(m) => m,
            PolicyModel::Path(m) => m,
            PolicyModel::Geo(m) => m,
        }
    }
}

/// Results go to stdout as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
