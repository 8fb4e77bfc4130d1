// guardsim/cli/src/config.rs

use anyhow::{Context, Result};
use guardsim_defense::RedistributionConfig;
use guardsim_placement::PlacementConfig;
use guardsim_selection::{GeoClusterConfig, PathTopologyConfig, ResilienceConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Simulator configuration, loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub defense: RedistributionConfig,

    #[serde(default)]
    pub placement: PlacementConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSON dataset with guards, resilience, paths and candidates
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,

    /// Usability cache for the path-topology policy, reused across runs
    #[serde(default)]
    pub usability_cache: Option<PathBuf>,
}

fn default_dataset() -> PathBuf {
    PathBuf::from("dataset.json")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            usability_cache: None,
        }
    }
}

/// Per-policy selection parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub resilience: ResilienceConfig,

    #[serde(default)]
    pub path: PathTopologyConfig,

    #[serde(default)]
    pub geo: GeoClusterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// pretty, json or compact
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SimulatorConfig {
    /// Reject invalid parameters before any dataset is loaded
    pub fn validate(&self) -> Result<()> {
        self.selection
            .resilience
            .validate()
            .context("invalid [selection.resilience]")?;
        self.selection.geo.validate().context("invalid [selection.geo]")?;
        self.defense.validate().context("invalid [defense]")?;
        self.placement.validate().context("invalid [placement]")?;
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SimulatorConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
