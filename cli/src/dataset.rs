// guardsim/cli/src/dataset.rs

use anyhow::{bail, Context, Result};
use guardsim_types::{
    AsToken, Guard, GuardRegistry, Location, ResilienceMap, ResilienceTable, SnapshotRecord,
    StaticGeoLookup, StaticPathOracle,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use tracing::info;

/// Raw relay snapshot resolved against address tables at load time
#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    pub records: Vec<SnapshotRecord>,
    #[serde(default)]
    pub ip_to_as: HashMap<IpAddr, AsToken>,
    #[serde(default)]
    pub locations: StaticGeoLookup,
}

/// Everything the simulator reads from disk
#[derive(Debug, Default, Deserialize)]
pub struct Dataset {
    /// Guards with their attributes already resolved
    #[serde(default)]
    pub guards: Vec<Guard>,

    #[serde(default)]
    pub snapshot: Option<Snapshot>,

    /// Client AS to guard AS resilience
    #[serde(default)]
    pub resilience: HashMap<AsToken, HashMap<AsToken, f64>>,

    #[serde(default)]
    pub paths: StaticPathOracle,

    /// Locations an attacker may place relays at
    #[serde(default)]
    pub candidates: Vec<Location>,
}

impl Dataset {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading dataset {}", path.display()))?;
        let dataset: Dataset = serde_json::from_str(&content)
            .with_context(|| format!("parsing dataset {}", path.display()))?;
        info!(
            "Loaded dataset {}: {} guards, {} resilience clients, {} paths, {} candidates",
            path.display(),
            dataset.guards.len(),
            dataset.resilience.len(),
            dataset.paths.len(),
            dataset.candidates.len()
        );
        Ok(dataset)
    }

    /// Resolved guards plus any snapshot records
    pub fn registry(&self) -> Result<GuardRegistry> {
        let mut guards = self.guards.clone();
        if let Some(snapshot) = &self.snapshot {
            let resolved =
                GuardRegistry::from_records(&snapshot.records, &snapshot.ip_to_as, &snapshot.locations)
                    .context("resolving snapshot records")?;
            guards.extend(resolved.iter().cloned());
        }
        if guards.is_empty() {
            bail!("dataset contains no guards");
        }
        Ok(GuardRegistry::new(guards)?)
    }

    pub fn resilience_table(&self) -> Result<ResilienceTable> {
        let mut table = ResilienceTable::new();
        for (client, values) in &self.resilience {
            let map = ResilienceMap::new(values.clone())
                .with_context(|| format!("resilience for client {}", client))?;
            table.insert(client.clone(), map);
        }
        Ok(table)
    }
}
