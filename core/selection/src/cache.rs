// guardsim/core/selection/src/cache.rs

use crate::error::SelectionError;
use guardsim_types::{AsToken, Guard, GuardId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// Cached usability verdict for one (client, guard) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsabilityEntry {
    /// AS the guard was located in when the verdict was computed
    pub guard_as: AsToken,
    pub usable: bool,
}

type ClientTable = HashMap<AsToken, HashMap<String, UsabilityEntry>>;

/// On-disk form: verdicts plus the suspect set they were computed against
#[derive(Serialize, Deserialize)]
struct PersistedCache {
    suspects: BTreeSet<AsToken>,
    entries: ClientTable,
}

/// Client-to-guard usability cache.
///
/// Only natural guards with full fingerprints are stored, and an entry is
/// served only while the guard still sits in the AS it was computed for.
#[derive(Debug, Default)]
pub struct UsabilityCache {
    entries: RwLock<ClientTable>,
}

impl UsabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, client: &AsToken, guard: &Guard) -> Option<bool> {
        let fingerprint = cache_key(guard)?;
        let guard_as = guard.asn.as_ref()?;
        let entries = self.entries.read();
        entries
            .get(client)
            .and_then(|guards| guards.get(fingerprint))
            .filter(|entry| &entry.guard_as == guard_as)
            .map(|entry| entry.usable)
    }

    pub fn store(&self, client: &AsToken, guard: &Guard, usable: bool) {
        let (Some(fingerprint), Some(guard_as)) = (cache_key(guard), guard.asn.as_ref()) else {
            return;
        };
        self.entries
            .write()
            .entry(client.clone())
            .or_default()
            .insert(
                fingerprint.to_string(),
                UsabilityEntry {
                    guard_as: guard_as.clone(),
                    usable,
                },
            );
    }

    /// Drop every cached verdict
    pub fn invalidate(&self) {
        self.entries.write().clear();
    }

    pub fn invalidate_client(&self, client: &AsToken) {
        self.entries.write().remove(client);
    }

    /// Number of cached (client, guard) pairs
    pub fn len(&self) -> usize {
        self.entries.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load verdicts persisted for `suspects`. A file written for a
    /// different suspect set yields an empty cache.
    pub fn load(path: &Path, suspects: &BTreeSet<AsToken>) -> Result<Self, SelectionError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SelectionError::Cache(format!("{}: {}", path.display(), e)))?;
        let persisted: PersistedCache =
            serde_json::from_str(&content).map_err(|e| SelectionError::Cache(e.to_string()))?;

        if &persisted.suspects != suspects {
            warn!(
                "Usability cache {} was computed for suspects {:?}, discarding it",
                path.display(),
                persisted.suspects
            );
            return Ok(Self::new());
        }

        let cache = Self {
            entries: RwLock::new(persisted.entries),
        };
        info!("Loaded {} usability entries from {}", cache.len(), path.display());
        Ok(cache)
    }

    pub fn persist(&self, path: &Path, suspects: &BTreeSet<AsToken>) -> Result<(), SelectionError> {
        let persisted = PersistedCache {
            suspects: suspects.clone(),
            entries: self.entries.read().clone(),
        };
        let content =
            serde_json::to_string(&persisted).map_err(|e| SelectionError::Cache(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| SelectionError::Cache(format!("{}: {}", path.display(), e)))?;
        info!("Persisted {} usability entries to {}", self.len(), path.display());
        Ok(())
    }
}

fn cache_key(guard: &Guard) -> Option<&str> {
    match &guard.id {
        GuardId::Natural(fp) if guard.id.is_cacheable() => Some(fp.as_str()),
        _ => None,
    }
}
