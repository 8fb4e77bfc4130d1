// guardsim/core/types/src/registry.rs

use crate::error::RegistryError;
use crate::interfaces::GeoLookup;
use crate::types::{AsToken, Guard, GuardId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{info, warn};

/// One relay as exported from a network snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub fingerprint: String,
    pub address: IpAddr,
    pub bandwidth: f64,
}

/// Immutable guard table: an arena of guards plus an index by identifier.
#[derive(Debug, Clone, Default)]
pub struct GuardRegistry {
    guards: Vec<Guard>,
    index: HashMap<GuardId, usize>,
}

impl GuardRegistry {
    pub fn new(guards: Vec<Guard>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(guards.len());
        for (slot, guard) in guards.iter().enumerate() {
            validate_guard(guard)?;
            if index.insert(guard.id.clone(), slot).is_some() {
                return Err(RegistryError::DuplicateGuard(guard.id.clone()));
            }
        }
        Ok(Self { guards, index })
    }

    /// Build from snapshot records, resolving each address to an AS and a
    /// coordinate. Unresolvable attributes are left empty.
    pub fn from_records(
        records: &[SnapshotRecord],
        ip_to_as: &HashMap<IpAddr, AsToken>,
        geo: &dyn GeoLookup,
    ) -> Result<Self, RegistryError> {
        let mut guards = Vec::with_capacity(records.len());
        let mut missing_as = 0usize;
        let mut missing_coord = 0usize;

        for record in records {
            let mut guard = Guard::natural(record.fingerprint.clone(), record.bandwidth);

            match ip_to_as.get(&record.address) {
                Some(asn) => guard.asn = Some(asn.clone()),
                None => {
                    warn!(
                        "No AS mapping for guard {} at {}",
                        record.fingerprint, record.address
                    );
                    missing_as += 1;
                }
            }

            match geo.coordinate_of(&record.address) {
                Some(coord) => guard.coordinate = Some(coord),
                None => missing_coord += 1,
            }

            guards.push(guard);
        }

        if missing_coord > 0 {
            warn!("{} guards have no geolocation", missing_coord);
        }
        info!(
            "Loaded {} guards ({} without AS, {} without coordinate)",
            guards.len(),
            missing_as,
            missing_coord
        );

        Self::new(guards)
    }

    pub fn get(&self, id: &GuardId) -> Option<&Guard> {
        self.index.get(id).map(|&slot| &self.guards[slot])
    }

    pub fn contains(&self, id: &GuardId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Guard> {
        self.guards.iter()
    }

    /// All guards as a borrowed pool, in load order
    pub fn pool(&self) -> Vec<&Guard> {
        self.guards.iter().collect()
    }

    pub fn total_bandwidth(&self) -> f64 {
        self.guards.iter().map(|g| g.bandwidth).sum()
    }
}

/// Base registry plus synthetic additions.
///
/// Lets a search try many placements without copying the base table.
#[derive(Debug, Clone)]
pub struct RegistryOverlay<'a> {
    base: &'a GuardRegistry,
    additions: Vec<Guard>,
}

impl<'a> RegistryOverlay<'a> {
    pub fn new(base: &'a GuardRegistry) -> Self {
        Self {
            base,
            additions: Vec::new(),
        }
    }

    /// Permanently add a guard to this overlay
    pub fn commit(&mut self, guard: Guard) -> Result<(), RegistryError> {
        validate_guard(&guard)?;
        if self.contains(&guard.id) {
            return Err(RegistryError::DuplicateGuard(guard.id));
        }
        self.additions.push(guard);
        Ok(())
    }

    pub fn contains(&self, id: &GuardId) -> bool {
        self.base.contains(id) || self.additions.iter().any(|g| &g.id == id)
    }

    pub fn additions(&self) -> &[Guard] {
        &self.additions
    }

    pub fn len(&self) -> usize {
        self.base.len() + self.additions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pool(&self) -> Vec<&Guard> {
        self.base.iter().chain(self.additions.iter()).collect()
    }

    /// Pool as it would look with `trial` inserted, without committing it
    pub fn pool_with<'b>(&'b self, trial: &'b Guard) -> Vec<&'b Guard> {
        let mut pool = Vec::with_capacity(self.len() + 1);
        pool.extend(self.base.iter());
        pool.extend(self.additions.iter());
        pool.push(trial);
        pool
    }
}

fn validate_guard(guard: &Guard) -> Result<(), RegistryError> {
    if !guard.bandwidth.is_finite() || guard.bandwidth < 0.0 {
        return Err(RegistryError::InvalidBandwidth {
            id: guard.id.clone(),
            value: guard.bandwidth,
        });
    }
    Ok(())
}
