// guardsim/core/selection/src/path_topology.rs

use crate::cache::UsabilityCache;
use crate::error::SelectionError;
use crate::model::{bandwidth_proportional, ensure_nonempty, DistributionModel};
use guardsim_types::{AsToken, ClientContext, Guard, PathOracle, SelectionDistribution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Path-topology-aware selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathTopologyConfig {
    /// ASes a client must not see on the path to its guard
    #[serde(default = "default_suspects")]
    pub suspects: BTreeSet<AsToken>,
}

fn default_suspects() -> BTreeSet<AsToken> {
    ["3356", "1299"].into_iter().map(AsToken::from).collect()
}

impl Default for PathTopologyConfig {
    fn default() -> Self {
        Self {
            suspects: default_suspects(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usability {
    Usable,
    /// A suspect AS sits on the path
    Blocked,
    NoPath,
    NoAs,
}

/// Bandwidth-weighted selection restricted to guards whose inferred
/// client-guard path (both directions) avoids every suspect AS.
pub struct PathTopologyModel {
    config: PathTopologyConfig,
    oracle: Arc<dyn PathOracle>,
    cache: UsabilityCache,
}

impl PathTopologyModel {
    pub fn new(config: PathTopologyConfig, oracle: Arc<dyn PathOracle>) -> Self {
        Self::with_cache(config, oracle, UsabilityCache::new())
    }

    pub fn with_cache(
        config: PathTopologyConfig,
        oracle: Arc<dyn PathOracle>,
        cache: UsabilityCache,
    ) -> Self {
        Self {
            config,
            oracle,
            cache,
        }
    }

    pub fn cache(&self) -> &UsabilityCache {
        &self.cache
    }

    pub fn suspects(&self) -> &BTreeSet<AsToken> {
        &self.config.suspects
    }

    /// Whether a relay in `location` could serve `client`: a path must be
    /// known and contain no suspect.
    pub fn location_usable(&self, client: &AsToken, location: &AsToken) -> Option<bool> {
        let path = self.oracle.bidirectional_path(client, location)?;
        if path.is_empty() {
            return Some(false);
        }
        Some(path.iter().all(|asn| !self.config.suspects.contains(asn)))
    }

    /// Usability of one guard for `client`, consulting the cache first
    pub fn is_usable(&self, client: &AsToken, guard: &Guard) -> bool {
        self.check(client, guard) == Usability::Usable
    }

    fn check(&self, client: &AsToken, guard: &Guard) -> Usability {
        if let Some(usable) = self.cache.lookup(client, guard) {
            return if usable {
                Usability::Usable
            } else {
                Usability::Blocked
            };
        }

        let Some(guard_as) = guard.asn.as_ref() else {
            return Usability::NoAs;
        };

        let verdict = match self.location_usable(client, guard_as) {
            Some(true) => Usability::Usable,
            Some(false) => Usability::Blocked,
            None => {
                debug!("No path inference between {} and {}", client, guard_as);
                Usability::NoPath
            }
        };
        self.cache.store(client, guard, verdict == Usability::Usable);
        verdict
    }

    /// Usability flags in pool order. Guards with no AS or no inferred
    /// path are unusable and reported once per call.
    pub fn usable_guards(&self, client: &AsToken, pool: &[&Guard]) -> Vec<bool> {
        let mut no_as = 0usize;
        let mut no_path = 0usize;
        let flags = pool
            .iter()
            .map(|g| match self.check(client, g) {
                Usability::Usable => true,
                Usability::Blocked => false,
                Usability::NoAs => {
                    no_as += 1;
                    false
                }
                Usability::NoPath => {
                    no_path += 1;
                    false
                }
            })
            .collect();

        if no_as > 0 {
            warn!("{} of {} guards have no AS, treating as unusable", no_as, pool.len());
        }
        if no_path > 0 {
            warn!(
                "{} of {} guards have no inferred path from {}, treating as unusable",
                no_path,
                pool.len(),
                client
            );
        }
        flags
    }

    /// Persist the cache tagged with this model's suspect set
    pub fn persist_cache(&self, path: &Path) -> Result<(), SelectionError> {
        self.cache.persist(path, &self.config.suspects)
    }

    /// Candidate ASes where an added relay would be usable by `client`.
    /// A suspect client can use nothing.
    pub fn usable_locations(&self, client: &AsToken, candidates: &[AsToken]) -> Vec<AsToken> {
        if self.config.suspects.contains(client) {
            return Vec::new();
        }
        candidates
            .iter()
            .filter(|asn| self.location_usable(client, asn) == Some(true))
            .cloned()
            .collect()
    }
}

impl DistributionModel for PathTopologyModel {
    fn name(&self) -> &'static str {
        "path"
    }

    fn evaluate(
        &self,
        client: &ClientContext,
        pool: &[&Guard],
    ) -> Result<SelectionDistribution, SelectionError> {
        ensure_nonempty(pool)?;
        let client_as = client
            .as_token()
            .ok_or_else(|| SelectionError::ClientKindMismatch {
                model: self.name(),
                client: client.to_string(),
            })?;

        let usable = self.usable_guards(client_as, pool);
        let usable_count = usable.iter().filter(|u| **u).count();
        let usable_bandwidth: f64 = pool
            .iter()
            .zip(&usable)
            .filter(|(_, u)| **u)
            .map(|(g, _)| g.bandwidth)
            .sum();

        if usable_count == 0 || usable_bandwidth <= 0.0 {
            warn!(
                "No usable guard bandwidth for {} ({} usable), falling back to bandwidth weighting",
                client_as, usable_count
            );
            return Ok(bandwidth_proportional(pool));
        }

        debug!("{} of {} guards usable for {}", usable_count, pool.len(), client_as);

        Ok(pool
            .iter()
            .zip(&usable)
            .map(|(g, u)| {
                let p = if *u { g.bandwidth / usable_bandwidth } else { 0.0 };
                (g.id.clone(), p)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::count_warnings;
    use guardsim_types::{GuardId, Location, StaticPathOracle};
    use tempfile::TempDir;

    fn asn(s: &str) -> AsToken {
        AsToken::new(s)
    }

    fn fp(c: char) -> String {
        std::iter::repeat(c).take(40).collect()
    }

    fn oracle() -> Arc<StaticPathOracle> {
        let mut oracle = StaticPathOracle::new();
        // client 100 -> AS 1 clean, -> AS 2 through a suspect, -> AS 3 unknown
        oracle.insert(asn("100"), asn("1"), vec![asn("100"), asn("50"), asn("1")]);
        oracle.insert(asn("100"), asn("2"), vec![asn("100"), asn("3356"), asn("2")]);
        oracle.insert(asn("1"), asn("100"), vec![asn("1"), asn("100")]);
        oracle.insert(asn("100"), asn("4"), vec![asn("100"), asn("4")]);
        oracle.insert(asn("4"), asn("100"), vec![asn("4"), asn("1299"), asn("100")]);
        Arc::new(oracle)
    }

    fn guards() -> Vec<Guard> {
        vec![
            Guard::natural(fp('A'), 10.0).with_as("1"),
            Guard::natural(fp('B'), 10.0).with_as("2"),
            Guard::natural(fp('C'), 80.0).with_as("3"),
            Guard::natural(fp('D'), 30.0).with_as("1"),
        ]
    }

    #[test]
    fn test_only_usable_guards_are_selected() {
        let model = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let guards = guards();
        let pool: Vec<&Guard> = guards.iter().collect();

        let dist = model.evaluate(&ClientContext::As(asn("100")), &pool).unwrap();

        assert!((dist.get(&GuardId::natural(fp('A'))) - 0.25).abs() < 1e-12);
        assert!((dist.get(&GuardId::natural(fp('D'))) - 0.75).abs() < 1e-12);
        assert_eq!(dist.get(&GuardId::natural(fp('B'))), 0.0);
        assert_eq!(dist.get(&GuardId::natural(fp('C'))), 0.0);
        assert_eq!(dist.len(), 4);
    }

    #[test]
    fn test_reverse_path_suspect_blocks_usability() {
        let model = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let guard = Guard::natural(fp('E'), 5.0).with_as("4");

        assert!(!model.is_usable(&asn("100"), &guard));
    }

    #[test]
    fn test_no_usable_guard_falls_back_to_full_pool() {
        let model = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let guards = vec![
            Guard::natural(fp('A'), 10.0).with_as("2"),
            Guard::natural(fp('B'), 10.0).with_as("3"),
            Guard::natural(fp('C'), 80.0).with_as("4"),
        ];
        let pool: Vec<&Guard> = guards.iter().collect();

        let dist = model.evaluate(&ClientContext::As(asn("100")), &pool).unwrap();

        assert!((dist.get(&GuardId::natural(fp('A'))) - 0.1).abs() < 1e-12);
        assert!((dist.get(&GuardId::natural(fp('C'))) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_cache_populated_for_natural_guards_only() {
        let model = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let mut guards = guards();
        guards.push(Guard::synthetic(0, 10.0, &Location::As(asn("1"))));
        let pool: Vec<&Guard> = guards.iter().collect();

        model.evaluate(&ClientContext::As(asn("100")), &pool).unwrap();
        assert_eq!(model.cache().len(), 4);

        model.cache().invalidate();
        assert!(model.cache().is_empty());
    }

    #[test]
    fn test_usable_locations() {
        let model = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let candidates = vec![asn("1"), asn("2"), asn("3"), asn("4")];

        assert_eq!(model.usable_locations(&asn("100"), &candidates), vec![asn("1")]);
        assert!(model.usable_locations(&asn("3356"), &candidates).is_empty());
    }

    #[test]
    fn test_geo_client_rejected() {
        let model = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let guards = guards();
        let pool: Vec<&Guard> = guards.iter().collect();
        let client = ClientContext::Geo(guardsim_types::Coordinate { lat: 0.0, lon: 0.0 });

        assert!(matches!(
            model.evaluate(&client, &pool),
            Err(SelectionError::ClientKindMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_path_excludes_guard_with_one_warning() {
        let model = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let guards = vec![
            Guard::natural(fp('A'), 10.0).with_as("1"),
            Guard::natural(fp('C'), 80.0).with_as("3"),
            Guard::natural(fp('F'), 20.0).with_as("5"),
        ];
        let pool: Vec<&Guard> = guards.iter().collect();

        let (dist, warnings) =
            count_warnings(|| model.evaluate(&ClientContext::As(asn("100")), &pool).unwrap());

        assert_eq!(warnings, 1);
        assert_eq!(dist.get(&GuardId::natural(fp('A'))), 1.0);
        assert_eq!(dist.get(&GuardId::natural(fp('C'))), 0.0);
        assert_eq!(dist.get(&GuardId::natural(fp('F'))), 0.0);
    }

    #[test]
    fn test_only_unknown_paths_fall_back_to_bandwidth() {
        let model = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let guards = vec![
            Guard::natural(fp('C'), 80.0).with_as("3"),
            Guard::natural(fp('F'), 20.0).with_as("5"),
        ];
        let pool: Vec<&Guard> = guards.iter().collect();

        let (dist, warnings) =
            count_warnings(|| model.evaluate(&ClientContext::As(asn("100")), &pool).unwrap());

        // one for the unknown paths, one for the fallback
        assert_eq!(warnings, 2);
        assert!((dist.get(&GuardId::natural(fp('C'))) - 0.8).abs() < 1e-12);
        assert!((dist.get(&GuardId::natural(fp('F'))) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_persisted_cache_not_reused_after_suspects_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usability.json");
        let guards = vec![
            Guard::natural(fp('A'), 10.0).with_as("1"),
            Guard::natural(fp('B'), 10.0).with_as("2"),
        ];
        let pool: Vec<&Guard> = guards.iter().collect();
        let client = ClientContext::As(asn("100"));

        let strict = PathTopologyModel::new(PathTopologyConfig::default(), oracle());
        let dist = strict.evaluate(&client, &pool).unwrap();
        assert_eq!(dist.get(&GuardId::natural(fp('B'))), 0.0);
        strict.persist_cache(&path).unwrap();

        let lenient_config = PathTopologyConfig {
            suspects: BTreeSet::new(),
        };
        let cache = UsabilityCache::load(&path, &lenient_config.suspects).unwrap();
        assert!(cache.is_empty());
        let lenient = PathTopologyModel::with_cache(lenient_config, oracle(), cache);
        let dist = lenient.evaluate(&client, &pool).unwrap();
        assert!((dist.get(&GuardId::natural(fp('B'))) - 0.5).abs() < 1e-12);

        let same = UsabilityCache::load(&path, strict.suspects()).unwrap();
        assert_eq!(same.len(), 2);
    }
}
