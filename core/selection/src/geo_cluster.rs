// guardsim/core/selection/src/geo_cluster.rs

use crate::error::SelectionError;
use crate::model::{ensure_nonempty, DistributionModel};
use guardsim_types::{ClientContext, Coordinate, Guard, SelectionDistribution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Geo-cluster selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoClusterConfig {
    /// Edge length of a grid cell in degrees
    #[serde(default = "default_cell_edge")]
    pub cell_edge: f64,

    /// Fraction of occupied cells, nearest first, a client may pick from
    #[serde(default = "default_reachable_fraction")]
    pub reachable_fraction: f64,
}

fn default_cell_edge() -> f64 {
    2.0
}

fn default_reachable_fraction() -> f64 {
    0.2
}

impl Default for GeoClusterConfig {
    fn default() -> Self {
        Self {
            cell_edge: default_cell_edge(),
            reachable_fraction: default_reachable_fraction(),
        }
    }
}

impl GeoClusterConfig {
    pub fn validate(&self) -> Result<(), SelectionError> {
        if !self.cell_edge.is_finite() || self.cell_edge <= 0.0 || self.cell_edge > 180.0 {
            return Err(SelectionError::InvalidParameter(format!(
                "cell edge must lie in (0, 180], got {}",
                self.cell_edge
            )));
        }
        if !(self.reachable_fraction > 0.0 && self.reachable_fraction <= 1.0) {
            return Err(SelectionError::InvalidParameter(format!(
                "reachable fraction must lie in (0, 1], got {}",
                self.reachable_fraction
            )));
        }
        Ok(())
    }
}

/// Equal-angle grid over the globe, cells numbered row-major from (-90, -180)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGrid {
    edge: f64,
    rows: usize,
    cols: usize,
}

impl CellGrid {
    pub fn new(edge: f64) -> Self {
        Self {
            edge,
            rows: (180.0 / edge).ceil() as usize,
            cols: (360.0 / edge).ceil() as usize,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn cell_of(&self, c: &Coordinate) -> usize {
        // the north pole and the antimeridian fold into the last row/column
        let row = (((c.lat + 90.0) / self.edge).floor() as usize).min(self.rows - 1);
        let col = (((c.lon + 180.0) / self.edge).floor() as usize).min(self.cols - 1);
        row * self.cols + col
    }

    pub fn center_of(&self, cell: usize) -> Coordinate {
        let row = (cell / self.cols) as f64;
        let col = (cell % self.cols) as f64;
        Coordinate {
            lat: -90.0 + row * self.edge + self.edge / 2.0,
            lon: -180.0 + col * self.edge + self.edge / 2.0,
        }
    }
}

/// Picks a reachable cell uniformly, then a guard within it uniformly
pub struct GeoClusterModel {
    config: GeoClusterConfig,
    grid: CellGrid,
}

impl GeoClusterModel {
    pub fn new(config: GeoClusterConfig) -> Result<Self, SelectionError> {
        config.validate()?;
        let grid = CellGrid::new(config.cell_edge);
        Ok(Self { config, grid })
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Occupied cells mapped to the pool indices they hold
    fn occupied_cells(&self, pool: &[&Guard]) -> BTreeMap<usize, Vec<usize>> {
        let mut cells: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut unplaced = 0usize;
        for (i, guard) in pool.iter().enumerate() {
            match guard.coordinate.as_ref() {
                Some(c) => cells.entry(self.grid.cell_of(c)).or_default().push(i),
                None => unplaced += 1,
            }
        }
        if unplaced > 0 {
            warn!("{} of {} guards have no coordinate, never selected", unplaced, pool.len());
        }
        cells
    }

    /// Reachable cells for `client`, nearest first. Distance ties go to the
    /// lower cell index.
    pub fn reachable_cells(&self, client: &Coordinate, pool: &[&Guard]) -> Vec<usize> {
        self.nearest_cells(client, &self.occupied_cells(pool))
    }

    fn nearest_cells(&self, client: &Coordinate, cells: &BTreeMap<usize, Vec<usize>>) -> Vec<usize> {
        let mut ranked: Vec<(f64, usize)> = cells
            .keys()
            .map(|&cell| (client.great_circle_km(&self.grid.center_of(cell)), cell))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let reach = (ranked.len() as f64 * self.config.reachable_fraction).floor() as usize;
        ranked.truncate(reach);
        ranked.into_iter().map(|(_, cell)| cell).collect()
    }
}

impl DistributionModel for GeoClusterModel {
    fn name(&self) -> &'static str {
        "geo"
    }

    fn evaluate(
        &self,
        client: &ClientContext,
        pool: &[&Guard],
    ) -> Result<SelectionDistribution, SelectionError> {
        ensure_nonempty(pool)?;
        let origin = client
            .coordinate()
            .ok_or_else(|| SelectionError::ClientKindMismatch {
                model: self.name(),
                client: client.to_string(),
            })?;

        let cells = self.occupied_cells(pool);
        let reachable = self.nearest_cells(&origin, &cells);
        if reachable.is_empty() {
            warn!(
                "No reachable cell for {} among {} occupied, using uniform selection",
                client,
                cells.len()
            );
            return Ok(SelectionDistribution::uniform(pool.iter().map(|g| &g.id)));
        }
        debug!("{} of {} cells reachable from {}", reachable.len(), cells.len(), client);

        let mut probabilities = vec![0.0; pool.len()];
        let cell_share = 1.0 / reachable.len() as f64;
        for cell in &reachable {
            let members = match cells.get(cell) {
                Some(members) => members,
                None => continue,
            };
            let share = cell_share / members.len() as f64;
            for &i in members {
                probabilities[i] = share;
            }
        }

        Ok(pool
            .iter()
            .zip(probabilities)
            .map(|(g, p)| (g.id.clone(), p))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::count_warnings;
    use guardsim_types::{AsToken, GuardId};

    fn at(id: &str, lat: f64, lon: f64) -> Guard {
        Guard::natural(id, 1.0).with_coordinate(Coordinate { lat, lon })
    }

    fn client(lat: f64, lon: f64) -> ClientContext {
        ClientContext::Geo(Coordinate { lat, lon })
    }

    #[test]
    fn test_cell_indexing() {
        let grid = CellGrid::new(2.0);
        assert_eq!(grid.cell_count(), 90 * 180);
        assert_eq!(grid.cell_of(&Coordinate { lat: -90.0, lon: -180.0 }), 0);
        assert_eq!(grid.cell_of(&Coordinate { lat: -89.0, lon: -177.0 }), 1);
        assert_eq!(grid.cell_of(&Coordinate { lat: 90.0, lon: 180.0 }), 90 * 180 - 1);

        let center = grid.center_of(grid.cell_of(&Coordinate { lat: 0.5, lon: 0.5 }));
        assert_eq!(center, Coordinate { lat: 1.0, lon: 1.0 });
    }

    #[test]
    fn test_single_cell_without_reach_is_uniform() {
        let model = GeoClusterModel::new(GeoClusterConfig::default()).unwrap();
        let guards = vec![
            at("A", 10.1, 10.1),
            at("B", 10.5, 10.9),
            at("C", 11.0, 11.0),
            at("D", 11.9, 10.2),
        ];
        let pool: Vec<&Guard> = guards.iter().collect();

        let dist = model.evaluate(&client(10.2, 10.2), &pool).unwrap();

        for g in &guards {
            assert!((dist.get(&g.id) - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_nearest_cells_share_probability() {
        let model = GeoClusterModel::new(GeoClusterConfig::default()).unwrap();
        let mut guards = vec![at("A", 1.0, 1.0), at("B", 1.5, 1.5), at("C", 1.0, 3.0)];
        for i in 0..8 {
            guards.push(at(&format!("F{}", i), 1.0, 5.0 + 2.0 * i as f64));
        }
        let pool: Vec<&Guard> = guards.iter().collect();

        let dist = model.evaluate(&client(1.0, 1.0), &pool).unwrap();

        assert!((dist.get(&GuardId::natural("A")) - 0.25).abs() < 1e-12);
        assert!((dist.get(&GuardId::natural("B")) - 0.25).abs() < 1e-12);
        assert!((dist.get(&GuardId::natural("C")) - 0.5).abs() < 1e-12);
        assert_eq!(dist.get(&GuardId::natural("F0")), 0.0);
        assert!(dist.is_normalized(1e-12));
    }

    #[test]
    fn test_guard_without_coordinate_gets_zero() {
        let model = GeoClusterModel::new(GeoClusterConfig {
            reachable_fraction: 1.0,
            ..Default::default()
        })
        .unwrap();
        let guards = vec![at("A", 1.0, 1.0), Guard::natural("B", 50.0)];
        let pool: Vec<&Guard> = guards.iter().collect();

        let (dist, warnings) = count_warnings(|| model.evaluate(&client(0.0, 0.0), &pool).unwrap());

        assert_eq!(warnings, 1);
        assert_eq!(dist.get(&GuardId::natural("A")), 1.0);
        assert_eq!(dist.get(&GuardId::natural("B")), 0.0);
    }

    #[test]
    fn test_as_client_rejected() {
        let model = GeoClusterModel::new(GeoClusterConfig::default()).unwrap();
        let guards = vec![at("A", 1.0, 1.0)];
        let pool: Vec<&Guard> = guards.iter().collect();

        assert!(matches!(
            model.evaluate(&ClientContext::As(AsToken::new("1")), &pool),
            Err(SelectionError::ClientKindMismatch { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(GeoClusterConfig::default().validate().is_ok());
        assert!(GeoClusterConfig { cell_edge: 0.0, ..Default::default() }.validate().is_err());
        assert!(GeoClusterConfig { reachable_fraction: 1.5, ..Default::default() }
            .validate()
            .is_err());
    }
}
