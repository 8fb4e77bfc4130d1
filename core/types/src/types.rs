// guardsim/core/types/src/types.rs

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Length of a hex-encoded relay fingerprint.
pub const FINGERPRINT_LEN: usize = 40;

/// Mean earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

const SYNTHETIC_PREFIX: &str = "synthetic-";

/// Autonomous system token (e.g. "3356")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AsToken(pub String);

impl AsToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AsToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

impl From<&str> for AsToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable guard identifier.
///
/// Natural guards come from a network snapshot and are keyed by their
/// fingerprint. Synthetic guards are injected by an attacker simulation and
/// only carry an ordinal; their location lives on the owning [`Guard`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GuardId {
    Natural(String),
    Synthetic(u32),
}

impl GuardId {
    pub fn natural(fingerprint: impl Into<String>) -> Self {
        GuardId::Natural(fingerprint.into())
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, GuardId::Synthetic(_))
    }

    /// Whether per-guard lookups for this identifier may be reused across
    /// evaluations. Only full-length natural fingerprints qualify.
    pub fn is_cacheable(&self) -> bool {
        match self {
            GuardId::Natural(fp) => fp.len() == FINGERPRINT_LEN,
            GuardId::Synthetic(_) => false,
        }
    }
}

impl fmt::Display for GuardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardId::Natural(fp) => write!(f, "{}", fp),
            GuardId::Synthetic(n) => write!(f, "{}{}", SYNTHETIC_PREFIX, n),
        }
    }
}

impl Serialize for GuardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GuardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Loaded ids are always natural; synthetic guards only come from placement
        Ok(GuardId::Natural(String::deserialize(deserializer)?))
    }
}

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = RegistryError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lon)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, RegistryError> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(RegistryError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Haversine distance in kilometres
    pub fn great_circle_km(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

impl FromStr for Coordinate {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| RegistryError::ParseClient(s.to_string()))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| RegistryError::ParseClient(s.to_string()))?;
        let lon = lon
            .trim()
            .parse::<f64>()
            .map_err(|_| RegistryError::ParseClient(s.to_string()))?;
        Coordinate::new(lat, lon)
    }
}

/// A network location where a guard (or an attacker's relay) can sit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    As(AsToken),
    Geo(Coordinate),
}

impl Location {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Location::Geo(c) => Some(*c),
            Location::As(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::As(asn) => write!(f, "{}", asn),
            Location::Geo(c) => write!(f, "{}", c),
        }
    }
}

/// Entry relay with its selection-relevant attributes.
///
/// Immutable once loaded; attacker relays are separate synthetic guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub id: GuardId,
    /// Consensus bandwidth weight
    pub bandwidth: f64,
    pub asn: Option<AsToken>,
    pub coordinate: Option<Coordinate>,
}

impl Guard {
    pub fn natural(fingerprint: impl Into<String>, bandwidth: f64) -> Self {
        Self {
            id: GuardId::natural(fingerprint),
            bandwidth,
            asn: None,
            coordinate: None,
        }
    }

    /// Synthetic attacker guard placed at `location`
    pub fn synthetic(ordinal: u32, bandwidth: f64, location: &Location) -> Self {
        let (asn, coordinate) = match location {
            Location::As(asn) => (Some(asn.clone()), None),
            Location::Geo(c) => (None, Some(*c)),
        };
        Self {
            id: GuardId::Synthetic(ordinal),
            bandwidth,
            asn,
            coordinate,
        }
    }

    pub fn with_as(mut self, asn: impl Into<AsToken>) -> Self {
        self.asn = Some(asn.into());
        self
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn is_synthetic(&self) -> bool {
        self.id.is_synthetic()
    }
}

/// The client on whose behalf a selection policy is evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientContext {
    As(AsToken),
    Geo(Coordinate),
}

impl ClientContext {
    pub fn as_token(&self) -> Option<&AsToken> {
        match self {
            ClientContext::As(asn) => Some(asn),
            ClientContext::Geo(_) => None,
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            ClientContext::Geo(c) => Some(*c),
            ClientContext::As(_) => None,
        }
    }
}

impl fmt::Display for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientContext::As(asn) => write!(f, "{}", asn),
            ClientContext::Geo(c) => write!(f, "{}", c),
        }
    }
}

impl FromStr for ClientContext {
    type Err = RegistryError;

    /// `lat,lon` parses as a coordinate, anything else as an AS token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RegistryError::ParseClient(s.to_string()));
        }
        if s.contains(',') {
            return Ok(ClientContext::Geo(s.parse()?));
        }
        let token = s.strip_prefix("AS").unwrap_or(s);
        Ok(ClientContext::As(AsToken::new(token)))
    }
}

/// Guard identifier to selection probability.
///
/// Ordered by identifier so sums and iteration are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SelectionDistribution {
    probabilities: BTreeMap<GuardId, f64>,
}

impl SelectionDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform distribution over the given identifiers
    pub fn uniform<'a>(ids: impl IntoIterator<Item = &'a GuardId>) -> Self {
        let ids: Vec<&GuardId> = ids.into_iter().collect();
        let mut dist = Self::new();
        if ids.is_empty() {
            return dist;
        }
        let p = 1.0 / ids.len() as f64;
        for id in ids {
            dist.insert(id.clone(), p);
        }
        dist
    }

    pub fn insert(&mut self, id: GuardId, probability: f64) {
        self.probabilities.insert(id, probability);
    }

    /// Probability of `id`, zero when absent
    pub fn get(&self, id: &GuardId) -> f64 {
        self.probabilities.get(id).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, id: &GuardId) -> bool {
        self.probabilities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GuardId, f64)> {
        self.probabilities.iter().map(|(id, p)| (id, *p))
    }

    pub fn total(&self) -> f64 {
        self.probabilities.values().sum()
    }

    pub fn is_normalized(&self, tolerance: f64) -> bool {
        (self.total() - 1.0).abs() <= tolerance
    }

    pub fn mass_where(&self, mut predicate: impl FnMut(&GuardId) -> bool) -> f64 {
        self.probabilities
            .iter()
            .filter(|(id, _)| predicate(id))
            .map(|(_, p)| *p)
            .sum()
    }

    /// Combined probability of all synthetic (attacker) guards
    pub fn synthetic_mass(&self) -> f64 {
        self.mass_where(GuardId::is_synthetic)
    }

    /// `identifier probability` lines, one per guard
    pub fn to_text(&self) -> String {
        self.probabilities
            .iter()
            .map(|(id, p)| format!("{} {}\n", id, p))
            .collect()
    }
}

impl FromIterator<(GuardId, f64)> for SelectionDistribution {
    fn from_iter<T: IntoIterator<Item = (GuardId, f64)>>(iter: T) -> Self {
        Self {
            probabilities: iter.into_iter().collect(),
        }
    }
}

/// Unrandomized resilience of each AS as seen from one client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResilienceMap {
    values: HashMap<AsToken, f64>,
}

impl ResilienceMap {
    pub fn new(values: HashMap<AsToken, f64>) -> Result<Self, RegistryError> {
        for (asn, value) in &values {
            if !(0.0..=1.0).contains(value) {
                return Err(RegistryError::InvalidResilience {
                    asn: asn.clone(),
                    value: *value,
                });
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, asn: &AsToken) -> Option<f64> {
        self.values.get(asn).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ases(&self) -> impl Iterator<Item = &AsToken> {
        self.values.keys()
    }
}

/// Resilience maps keyed by client AS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResilienceTable {
    clients: HashMap<AsToken, ResilienceMap>,
}

impl ResilienceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, client: AsToken, map: ResilienceMap) {
        self.clients.insert(client, map);
    }

    pub fn for_client(&self, client: &AsToken) -> Option<&ResilienceMap> {
        self.clients.get(client)
    }

    /// Re-check every map after deserialization
    pub fn validate(&self) -> Result<(), RegistryError> {
        for map in self.clients.values() {
            ResilienceMap::new(map.values.clone())?;
        }
        Ok(())
    }
}

/// Ceiling on selection probability divided by fractional network cost.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CapThreshold(f64);

impl CapThreshold {
    pub fn new(value: f64) -> Result<Self, RegistryError> {
        if !value.is_finite() || value < 1.0 {
            return Err(RegistryError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for CapThreshold {
    fn default() -> Self {
        Self(2.0)
    }
}

impl TryFrom<f64> for CapThreshold {
    type Error = RegistryError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        CapThreshold::new(value)
    }
}

impl From<CapThreshold> for f64 {
    fn from(t: CapThreshold) -> f64 {
        t.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_id_display_and_json() {
        let natural = GuardId::natural("A".repeat(40));
        let synthetic = GuardId::Synthetic(3);

        assert_eq!(natural.to_string(), "A".repeat(40));
        assert_eq!(synthetic.to_string(), "synthetic-3");

        let json = serde_json::to_string(&natural).unwrap();
        assert_eq!(serde_json::from_str::<GuardId>(&json).unwrap(), natural);
    }

    #[test]
    fn test_loaded_id_spelled_like_synthetic_stays_natural() {
        let guard: Guard =
            serde_json::from_str(r#"{"id": "synthetic-0", "bandwidth": 10.0}"#).unwrap();

        assert_eq!(guard.id, GuardId::natural("synthetic-0"));
        assert!(!guard.id.is_synthetic());
        assert_ne!(guard.id, GuardId::Synthetic(0));
    }

    #[test]
    fn test_guard_id_cacheability() {
        assert!(GuardId::natural("F".repeat(40)).is_cacheable());
        assert!(!GuardId::natural("short").is_cacheable());
        assert!(!GuardId::Synthetic(0).is_cacheable());
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(45.0, 90.0).is_ok());
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.1).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_coordinate_range_checked_on_load() {
        let ok: Coordinate = serde_json::from_str(r#"{"lat": 52.5, "lon": 13.4}"#).unwrap();
        assert_eq!(ok, Coordinate { lat: 52.5, lon: 13.4 });

        assert!(serde_json::from_str::<Coordinate>(r#"{"lat": 95.0, "lon": 0.0}"#).is_err());
        assert!(serde_json::from_str::<Guard>(
            r#"{"id": "A", "bandwidth": 1.0, "coordinate": {"lat": 0.0, "lon": 181.0}}"#
        )
        .is_err());
        assert!(serde_json::from_str::<Location>(r#"{"geo": {"lat": -91.0, "lon": 0.0}}"#).is_err());
    }

    #[test]
    fn test_great_circle_distance() {
        let a = Coordinate::new(0.0, 0.0).unwrap();
        let b = Coordinate::new(0.0, 1.0).unwrap();
        let d = a.great_circle_km(&b);
        // one degree of longitude on the equator
        assert!((d - 111.195).abs() < 0.1, "got {}", d);
        assert_eq!(a.great_circle_km(&a), 0.0);

        let north = Coordinate::new(90.0, 0.0).unwrap();
        let south = Coordinate::new(-90.0, 0.0).unwrap();
        let half = north.great_circle_km(&south);
        assert!((half - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_client_context_parsing() {
        assert_eq!(
            "AS3356".parse::<ClientContext>().unwrap(),
            ClientContext::As(AsToken::new("3356"))
        );
        assert_eq!(
            "1299".parse::<ClientContext>().unwrap(),
            ClientContext::As(AsToken::new("1299"))
        );
        let geo: ClientContext = "40.5, -74.0".parse().unwrap();
        assert_eq!(geo.coordinate(), Some(Coordinate { lat: 40.5, lon: -74.0 }));
        assert!("91,0".parse::<ClientContext>().is_err());
        assert!("".parse::<ClientContext>().is_err());
    }

    #[test]
    fn test_distribution_helpers() {
        let ids = vec![GuardId::natural("a"), GuardId::natural("b"), GuardId::Synthetic(0)];
        let dist = SelectionDistribution::uniform(&ids);

        assert_eq!(dist.len(), 3);
        assert!(dist.is_normalized(1e-12));
        assert!((dist.synthetic_mass() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(dist.get(&GuardId::natural("missing")), 0.0);
        assert!(dist.to_text().contains("synthetic-0"));
    }

    #[test]
    fn test_distribution_json_uses_string_keys() {
        let dist: SelectionDistribution = vec![
            (GuardId::natural("abc"), 0.25),
            (GuardId::Synthetic(1), 0.75),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&dist).unwrap();
        assert_eq!(json, r#"{"abc":0.25,"synthetic-1":0.75}"#);
    }

    #[test]
    fn test_cap_threshold_rejects_below_one() {
        assert!(CapThreshold::new(1.0).is_ok());
        assert_eq!(
            CapThreshold::new(0.5),
            Err(RegistryError::InvalidThreshold(0.5))
        );
        assert!(CapThreshold::new(f64::INFINITY).is_err());
        assert!(serde_json::from_str::<CapThreshold>("0.9").is_err());
    }

    #[test]
    fn test_resilience_map_bounds() {
        let mut values = HashMap::new();
        values.insert(AsToken::new("1"), 0.4);
        assert!(ResilienceMap::new(values.clone()).is_ok());

        values.insert(AsToken::new("2"), 1.2);
        assert!(ResilienceMap::new(values).is_err());
    }
}
