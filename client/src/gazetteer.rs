//! Curated name → coordinate table consulted before any cache or network lookup.
//!
//! The table is configuration data: the built-in California entries cover the
//! locations the record source publishes most often, and deployments may swap
//! in their own JSON file.

use std::collections::HashMap;
use std::path::Path;

use checkpoint_shared::{CheckpointRecord, Coordinate};
use serde::Deserialize;

const CALIFORNIA_CITIES: &[(&str, f64, f64)] = &[
    ("El Centro", 32.792, -115.563),
    ("Glendora", 34.136, -117.865),
    ("Monterey Park", 34.062, -118.123),
    ("Pleasanton", 37.663, -121.875),
    ("Union City", 37.596, -122.019),
    ("Lincoln", 38.891, -121.293),
    ("Oceanside", 33.196, -117.380),
    ("San Jacinto", 33.784, -116.958),
    ("Greenfield", 36.321, -121.244),
    ("Vacaville", 38.357, -121.987),
];

const CALIFORNIA_COUNTIES: &[(&str, f64, f64)] = &[
    ("Imperial", 32.792, -115.563),
    ("L.A", 34.052, -118.243),
    ("LA", 34.052, -118.243),
    ("Alameda", 37.602, -122.061),
    ("Placer County", 38.891, -121.293),
    ("San diego", 32.716, -117.163),
    ("Riverside", 33.980, -117.375),
    ("Monterey", 36.600, -121.894),
    ("Solono", 38.357, -121.987),
    ("Fresno County", 36.746, -119.772),
];

#[derive(Debug, thiserror::Error)]
pub enum GazetteerError {
    #[error("failed to read gazetteer file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse gazetteer JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    cities: HashMap<String, Coordinate>,
    counties: HashMap<String, Coordinate>,
}

#[derive(Deserialize)]
struct GazetteerFile {
    #[serde(default)]
    cities: HashMap<String, [f64; 2]>,
    #[serde(default)]
    counties: HashMap<String, [f64; 2]>,
}

impl Gazetteer {
    pub fn california() -> Self {
        let table = |entries: &[(&str, f64, f64)]| {
            entries
                .iter()
                .map(|&(name, lat, lon)| (name.to_string(), Coordinate::new(lat, lon)))
                .collect()
        };
        Self {
            cities: table(CALIFORNIA_CITIES),
            counties: table(CALIFORNIA_COUNTIES),
        }
    }

    /// Parse `{"cities": {"Name": [lat, lon]}, "counties": {...}}`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, GazetteerError> {
        let file: GazetteerFile = serde_json::from_slice(bytes)?;
        let table = |entries: HashMap<String, [f64; 2]>| {
            entries
                .into_iter()
                .map(|(name, [lat, lon])| (name.trim().to_string(), Coordinate::new(lat, lon)))
                .collect()
        };
        Ok(Self {
            cities: table(file.cities),
            counties: table(file.counties),
        })
    }

    pub fn load(path: &Path) -> Result<Self, GazetteerError> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    pub fn city(&self, name: &str) -> Option<Coordinate> {
        self.cities.get(name.trim()).copied()
    }

    pub fn county(&self, name: &str) -> Option<Coordinate> {
        self.counties.get(name.trim()).copied()
    }

    /// City entry first, then county entry.
    pub fn lookup(&self, record: &CheckpointRecord) -> Option<Coordinate> {
        record
            .city_name()
            .and_then(|city| self.city(city))
            .or_else(|| record.county_name().and_then(|county| self.county(county)))
    }

    pub fn len(&self) -> usize {
        self.cities.len() + self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
