//! Route geometry for map display.
//!
//! A polyline is only ever drawn; it never feeds back into stop ordering.

use serde::{Deserialize, Serialize};

use crate::haversine::haversine_km;

/// Where the geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSource {
    /// Road-following path from a directions service.
    Directions,
    /// Straight segments between stops.
    StraightLine,
}

/// A polyline as decoded (lat, lng) points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
    source: PathSource,
}

impl Polyline {
    pub fn from_directions(points: Vec<(f64, f64)>) -> Self {
        Self {
            points,
            source: PathSource::Directions,
        }
    }

    /// Straight segments joining the given stops in order.
    pub fn straight_line(points: Vec<(f64, f64)>) -> Self {
        Self {
            points,
            source: PathSource::StraightLine,
        }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn source(&self) -> PathSource {
        self.source
    }

    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    /// Great-circle length of the drawn line.
    pub fn length_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum()
    }
}
