//! OSRM HTTP adapter for driving directions.
//!
//! Only used to draw a road-following line for a route. Failures fall back
//! to straight segments and never block planning or collection.

use serde::Deserialize;
use tracing::warn;

use crate::error::DirectionsError;
use crate::polyline::Polyline;
use crate::traits::DirectionsProvider;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmDirections {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmDirections {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, points: &[(f64, f64)]) -> String {
        route_url(&self.config, points)
    }
}

impl DirectionsProvider for OsrmDirections {
    fn driving_path(&self, points: &[(f64, f64)]) -> Result<Polyline, DirectionsError> {
        if points.len() < 2 {
            return Err(DirectionsError::TooFewPoints);
        }

        let body = self
            .client
            .get(self.route_url(points))
            .send()?
            .error_for_status()?
            .json::<OsrmRouteResponse>()?;

        body.into_polyline()
    }
}

/// OSRM expects `lng,lat` pairs separated by `;`.
fn route_url(config: &OsrmConfig, points: &[(f64, f64)]) -> String {
    let coords = points
        .iter()
        .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
        .collect::<Vec<_>>()
        .join(";");

    format!(
        "{}/route/v1/{}/{}?overview=full&geometries=geojson",
        config.base_url.trim_end_matches('/'),
        config.profile,
        coords
    )
}

/// Asks `provider` for a road path through `points`, falling back to a
/// straight line when the lookup fails.
pub fn driving_path_or_straight<P: DirectionsProvider + ?Sized>(
    provider: &P,
    points: &[(f64, f64)],
) -> Polyline {
    match provider.driving_path(points) {
        Ok(path) => path,
        Err(err) => {
            warn!(error = %err, points = points.len(), "directions unavailable, drawing straight line");
            Polyline::straight_line(points.to_vec())
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: GeoJsonLineString,
}

#[derive(Debug, Deserialize)]
struct GeoJsonLineString {
    /// `[lng, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

impl OsrmRouteResponse {
    fn into_polyline(self) -> Result<Polyline, DirectionsError> {
        if self.code != "Ok" {
            return Err(DirectionsError::NoRoute(
                self.message.unwrap_or(self.code),
            ));
        }
        let route = self
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| DirectionsError::NoRoute("empty route list".to_string()))?;

        Ok(Polyline::from_directions(
            route
                .geometry
                .coordinates
                .into_iter()
                .map(|[lng, lat]| (lat, lng))
                .collect(),
        ))
    }
}
