//! Geographic partition of bins into one cluster per truck.
//!
//! Plain k-means on raw lat/lng treated as a flat plane, which is fine at
//! city scale. Seeding uses input order, so the result is deterministic for
//! a fixed bin ordering.

use serde::Deserialize;
use tracing::debug;

use crate::error::{PlannerError, Result};
use crate::haversine::{haversine_km, validate_coordinate};
use crate::traits::Located;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// Upper bound on assign/recompute rounds.
    pub max_iterations: usize,
    /// Centroid movement (km) under which the clustering is considered stable.
    pub convergence_threshold_km: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold_km: 0.001,
        }
    }
}

/// Partitions `bins` into `k` clusters.
///
/// Cluster `i` is grown from the `i`-th seed and is conventionally handed to
/// the `i`-th selected truck. Empty clusters are possible when `k` exceeds
/// the number of spatial groups. Bins keep their input order inside each
/// cluster.
pub fn assign_clusters<'a, B: Located>(
    bins: &'a [B],
    k: usize,
    center: (f64, f64),
    options: &ClusterOptions,
) -> Result<Vec<Vec<&'a B>>> {
    if k == 0 {
        return Err(PlannerError::InvalidInput(
            "cannot cluster bins for zero trucks".to_string(),
        ));
    }
    validate_coordinate(center)?;
    if bins.is_empty() {
        return Ok(vec![Vec::new(); k]);
    }

    let locations: Vec<(f64, f64)> = bins.iter().map(Located::location).collect();
    for location in &locations {
        validate_coordinate(*location)?;
    }

    let mut centroids: Vec<(f64, f64)> = (0..k)
        .map(|i| locations.get(i).copied().unwrap_or(locations[0]))
        .collect();
    let mut membership = vec![0usize; locations.len()];

    for iteration in 0..options.max_iterations {
        for (slot, location) in membership.iter_mut().zip(&locations) {
            *slot = nearest_centroid(*location, &centroids);
        }

        let updated = recompute_centroids(&locations, &membership, k, center);
        let max_shift = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| haversine_km(*old, *new))
            .fold(0.0, f64::max);
        centroids = updated;

        debug!(iteration, max_shift_km = max_shift, "k-means round");
        if max_shift <= options.convergence_threshold_km {
            break;
        }
    }

    let mut clusters: Vec<Vec<&B>> = vec![Vec::new(); k];
    for (bin, cluster) in bins.iter().zip(membership) {
        clusters[cluster].push(bin);
    }

    Ok(clusters)
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest_centroid(location: (f64, f64), centroids: &[(f64, f64)]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = haversine_km(location, *centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

fn recompute_centroids(
    locations: &[(f64, f64)],
    membership: &[usize],
    k: usize,
    center: (f64, f64),
) -> Vec<(f64, f64)> {
    let mut sums = vec![(0.0, 0.0); k];
    let mut counts = vec![0usize; k];
    for (location, &cluster) in locations.iter().zip(membership) {
        sums[cluster].0 += location.0;
        sums[cluster].1 += location.1;
        counts[cluster] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .map(|((lat, lng), count)| {
            if count == 0 {
                center
            } else {
                (lat / count as f64, lng / count as f64)
            }
        })
        .collect()
}
