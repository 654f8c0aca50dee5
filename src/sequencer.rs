//! Stop ordering for a single truck.
//!
//! Two modes:
//! - [`optimize_route`]: first-improvement local search over the closed tour
//!   `center -> b1 -> ... -> bn -> center`, run once when a plan is created.
//! - [`nearest_neighbor_order`]: greedy ordering from an arbitrary position,
//!   used to show a driver what is next on a route that is already fixed.

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::haversine::{HaversineMatrix, haversine_km, validate_coordinate};
use crate::traits::{DistanceMatrixProvider, Located};

/// Move applied by the full-route local search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalSearch {
    /// Exchange the bins at positions i and j (j >= i + 2).
    #[default]
    PairwiseSwap,
    /// Reverse the segment [i..=j] (classic 2-opt).
    SegmentReversal,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SequenceOptions {
    pub strategy: LocalSearch,
}

/// A stop produced by nearest-neighbor ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedStop<T> {
    pub item: T,
    /// 1-based position in the ordering.
    pub order: usize,
    pub distance_from_previous_km: f64,
}

/// Length of the closed tour starting and ending at `center`.
pub fn route_distance_km<B: Located>(bins: &[B], center: (f64, f64)) -> f64 {
    if bins.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    let mut previous = center;
    for bin in bins {
        let location = bin.location();
        total += haversine_km(previous, location);
        previous = location;
    }
    total + haversine_km(previous, center)
}

/// Reorders `bins` to shorten the closed tour through `center`.
///
/// Never returns an ordering longer than the input. Sequences of two or
/// fewer bins are returned as given.
pub fn optimize_route<'a, B: Located>(
    bins: &'a [B],
    center: (f64, f64),
    options: &SequenceOptions,
) -> Result<Vec<&'a B>> {
    validate_coordinate(center)?;
    for bin in bins {
        validate_coordinate(bin.location())?;
    }

    if bins.len() <= 2 {
        return Ok(bins.iter().collect());
    }

    // Index 0 is the center; bin k lives at index k + 1.
    let mut locations = Vec::with_capacity(bins.len() + 1);
    locations.push(center);
    locations.extend(bins.iter().map(Located::location));
    let matrix = HaversineMatrix.matrix_for(&locations);

    let mut tour: Vec<usize> = (1..=bins.len()).collect();
    let mut current = tour_length(&tour, &matrix);
    let mut improvements = 0usize;

    while let Some(length) = improve_once(&mut tour, current, &matrix, options.strategy) {
        current = length;
        improvements += 1;
    }

    debug!(
        stops = bins.len(),
        improvements,
        distance_km = current,
        strategy = ?options.strategy,
        "route optimized"
    );

    Ok(tour.into_iter().map(|index| &bins[index - 1]).collect())
}

/// Applies the first improving move found, scanning pairs in order.
/// Returns the new tour length, or `None` when the tour is a local optimum.
fn improve_once(
    tour: &mut [usize],
    current: f64,
    matrix: &[Vec<f64>],
    strategy: LocalSearch,
) -> Option<f64> {
    let n = tour.len();
    for i in 0..n {
        for j in (i + 2)..n {
            apply_move(tour, i, j, strategy);
            let candidate = tour_length(tour, matrix);
            if candidate < current {
                return Some(candidate);
            }
            // Both moves are involutions.
            apply_move(tour, i, j, strategy);
        }
    }
    None
}

fn apply_move(tour: &mut [usize], i: usize, j: usize, strategy: LocalSearch) {
    match strategy {
        LocalSearch::PairwiseSwap => tour.swap(i, j),
        LocalSearch::SegmentReversal => tour[i..=j].reverse(),
    }
}

fn tour_length(tour: &[usize], matrix: &[Vec<f64>]) -> f64 {
    let mut total = 0.0;
    let mut previous = 0;
    for &stop in tour {
        total += matrix[previous][stop];
        previous = stop;
    }
    total + matrix[previous][0]
}

/// Greedy ordering: always drive to the closest bin not yet visited.
///
/// Ties go to the bin that appears first in `bins`.
pub fn nearest_neighbor_order<B: Located>(
    bins: &[B],
    start: (f64, f64),
) -> Result<Vec<SequencedStop<&B>>> {
    validate_coordinate(start)?;
    for bin in bins {
        validate_coordinate(bin.location())?;
    }

    let mut visited = vec![false; bins.len()];
    let mut position = start;
    let mut stops = Vec::with_capacity(bins.len());

    for order in 1..=bins.len() {
        let mut best: Option<(usize, f64)> = None;
        for (index, bin) in bins.iter().enumerate() {
            if visited[index] {
                continue;
            }
            let distance = haversine_km(position, bin.location());
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((index, distance)),
            }
        }

        let Some((index, distance)) = best else {
            break;
        };
        visited[index] = true;
        position = bins[index].location();
        stops.push(SequencedStop {
            item: &bins[index],
            order,
            distance_from_previous_km: distance,
        });
    }

    Ok(stops)
}
