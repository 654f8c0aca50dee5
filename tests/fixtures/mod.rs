//! Test fixtures for bin-route-planner.
//!
//! Provides:
//! - Collection points around Taman Universiti and Skudai, Johor
//! - Builders for bins, trucks and a seeded in-memory store
//! - A store wrapper that fails route completions on demand

pub mod failing_store;
pub mod johor_locations;

pub use failing_store::FailingCompletionStore;
pub use johor_locations::*;

use bin_route_planner::memory_store::InMemoryStore;
use bin_route_planner::model::{Bin, BinId, Truck, TruckId};
use jiff::civil::Date;

pub fn service_date() -> Date {
    jiff::civil::date(2026, 3, 14)
}

pub fn bin_at(id: i64, location: &Location) -> Bin {
    Bin {
        id: BinId(id),
        label: location.name.to_string(),
        plate: format!("BIN{:04}", id),
        location: location.coords(),
        status_id: Some(1),
        customer_id: None,
        area: Some(location.area.to_string()),
    }
}

pub fn truck(id: i64, plate: &str) -> Truck {
    Truck {
        id: TruckId(id),
        plate_no: plate.to_string(),
        driver_id: None,
        active: true,
        location: None,
    }
}

/// Bins alternating between Taman Universiti and Skudai, so the first two
/// k-means seeds land in different neighbourhoods.
pub fn interleaved_bins(count: usize) -> Vec<Bin> {
    let mut bins = Vec::with_capacity(count);
    for i in 0..count {
        let pool = if i % 2 == 0 { TAMAN_UNIVERSITI } else { SKUDAI };
        let location = &pool[(i / 2) % pool.len()];
        bins.push(bin_at(i as i64 + 1, location));
    }
    bins
}

pub fn store_with(bins: Vec<Bin>, truck_count: i64) -> InMemoryStore {
    let trucks = (1..=truck_count)
        .map(|id| truck(id, &format!("JTA {}", 1000 + id)))
        .collect();
    InMemoryStore::new(bins, trucks)
}
