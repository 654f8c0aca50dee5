//! Collection points in Johor Bahru's north-west suburbs.
//!
//! Coordinates are approximate street positions; the depot sits in
//! Taman Universiti.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub area: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, area: &'static str, lat: f64, lng: f64) -> Self {
        Self {
            name,
            area,
            lat,
            lng,
        }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

pub const DEPOT: Location = Location::new("Collection Centre", "Taman Universiti", 1.5341, 103.6217);

// ============================================================================
// Taman Universiti
// ============================================================================

pub const TAMAN_UNIVERSITI: &[Location] = &[
    Location::new("Bin A - Central Taman U", "Taman Universiti", 1.5341, 103.6217),
    Location::new("Bin B - Near Taman U Mart", "Taman Universiti", 1.5352, 103.6245),
    Location::new("Bin C - Near McDonald's Taman U", "Taman Universiti", 1.5320, 103.6190),
    Location::new("Bin D - Jalan Pendidikan", "Taman Universiti", 1.5360, 103.6222),
    Location::new("Bin E - Jalan Kebudayaan", "Taman Universiti", 1.5375, 103.6260),
    Location::new("Bin F - Jalan Ilmu", "Taman Universiti", 1.5331, 103.6238),
];

// ============================================================================
// Skudai
// ============================================================================

pub const SKUDAI: &[Location] = &[
    Location::new("Bin G - Jalan Hang Tuah", "Skudai", 1.5120, 103.6600),
    Location::new("Bin H - Taman Sri Skudai", "Skudai", 1.5098, 103.6632),
    Location::new("Bin I - Jalan Lembah", "Skudai", 1.5141, 103.6578),
    Location::new("Bin J - Skudai Parade", "Skudai", 1.5085, 103.6655),
    Location::new("Bin K - Jalan Persiaran", "Skudai", 1.5152, 103.6619),
    Location::new("Bin L - Taman Ungku Tun Aminah", "Skudai", 1.5107, 103.6590),
];
