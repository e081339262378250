//! Geo-indexing extension.
//!
//! Located entities carry a precision-9 geohash plus their coordinates in the
//! stored record. A proximity query first keeps rows whose geohash falls in
//! the center cell or one of its eight neighbours, then checks the exact
//! great-circle distance.

use serde::{Deserialize, Serialize};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision written to stored records.
pub const STORED_PRECISION: usize = 9;

/// Approximate cell width in km for geohash precision 1 through 9.
const CELL_WIDTH_KM: [f64; 9] = [5000.0, 1250.0, 156.0, 39.1, 4.89, 1.22, 0.153, 0.0382, 0.00477];

const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

// ============================================================================
// Geohash
// ============================================================================

/// Encode a point as a base32 geohash of `precision` characters.
pub fn encode(point: GeoPoint, precision: usize) -> String {
    let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
    let (mut lon_lo, mut lon_hi) = (-180.0_f64, 180.0_f64);
    let latitude = point.latitude.clamp(-90.0, 90.0);
    let longitude = point.longitude.clamp(-180.0, 180.0);

    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bits = 0u8;
    let mut bit_count = 0;

    while hash.len() < precision {
        if even {
            let mid = (lon_lo + lon_hi) / 2.0;
            if longitude >= mid {
                bits = (bits << 1) | 1;
                lon_lo = mid;
            } else {
                bits <<= 1;
                lon_hi = mid;
            }
        } else {
            let mid = (lat_lo + lat_hi) / 2.0;
            if latitude >= mid {
                bits = (bits << 1) | 1;
                lat_lo = mid;
            } else {
                bits <<= 1;
                lat_hi = mid;
            }
        }
        even = !even;
        bit_count += 1;
        if bit_count == 5 {
            hash.push(BASE32[bits as usize] as char);
            bits = 0;
            bit_count = 0;
        }
    }
    hash
}

/// Cell size in degrees `(latitude, longitude)` at `precision`.
fn cell_size(precision: usize) -> (f64, f64) {
    let total_bits = precision * 5;
    let lon_bits = total_bits.div_ceil(2);
    let lat_bits = total_bits / 2;
    (
        180.0 / f64::powi(2.0, lat_bits as i32),
        360.0 / f64::powi(2.0, lon_bits as i32),
    )
}

/// Longest precision whose cells are at least `radius_km` wide.
pub fn precision_for_radius(radius_km: f64) -> usize {
    CELL_WIDTH_KM
        .iter()
        .take_while(|width| **width >= radius_km)
        .count()
        .max(1)
}

/// The center cell and its neighbours covering `radius_km` around `center`.
pub fn search_cells(center: GeoPoint, radius_km: f64) -> Vec<String> {
    let precision = precision_for_radius(radius_km);
    let (dlat, dlon) = cell_size(precision);
    let mut cells = Vec::with_capacity(9);
    for dy in [-1.0, 0.0, 1.0] {
        for dx in [-1.0, 0.0, 1.0] {
            let latitude = (center.latitude + dy * dlat).clamp(-90.0, 90.0);
            let mut longitude = center.longitude + dx * dlon;
            if longitude > 180.0 {
                longitude -= 360.0;
            } else if longitude < -180.0 {
                longitude += 360.0;
            }
            let cell = encode(GeoPoint::new(latitude, longitude), precision);
            if !cells.contains(&cell) {
                cells.push(cell);
            }
        }
    }
    cells
}

// ============================================================================
// Distance
// ============================================================================

/// Great-circle distance in kilometres (haversine).
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Arithmetic mean of the points, `None` when empty.
pub fn centroid(points: impl IntoIterator<Item = GeoPoint>) -> Option<GeoPoint> {
    let (mut lat, mut lon, mut n) = (0.0, 0.0, 0usize);
    for p in points {
        lat += p.latitude;
        lon += p.longitude;
        n += 1;
    }
    (n > 0).then(|| GeoPoint::new(lat / n as f64, lon / n as f64))
}
