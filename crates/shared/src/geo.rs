//! Great-circle distance and the minimum-movement filter applied to raw
//! position samples before they are put on the wire.

use crate::tracking::{GeoPoint, LocationPoint};

/// Single shared Earth radius; every distance in the system goes through
/// [`distance_meters`] rather than re-deriving the formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A picker must move more than this before a new sample is emitted.
pub const MIN_MOVEMENT_METERS: f64 = 5.0;

/// Haversine distance between two coordinates, in meters.
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Whether a candidate sample represents enough movement to emit. The very
/// first sample (no history) always emits.
pub fn should_emit(previous: Option<&LocationPoint>, candidate: &LocationPoint, threshold_m: f64) -> bool {
    match previous {
        None => true,
        Some(prev) => distance_meters(&prev.position(), &candidate.position()) > threshold_m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint { lat, lng }
    }

    fn sample(lat: f64, lng: f64) -> LocationPoint {
        LocationPoint {
            lat,
            lng,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let minsk = point(53.9, 27.5667);
        let vilnius = point(54.6872, 25.2797);
        let there = distance_meters(&minsk, &vilnius);
        let back = distance_meters(&vilnius, &minsk);
        assert!((there - back).abs() < 1e-6);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = point(-33.8688, 151.2093);
        assert_eq!(distance_meters(&p, &p), 0.0);
    }

    #[test]
    fn known_distance_is_plausible() {
        // Minsk to Vilnius is roughly 170 km as the crow flies.
        let d = distance_meters(&point(53.9, 27.5667), &point(54.6872, 25.2797));
        assert!((165_000.0..180_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn first_sample_always_emits() {
        assert!(should_emit(None, &sample(0.0, 0.0), 1_000_000.0));
    }

    #[test]
    fn identical_point_never_re_emits() {
        let p = sample(53.9, 27.5);
        assert!(!should_emit(Some(&p), &p, 0.1));
        assert!(!should_emit(Some(&p), &p, MIN_MOVEMENT_METERS));
    }

    #[test]
    fn movement_beyond_threshold_emits() {
        let prev = sample(53.9, 27.5);
        // ~11 m north of prev.
        let moved = sample(53.9001, 27.5);
        assert!(should_emit(Some(&prev), &moved, MIN_MOVEMENT_METERS));
        assert!(!should_emit(Some(&prev), &moved, 50.0));
    }
}
