//! # Geodesy Utilities
//!
//! Spherical-earth distance helpers.

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points using the Haversine formula.
///
/// All inputs are in degrees. Identical points yield exactly `0.0`; antipodal
/// points yield half the Earth's circumference.
///
/// # Examples
///
/// ```
/// use link_budget_monitor::link::geodesy::haversine_km;
///
/// assert_eq!(haversine_km(18.5204, 73.8567, 18.5204, 73.8567), 0.0);
/// let d = haversine_km(0.0, 0.0, 0.0, 1.0);
/// assert!((d - 111.195).abs() < 0.001);
/// ```
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points.
    let a = a.min(1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Arithmetic midpoint of two coordinates, used to centre map views.
///
/// Adequate for the short ranges of a terrestrial link; not a great-circle
/// midpoint.
pub fn midpoint(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    ((lat1 + lat2) / 2.0, (lon1 + lon2) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_identical_points_are_zero() {
        for (lat, lon) in [(0.0, 0.0), (18.5204, 73.8567), (-89.9, 179.9), (45.0, -120.0)] {
            assert_eq!(haversine_km(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ((18.5204, 73.8567), (19.0760, 72.8777)),
            ((37.7749, -122.4194), (-33.8688, 151.2093)),
            ((0.0, 0.0), (10.0, -10.0)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let ab = haversine_km(lat1, lon1, lat2, lon2);
            let ba = haversine_km(lat2, lon2, lat1, lon1);
            assert!((ab - ba).abs() < 1e-9, "{} != {}", ab, ba);
        }
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let expected = EARTH_RADIUS_KM * PI / 180.0;
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - expected).abs() < 1e-9);
    }

    #[test]
    fn test_antipodal_points() {
        let expected = EARTH_RADIUS_KM * PI;
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - expected).abs() < 1e-6);

        let pole_to_pole = haversine_km(90.0, 0.0, -90.0, 0.0);
        assert!((pole_to_pole - expected).abs() < 1e-6);
    }

    #[test]
    fn test_pune_to_mumbai() {
        // Roughly 120 km between the two city centres
        let d = haversine_km(18.5204, 73.8567, 19.0760, 72.8777);
        assert!(d > 115.0 && d < 125.0, "unexpected distance {}", d);
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(10.0, 20.0, 20.0, 40.0), (15.0, 30.0));
        assert_eq!(midpoint(-1.0, -1.0, 1.0, 1.0), (0.0, 0.0));
    }
}
