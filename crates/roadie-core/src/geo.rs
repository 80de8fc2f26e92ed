use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate. Altitude is carried for the client's sake but never
/// enters distance math.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, altitude: 0.0 }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_m(&self, other: &LatLng) -> f64 {
        let lat_a = self.latitude.to_radians();
        let lat_b = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();
        let h = (d_lat / 2.0).sin().powi(2)
            + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * h.sqrt().asin()
    }

    /// Point `fraction` of the way from `self` toward `other`. Linear in
    /// lat/lng, which is fine at the sub-kilometer scale it is used for.
    pub fn toward(&self, other: &LatLng, fraction: f64) -> LatLng {
        LatLng {
            latitude: self.latitude + (other.latitude - self.latitude) * fraction,
            longitude: self.longitude + (other.longitude - self.longitude) * fraction,
            altitude: other.altitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_same_point() {
        let p = LatLng::new(40.7580, -73.9855);
        assert!(p.distance_m(&p) < 1e-6);
    }

    #[test]
    fn distance_matches_known_pair() {
        // Times Square to the Empire State Building, roughly 1.06 km.
        let a = LatLng::new(40.7580, -73.9855);
        let b = LatLng::new(40.7484, -73.9857);
        let d = a.distance_m(&b);
        assert!(d > 1_000.0 && d < 1_150.0, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = LatLng::new(51.5007, -0.1246);
        let b = LatLng::new(48.8584, 2.2945);
        assert!((a.distance_m(&b) - b.distance_m(&a)).abs() < 1e-6);
    }

    #[test]
    fn toward_interpolates() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(1.0, 2.0);
        let mid = a.toward(&b, 0.5);
        assert!((mid.latitude - 0.5).abs() < 1e-9);
        assert!((mid.longitude - 1.0).abs() < 1e-9);
    }
}
