use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_util::{lenient_coordinate, lenient_millis};

/// Mean earth radius in meters used for all distance computations.
pub const EARTH_RADIUS_M: f64 = 6_371_000.;

/// One recorded fix. Serialized with the short keys used by the log file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "lat", deserialize_with = "lenient_coordinate")]
    pub latitude: f64,
    #[serde(rename = "lon", deserialize_with = "lenient_coordinate")]
    pub longitude: f64,
    #[serde(
        rename = "t",
        default,
        serialize_with = "chrono::serde::ts_milliseconds::serialize",
        deserialize_with = "lenient_millis"
    )]
    pub timestamp: DateTime<Utc>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance((self.latitude, self.longitude), (other.latitude, other.longitude))
    }
}

/// Great-circle distance in meters between two (lat, lon) pairs given in degrees.
pub fn haversine_distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let lat1 = p1.0.to_radians();
    let lat2 = p2.0.to_radians();
    let d_lat = (p2.0 - p1.0).to_radians();
    let d_lon = (p2.1 - p1.1).to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);

    2. * EARTH_RADIUS_M * f64::asin(f64::sqrt(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousandth_of_a_degree_latitude() {
        let d = haversine_distance((45.0, 9.0), (45.001, 9.0));
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_distance((55.6761, 12.5683), (55.6761, 12.5683)), 0.);
    }

    #[test]
    fn distance_is_symmetric_and_non_negative() {
        let a = (40.122151, 44.658078);
        let b = (56.158405, 10.206034);
        let ab = haversine_distance(a, b);
        let ba = haversine_distance(b, a);
        assert!(ab > 0.);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn json_uses_short_keys() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let point = GeoPoint::new(45.5, 9.25, at);
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json, serde_json::json!({"lat": 45.5, "lon": 9.25, "t": 1_700_000_000_123i64}));
    }
}
