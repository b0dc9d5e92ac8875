//! Great-circle geometry over the court list.

use crate::dao::models::Court;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Location fix reported by the platform sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    /// Sensor timestamp in milliseconds since the Unix epoch, when known.
    pub timestamp_ms: Option<u64>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            timestamp_ms: None,
        }
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

/// Haversine distance in meters between two points given in degrees.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` marginally outside [0, 1] for antipodal points.
    let a = a.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// A court together with its distance from a sample.
#[derive(Debug, Clone, Copy)]
pub struct NearestCourt<'a> {
    pub court: &'a Court,
    pub distance_m: f64,
}

/// Closest court to the given point, `None` when the list is empty.
pub fn nearest_court(courts: &[Court], latitude: f64, longitude: f64) -> Option<NearestCourt<'_>> {
    courts
        .iter()
        .map(|court| NearestCourt {
            court,
            distance_m: distance_meters(latitude, longitude, court.latitude, court.longitude),
        })
        .filter(|candidate| candidate.distance_m.is_finite())
        .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
}

/// Latitude offset, in degrees, that spans `meters` along a meridian.
pub fn meters_to_latitude_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_M).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn court(id: i64, latitude: f64, longitude: f64) -> Court {
        Court {
            id,
            name: format!("court {id}"),
            latitude,
            longitude,
        }
    }

    #[test]
    fn distance_is_zero_for_identical_points() {
        assert_eq!(distance_meters(48.8566, 2.3522, 48.8566, 2.3522), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (40.7128, -74.0060, 34.0522, -118.2437),
            (-33.8688, 151.2093, 51.5074, -0.1278),
            (0.0, 179.9, 0.0, -179.9),
        ];
        for (lat1, lon1, lat2, lon2) in pairs {
            let there = distance_meters(lat1, lon1, lat2, lon2);
            let back = distance_meters(lat2, lon2, lat1, lon1);
            assert!((there - back).abs() < 1e-6, "{there} != {back}");
        }
    }

    #[test]
    fn one_kilometer_north_is_about_a_thousand_meters() {
        let distance = distance_meters(40.0, -73.0, 40.0 + meters_to_latitude_degrees(1000.0), -73.0);
        assert!((distance - 1000.0).abs() < 10.0, "got {distance}");

        // 0.009 degrees of latitude, measured independently, is ~1000.8 m.
        let distance = distance_meters(51.0, 0.0, 51.009, 0.0);
        assert!((distance - 1000.0).abs() < 10.0, "got {distance}");
    }

    #[test]
    fn picks_the_closest_court() {
        let courts = [court(1, 40.0, -73.0), court(2, 40.001, -73.0), court(3, 41.0, -73.0)];
        let nearest = nearest_court(&courts, 40.0009, -73.0).unwrap();
        assert_eq!(nearest.court.id, 2);
        assert!(nearest.distance_m < 20.0);
    }

    #[test]
    fn no_courts_means_no_nearest() {
        assert!(nearest_court(&[], 40.0, -73.0).is_none());
    }
}
