// lib/src/geo.rs
// Great-circle helpers used to rank responders and label distances.

use std::cmp::Ordering;

use models::Coordinates;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn to_radians(degrees: f64) -> f64 {
    degrees * (std::f64::consts::PI / 180.0)
}

/// Unrounded haversine distance in kilometers.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = to_radians(b.latitude - a.latitude);
    let d_lon = to_radians(b.longitude - a.longitude);
    let h = (d_lat / 2.0).sin().powi(2)
        + to_radians(a.latitude).cos() * to_radians(b.latitude).cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Haversine distance rounded to one decimal place, for display.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    round_to_tenth(haversine_km(a, b))
}

/// Initial bearing from `a` towards `b`, in degrees clockwise from north,
/// normalized to [0, 360).
pub fn bearing_degrees(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = to_radians(a.latitude);
    let lat2 = to_radians(b.latitude);
    let d_lon = to_radians(b.longitude - a.longitude);
    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    if bearing >= 360.0 { 0.0 } else { bearing }
}

/// Orders `items` nearest-first from `origin`. Equal distances keep their
/// input order.
pub fn rank_by_distance<T, F>(origin: Coordinates, items: Vec<T>, position: F) -> Vec<(T, f64)>
where
    F: Fn(&T) -> Coordinates,
{
    let mut ranked: Vec<(T, f64)> = items
        .into_iter()
        .map(|item| {
            let km = haversine_km(origin, position(&item));
            (item, km)
        })
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    ranked
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates { latitude, longitude }
    }

    #[test]
    fn should_be_zero_for_same_point() {
        let a = at(12.9716, 77.5946);
        assert_eq!(distance_km(a, a), 0.0);
        assert_eq!(haversine_km(a, a), 0.0);
    }

    #[test]
    fn should_be_symmetric() {
        let a = at(12.9716, 77.5946);
        let b = at(13.0827, 80.2707);
        assert_eq!(distance_km(a, b), distance_km(b, a));
    }

    #[test]
    fn should_round_to_one_decimal() {
        // Bengaluru to Chennai, roughly 290 km as the crow flies.
        let km = distance_km(at(12.9716, 77.5946), at(13.0827, 80.2707));
        assert!((km - 290.2).abs() < 1.0, "unexpected distance {}", km);
        assert_eq!(km, (km * 10.0).round() / 10.0);
    }

    #[test]
    fn should_match_known_offset() {
        // 0.018 degrees of latitude is about 2 km.
        let km = distance_km(at(20.0, 78.0), at(19.982, 78.0));
        assert_eq!(km, 2.0);
    }

    #[test]
    fn should_handle_antipodes() {
        let km = haversine_km(at(0.0, 0.0), at(0.0, 180.0));
        assert!((km - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn should_compute_cardinal_bearings() {
        let origin = at(0.0, 0.0);
        assert!((bearing_degrees(origin, at(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, at(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, at(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, at(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn should_rank_nearest_first() {
        let origin = at(20.0, 78.0);
        let points = vec![("far", at(21.0, 78.0)), ("near", at(20.01, 78.0)), ("mid", at(20.5, 78.0))];
        let ranked = rank_by_distance(origin, points, |(_, c)| *c);
        let names: Vec<&str> = ranked.iter().map(|((name, _), _)| *name).collect();
        assert_eq!(names, vec!["near", "mid", "far"]);
    }
}
