use fleet_replay::geo::{bearing, distance, interpolated_position, path_length};
use fleet_replay::Location;
use proptest::prelude::*;

// Helper to create arbitrary coordinates away from the poles
fn arbitrary_location() -> impl Strategy<Value = Location> {
    (-80.0f64..80.0, -179.0f64..179.0).prop_map(|(lat, lng)| Location::new(lat, lng))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// **Feature: fleet-trip-replay, Property 1: Distance Symmetry**
    ///
    /// The great-circle distance between two points does not depend on their order.
    #[test]
    fn property_distance_symmetry(a in arbitrary_location(), b in arbitrary_location()) {
        let ab = distance(&a, &b);
        let ba = distance(&b, &a);
        prop_assert!((ab - ba).abs() < 1e-9, "{} != {}", ab, ba);
        prop_assert!(ab >= 0.0);
    }

    /// **Feature: fleet-trip-replay, Property 2: Distance Identity**
    #[test]
    fn property_distance_identity(a in arbitrary_location()) {
        prop_assert_eq!(distance(&a, &a), 0.0);
    }

    /// **Feature: fleet-trip-replay, Property 3: Bearing Range**
    ///
    /// Bearings are normalized into [0, 360).
    #[test]
    fn property_bearing_range(a in arbitrary_location(), b in arbitrary_location()) {
        let degrees = bearing(&a, &b);
        prop_assert!((0.0..360.0).contains(&degrees), "bearing {}", degrees);
    }

    /// **Feature: fleet-trip-replay, Property 4: Interpolation Stays On The Route Box**
    #[test]
    fn property_interpolation_bounded(
        route in prop::collection::vec(arbitrary_location(), 1..20),
        progress in -50.0f64..150.0
    ) {
        let point = interpolated_position(&route, progress).unwrap();
        let min_lat = route.iter().map(|p| p.lat).fold(f64::INFINITY, f64::min);
        let max_lat = route.iter().map(|p| p.lat).fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(point.lat >= min_lat - 1e-9 && point.lat <= max_lat + 1e-9);
    }
}

#[test]
fn test_bearing_cardinal_directions() {
    let origin = Location::new(0.0, 0.0);
    assert!((bearing(&origin, &Location::new(1.0, 0.0)) - 0.0).abs() < 1e-6);
    assert!((bearing(&origin, &Location::new(0.0, 1.0)) - 90.0).abs() < 1e-6);
    assert!((bearing(&origin, &Location::new(-1.0, 0.0)) - 180.0).abs() < 1e-6);
    assert!((bearing(&origin, &Location::new(0.0, -1.0)) - 270.0).abs() < 1e-6);
    assert_eq!(bearing(&origin, &origin), 0.0);
}

#[test]
fn test_interpolated_midpoint_of_three_point_route() {
    let route = vec![
        Location::new(10.0, 10.0),
        Location::new(11.0, 12.0),
        Location::new(15.0, 20.0),
    ];
    assert_eq!(interpolated_position(&route, 50.0), Some(route[1]));
    assert_eq!(interpolated_position(&route, 0.0), Some(route[0]));
    assert_eq!(interpolated_position(&route, 100.0), Some(route[2]));
    assert_eq!(interpolated_position(&[], 50.0), None);
}

#[test]
fn test_path_length_sums_segments() {
    let points = vec![
        Location::new(0.0, 0.0),
        Location::new(0.0, 1.0),
        Location::new(0.0, 2.0),
    ];
    let total = path_length(&points);
    let expected = distance(&points[0], &points[1]) + distance(&points[1], &points[2]);
    assert!((total - expected).abs() < 1e-9);
}
