//! Great-circle math over lat/lng points

use crate::event::GpsLocation;
use crate::types::Location;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Anything carrying a latitude and longitude in degrees
pub trait Coordinate {
    fn lat(&self) -> f64;
    fn lng(&self) -> f64;
}

impl Coordinate for Location {
    fn lat(&self) -> f64 {
        self.lat
    }

    fn lng(&self) -> f64 {
        self.lng
    }
}

impl Coordinate for GpsLocation {
    fn lat(&self) -> f64 {
        self.lat
    }

    fn lng(&self) -> f64 {
        self.lng
    }
}

/// Haversine distance in kilometres
pub fn distance<A: Coordinate + ?Sized, B: Coordinate + ?Sized>(a: &A, b: &B) -> f64 {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlat = (b.lat() - a.lat()).to_radians();
    let dlng = (b.lng() - a.lng()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Initial bearing from `a` to `b` in degrees, clockwise from north, in `[0, 360)`.
///
/// Coincident points have no defined bearing; they yield `0.0`.
pub fn bearing<A: Coordinate + ?Sized, B: Coordinate + ?Sized>(a: &A, b: &B) -> f64 {
    if a.lat() == b.lat() && a.lng() == b.lng() {
        return 0.0;
    }

    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlng = (b.lng() - a.lng()).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();

    let degrees = y.atan2(x).to_degrees();
    let normalized = (degrees + 360.0) % 360.0;
    // -0.0 and rounding up to exactly 360.0 both collapse to 0
    if normalized >= 360.0 || normalized == 0.0 {
        0.0
    } else {
        normalized
    }
}

/// Position along `route` at `progress_percent`, interpolated in point-index space.
///
/// Progress is mapped onto `[0, len - 1]` and the result lies on the straight line
/// between the two bracketing points. This is not distance-weighted: it assumes the
/// route points are roughly evenly spaced, which holds for sampled routes.
pub fn interpolated_position(route: &[Location], progress_percent: f64) -> Option<Location> {
    match route {
        [] => None,
        [only] => Some(Location::new(only.lat, only.lng)),
        _ => {
            let progress = if progress_percent.is_nan() {
                0.0
            } else {
                progress_percent.clamp(0.0, 100.0)
            };
            let target = progress / 100.0 * (route.len() - 1) as f64;
            let current_index = (target.floor() as usize).min(route.len() - 1);
            let next_index = (current_index + 1).min(route.len() - 1);
            let fraction = target - current_index as f64;

            let current = &route[current_index];
            let next = &route[next_index];

            Some(Location::new(
                current.lat + (next.lat - current.lat) * fraction,
                current.lng + (next.lng - current.lng) * fraction,
            ))
        }
    }
}

/// Sum of haversine distances between consecutive points
pub fn path_length<C: Coordinate>(points: &[C]) -> f64 {
    points.windows(2).map(|pair| distance(&pair[0], &pair[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_distance_known_pair() {
        // Delhi to Mumbai is roughly 1150 km great-circle
        let delhi = Location::new(28.7041, 77.1025);
        let mumbai = Location::new(19.076, 72.8776);
        let d = distance(&delhi, &mumbai);
        assert!((d - 1153.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_distance_identity() {
        let p = Location::new(12.9716, 77.5946);
        assert!(distance(&p, &p).abs() < EPSILON);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Location::new(0.0, 0.0);
        assert!((bearing(&origin, &Location::new(1.0, 0.0)) - 0.0).abs() < 1e-6);
        assert!((bearing(&origin, &Location::new(0.0, 1.0)) - 90.0).abs() < 1e-6);
        assert!((bearing(&origin, &Location::new(-1.0, 0.0)) - 180.0).abs() < 1e-6);
        assert!((bearing(&origin, &Location::new(0.0, -1.0)) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_bearing_degenerate() {
        let p = Location::new(10.0, 10.0);
        assert_eq!(bearing(&p, &p), 0.0);
    }

    #[test]
    fn test_interpolation_edges() {
        assert!(interpolated_position(&[], 50.0).is_none());

        let single = [Location::new(1.0, 2.0)];
        assert_eq!(interpolated_position(&single, 75.0), Some(Location::new(1.0, 2.0)));

        let route = [Location::new(0.0, 0.0), Location::new(10.0, 20.0)];
        assert_eq!(interpolated_position(&route, -5.0), Some(Location::new(0.0, 0.0)));
        assert_eq!(interpolated_position(&route, 250.0), Some(Location::new(10.0, 20.0)));
        assert_eq!(interpolated_position(&route, 50.0), Some(Location::new(5.0, 10.0)));
    }

    #[test]
    fn test_path_length_mixed_points() {
        let points = [
            GpsLocation::new(0.0, 0.0),
            GpsLocation::new(0.0, 1.0),
            GpsLocation::new(0.0, 2.0),
        ];
        let direct = distance(&points[0], &points[2]);
        assert!((path_length(&points) - direct).abs() < 1e-6);
    }
}
