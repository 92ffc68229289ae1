//! Minimum-displacement gate for local location samples

use crate::core::{GeoPoint, EARTH_RADIUS_WGS84, ECCENTRICITY_SQUARED_WGS84};
use nalgebra::Vector2;

/// East/north displacement in meters from `from` to `to`, on the tangent
/// plane at `from`. Accurate for the short distances a playing field spans.
pub fn local_displacement(from: &GeoPoint, to: &GeoPoint) -> Vector2<f64> {
    let ref_lat_rad = from.lat.to_radians();
    let sin_sq = ref_lat_rad.sin().powi(2);

    // Prime vertical and meridional radii of curvature
    let n = EARTH_RADIUS_WGS84 / (1.0 - ECCENTRICITY_SQUARED_WGS84 * sin_sq).sqrt();
    let m = EARTH_RADIUS_WGS84 * (1.0 - ECCENTRICITY_SQUARED_WGS84)
        / (1.0 - ECCENTRICITY_SQUARED_WGS84 * sin_sq).powf(1.5);

    let east = n * ref_lat_rad.cos() * (to.lon - from.lon).to_radians();
    let north = m * (to.lat - from.lat).to_radians();
    Vector2::new(east, north)
}

pub fn distance_m(from: &GeoPoint, to: &GeoPoint) -> f64 {
    local_displacement(from, to).norm()
}

/// Accepts a sample only once it has moved more than `min_distance_m` from
/// the last accepted one. The first sample is always accepted.
#[derive(Debug, Clone)]
pub struct MovementFilter {
    min_distance_m: f64,
    last_accepted: Option<GeoPoint>,
}

impl MovementFilter {
    pub fn new(min_distance_m: f64) -> Self {
        Self {
            min_distance_m,
            last_accepted: None,
        }
    }

    pub fn min_distance_m(&self) -> f64 {
        self.min_distance_m
    }

    pub fn accept(&mut self, point: &GeoPoint) -> bool {
        let moved = match &self.last_accepted {
            None => true,
            Some(last) => distance_m(last, point) > self.min_distance_m,
        };
        if moved {
            self.last_accepted = Some(*point);
        }
        moved
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_displacement_directions() {
        let origin = GeoPoint::new(0.0, 0.0);
        let target = GeoPoint::new(0.001, 0.001);

        let d = local_displacement(&origin, &target);
        // ~111 m each way at the equator
        assert!((d.x - 111.3).abs() < 1.0);
        assert!((d.y - 110.6).abs() < 1.0);
    }

    #[test]
    fn test_field_width_is_plausible() {
        // The shipped field is roughly 680 m east-west
        let west = GeoPoint::new(41.789, 2.762952);
        let east = GeoPoint::new(41.789, 2.771154);
        let width = distance_m(&west, &east);
        assert!(width > 650.0 && width < 700.0, "width {}", width);
    }

    #[test]
    fn test_filter_gates_small_moves() {
        let mut filter = MovementFilter::new(1.0);
        let start = GeoPoint::new(41.789, 2.765);

        assert!(filter.accept(&start));
        // ~0.1 m north
        assert!(!filter.accept(&GeoPoint::new(41.789001, 2.765)));
        // ~5.5 m north of the last accepted sample
        assert!(filter.accept(&GeoPoint::new(41.78905, 2.765)));
    }

    #[test]
    fn test_rejected_samples_do_not_move_the_anchor() {
        let mut filter = MovementFilter::new(1.0);
        assert!(filter.accept(&GeoPoint::new(41.789, 2.765)));

        // Creep north in ~0.55 m steps; each step alone is under the gate
        assert!(!filter.accept(&GeoPoint::new(41.789005, 2.765)));
        assert!(filter.accept(&GeoPoint::new(41.78901, 2.765)));
    }

    #[test]
    fn test_reset_accepts_next_sample() {
        let mut filter = MovementFilter::new(10.0);
        let point = GeoPoint::new(41.789, 2.765);
        assert!(filter.accept(&point));
        assert!(!filter.accept(&point));
        filter.reset();
        assert!(filter.accept(&point));
    }
}
