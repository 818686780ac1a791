//! Synthetic locations for senders without a usable position.
//!
//! Bad locations are spread around a center point so that several of them
//! don't stack on a single map marker. Offsets come from a seeded RNG, so a
//! batch with the same seed always yields the same positions.

use std::collections::HashSet;
use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::LatLong;

/// Default jitter radius around the sentinel, in meters.
pub const DEFAULT_JITTER_RADIUS_METERS: f64 = 10_000.0;

const METERS_PER_DEGREE: f64 = 111_320.0;
const MIN_OFFSET_METERS: f64 = 1.0;

/// Produce `count` distinct positions within `radius_meters` of `center`.
///
/// None of the positions equals `center` itself.
pub fn jitter(count: usize, center: LatLong, radius_meters: f64, seed: u64) -> Vec<LatLong> {
    let mut rng = StdRng::seed_from_u64(seed);
    let radius = radius_meters.max(MIN_OFFSET_METERS * 2.0);
    let mut seen = HashSet::with_capacity(count);
    let mut points = Vec::with_capacity(count);

    while points.len() < count {
        let bearing = rng.gen_range(0.0..2.0 * PI);
        let distance = rng.gen_range(MIN_OFFSET_METERS..radius);

        let d_lat = distance * bearing.cos() / METERS_PER_DEGREE;
        let lat_scale = center.latitude.to_radians().cos().abs().max(0.01);
        let d_lon = distance * bearing.sin() / (METERS_PER_DEGREE * lat_scale);

        let point = LatLong::new(
            (center.latitude + d_lat).clamp(-90.0, 90.0),
            (center.longitude + d_lon).clamp(-180.0, 180.0),
        );
        if point == center {
            continue;
        }
        if seen.insert((point.latitude.to_bits(), point.longitude.to_bits())) {
            points.push(point);
        }
    }

    points
}
