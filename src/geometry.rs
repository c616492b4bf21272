// Pure trilateration geometry. No state, no I/O: two anchor positions, two
// measured ranges and a control point in, one best-estimate `Point` out.
// Every degenerate case (zero baseline, impossible triangle, arithmetic
// domain error) resolves to the sentinel point instead of an error.

use geo::GeodesicDistance;
use nalgebra::Vector2;

use crate::config::TrackerConfig;
use crate::types::Point;

/// Local-plane conversion between ranging metres and geographic degrees.
pub const METERS_PER_DEGREE: f64 = 111_139.0;

/// Which trilateration method to run. Both take the same inputs and honour
/// the same sentinel contract; selection is left to the integrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    LawOfCosines,
    CircleIntersection,
}

impl Algorithm {
    pub fn compute(
        self,
        anchor_a: &Point,
        anchor_b: &Point,
        control: &Point,
        distance_a: f64,
        distance_b: f64,
        config: &TrackerConfig,
    ) -> Point {
        match self {
            Algorithm::LawOfCosines => {
                law_of_cosines_position(anchor_a, anchor_b, control, distance_a, distance_b, config)
            }
            Algorithm::CircleIntersection => {
                circle_intersection_position(anchor_a, anchor_b, control, distance_a, distance_b)
            }
        }
    }
}

/// Great-circle distance in metres between two geographic points.
pub fn geodesic_distance_m(a: &Point, b: &Point) -> f64 {
    // geo points are (x=longitude, y=latitude); ours are (x=lat, y=lon).
    let pa = geo::Point::new(a.y, a.x);
    let pb = geo::Point::new(b.y, b.x);
    pa.geodesic_distance(&pb)
}

/// Compensate systematic under-measurement of the ranging hardware.
///
/// When the two ranges cannot span the anchor baseline, both are multiplied
/// by a common factor grown from 1.0 in `step` increments until the triangle
/// inequality holds or `cap` is reached. Bounded and monotonic; the factor
/// never exceeds `cap`.
pub fn scale_short_ranges(
    distance_a: f64,
    distance_b: f64,
    baseline_m: f64,
    step: f64,
    cap: f64,
) -> (f64, f64, f64) {
    let mut factor = 1.0;
    while (distance_a + distance_b) * factor < baseline_m && factor + step <= cap {
        factor += step;
    }
    (distance_a * factor, distance_b * factor, factor)
}

/// Primary method: project the tag via the law of cosines at anchor A.
///
/// The baseline length is geodesic; the angle's offsets are projected into
/// degrees with the fixed metres-per-degree constant, along the baseline axis
/// (longitude) and across it (latitude). The control point picks the sign of
/// each offset, since the law of cosines alone cannot distinguish the two
/// mirror solutions.
pub fn law_of_cosines_position(
    anchor_a: &Point,
    anchor_b: &Point,
    control: &Point,
    distance_a: f64,
    distance_b: f64,
    config: &TrackerConfig,
) -> Point {
    if !distance_a.is_finite() || !distance_b.is_finite() {
        return Point::not_calculated();
    }

    let baseline = geodesic_distance_m(anchor_a, anchor_b);
    let (distance_a, distance_b, _) = scale_short_ranges(
        distance_a,
        distance_b,
        baseline,
        config.offset_scale_step,
        config.max_offset_scale,
    );

    let denominator = 2.0 * distance_a * baseline;
    if denominator == 0.0 {
        return Point::not_calculated();
    }

    let cos_alpha =
        (distance_a.powi(2) + baseline.powi(2) - distance_b.powi(2)) / denominator.abs();
    if !cos_alpha.is_finite() || !(-1.0..=1.0).contains(&cos_alpha) {
        return Point::not_calculated();
    }

    let along = (distance_a * cos_alpha) / METERS_PER_DEGREE;
    let across = (distance_a * (1.0 - cos_alpha * cos_alpha).sqrt()) / METERS_PER_DEGREE;

    let x = if anchor_a.x > control.x { anchor_a.x - across } else { anchor_a.x + across };
    let y = if anchor_a.y > control.y { anchor_a.y - along } else { anchor_a.y + along };
    Point::new(x, y)
}

/// Alternate method: intersect the two range circles in the degree plane and
/// keep the candidate geodetically closer to the control point.
pub fn circle_intersection_position(
    anchor_a: &Point,
    anchor_b: &Point,
    control: &Point,
    distance_a: f64,
    distance_b: f64,
) -> Point {
    let a = Vector2::new(anchor_a.x, anchor_a.y);
    let b = Vector2::new(anchor_b.x, anchor_b.y);
    let d = (b - a).norm();
    let ra = distance_a / METERS_PER_DEGREE;
    let rb = distance_b / METERS_PER_DEGREE;

    // Non-intersecting, one circle inside the other, coincident circles.
    if d > ra + rb || d < (ra - rb).abs() || (d == 0.0 && ra == rb) {
        return Point::not_calculated();
    }

    let foot = (ra * ra - rb * rb + d * d) / (2.0 * d);
    let disc = ra * ra - foot * foot;
    if !disc.is_finite() || disc < 0.0 {
        return Point::not_calculated();
    }
    let h = disc.sqrt();

    let mid = a + (b - a) * (foot / d);
    let perp = Vector2::new((b - a).y, -(b - a).x) / d;
    let first = mid + perp * h;
    let second = mid - perp * h;

    let first = Point::new(first.x, first.y);
    let second = Point::new(second.x, second.y);
    if geodesic_distance_m(&first, control) < geodesic_distance_m(&second, control) {
        first
    } else {
        second
    }
}
