use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Label carried by a position that was never successfully computed.
pub const NOT_CALCULATED: &str = "NOT_CALCULATED";

/// A 2-D geographic position. `x` is latitude and `y` is longitude in
/// decimal degrees, unless the surrounding code has converted into a local
/// plane — the type does not track which frame it is in, callers do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub label: String,
    pub observed: bool,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, label: "TAG".to_string(), observed: false }
    }

    pub fn with_label(x: f64, y: f64, label: &str) -> Self {
        Self { x, y, label: label.to_string(), observed: false }
    }

    /// Sentinel meaning "no valid result". Both coordinates are zero and the
    /// label marks the point as never computed.
    pub fn not_calculated() -> Self {
        Self::with_label(0.0, 0.0, NOT_CALCULATED)
    }

    pub fn is_sentinel(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X: {} Y: {} TAG: {}", self.x, self.y, self.label)
    }
}

/// A fixed ranging anchor: a surveyed position plus the short tag address
/// used on the radio link. Built once from configuration, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub address: String,
    pub position: Point,
}

impl Anchor {
    pub fn new(address: &str, x: f64, y: f64) -> Self {
        Self {
            address: address.to_string(),
            position: Point::with_label(x, y, address),
        }
    }
}

/// One AHRS sample: acceleration, angular rate and magnetic field vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct InertialSample {
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
    pub mag: Vector3<f64>,
    pub timestamp: f64,
}

impl InertialSample {
    pub fn new(accel: Vector3<f64>, gyro: Vector3<f64>, mag: Vector3<f64>) -> Self {
        Self { accel, gyro, mag, timestamp: current_timestamp() }
    }
}

impl std::fmt::Display for InertialSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}, {}, {}, {}",
            self.accel.x, self.accel.y, self.accel.z,
            self.gyro.x, self.gyro.y, self.gyro.z,
            self.mag.x, self.mag.y, self.mag.z,
        )
    }
}

/// A decoded GPS fix in signed decimal degrees (`x` latitude, `y` longitude).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub x: f64,
    pub y: f64,
    pub timestamp: f64,
}

impl GpsFix {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, timestamp: current_timestamp() }
    }

    pub fn as_point(&self) -> Point {
        Point::with_label(self.x, self.y, "GPS")
    }
}

impl std::fmt::Display for GpsFix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

/// Capability for any measurement that carries a capture timestamp.
///
/// Implemented independently by each measurement type; the age arithmetic is
/// identical everywhere so it lives in default methods. Budgets come from
/// configuration, the gate itself knows nothing about measurement semantics.
pub trait Stamped {
    fn timestamp(&self) -> f64;

    fn age(&self) -> f64 {
        current_timestamp() - self.timestamp()
    }

    fn is_fresh(&self, budget_secs: f64) -> bool {
        self.age() <= budget_secs
    }
}

impl Stamped for InertialSample {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

impl Stamped for GpsFix {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// Wall-clock seconds since the Unix epoch.
pub fn current_timestamp() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_point() {
        let p = Point::not_calculated();
        assert!(p.is_sentinel());
        assert_eq!(p.label, NOT_CALCULATED);
    }

    #[test]
    fn freshness_against_budget() {
        let mut fix = GpsFix::new(50.0, 18.0);
        assert!(fix.is_fresh(1.0));

        fix.timestamp = current_timestamp() - 10.0;
        assert!(!fix.is_fresh(5.0));
        assert!(fix.is_fresh(15.0));
    }

    #[test]
    fn point_record_format() {
        let p = Point::with_label(1.5, -2.25, "C0:01");
        assert_eq!(p.to_string(), "X: 1.5 Y: -2.25 TAG: C0:01");
    }
}
