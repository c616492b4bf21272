// One fused snapshot per cycle: a ranging pair, an inertial sample and a GPS
// fix, each gated by its staleness budget at construction. Validity is
// decided exactly once; staleness never raises, it only clears `is_valid`.

use crate::config::{FreshnessBudgets, TrackerConfig};
use crate::geometry::Algorithm;
use crate::protocol::RangingPair;
use crate::types::{current_timestamp, GpsFix, InertialSample, Point, Stamped};

use crate::anchors::AnchorSelection;

/// A validated, timestamped fusion frame.
///
/// `computed_position` stays at the sentinel until `calculate` succeeds; it
/// is never partially populated. `is_valid` is fixed at construction and
/// never re-evaluated.
#[derive(Clone, Debug)]
pub struct FusionFrame {
    pub ranging: RangingPair,
    pub inertial: Option<InertialSample>,
    pub gps: Option<GpsFix>,
    pub computed_position: Point,
    pub is_valid: bool,
    pub created_at: f64,
}

impl FusionFrame {
    /// Build a frame and decide validity: true iff all four stamped leaves
    /// (both ranging measurements, the inertial sample, the GPS fix) are
    /// within their budgets. A sub-measurement that failed upstream and
    /// arrived as `None` clears validity instead of raising.
    pub fn new(
        ranging: RangingPair,
        inertial: Option<InertialSample>,
        gps: Option<GpsFix>,
        budgets: &FreshnessBudgets,
    ) -> Self {
        let is_valid = ranging.nearest.is_fresh(budgets.ranging_secs)
            && ranging.second.is_fresh(budgets.ranging_secs)
            && inertial.as_ref().is_some_and(|s| s.is_fresh(budgets.inertial_secs))
            && gps.as_ref().is_some_and(|g| g.is_fresh(budgets.gps_secs));

        Self {
            ranging,
            inertial,
            gps,
            computed_position: Point::not_calculated(),
            is_valid,
            created_at: current_timestamp(),
        }
    }

    /// Run the geometry engine over the frame's ranging distances, using the
    /// GPS fix as the control point. Pure in the frame state, so calling it
    /// twice with the same selection yields the same position. Freshness is
    /// not re-checked here.
    pub fn calculate(
        &mut self,
        selection: &AnchorSelection,
        algorithm: Algorithm,
        config: &TrackerConfig,
    ) {
        let Some(control) = self.gps.as_ref().map(GpsFix::as_point) else {
            return;
        };
        self.computed_position = algorithm.compute(
            &selection.nearest.position,
            &selection.second.position,
            &control,
            self.ranging.nearest.distance,
            self.ranging.second.distance,
            config,
        );
    }
}

impl std::fmt::Display for FusionFrame {
    /// Session-record layout consumed by the offline analysis tooling: a
    /// fixed 15-line block per frame.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "                FRAME VALID")?;
        writeln!(f, "{}", self.is_valid)?;
        writeln!(f, "                   TIME")?;
        writeln!(f, "{}", self.created_at)?;
        writeln!(f, "                   UWB")?;
        writeln!(f, "{}", self.ranging)?;
        writeln!(f)?;
        writeln!(f, "                   AHRS")?;
        match &self.inertial {
            Some(sample) => writeln!(f, "{sample}")?,
            None => writeln!(f, "none")?,
        }
        writeln!(f, "                   GPS")?;
        match &self.gps {
            Some(fix) => writeln!(f, "{fix}")?,
            None => writeln!(f, "none")?,
        }
        writeln!(f, "             CALCULATED_POSITION")?;
        writeln!(f, "{}", self.computed_position)?;
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RangingMeasurement;
    use crate::types::Anchor;
    use nalgebra::Vector3;

    fn fresh_pair() -> RangingPair {
        RangingPair::new(
            RangingMeasurement::new("AA:05", 12.0, -80.0),
            RangingMeasurement::new("BB:02", 15.0, -82.0),
        )
    }

    fn fresh_inertial() -> InertialSample {
        InertialSample::new(
            Vector3::new(0.1, 0.0, 9.8),
            Vector3::zeros(),
            Vector3::new(22.0, 3.0, -40.0),
        )
    }

    fn budgets() -> FreshnessBudgets {
        FreshnessBudgets::default()
    }

    #[test]
    fn all_fresh_inputs_make_a_valid_frame() {
        let frame = FusionFrame::new(
            fresh_pair(),
            Some(fresh_inertial()),
            Some(GpsFix::new(50.0, 18.0)),
            &budgets(),
        );
        assert!(frame.is_valid);
        assert!(frame.computed_position.is_sentinel());
    }

    #[test]
    fn one_stale_input_invalidates_the_frame() {
        let mut fix = GpsFix::new(50.0, 18.0);
        fix.timestamp -= 60.0;
        let frame = FusionFrame::new(fresh_pair(), Some(fresh_inertial()), Some(fix), &budgets());
        assert!(!frame.is_valid);
    }

    #[test]
    fn stale_ranging_leg_invalidates_the_frame() {
        let mut pair = fresh_pair();
        pair.second.timestamp -= 60.0;
        let frame = FusionFrame::new(
            pair,
            Some(fresh_inertial()),
            Some(GpsFix::new(50.0, 18.0)),
            &budgets(),
        );
        assert!(!frame.is_valid);
    }

    #[test]
    fn missing_sub_measurement_invalidates_without_raising() {
        let frame = FusionFrame::new(fresh_pair(), None, Some(GpsFix::new(50.0, 18.0)), &budgets());
        assert!(!frame.is_valid);
    }

    #[test]
    fn calculate_is_idempotent() {
        let config = TrackerConfig::default();
        let selection = AnchorSelection {
            nearest: Anchor::new("AA:05", 0.0, 0.0),
            second: Anchor::new("BB:02", 0.0, 0.0004),
        };
        let pair = RangingPair::new(
            RangingMeasurement::new("AA:05", 30.0, -80.0),
            RangingMeasurement::new("BB:02", 40.0, -82.0),
        );
        let mut frame =
            FusionFrame::new(pair, Some(fresh_inertial()), Some(GpsFix::new(0.0002, 0.0001)), &budgets());

        frame.calculate(&selection, Algorithm::LawOfCosines, &config);
        let first = frame.computed_position.clone();
        assert!(!first.is_sentinel());

        frame.calculate(&selection, Algorithm::LawOfCosines, &config);
        assert_eq!(frame.computed_position, first);
    }

    #[test]
    fn calculate_without_gps_keeps_the_sentinel() {
        let config = TrackerConfig::default();
        let selection = AnchorSelection {
            nearest: Anchor::new("AA:05", 0.0, 0.0),
            second: Anchor::new("BB:02", 0.0, 0.0004),
        };
        let mut frame = FusionFrame::new(fresh_pair(), Some(fresh_inertial()), None, &budgets());
        frame.calculate(&selection, Algorithm::LawOfCosines, &config);
        assert!(frame.computed_position.is_sentinel());
    }

    #[test]
    fn record_block_has_fixed_line_count() {
        let mut fix = GpsFix::new(50.0, 18.0);
        fix.timestamp -= 1.0;
        let frame = FusionFrame::new(fresh_pair(), Some(fresh_inertial()), Some(fix), &budgets());
        let rendered = frame.to_string();
        assert_eq!(rendered.lines().count(), 15);
        assert!(rendered.contains("FRAME VALID"));
        assert!(rendered.contains("NOT_CALCULATED"));
    }
}
