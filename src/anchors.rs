use std::cmp::Ordering;

use crate::config::TrackerConfig;
use crate::geometry::geodesic_distance_m;
use crate::types::{Anchor, GpsFix};

/// The anchor pair chosen for one ranging cycle, nearest first. The same
/// selection feeds both the outbound request addresses and the geometry
/// engine, so the distances and coordinates always refer to the same
/// anchors.
#[derive(Clone, Debug)]
pub struct AnchorSelection {
    pub nearest: Anchor,
    pub second: Anchor,
}

/// Picks which two of the configured anchors to query, based on the current
/// GPS fix. The anchor set is read-only process-wide state.
pub struct AnchorSelector {
    anchors: Vec<Anchor>,
}

impl AnchorSelector {
    pub fn new(config: &TrackerConfig) -> Self {
        Self { anchors: config.anchors.clone() }
    }

    /// The two anchors geodesically closest to the fix. `None` when fewer
    /// than two anchors are configured.
    pub fn select(&self, fix: &GpsFix) -> Option<AnchorSelection> {
        if self.anchors.len() < 2 {
            return None;
        }
        let origin = fix.as_point();
        let mut ranked: Vec<(f64, &Anchor)> = self
            .anchors
            .iter()
            .map(|anchor| (geodesic_distance_m(&anchor.position, &origin), anchor))
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        Some(AnchorSelection {
            nearest: ranked[0].1.clone(),
            second: ranked[1].1.clone(),
        })
    }
}
