// Top-level orchestration: one `next_frame` call per cycle picks the anchor
// pair from the latest GPS fix, requests distances, fuses whatever has
// arrived and runs the geometry engine. Sensor feeds are push-style; the
// tracker only ever keeps the most recent sample of each.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::anchors::AnchorSelector;
use crate::config::TrackerConfig;
use crate::error::{RangingError, TrackerError};
use crate::fusion::FusionFrame;
use crate::geometry::Algorithm;
use crate::session::RangingSession;
use crate::transport::{MeasurementStream, RangingLink};
use crate::types::{GpsFix, InertialSample};

/// Per-run frame counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackerStats {
    pub frames_produced: u64,
    pub valid_frames: u64,
}

pub struct PositionTracker<L: RangingLink> {
    config: TrackerConfig,
    session: RangingSession<L>,
    selector: AnchorSelector,
    algorithm: Algorithm,
    last_inertial: Option<InertialSample>,
    last_gps: Option<GpsFix>,
    records: Vec<String>,
    stats: TrackerStats,
}

impl<L: RangingLink> PositionTracker<L> {
    pub fn new(
        link: L,
        stream: Option<Box<dyn MeasurementStream>>,
        config: TrackerConfig,
        algorithm: Algorithm,
    ) -> Result<Self, RangingError> {
        let session = RangingSession::new(link, stream, &config)?;
        let selector = AnchorSelector::new(&config);
        Ok(Self {
            config,
            session,
            selector,
            algorithm,
            last_inertial: None,
            last_gps: None,
            records: Vec::new(),
            stats: TrackerStats::default(),
        })
    }

    /// Connect the ranging session. Call once before the first cycle.
    pub fn launch(&mut self) -> Result<(), RangingError> {
        self.session.connect()
    }

    pub fn feed_gps(&mut self, fix: GpsFix) {
        self.last_gps = Some(fix);
    }

    pub fn feed_inertial(&mut self, sample: InertialSample) {
        self.last_inertial = Some(sample);
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Run one tracking cycle. `NoData` covers every "nothing to fuse yet"
    /// case: no GPS fix so far, no usable anchor pair, or no measurement
    /// parsed since startup. A request failure triggers a session restart
    /// before propagating.
    pub fn next_frame(&mut self) -> Result<FusionFrame, RangingError> {
        let gps = self.last_gps.clone().ok_or(RangingError::NoData)?;
        let selection = self.selector.select(&gps).ok_or(RangingError::NoData)?;

        if let Err(err) = self
            .session
            .ask_for_distances(&selection.nearest.address, &selection.second.address)
        {
            log::warn!("distance request failed ({err}), restarting session");
            let _ = self.session.restart();
            return Err(err);
        }

        let pair = self.session.last_measurement_pair().ok_or(RangingError::NoData)?;

        let mut frame = FusionFrame::new(
            pair,
            self.last_inertial.clone(),
            Some(gps),
            &self.config.freshness,
        );
        frame.calculate(&selection, self.algorithm, &self.config);

        self.stats.frames_produced += 1;
        if frame.is_valid {
            self.stats.valid_frames += 1;
        }
        self.records.push(frame.to_string());
        Ok(frame)
    }

    /// Stop the session and flush every accumulated frame record to the
    /// session log, appending if the file already exists.
    pub fn shutdown(&mut self, log_path: &Path) -> Result<(), TrackerError> {
        self.session.shutdown();
        if self.records.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new().create(true).append(true).open(log_path)?;
        for record in self.records.drain(..) {
            file.write_all(record.as_bytes())?;
        }
        log::info!("session log written to {}", log_path.display());
        Ok(())
    }
}
