//! UWB two-anchor position tracker.
//!
//! A tag carrying a UWB ranging front-end, a GPS receiver and an AHRS unit is
//! localized against a surveyed anchor set: each cycle the two anchors
//! nearest the current GPS fix are asked for distances, the answers are fused
//! with the latest sensor samples into a validated frame, and a trilateration
//! engine turns the two ranges into a geographic position.
//!
//! The crate is transport-agnostic: the BLE/serial drivers live behind the
//! [`transport::RangingLink`] and [`transport::MeasurementStream`] traits,
//! with in-memory mocks provided for tests and the demo binary.

pub mod anchors;
pub mod config;
pub mod error;
pub mod fusion;
pub mod geometry;
pub mod gps;
pub mod protocol;
pub mod session;
pub mod tracker;
pub mod transport;
pub mod types;

pub use config::TrackerConfig;
pub use error::{RangingError, TrackerError, TransportError};
pub use fusion::FusionFrame;
pub use geometry::Algorithm;
pub use tracker::PositionTracker;
pub use types::{Anchor, GpsFix, InertialSample, Point};
