// Boundary traits for the ranging hardware. The write/control side (BLE
// GATT in the field) and the line-oriented read side (serial) are separate
// devices, so they are separate traits; everything above this seam is
// transport-agnostic. Real drivers live outside this crate; the mocks below
// back the tests and the demo binary.

use crate::error::TransportError;

/// Write/control half of the ranging front-end.
pub trait RangingLink {
    /// Probe and open the device. Called once at session construction;
    /// failure there is fatal for the whole session.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Establish the link. Post-construction failures are recoverable.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Write one ranging request. No synchronous acknowledgement; answers
    /// arrive on the measurement stream.
    fn write_request(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    fn disconnect(&mut self);

    /// Out-of-band device reset addressed by serial port, used only during
    /// the session restart sequence.
    fn hardware_reset(&mut self) -> Result<(), TransportError>;
}

/// Read half: one device emission per line.
pub trait MeasurementStream: Send {
    fn read_line(&mut self) -> Result<String, TransportError>;
}

pub mod mock {
    use super::{MeasurementStream, RangingLink};
    use crate::error::TransportError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// In-memory link recording every write, with switchable failure modes.
    #[derive(Clone, Default)]
    pub struct MockLink {
        pub writes: Arc<Mutex<Vec<String>>>,
        pub resets: Arc<AtomicU32>,
        pub fail_open: bool,
        pub fail_connect: bool,
        pub fail_write: bool,
        pub missing_characteristic: bool,
        pub connected: Arc<Mutex<bool>>,
    }

    impl MockLink {
        pub fn healthy() -> Self {
            Self::default()
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().map(|w| w.len()).unwrap_or(0)
        }

        pub fn reset_count(&self) -> u32 {
            self.resets.load(Ordering::Relaxed)
        }
    }

    impl RangingLink for MockLink {
        fn open(&mut self) -> Result<(), TransportError> {
            if self.fail_open {
                return Err(TransportError::DeviceMissing("mock device".into()));
            }
            Ok(())
        }

        fn connect(&mut self) -> Result<(), TransportError> {
            if self.fail_connect {
                return Err(TransportError::Io("mock connect refused".into()));
            }
            if let Ok(mut connected) = self.connected.lock() {
                *connected = true;
            }
            Ok(())
        }

        fn write_request(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            if self.missing_characteristic {
                return Err(TransportError::CharacteristicMissing("write uuid".into()));
            }
            if self.fail_write {
                return Err(TransportError::Io("mock write failed".into()));
            }
            if let Ok(mut writes) = self.writes.lock() {
                writes.push(String::from_utf8_lossy(payload).into_owned());
            }
            Ok(())
        }

        fn disconnect(&mut self) {
            if let Ok(mut connected) = self.connected.lock() {
                *connected = false;
            }
        }

        fn hardware_reset(&mut self) -> Result<(), TransportError> {
            self.resets.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Replays a fixed list of lines, then reports the stream closed.
    pub struct ScriptedStream {
        lines: VecDeque<String>,
        interval: Duration,
    }

    impl ScriptedStream {
        pub fn new(lines: Vec<String>) -> Self {
            Self { lines: lines.into(), interval: Duration::from_millis(1) }
        }

        pub fn with_interval(lines: Vec<String>, interval: Duration) -> Self {
            Self { lines: lines.into(), interval }
        }
    }

    impl MeasurementStream for ScriptedStream {
        fn read_line(&mut self) -> Result<String, TransportError> {
            std::thread::sleep(self.interval);
            self.lines.pop_front().ok_or(TransportError::Closed)
        }
    }

    /// Endless synthetic pair emitter for running the binary without
    /// hardware: distances wander slowly around a base value.
    pub struct SyntheticStream {
        nearest_address: String,
        second_address: String,
        tick: u64,
        interval: Duration,
    }

    impl SyntheticStream {
        pub fn new(nearest_address: &str, second_address: &str, interval: Duration) -> Self {
            Self {
                nearest_address: nearest_address.to_string(),
                second_address: second_address.to_string(),
                tick: 0,
                interval,
            }
        }
    }

    impl MeasurementStream for SyntheticStream {
        fn read_line(&mut self) -> Result<String, TransportError> {
            std::thread::sleep(self.interval);
            self.tick += 1;
            let t = self.tick as f64 * 0.2;
            let distance_a = 18.0 + 3.0 * t.sin();
            let distance_b = 24.0 + 3.0 * t.cos();
            Ok(format!(
                "{}|{:.2}|{:.1}_{}|{:.2}|{:.1}",
                self.nearest_address,
                distance_a,
                -78.0 + t.sin(),
                self.second_address,
                distance_b,
                -80.0 + t.cos(),
            ))
        }
    }
}
