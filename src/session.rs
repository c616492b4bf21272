// Ranging session protocol manager. The device protocol is not strictly
// request/response: answers arrive asynchronously on the measurement stream
// and may be stale or duplicated, so a background worker continuously drains
// the stream line-by-line into a bounded drop-oldest queue, and consumers
// pull the oldest unread line on demand. The queue is the only state shared
// between the worker and the caller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::error::{RangingError, TransportError};
use crate::protocol::RangingPair;
use crate::transport::{MeasurementStream, RangingLink};

/// Session states. `Faulted` is reachable from anywhere on transport
/// failure, and `restart()` is the only way out of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Requesting,
    Awaiting,
    Faulted,
}

/// Strict-FIFO queue of raw measurement lines with a fixed capacity; when
/// full, the oldest unread entry is evicted to make room.
#[derive(Clone)]
pub struct BoundedLineQueue {
    inner: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl BoundedLineQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        if let Ok(mut queue) = self.inner.lock() {
            if queue.len() >= self.capacity {
                queue.pop_front();
            }
            queue.push_back(line);
        }
    }

    pub fn pop(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|mut queue| queue.pop_front())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stateful manager for one ranging front-end.
pub struct RangingSession<L: RangingLink> {
    link: L,
    state: SessionState,
    queue: BoundedLineQueue,
    last_requested: Option<(String, String)>,
    last_pair: Option<RangingPair>,
    stream: Option<Box<dyn MeasurementStream>>,
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl<L: RangingLink> std::fmt::Debug for RangingSession<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangingSession")
            .field("state", &self.state)
            .field("last_requested", &self.last_requested)
            .field("last_pair", &self.last_pair)
            .finish_non_exhaustive()
    }
}

impl<L: RangingLink> RangingSession<L> {
    /// Open the device and build the session. A transport failure here is
    /// fatal: the session object is not constructed and must not be retried
    /// without rebuilding the link.
    pub fn new(
        mut link: L,
        stream: Option<Box<dyn MeasurementStream>>,
        config: &TrackerConfig,
    ) -> Result<Self, RangingError> {
        link.open().map_err(|err| RangingError::Fatal(err.to_string()))?;
        Ok(Self {
            link,
            state: SessionState::Disconnected,
            queue: BoundedLineQueue::new(config.queue_capacity),
            last_requested: None,
            last_pair: None,
            stream,
            worker: None,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Establish the link and start the reader worker (once). Failure here
    /// is recoverable via `restart()`.
    pub fn connect(&mut self) -> Result<(), RangingError> {
        if let Err(err) = self.link.connect() {
            self.state = SessionState::Faulted;
            return Err(RangingError::Connection(err));
        }
        self.spawn_reader();
        self.state = SessionState::Connected;
        log::info!("ranging session connected");
        Ok(())
    }

    /// Send a distance request to two anchors. A repeat of the last-issued
    /// pair is a no-op; a missing characteristic is logged and swallowed; a
    /// write failure faults the session.
    pub fn ask_for_distances(&mut self, address_1: &str, address_2: &str) -> Result<(), RangingError> {
        if self
            .last_requested
            .as_ref()
            .is_some_and(|(a, b)| a == address_1 && b == address_2)
        {
            return Ok(());
        }
        self.last_requested = Some((address_1.to_string(), address_2.to_string()));

        let message = format!("{address_1}{address_2}");
        self.state = SessionState::Requesting;
        log::debug!("requesting distances from {address_1} and {address_2}");
        match self.link.write_request(message.as_bytes()) {
            Ok(()) => {
                self.state = SessionState::Awaiting;
                Ok(())
            }
            Err(TransportError::CharacteristicMissing(detail)) => {
                // The link is up but misconfigured; not worth faulting over.
                log::warn!("write skipped, characteristic not found: {detail}");
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(err) => {
                log::error!("ranging write failed: {err}");
                self.state = SessionState::Faulted;
                Err(RangingError::Connection(err))
            }
        }
    }

    /// Pop and parse the oldest queued line, replacing the cached pair on
    /// success. A malformed line is logged and the cached pair survives;
    /// `None` only before any pair has ever been parsed.
    pub fn last_measurement_pair(&mut self) -> Option<RangingPair> {
        if let Some(line) = self.queue.pop() {
            match RangingPair::parse(&line) {
                Ok(pair) => {
                    self.last_pair = Some(pair);
                    if self.state == SessionState::Awaiting {
                        self.state = SessionState::Connected;
                    }
                }
                Err(err) => log::warn!("ignoring measurement line: {err}"),
            }
        }
        self.last_pair.clone()
    }

    /// Request and retrieve a single-tag measurement. An answer from a
    /// different tag than requested is stale or cross-talk data and raises
    /// `AddressMismatch` instead of being returned silently.
    pub fn read(&mut self, address: &str) -> Result<crate::protocol::RangingMeasurement, RangingError> {
        if let Err(err) = self.ask_for_distances(address, address) {
            log::warn!("request failed ({err}), attempting session restart");
            let _ = self.restart();
            return Err(err);
        }
        let pair = self.last_measurement_pair().ok_or(RangingError::NoData)?;
        let measurement = pair.nearest;
        if measurement.tag_address != address {
            return Err(RangingError::AddressMismatch {
                requested: address.to_string(),
                got: measurement.tag_address,
            });
        }
        Ok(measurement)
    }

    /// Best-effort recovery: disconnect, reset session-local state, issue an
    /// out-of-band hardware reset, reconnect. Every step runs even if an
    /// earlier one fails; the session ends `Connected` only if the final
    /// reconnect succeeds.
    pub fn restart(&mut self) -> Result<(), RangingError> {
        log::warn!("restarting ranging session");
        self.disconnect();
        self.last_requested = None;
        self.last_pair = None;

        if let Err(err) = self.link.hardware_reset() {
            log::error!("hardware reset failed: {err}");
        }

        match self.link.connect() {
            Ok(()) => {
                self.state = SessionState::Connected;
                log::info!("ranging session restarted");
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Faulted;
                log::error!("reconnect failed: {err}");
                Err(RangingError::Connection(err))
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.link.disconnect();
        self.state = SessionState::Disconnected;
    }

    /// Cooperative shutdown: stop the reader worker and drop the link.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.disconnect();
    }

    fn spawn_reader(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        let queue = self.queue.clone();
        let stop = Arc::clone(&self.stop);
        self.worker = Some(std::thread::spawn(move || loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match stream.read_line() {
                Ok(line) => queue.push(line),
                Err(TransportError::TimedOut) => continue,
                Err(TransportError::Closed) => {
                    log::info!("measurement stream closed, reader exiting");
                    break;
                }
                Err(err) => {
                    log::warn!("measurement stream read failed: {err}");
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }));
    }
}

impl<L: RangingLink> Drop for RangingSession<L> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockLink, ScriptedStream};

    fn session_with(link: MockLink) -> RangingSession<MockLink> {
        RangingSession::new(link, None, &TrackerConfig::default()).unwrap()
    }

    const PAIR_LINE: &str = "AA:05x|12.34|5.6_BB:02x|9.87|4.3";

    #[test]
    fn queue_evicts_oldest_at_capacity() {
        let queue = BoundedLineQueue::new(5);
        for i in 1..=7 {
            queue.push(format!("line-{i}"));
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.pop().as_deref(), Some("line-3"));
        assert_eq!(queue.pop().as_deref(), Some("line-4"));
        assert_eq!(queue.pop().as_deref(), Some("line-5"));
        assert_eq!(queue.pop().as_deref(), Some("line-6"));
        assert_eq!(queue.pop().as_deref(), Some("line-7"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn repeated_request_issues_one_write() {
        let link = MockLink::healthy();
        let writes = Arc::clone(&link.writes);
        let mut session = session_with(link);
        session.connect().unwrap();

        session.ask_for_distances("AA:05", "BB:02").unwrap();
        session.ask_for_distances("AA:05", "BB:02").unwrap();
        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], "AA:05BB:02");
    }

    #[test]
    fn changed_request_writes_again() {
        let link = MockLink::healthy();
        let writes = Arc::clone(&link.writes);
        let mut session = session_with(link);
        session.connect().unwrap();

        session.ask_for_distances("AA:05", "BB:02").unwrap();
        session.ask_for_distances("BB:02", "CC:03").unwrap();
        assert_eq!(writes.lock().unwrap().len(), 2);
    }

    #[test]
    fn missing_characteristic_is_swallowed() {
        let link = MockLink { missing_characteristic: true, ..MockLink::healthy() };
        let mut session = session_with(link);
        session.connect().unwrap();
        assert!(session.ask_for_distances("AA:05", "BB:02").is_ok());
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn write_failure_faults_the_session() {
        let link = MockLink { fail_write: true, ..MockLink::healthy() };
        let mut session = session_with(link);
        session.connect().unwrap();
        let err = session.ask_for_distances("AA:05", "BB:02").unwrap_err();
        assert!(matches!(err, RangingError::Connection(_)));
        assert_eq!(session.state(), SessionState::Faulted);
    }

    #[test]
    fn construction_failure_is_fatal() {
        let link = MockLink { fail_open: true, ..MockLink::healthy() };
        let err = RangingSession::new(link, None, &TrackerConfig::default()).unwrap_err();
        assert!(matches!(err, RangingError::Fatal(_)));
    }

    #[test]
    fn malformed_line_keeps_cached_pair() {
        let mut session = session_with(MockLink::healthy());
        session.connect().unwrap();

        session.queue.push(PAIR_LINE.to_string());
        let first = session.last_measurement_pair().unwrap();
        assert_eq!(first.nearest.tag_address, "AA:05");

        session.queue.push("garbage with no separators".to_string());
        let second = session.last_measurement_pair().unwrap();
        assert_eq!(second.nearest.tag_address, "AA:05");
        assert_eq!(second.nearest.distance, first.nearest.distance);
    }

    #[test]
    fn no_pair_before_first_parse() {
        let mut session = session_with(MockLink::healthy());
        session.connect().unwrap();
        assert!(session.last_measurement_pair().is_none());
    }

    #[test]
    fn read_raises_address_mismatch() {
        let mut session = session_with(MockLink::healthy());
        session.connect().unwrap();
        session.queue.push(PAIR_LINE.to_string());

        // The queued answer is tagged AA:05; asking for BB:02 must not
        // return it silently.
        let err = session.read("BB:02").unwrap_err();
        assert!(matches!(err, RangingError::AddressMismatch { .. }));
    }

    #[test]
    fn read_returns_matching_measurement() {
        let mut session = session_with(MockLink::healthy());
        session.connect().unwrap();
        session.queue.push(PAIR_LINE.to_string());

        let measurement = session.read("AA:05").unwrap();
        assert_eq!(measurement.distance, 12.34);
    }

    #[test]
    fn restart_resets_dedup_state_and_resets_hardware() {
        let link = MockLink::healthy();
        let writes = Arc::clone(&link.writes);
        let resets = Arc::clone(&link.resets);
        let mut session = session_with(link);
        session.connect().unwrap();

        session.ask_for_distances("AA:05", "BB:02").unwrap();
        session.queue.push(PAIR_LINE.to_string());
        session.last_measurement_pair().unwrap();

        session.restart().unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(resets.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert!(session.last_measurement_pair().is_none());

        // Same addresses again: dedup state was cleared, so a new write goes
        // out.
        session.ask_for_distances("AA:05", "BB:02").unwrap();
        assert_eq!(writes.lock().unwrap().len(), 2);
    }

    #[test]
    fn restart_stays_faulted_when_reconnect_fails() {
        let mut link = MockLink::healthy();
        link.fail_connect = true;
        let mut session = session_with(link);
        assert!(session.connect().is_err());
        assert!(session.restart().is_err());
        assert_eq!(session.state(), SessionState::Faulted);
    }

    #[test]
    fn reader_worker_feeds_the_queue() {
        let stream = ScriptedStream::new(vec![
            PAIR_LINE.to_string(),
            "CC:03x|1.0|2.0_DD:04x|3.0|4.0".to_string(),
        ]);
        let mut session = RangingSession::new(
            MockLink::healthy(),
            Some(Box::new(stream)),
            &TrackerConfig::default(),
        )
        .unwrap();
        session.connect().unwrap();

        let mut pair = None;
        for _ in 0..100 {
            pair = session.last_measurement_pair();
            if pair.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let pair = pair.expect("worker should have delivered a pair");
        assert_eq!(pair.nearest.tag_address, "AA:05");
        session.shutdown();
    }
}
