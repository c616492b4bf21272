use thiserror::Error;

/// Failures on the underlying BLE/serial link.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Device could not be reached at all (discovery/open failure).
    #[error("device not found: {0}")]
    DeviceMissing(String),

    /// GATT service or characteristic missing on an otherwise live link.
    #[error("characteristic or service not found: {0}")]
    CharacteristicMissing(String),

    #[error("link not connected")]
    NotConnected,

    #[error("transport I/O failed: {0}")]
    Io(String),

    /// Benign read timeout on the measurement stream; the reader retries.
    #[error("read timed out")]
    TimedOut,

    /// The measurement stream will produce no further lines.
    #[error("stream closed")]
    Closed,
}

/// Ranging-layer failures surfaced to the caller.
///
/// Degenerate geometry and stale fusion inputs are *not* here — those are
/// absorbed locally as sentinel values and validity flags. A device-reported
/// timeout is not an error either; it parses into a measurement with
/// `valid = false`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangingError {
    /// Line failed the ranging grammar. Recoverable; the previously cached
    /// pair stays in effect.
    #[error("malformed ranging line: {0}")]
    Malformed(String),

    /// A tag other than the requested one answered (stale or cross-talk
    /// data). Surfaced so stale-data bugs stay visible.
    #[error("tag {got} answered a request for {requested}")]
    AddressMismatch { requested: String, got: String },

    /// Write/connect failure on the link. Recoverable via `restart()`.
    #[error("ranging link failure: {0}")]
    Connection(#[from] TransportError),

    /// Transport unavailable at session construction. Unrecoverable: the
    /// session must not be used.
    #[error("ranging device unavailable at construction: {0}")]
    Fatal(String),

    /// The measurement queue has never produced a pair (or no GPS fix /
    /// anchor pair is available to request against).
    #[error("no measurement available")]
    NoData,
}

/// Top-level tracker failures.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Ranging(#[from] RangingError),

    #[error("session log write failed: {0}")]
    Io(#[from] std::io::Error),
}
