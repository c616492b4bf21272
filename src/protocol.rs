// Ranging line grammar. One device emission per line:
//
//   single block:  "<addr><rest>|<distance>|<power>"
//   pair:          "<block>_<block>"
//
// The tag address is the first five characters of the first field. A
// distance field equal to the timeout marker means the device gave up on
// that tag; it parses into a measurement with `valid = false` rather than an
// error. Anything else that does not fit the grammar is malformed.

use serde::{Deserialize, Serialize};

use crate::error::RangingError;
use crate::types::{current_timestamp, Stamped};

/// Distance field emitted by the device when a tag did not answer in time.
pub const TIMEOUT_MARKER: &str = "Timed out!";

/// Number of leading characters of the first field that carry the address.
const ADDRESS_LEN: usize = 5;

/// One distance measurement to a single anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangingMeasurement {
    pub tag_address: String,
    /// Metres. Zero when `valid` is false.
    pub distance: f64,
    /// Received signal power as reported by the device.
    pub power: f64,
    /// False iff the device reported a timeout for this tag.
    pub valid: bool,
    pub timestamp: f64,
}

impl RangingMeasurement {
    pub fn new(tag_address: &str, distance: f64, power: f64) -> Self {
        Self {
            tag_address: tag_address.to_string(),
            distance,
            power,
            valid: true,
            timestamp: current_timestamp(),
        }
    }

    /// The device-reported timeout sentinel. Not an error.
    pub fn timed_out() -> Self {
        Self {
            tag_address: "none".to_string(),
            distance: 0.0,
            power: 0.0,
            valid: false,
            timestamp: current_timestamp(),
        }
    }

    /// Parse one `|`-delimited block.
    pub fn parse(block: &str) -> Result<Self, RangingError> {
        let fields: Vec<&str> = block.split('|').collect();
        if fields.len() < 2 {
            return Err(RangingError::Malformed(block.to_string()));
        }
        if fields[1] == TIMEOUT_MARKER {
            return Ok(Self::timed_out());
        }

        let tag_address: String = fields[0].chars().take(ADDRESS_LEN).collect();
        let distance: f64 = fields[1]
            .trim()
            .parse()
            .map_err(|_| RangingError::Malformed(block.to_string()))?;
        let power: f64 = fields
            .get(2)
            .ok_or_else(|| RangingError::Malformed(block.to_string()))?
            .trim()
            .parse()
            .map_err(|_| RangingError::Malformed(block.to_string()))?;

        Ok(Self::new(&tag_address, distance, power))
    }
}

impl Stamped for RangingMeasurement {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

impl std::fmt::Display for RangingMeasurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let validity = if self.valid { "valid" } else { "invalid" };
        write!(f, "{} {} {} {}", self.tag_address, self.distance, self.power, validity)
    }
}

/// The two measurements of one ranging cycle: nearest anchor first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangingPair {
    pub nearest: RangingMeasurement,
    pub second: RangingMeasurement,
}

impl RangingPair {
    pub fn new(nearest: RangingMeasurement, second: RangingMeasurement) -> Self {
        Self { nearest, second }
    }

    /// Parse a full pair line (two `_`-joined blocks).
    pub fn parse(line: &str) -> Result<Self, RangingError> {
        let blocks: Vec<&str> = line.split('_').collect();
        if blocks.len() < 2 {
            return Err(RangingError::Malformed(line.to_string()));
        }
        Ok(Self::new(
            RangingMeasurement::parse(blocks[0])?,
            RangingMeasurement::parse(blocks[1])?,
        ))
    }
}

impl std::fmt::Display for RangingPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nearest: {}\nSecond: {}", self.nearest, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_pair_line() {
        let pair = RangingPair::parse("AA:05rest|12.34|5.6_BB:02rest|9.87|4.3").unwrap();
        assert_eq!(pair.nearest.tag_address, "AA:05");
        assert_eq!(pair.nearest.distance, 12.34);
        assert_eq!(pair.nearest.power, 5.6);
        assert!(pair.nearest.valid);
        assert_eq!(pair.second.tag_address, "BB:02");
        assert_eq!(pair.second.distance, 9.87);
    }

    #[test]
    fn single_block_line_is_malformed() {
        let err = RangingPair::parse("AA:05rest|12.34|5.6").unwrap_err();
        assert!(matches!(err, RangingError::Malformed(_)));
    }

    #[test]
    fn too_few_fields_is_malformed() {
        assert!(matches!(
            RangingMeasurement::parse("AA:05rest"),
            Err(RangingError::Malformed(_))
        ));
        assert!(matches!(
            RangingMeasurement::parse("AA:05|not-a-number|1.0"),
            Err(RangingError::Malformed(_))
        ));
        assert!(matches!(
            RangingMeasurement::parse("AA:05|12.0"),
            Err(RangingError::Malformed(_))
        ));
    }

    #[test]
    fn timeout_marker_is_a_sentinel_not_an_error() {
        let measurement = RangingMeasurement::parse("AA:05rest|Timed out!|0").unwrap();
        assert!(!measurement.valid);
        assert_eq!(measurement.distance, 0.0);

        // Also inside a pair.
        let pair = RangingPair::parse("AA:05|Timed out!_BB:02x|3.5|1.0").unwrap();
        assert!(!pair.nearest.valid);
        assert!(pair.second.valid);
        assert_eq!(pair.second.tag_address, "BB:02");
    }

    #[test]
    fn record_line_format() {
        let measurement = RangingMeasurement::new("AA:05", 12.5, -80.0);
        assert_eq!(measurement.to_string(), "AA:05 12.5 -80 valid");
        assert_eq!(RangingMeasurement::timed_out().to_string(), "none 0 0 invalid");
    }
}
