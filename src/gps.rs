// Thin NMEA GGA decoding: just enough to turn the receiver's sentences into
// signed decimal-degree fixes. A fix is accepted only when at least one
// satellite contributed to it.

use crate::types::GpsFix;

/// Decode one GGA sentence. Returns `None` for non-GGA sentences, fixes
/// without satellites, and malformed coordinate fields.
pub fn parse_gga(line: &str) -> Option<GpsFix> {
    let fields: Vec<&str> = line.trim().split(',').collect();
    if fields.len() < 8 || !fields[0].ends_with("GGA") {
        return None;
    }

    let satellites: u32 = fields[7].trim().parse().ok()?;
    if satellites == 0 {
        return None;
    }

    let mut latitude = ddmm_to_degrees(fields[2], 2)?;
    if fields[3] == "S" {
        latitude = -latitude;
    }
    let mut longitude = ddmm_to_degrees(fields[4], 3)?;
    if fields[5] == "W" {
        longitude = -longitude;
    }

    Some(GpsFix::new(latitude, longitude))
}

/// `ddmm.mmm` (or `dddmm.mmm`) to decimal degrees: whole degrees plus
/// minutes over sixty.
fn ddmm_to_degrees(raw: &str, degree_digits: usize) -> Option<f64> {
    if raw.len() <= degree_digits || !raw.is_char_boundary(degree_digits) {
        return None;
    }
    let degrees: f64 = raw[..degree_digits].parse().ok()?;
    let minutes: f64 = raw[degree_digits..].parse().ok()?;
    Some(degrees + minutes / 60.0)
}
