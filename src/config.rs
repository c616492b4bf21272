use crate::types::Anchor;

/// Staleness budgets, one per measurement source, in seconds.
#[derive(Clone, Debug)]
pub struct FreshnessBudgets {
    pub ranging_secs: f64,
    pub inertial_secs: f64,
    pub gps_secs: f64,
}

impl Default for FreshnessBudgets {
    fn default() -> Self {
        Self { ranging_secs: 1.0, inertial_secs: 1.0, gps_secs: 5.0 }
    }
}

/// Immutable tracker configuration, constructed once at process start and
/// passed by reference to every component that needs it.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// MAC address of the UWB front-end.
    pub device_address: String,
    /// GATT service exposing the ranging characteristics.
    pub service_uuid: String,
    pub read_characteristic_uuid: String,
    pub write_characteristic_uuid: String,
    /// Serial port carrying the measurement stream.
    pub uwb_serial_path: String,
    pub gps_serial_path: String,

    /// Cap on the range offset-scaling correction (ratio, >= 1.0).
    pub max_offset_scale: f64,
    /// Per-step growth of the offset scale factor.
    pub offset_scale_step: f64,

    /// Capacity of the raw measurement line queue.
    pub queue_capacity: usize,

    pub freshness: FreshnessBudgets,

    /// Surveyed anchor set. At least two anchors are needed for ranging.
    pub anchors: Vec<Anchor>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            device_address: "90:84:2B:4A:3A:0C".to_string(),
            service_uuid: "50218d18-bc42-11ed-afa1-0242ac120002".to_string(),
            read_characteristic_uuid: "57eb6e60-bc42-11ed-afa1-0242ac120002".to_string(),
            write_characteristic_uuid: "5b28fd72-bc42-11ed-afa1-0242ac120002".to_string(),
            uwb_serial_path: "/dev/UWB".to_string(),
            gps_serial_path: "/dev/GPS".to_string(),
            max_offset_scale: 1.15,
            offset_scale_step: 0.005,
            queue_capacity: 5,
            freshness: FreshnessBudgets::default(),
            // Demo ring roughly 30 m across; production deployments supply
            // their own surveyed set.
            anchors: vec![
                Anchor::new("C0:01", 50.28780, 18.67750),
                Anchor::new("C0:02", 50.28780, 18.67792),
                Anchor::new("C0:03", 50.28753, 18.67792),
                Anchor::new("C0:04", 50.28753, 18.67750),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = TrackerConfig::default();
        assert!(config.max_offset_scale >= 1.0);
        assert!(config.offset_scale_step > 0.0);
        assert_eq!(config.queue_capacity, 5);
        assert!(config.anchors.len() >= 2);
    }
}
