//! # Telemetry Sample
//!
//! One decoded record from the remote transmitter.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Scale applied to latitude/longitude on the wire (degrees × 10^7)
pub const COORDINATE_SCALE: f64 = 10_000_000.0;

/// Scale applied to altitude on the wire (meters × 10^3, i.e. millimeters)
pub const ALTITUDE_SCALE: f64 = 1_000.0;

/// A single telemetry sample reported by the transmitter.
///
/// Samples are never modified after construction. The history buffer only
/// hands out shared references, and snapshots carry clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySample {
    /// Device-local milliseconds since boot. Resets with the device, so it is
    /// not comparable across reconnects.
    pub timestamp: u64,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Altitude in meters
    pub altitude: f64,

    /// Received signal strength in dBm
    pub rssi: f64,

    /// Signal-to-noise ratio in dB
    pub snr: f64,

    /// Wall-clock time the sample was accepted by the consumer
    pub received_at: DateTime<Local>,
}

impl TelemetrySample {
    /// Build a sample from the raw fixed-point wire values.
    pub fn from_fixed_point(
        timestamp: u64,
        lat_fixed: f64,
        lon_fixed: f64,
        alt_fixed: f64,
        rssi: f64,
        snr: f64,
        received_at: DateTime<Local>,
    ) -> Self {
        Self {
            timestamp,
            latitude: lat_fixed / COORDINATE_SCALE,
            longitude: lon_fixed / COORDINATE_SCALE,
            altitude: alt_fixed / ALTITUDE_SCALE,
            rssi,
            snr,
            received_at,
        }
    }
}
