//! # Receiver Location
//!
//! Where the ground receiver sits. Set by the operator, or seeded from an
//! external geolocation fix when one is available.

use serde::{Deserialize, Serialize};

/// Latitude used when no receiver position is known
pub const DEFAULT_RECEIVER_LATITUDE: f64 = 18.5204;

/// Longitude used when no receiver position is known
pub const DEFAULT_RECEIVER_LONGITUDE: f64 = 73.8567;

/// Label of the fallback position
pub const DEFAULT_RECEIVER_LABEL: &str = "Default Location";

/// Position fix supplied by an external geolocation provider
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Human-readable place name (e.g. city)
    pub label: String,
}

/// Receiver station location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverLocation {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Display name of the location
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_label() -> String {
    "Receiver".to_string()
}

impl ReceiverLocation {
    pub fn new(latitude: f64, longitude: f64, label: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            label: label.into(),
        }
    }

    /// The documented fallback location.
    pub fn fallback() -> Self {
        Self::new(
            DEFAULT_RECEIVER_LATITUDE,
            DEFAULT_RECEIVER_LONGITUDE,
            DEFAULT_RECEIVER_LABEL,
        )
    }

    /// Seed a location from an optional geolocation fix.
    ///
    /// A missing fix is not an error: the fallback location is used instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use link_budget_monitor::link::ReceiverLocation;
    ///
    /// let location = ReceiverLocation::resolve(None);
    /// assert_eq!(location.label, "Default Location");
    /// ```
    pub fn resolve(fix: Option<GeoFix>) -> Self {
        match fix {
            Some(fix) => Self::new(fix.latitude, fix.longitude, fix.label),
            None => Self::fallback(),
        }
    }
}
