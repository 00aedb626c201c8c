//! # Link Budget Calculator
//!
//! Compares the theoretical received power predicted by free-space propagation
//! with the RSSI actually reported by the transmitter's peer radio.
//!
//! ```text
//! FSPL        = 20·log10(d_km) + 20·log10(f_MHz) + 32.44
//! P_rx,theory = P_tx + G_tx + G_rx - FSPL - L_filter
//! margin      = RSSI - sensitivity
//! difference  = RSSI - P_rx,theory
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::geodesy::haversine_km;
use super::receiver::ReceiverLocation;
use crate::error::{LinkMonitorError, Result};
use crate::telemetry::TelemetrySample;

/// FSPL constant for distance in km and frequency in MHz.
///
/// Tied to that unit pairing; a different pairing needs a different constant.
pub const FSPL_CONSTANT_KM_MHZ: f64 = 32.44;

/// Margin above which the link is rated [`MarginQuality::Good`]
pub const GOOD_MARGIN_DB: f64 = 10.0;

/// Margin below which the link is rated [`MarginQuality::Poor`]
pub const POOR_MARGIN_DB: f64 = 0.0;

/// Allowed transmitter power range (dBm)
pub const TX_POWER_RANGE_DBM: (f64, f64) = (-30.0, 30.0);
/// Allowed antenna gain range, both ends (dBi)
pub const ANTENNA_GAIN_RANGE_DBI: (f64, f64) = (-10.0, 20.0);
/// Allowed receiver sensitivity range (dBm)
pub const RX_SENSITIVITY_RANGE_DBM: (f64, f64) = (-150.0, -50.0);
/// Allowed receiver filter loss range (dB)
pub const FILTER_LOSS_RANGE_DB: (f64, f64) = (0.0, 10.0);
/// Allowed carrier frequency range (MHz)
pub const FREQUENCY_RANGE_MHZ: (f64, f64) = (100.0, 3000.0);

/// Operator-configured RF parameters of the link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParameters {
    /// Transmitter output power in dBm
    pub tx_power_dbm: f64,

    /// Transmitter antenna gain in dBi
    pub tx_gain_dbi: f64,

    /// Receiver antenna gain in dBi
    pub rx_gain_dbi: f64,

    /// Receiver sensitivity in dBm
    pub rx_sensitivity_dbm: f64,

    /// Receiver front-end filter loss in dB
    pub filter_loss_db: f64,

    /// Carrier frequency in MHz
    pub frequency_mhz: f64,
}

impl Default for LinkParameters {
    fn default() -> Self {
        Self {
            tx_power_dbm: 20.0,
            tx_gain_dbi: 2.0,
            rx_gain_dbi: 2.0,
            rx_sensitivity_dbm: -110.0,
            filter_loss_db: 2.0,
            frequency_mhz: 915.0,
        }
    }
}

impl LinkParameters {
    /// Check every parameter against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`LinkMonitorError::InvalidParameter`] naming the first
    /// out-of-range (or non-finite) value.
    pub fn validate(&self) -> Result<()> {
        for (name, value, (min, max)) in [
            ("tx_power_dbm", self.tx_power_dbm, TX_POWER_RANGE_DBM),
            ("tx_gain_dbi", self.tx_gain_dbi, ANTENNA_GAIN_RANGE_DBI),
            ("rx_gain_dbi", self.rx_gain_dbi, ANTENNA_GAIN_RANGE_DBI),
            ("rx_sensitivity_dbm", self.rx_sensitivity_dbm, RX_SENSITIVITY_RANGE_DBM),
            ("filter_loss_db", self.filter_loss_db, FILTER_LOSS_RANGE_DB),
            ("frequency_mhz", self.frequency_mhz, FREQUENCY_RANGE_MHZ),
        ] {
            if !(min..=max).contains(&value) {
                return Err(LinkMonitorError::InvalidParameter { name, value, min, max });
            }
        }
        Ok(())
    }
}

/// Qualitative rating of the link margin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarginQuality {
    Good,
    Fair,
    Poor,
}

impl MarginQuality {
    /// Rate a link margin.
    ///
    /// Both thresholds are strict: exactly 10 dB and exactly 0 dB are `Fair`.
    pub fn classify(link_margin_db: f64) -> Self {
        if link_margin_db > GOOD_MARGIN_DB {
            MarginQuality::Good
        } else if link_margin_db < POOR_MARGIN_DB {
            MarginQuality::Poor
        } else {
            MarginQuality::Fair
        }
    }
}

impl fmt::Display for MarginQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MarginQuality::Good => "Good",
            MarginQuality::Fair => "Fair",
            MarginQuality::Poor => "Poor",
        };
        f.write_str(label)
    }
}

/// Derived link metrics for one telemetry sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkBudgetResult {
    /// Receiver to transmitter great-circle distance in km
    pub distance_km: f64,

    /// Free-space path loss in dB (0 for zero distance)
    pub fspl_db: f64,

    /// Received power predicted by the link budget in dBm
    pub theoretical_rx_power_dbm: f64,

    /// RSSI headroom above receiver sensitivity in dB
    pub link_margin_db: f64,

    /// Measured RSSI minus theoretical received power in dB
    pub power_difference_db: f64,
}

impl LinkBudgetResult {
    /// Qualitative rating of [`Self::link_margin_db`]
    pub fn quality(&self) -> MarginQuality {
        MarginQuality::classify(self.link_margin_db)
    }
}

/// Free-space path loss in dB for a distance in km and frequency in MHz.
///
/// Returns `0.0` when the distance is zero (or negative) instead of taking the
/// logarithm of zero.
pub fn free_space_path_loss_db(distance_km: f64, frequency_mhz: f64) -> f64 {
    if distance_km <= 0.0 {
        return 0.0;
    }
    20.0 * distance_km.log10() + 20.0 * frequency_mhz.log10() + FSPL_CONSTANT_KM_MHZ
}

/// Received power predicted by the link budget in dBm.
pub fn theoretical_rx_power_dbm(params: &LinkParameters, fspl_db: f64) -> f64 {
    params.tx_power_dbm + params.tx_gain_dbi + params.rx_gain_dbi - fspl_db - params.filter_loss_db
}

/// Compute the link budget for the latest sample.
///
/// Pure: the same inputs always give the same result.
///
/// # Examples
///
/// ```
/// use chrono::Local;
/// use link_budget_monitor::link::{compute, LinkParameters, ReceiverLocation};
/// use link_budget_monitor::telemetry::parse_sample;
///
/// let sample = parse_sample("1000,185204000,738567000,100000,-95.0,8.0", Local::now())?;
/// let receiver = ReceiverLocation::new(18.5204, 73.8567, "Base");
/// let result = compute(&receiver, &sample, &LinkParameters::default());
///
/// assert_eq!(result.distance_km, 0.0);
/// assert_eq!(result.fspl_db, 0.0);
/// assert_eq!(result.link_margin_db, 15.0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn compute(
    receiver: &ReceiverLocation,
    sample: &TelemetrySample,
    params: &LinkParameters,
) -> LinkBudgetResult {
    let distance_km = haversine_km(
        receiver.latitude,
        receiver.longitude,
        sample.latitude,
        sample.longitude,
    );
    let fspl_db = free_space_path_loss_db(distance_km, params.frequency_mhz);
    let theoretical_rx_power_dbm = theoretical_rx_power_dbm(params, fspl_db);
    let link_margin_db = sample.rssi - params.rx_sensitivity_dbm;
    let power_difference_db = sample.rssi - theoretical_rx_power_dbm;

    LinkBudgetResult {
        distance_km,
        fspl_db,
        theoretical_rx_power_dbm,
        link_margin_db,
        power_difference_db,
    }
}
