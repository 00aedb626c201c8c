//! # Telemetry Record Parser
//!
//! Decodes one line of the serial wire format:
//!
//! ```text
//! timestamp,lat_fixed,lon_fixed,alt_fixed,rssi,snr
//! ```
//!
//! `lat_fixed`/`lon_fixed` are degrees × 10^7 and `alt_fixed` is millimeters.
//! Fields beyond the sixth are ignored.

use chrono::{DateTime, Local};
use thiserror::Error;

use super::sample::TelemetrySample;

/// Field delimiter used by the transmitter
pub const FIELD_DELIMITER: char = ',';

/// Minimum number of fields in a valid record
pub const MIN_FIELDS: usize = 6;

/// Reasons a line was rejected as a telemetry record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Line has no delimiter at all
    #[error("no '{FIELD_DELIMITER}' delimiter in record")]
    MissingDelimiter,

    /// Line has fewer than six fields
    #[error("expected at least {MIN_FIELDS} fields, found {found}")]
    TooFewFields { found: usize },

    /// A field could not be converted to a number
    #[error("invalid {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Parse a raw telemetry line into a sample stamped with `received_at`.
///
/// # Arguments
///
/// * `line` - One record without its line terminator
/// * `received_at` - Wall-clock acceptance time assigned by the caller
///
/// # Errors
///
/// Returns error if:
/// - The line contains no comma
/// - Fewer than six fields are present
/// - Any of the six fields is not numeric
///
/// # Examples
///
/// ```
/// use chrono::Local;
/// use link_budget_monitor::telemetry::parse_sample;
///
/// let sample = parse_sample("1000,185204000,738567000,100000,-95.0,8.0", Local::now())?;
/// assert_eq!(sample.latitude, 18.5204);
/// assert_eq!(sample.altitude, 100.0);
/// # Ok::<(), link_budget_monitor::telemetry::ParseError>(())
/// ```
pub fn parse_sample(line: &str, received_at: DateTime<Local>) -> Result<TelemetrySample, ParseError> {
    if !line.contains(FIELD_DELIMITER) {
        return Err(ParseError::MissingDelimiter);
    }

    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() < MIN_FIELDS {
        return Err(ParseError::TooFewFields { found: fields.len() });
    }

    let timestamp = parse_integer("timestamp", fields[0])?;
    let lat_fixed = parse_float("latitude", fields[1])?;
    let lon_fixed = parse_float("longitude", fields[2])?;
    let alt_fixed = parse_float("altitude", fields[3])?;
    let rssi = parse_float("rssi", fields[4])?;
    let snr = parse_float("snr", fields[5])?;

    Ok(TelemetrySample::from_fixed_point(
        timestamp, lat_fixed, lon_fixed, alt_fixed, rssi, snr, received_at,
    ))
}

fn parse_integer(field: &'static str, raw: &str) -> Result<u64, ParseError> {
    raw.trim().parse().map_err(|_| ParseError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

fn parse_float(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    raw.trim().parse().map_err(|_| ParseError::InvalidField {
        field,
        value: raw.to_string(),
    })
}
