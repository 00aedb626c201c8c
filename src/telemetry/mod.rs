//! # Telemetry Module
//!
//! Transmitter telemetry records received over the serial link.
//!
//! This module handles:
//! - Parsing comma-delimited records into [`TelemetrySample`]s
//! - Decoding the fixed-point latitude/longitude/altitude encoding
//! - Keeping a bounded, arrival-ordered history of recent samples

pub mod sample;
pub mod parser;
pub mod history;

pub use history::{HistoryBuffer, HISTORY_CAPACITY};
pub use parser::{parse_sample, ParseError};
pub use sample::TelemetrySample;
