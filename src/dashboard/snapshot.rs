//! # Dashboard Snapshots
//!
//! Immutable views of the dashboard handed to presentation, plus the text and
//! JSON renderings used by the command-line front end.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write;

use crate::error::Result;
use crate::link::{LinkBudgetResult, LinkParameters, MarginQuality, ReceiverLocation};
use crate::telemetry::TelemetrySample;

/// Link metrics, or the reason they cannot be computed yet
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum LinkStatus {
    /// No telemetry has been accepted yet
    NoTelemetry,

    /// No receiver location is set
    NoReceiver,

    /// Metrics for the newest sample
    Available(LinkBudgetResult),
}

impl LinkStatus {
    pub fn result(&self) -> Option<LinkBudgetResult> {
        match self {
            LinkStatus::Available(result) => Some(*result),
            _ => None,
        }
    }
}

/// Where an operator-visible error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Parse,
    Transport,
}

/// An error shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub at: DateTime<Local>,
    pub source: ErrorSource,
    pub message: String,
}

/// Running ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Records parsed and appended to history
    pub accepted: u64,

    /// Records that failed to parse
    pub rejected: u64,

    /// Transport failures reported by readers
    pub transport_errors: u64,
}

/// Point-in-time view of the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub taken_at: DateTime<Local>,

    /// Port of the running reader, if connected
    pub connected_port: Option<String>,

    pub latest: Option<TelemetrySample>,
    pub receiver: Option<ReceiverLocation>,
    pub parameters: LinkParameters,
    pub link: LinkStatus,

    /// Midpoint between receiver and transmitter, for centring a map
    pub map_center: Option<(f64, f64)>,

    /// Most recent samples, oldest first
    pub history: Vec<TelemetrySample>,

    pub errors: Vec<ErrorEvent>,
    pub stats: IngestStats,
}

impl DashboardSnapshot {
    /// Attach connection state owned by the serial link.
    pub fn with_connection(mut self, port: Option<&str>) -> Self {
        self.connected_port = port.map(str::to_string);
        self
    }

    /// Qualitative margin rating, when metrics are available
    pub fn quality(&self) -> Option<MarginQuality> {
        self.link.result().map(|result| result.quality())
    }

    /// Serialize as a single JSON line.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Render a human-readable dashboard.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "=== Link Budget Analysis @ {} ===", self.taken_at.format("%H:%M:%S"));
        match &self.connected_port {
            Some(port) => {
                let _ = writeln!(out, "Connected: {}", port);
            }
            None => {
                let _ = writeln!(out, "Disconnected");
            }
        }
        let _ = writeln!(
            out,
            "Samples: {} accepted, {} rejected, {} transport errors",
            self.stats.accepted, self.stats.rejected, self.stats.transport_errors
        );

        match &self.latest {
            Some(latest) => {
                let _ = writeln!(out, "\n--- Current Readings ---");
                let _ = writeln!(
                    out,
                    "Latitude   {:>12.6}°   RSSI      {:>7.1} dBm",
                    latest.latitude, latest.rssi
                );
                let _ = writeln!(
                    out,
                    "Longitude  {:>12.6}°   SNR       {:>7.1} dB",
                    latest.longitude, latest.snr
                );
                let _ = writeln!(
                    out,
                    "Altitude   {:>12.1} m   Timestamp {} ms",
                    latest.altitude, latest.timestamp
                );
            }
            None => {
                let _ = writeln!(out, "\nNo data received yet. Check serial connection.");
            }
        }

        match self.link {
            LinkStatus::Available(result) => {
                let _ = writeln!(out, "\n--- Link Budget ---");
                let _ = writeln!(out, "Distance               {:>9.3} km", result.distance_km);
                let _ = writeln!(out, "Free Space Path Loss   {:>9.1} dB", result.fspl_db);
                let _ = writeln!(
                    out,
                    "Link Margin            {:>9.1} dB ({})",
                    result.link_margin_db,
                    result.quality()
                );
                let _ = writeln!(
                    out,
                    "Theoretical Rx Power   {:>9.1} dBm",
                    result.theoretical_rx_power_dbm
                );
                if let Some(latest) = &self.latest {
                    let _ = writeln!(out, "Actual RSSI            {:>9.1} dBm", latest.rssi);
                }
                let _ = writeln!(
                    out,
                    "Power Difference       {:>9.1} dB",
                    result.power_difference_db
                );
            }
            LinkStatus::NoReceiver => {
                let _ = writeln!(out, "\nSet a receiver location to compute the link budget.");
            }
            LinkStatus::NoTelemetry => {}
        }

        if let (Some(receiver), Some((lat, lon))) = (&self.receiver, self.map_center) {
            let _ = writeln!(
                out,
                "\nReceiver {} at {:.6}, {:.6}; map centre {:.6}, {:.6}",
                receiver.label, receiver.latitude, receiver.longitude, lat, lon
            );
        }

        if !self.history.is_empty() {
            let _ = writeln!(out, "\n--- Recent Data History ---");
            let _ = writeln!(
                out,
                "{:<8} {:>11} {:>12} {:>9} {:>7} {:>6} {:>10}",
                "time", "latitude", "longitude", "altitude", "rssi", "snr", "timestamp"
            );
            for sample in &self.history {
                let _ = writeln!(
                    out,
                    "{:<8} {:>11.6} {:>12.6} {:>9.1} {:>7.1} {:>6.1} {:>10}",
                    sample.received_at.format("%H:%M:%S"),
                    sample.latitude,
                    sample.longitude,
                    sample.altitude,
                    sample.rssi,
                    sample.snr,
                    sample.timestamp
                );
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\n--- Errors ---");
            for event in &self.errors {
                let _ = writeln!(
                    out,
                    "{} [{:?}] {}",
                    event.at.format("%H:%M:%S"),
                    event.source,
                    event.message
                );
            }
        }

        out
    }
}
