//! # Dashboard Module
//!
//! The consumer side of the ingestion pipeline.
//!
//! This module handles:
//! - Draining whatever the reader has enqueued, without waiting
//! - Parsing records and appending accepted samples to the history buffer
//! - Keeping a bounded log of parse and transport errors for the operator
//! - Picking up receiver/link-parameter edits published through [`OperatorControls`]
//! - Producing immutable [`DashboardSnapshot`]s for presentation
//!
//! ## Usage
//!
//! ```
//! use link_budget_monitor::dashboard::{Dashboard, DashboardSettings};
//! use link_budget_monitor::link::{LinkParameters, ReceiverLocation};
//! use link_budget_monitor::serial::reader::{ingest_channel, IngestItem};
//!
//! let (tx, rx) = ingest_channel();
//! let (mut dashboard, controls) = Dashboard::new(
//!     rx,
//!     Some(ReceiverLocation::fallback()),
//!     LinkParameters::default(),
//!     DashboardSettings::default(),
//! );
//!
//! tx.try_send(IngestItem::Line("1000,185204000,738567000,100000,-95.0,8.0".into()))?;
//! dashboard.drain();
//!
//! let snapshot = dashboard.snapshot(10);
//! assert!(snapshot.link.result().is_some());
//! # let _ = controls;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod snapshot;

use chrono::Local;
use std::collections::VecDeque;
use tokio::sync::{mpsc::error::TryRecvError, watch};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::link::{self, LinkParameters, ReceiverLocation};
use crate::serial::reader::{IngestItem, IngestReceiver};
use crate::telemetry::{parse_sample, HistoryBuffer};

pub use snapshot::{DashboardSnapshot, ErrorEvent, ErrorSource, IngestStats, LinkStatus};

/// Default number of error events kept for display
pub const DEFAULT_MAX_ERROR_EVENTS: usize = 20;

/// Consumer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardSettings {
    /// Number of error events kept for display
    pub max_error_events: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            max_error_events: DEFAULT_MAX_ERROR_EVENTS,
        }
    }
}

/// Operator-side handle for editing receiver location and link parameters.
///
/// Edits are visible to the dashboard on its next refresh.
#[derive(Debug)]
pub struct OperatorControls {
    receiver: watch::Sender<Option<ReceiverLocation>>,
    parameters: watch::Sender<LinkParameters>,
}

impl OperatorControls {
    /// Set the receiver location.
    pub fn set_receiver(&self, location: ReceiverLocation) {
        info!(
            "Receiver location set to {:.6}, {:.6} ({})",
            location.latitude, location.longitude, location.label
        );
        self.receiver.send_replace(Some(location));
    }

    /// Forget the receiver location; link metrics are suppressed until a new
    /// one is set.
    pub fn clear_receiver(&self) {
        self.receiver.send_replace(None);
    }

    /// Replace the link parameters after range validation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LinkMonitorError::InvalidParameter`] and keeps the
    /// previous parameters if any value is out of range.
    pub fn set_parameters(&self, parameters: LinkParameters) -> Result<()> {
        parameters.validate()?;
        self.parameters.send_replace(parameters);
        debug!("Link parameters updated: {:?}", parameters);
        Ok(())
    }

    /// Current receiver location
    pub fn receiver(&self) -> Option<ReceiverLocation> {
        self.receiver.borrow().clone()
    }

    /// Current link parameters
    pub fn parameters(&self) -> LinkParameters {
        *self.parameters.borrow()
    }
}

/// Pipeline consumer: owns the history buffer and derives link metrics.
#[derive(Debug)]
pub struct Dashboard {
    rx: IngestReceiver,
    history: HistoryBuffer,
    receiver: watch::Receiver<Option<ReceiverLocation>>,
    parameters: watch::Receiver<LinkParameters>,
    errors: VecDeque<ErrorEvent>,
    max_error_events: usize,
    stats: IngestStats,
}

impl Dashboard {
    /// Create the consumer and its operator controls.
    ///
    /// # Arguments
    ///
    /// * `rx` - Receiving half of the ingestion channel
    /// * `receiver` - Initial receiver location, if known
    /// * `parameters` - Initial link parameters (assumed already validated)
    /// * `settings` - Error-log size
    pub fn new(
        rx: IngestReceiver,
        receiver: Option<ReceiverLocation>,
        parameters: LinkParameters,
        settings: DashboardSettings,
    ) -> (Self, OperatorControls) {
        let (receiver_tx, receiver_rx) = watch::channel(receiver);
        let (parameters_tx, parameters_rx) = watch::channel(parameters);

        let dashboard = Self {
            rx,
            history: HistoryBuffer::new(),
            receiver: receiver_rx,
            parameters: parameters_rx,
            errors: VecDeque::with_capacity(settings.max_error_events),
            max_error_events: settings.max_error_events,
            stats: IngestStats::default(),
        };
        let controls = OperatorControls {
            receiver: receiver_tx,
            parameters: parameters_tx,
        };

        (dashboard, controls)
    }

    /// Process every item currently queued, without waiting for more.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of items taken off the channel
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.rx.try_recv() {
                Ok(item) => {
                    self.ingest(item);
                    drained += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }

    /// Process one item from the reader.
    pub fn ingest(&mut self, item: IngestItem) {
        match item {
            IngestItem::Line(line) => match parse_sample(&line, Local::now()) {
                Ok(sample) => {
                    debug!(
                        "Accepted sample t={} lat={:.6} lon={:.6} rssi={:.1}",
                        sample.timestamp, sample.latitude, sample.longitude, sample.rssi
                    );
                    self.history.append(sample);
                    self.stats.accepted += 1;
                }
                Err(e) => {
                    warn!("Data parsing error: {} (line {:?})", e, line);
                    self.stats.rejected += 1;
                    self.record_error(ErrorSource::Parse, format!("{}: {}", e, line));
                }
            },
            IngestItem::TransportError(message) => {
                warn!("Serial transport error: {}", message);
                self.stats.transport_errors += 1;
                self.record_error(ErrorSource::Transport, message);
            }
        }
    }

    fn record_error(&mut self, source: ErrorSource, message: String) {
        if self.max_error_events == 0 {
            return;
        }
        if self.errors.len() == self.max_error_events {
            self.errors.pop_front();
        }
        self.errors.push_back(ErrorEvent {
            at: Local::now(),
            source,
            message,
        });
    }

    /// Read-only view of the sample history
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Recent error events, oldest first
    pub fn errors(&self) -> impl Iterator<Item = &ErrorEvent> {
        self.errors.iter()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Link metrics for the newest sample with the current operator settings.
    pub fn link_status(&self) -> LinkStatus {
        let Some(sample) = self.history.latest() else {
            return LinkStatus::NoTelemetry;
        };
        let guard = self.receiver.borrow();
        let Some(receiver) = guard.as_ref() else {
            return LinkStatus::NoReceiver;
        };
        let parameters = *self.parameters.borrow();

        LinkStatus::Available(link::compute(receiver, sample, &parameters))
    }

    /// Take an immutable snapshot for presentation.
    ///
    /// # Arguments
    ///
    /// * `history_rows` - Number of most recent samples to include
    pub fn snapshot(&self, history_rows: usize) -> DashboardSnapshot {
        let receiver = self.receiver.borrow().clone();
        let latest = self.history.latest().cloned();
        let map_center = match (&receiver, &latest) {
            (Some(rx), Some(tx)) => Some(link::geodesy::midpoint(
                rx.latitude,
                rx.longitude,
                tx.latitude,
                tx.longitude,
            )),
            _ => None,
        };

        DashboardSnapshot {
            taken_at: Local::now(),
            connected_port: None,
            latest,
            receiver,
            parameters: *self.parameters.borrow(),
            link: self.link_status(),
            map_center,
            history: self.history.recent(history_rows),
            errors: self.errors.iter().cloned().collect(),
            stats: self.stats,
        }
    }
}
