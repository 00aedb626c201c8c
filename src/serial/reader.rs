//! # Serial Reader Task
//!
//! Background task that pulls lines off the transport and forwards record
//! candidates to the consumer over the ingestion channel.
//!
//! The reader stops when:
//! - The connection is closed (the `open` watch flips to `false` or its sender is dropped)
//! - The transport fails (a [`IngestItem::TransportError`] is forwarded first)
//! - The consumer drops its end of the channel

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use super::port_trait::LineSource;

/// Capacity of the reader to consumer channel
pub const INGEST_CHANNEL_CAPACITY: usize = 1024;

/// Default per-call transport read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Default idle sleep between read attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Item carried from the reader to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestItem {
    /// Trimmed line that looks like a telemetry record
    Line(String),

    /// Transport failure; the reader has stopped
    TransportError(String),
}

/// Sending half of the ingestion channel (reader side)
pub type IngestSender = mpsc::Sender<IngestItem>;

/// Receiving half of the ingestion channel (consumer side)
pub type IngestReceiver = mpsc::Receiver<IngestItem>;

/// Create the bounded, FIFO ingestion channel.
pub fn ingest_channel() -> (IngestSender, IngestReceiver) {
    mpsc::channel(INGEST_CHANNEL_CAPACITY)
}

/// Reader timing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSettings {
    /// Upper bound on a single transport read
    pub read_timeout: Duration,

    /// Sleep after a read attempt that produced nothing
    pub poll_interval: Duration,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why a reader task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Connection was closed by the owner
    Closed,

    /// Transport read failed
    TransportFailed,

    /// Consumer dropped the channel
    ConsumerGone,
}

/// Decode and trim a raw line, keeping it only if it could be a record.
///
/// Invalid UTF-8 is replaced rather than rejected; such lines then fail
/// record parsing downstream and are reported there.
pub fn candidate_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() || !line.contains(',') {
        return None;
    }
    Some(line.to_string())
}

/// Run the reader loop until the connection closes or the transport fails.
///
/// # Arguments
///
/// * `source` - Transport to read from; dropped (closed) when the loop exits
/// * `tx` - Ingestion channel sender
/// * `open` - Connection state; `false` or a dropped sender means closed
/// * `settings` - Read timeout and idle poll interval
pub async fn run_reader<S: LineSource>(
    mut source: S,
    tx: IngestSender,
    mut open: watch::Receiver<bool>,
    settings: ReaderSettings,
) -> ReaderExit {
    loop {
        if !*open.borrow_and_update() {
            debug!("Connection closed, reader exiting");
            return ReaderExit::Closed;
        }

        let read = tokio::select! {
            biased;
            changed = open.changed() => {
                if changed.is_err() {
                    return ReaderExit::Closed;
                }
                continue;
            }
            result = source.read_line(settings.read_timeout) => result,
        };

        match read {
            Ok(Some(raw)) => {
                match candidate_line(&raw) {
                    Some(line) => {
                        trace!("Read line: {}", line);
                        if let Some(exit) = forward(&tx, IngestItem::Line(line), &mut open).await {
                            return exit;
                        }
                    }
                    None => trace!("Discarding non-record line ({} bytes)", raw.len()),
                }
                tokio::task::yield_now().await;
            }
            Ok(None) => {
                tokio::select! {
                    biased;
                    changed = open.changed() => {
                        if changed.is_err() {
                            return ReaderExit::Closed;
                        }
                    }
                    _ = tokio::time::sleep(settings.poll_interval) => {}
                }
            }
            Err(e) => {
                warn!("Serial read failed: {}", e);
                let item = IngestItem::TransportError(e.to_string());
                return forward(&tx, item, &mut open)
                    .await
                    .unwrap_or(ReaderExit::TransportFailed);
            }
        }
    }
}

/// Enqueue one item unless the connection closes first.
///
/// Returns `Some(exit)` when the reader must stop.
async fn forward(
    tx: &IngestSender,
    item: IngestItem,
    open: &mut watch::Receiver<bool>,
) -> Option<ReaderExit> {
    loop {
        if !*open.borrow_and_update() {
            return Some(ReaderExit::Closed);
        }

        // Sender::send is cancel safe: losing the race to `changed` means the
        // item was not enqueued.
        tokio::select! {
            biased;
            changed = open.changed() => {
                if changed.is_err() {
                    return Some(ReaderExit::Closed);
                }
            }
            sent = tx.send(item.clone()) => return sent.err().map(|_| ReaderExit::ConsumerGone),
        }
    }
}
