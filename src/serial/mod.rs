//! # Serial Communication Module
//!
//! Handles the serial link to the telemetry receiver.
//!
//! This module handles:
//! - Opening the serial port at the configured baud rate
//! - Running the background reader task for the open connection
//! - Closing the connection and joining the reader on disconnect
//! - Guaranteeing at most one open transport per link (reconnect closes first)
//! - Enumerating available serial ports

pub mod port_trait;
pub mod reader;

use crate::error::{LinkMonitorError, Result};
use port_trait::{LineSource, TokioSerialPort};
use reader::{run_reader, IngestSender, ReaderExit, ReaderSettings};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default serial baud rate of the receiver firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Baud rates offered by the receiver firmware
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9_600, 57_600, 115_200];

/// Device paths tried when the port is configured as `auto` (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices (Teensy, most MCU boards)
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// The reader currently attached to the link
struct ActiveReader {
    port_name: String,
    open: watch::Sender<bool>,
    handle: JoinHandle<ReaderExit>,
}

/// Serial connection slot.
///
/// Owns the lifecycle of at most one transport and its reader task. The
/// history held by the consumer is unaffected by connect/disconnect.
pub struct SerialLink {
    tx: IngestSender,
    settings: ReaderSettings,
    active: Option<ActiveReader>,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port_name", &self.port_name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Create a disconnected link that will feed `tx` once connected.
    pub fn new(tx: IngestSender, settings: ReaderSettings) -> Self {
        Self {
            tx,
            settings,
            active: None,
        }
    }

    /// Connect to a serial port, closing any existing connection first.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened. The link is left
    /// disconnected in that case.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use link_budget_monitor::serial::{reader, SerialLink};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let (tx, _rx) = reader::ingest_channel();
    ///     let mut link = SerialLink::new(tx, reader::ReaderSettings::default());
    ///     link.connect("/dev/ttyACM0", 115_200).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(&mut self, port: &str, baud_rate: u32) -> Result<()> {
        self.connect_with(port, || open_port(port, baud_rate).map(TokioSerialPort::new))
            .await
    }

    /// Connect to the first port in `paths` that opens.
    ///
    /// # Returns
    ///
    /// * `Result<String>` - Path of the port that was opened
    ///
    /// # Errors
    ///
    /// Returns [`LinkMonitorError::SerialPortNotFound`] if none can be opened
    pub async fn connect_first(&mut self, paths: &[&str], baud_rate: u32) -> Result<String> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match self.connect(path, baud_rate).await {
                Ok(()) => return Ok(path.to_string()),
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(LinkMonitorError::SerialPortNotFound(paths.join(", ")))
    }

    /// Close the current connection (if any), then open a new source with
    /// `open` and start its reader.
    ///
    /// `open` is only called after the previous transport has been dropped.
    pub async fn connect_with<S, F>(&mut self, port_name: &str, open: F) -> Result<()>
    where
        S: LineSource + 'static,
        F: FnOnce() -> Result<S>,
    {
        self.disconnect().await;

        let source = open()?;
        let (open_tx, open_rx) = watch::channel(true);
        let handle = tokio::spawn(run_reader(source, self.tx.clone(), open_rx, self.settings));

        info!("Connected to {}", port_name);
        self.active = Some(ActiveReader {
            port_name: port_name.to_string(),
            open: open_tx,
            handle,
        });
        Ok(())
    }

    /// Close the connection and wait for its reader to finish.
    ///
    /// Once this returns, the transport has been dropped and no further items
    /// will be enqueued by the old reader.
    ///
    /// # Returns
    ///
    /// * `Option<ReaderExit>` - How the reader ended, or `None` if nothing was connected
    pub async fn disconnect(&mut self) -> Option<ReaderExit> {
        let active = self.active.take()?;

        // The reader may already be gone after a transport error.
        let _ = active.open.send(false);

        match active.handle.await {
            Ok(exit) => {
                info!("Disconnected from {} ({:?})", active.port_name, exit);
                Some(exit)
            }
            Err(e) => {
                warn!("Reader task for {} ended abnormally: {}", active.port_name, e);
                None
            }
        }
    }

    /// Whether a reader is attached and still running.
    pub fn is_connected(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Name of the attached port, even if its reader has stopped.
    pub fn port_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.port_name.as_str())
    }
}

/// Open a serial port with 8N1 settings.
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyACM0" or "COM3")
/// * `baud_rate` - Line speed
///
/// # Returns
///
/// * `Result<SerialStream>` - Opened serial port
pub fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| LinkMonitorError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}

/// List available serial ports as `(name, description)` pairs.
///
/// # Errors
///
/// Returns error if the platform port enumeration fails
pub fn list_ports() -> Result<Vec<(String, String)>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| LinkMonitorError::Serial(format!("Failed to list serial ports: {}", e)))?;

    Ok(ports
        .into_iter()
        .map(|port| {
            let description = match port.port_type {
                tokio_serial::SerialPortType::UsbPort(usb) => format!(
                    "USB {:04x}:{:04x} {}",
                    usb.vid,
                    usb.pid,
                    usb.product.unwrap_or_default()
                ),
                tokio_serial::SerialPortType::PciPort => "PCI".to_string(),
                tokio_serial::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                tokio_serial::SerialPortType::Unknown => "Unknown".to_string(),
            };
            (port.port_name, description.trim_end().to_string())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::port_trait::mocks::{MockLineSource, MockRead};
    use crate::serial::reader::{ingest_channel, IngestItem};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BAUD_RATE, 115_200);
        assert!(SUPPORTED_BAUD_RATES.contains(&DEFAULT_BAUD_RATE));
        assert_eq!(DEFAULT_DEVICE_PATHS[0], "/dev/ttyACM0");
        assert_eq!(DEFAULT_DEVICE_PATHS[1], "/dev/ttyUSB0");
    }

    #[tokio::test]
    async fn test_connect_with_invalid_path_returns_error() {
        let (tx, _rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());

        let err = link
            .connect("/dev/nonexistent_serial_device_12345", DEFAULT_BAUD_RATE)
            .await
            .unwrap_err();

        match err {
            LinkMonitorError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            _ => panic!("Expected Serial error, got: {:?}", err),
        }
        assert!(!link.is_connected());
        assert!(link.port_name().is_none());
    }

    #[tokio::test]
    async fn test_connect_first_with_invalid_paths_returns_error() {
        let (tx, _rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());

        let err = link
            .connect_first(&["/dev/nonexistent0", "/dev/nonexistent1"], DEFAULT_BAUD_RATE)
            .await
            .unwrap_err();

        match err {
            LinkMonitorError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            _ => panic!("Expected SerialPortNotFound error, got: {:?}", err),
        }
    }

    #[tokio::test]
    async fn test_connect_first_with_empty_paths_returns_error() {
        let (tx, _rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());

        let result = link.connect_first(&[], DEFAULT_BAUD_RATE).await;
        assert!(matches!(result, Err(LinkMonitorError::SerialPortNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_when_idle_is_noop() {
        let (tx, _rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());
        assert_eq!(link.disconnect().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_forwards_lines_and_disconnect_joins_reader() {
        let (tx, mut rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());

        link.connect_with("mock0", || Ok(MockLineSource::from_lines(&["1,2,3,4,5,6"])))
            .await
            .unwrap();
        assert!(link.is_connected());
        assert_eq!(link.port_name(), Some("mock0"));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(rx.try_recv().unwrap(), IngestItem::Line("1,2,3,4,5,6".to_string()));

        assert_eq!(link.disconnect().await, Some(ReaderExit::Closed));
        assert!(!link.is_connected());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_closes_previous_transport_first() {
        let (tx, _rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());
        let live = Arc::new(AtomicUsize::new(0));

        for round in 0..3 {
            let live_for_open = live.clone();
            link.connect_with(&format!("mock{}", round), move || {
                assert_eq!(
                    live_for_open.load(Ordering::SeqCst),
                    0,
                    "previous transport still open when opening a new one"
                );
                Ok(MockLineSource::tracked(vec![], live_for_open))
            })
            .await
            .unwrap();

            assert_eq!(live.load(Ordering::SeqCst), 1);
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        link.disconnect().await;
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reconnect_leaves_link_disconnected() {
        let (tx, _rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());
        let live = Arc::new(AtomicUsize::new(0));

        let first = live.clone();
        link.connect_with("mock0", move || Ok(MockLineSource::tracked(vec![], first)))
            .await
            .unwrap();

        let result = link
            .connect_with::<MockLineSource, _>("mock1", || {
                Err(LinkMonitorError::Serial("Failed to open mock1".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(!link.is_connected());
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_marks_link_disconnected() {
        let (tx, mut rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());

        link.connect_with("mock0", || {
            Ok(MockLineSource::new(vec![MockRead::Fail(io::ErrorKind::UnexpectedEof)]))
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(rx.try_recv(), Ok(IngestItem::TransportError(_))));
        assert!(!link.is_connected());
        assert_eq!(link.port_name(), Some("mock0"));
        assert_eq!(link.disconnect().await, Some(ReaderExit::TransportFailed));
    }

    // Integration test - only runs if receiver hardware is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_connect_with_real_hardware() {
        let (tx, _rx) = ingest_channel();
        let mut link = SerialLink::new(tx, ReaderSettings::default());

        match link.connect_first(DEFAULT_DEVICE_PATHS, DEFAULT_BAUD_RATE).await {
            Ok(path) => {
                println!("Successfully opened receiver at: {}", path);
                assert!(link.is_connected());
                link.disconnect().await;
            }
            Err(_) => println!("No receiver hardware detected (this is OK for CI/CD)"),
        }
    }
}
