//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::info;

use crate::dashboard::DashboardSettings;
use crate::error::{LinkMonitorError, Result};
use crate::link::{GeoFix, LinkParameters, ReceiverLocation};
use crate::serial::reader::ReaderSettings;
use crate::serial::SUPPORTED_BAUD_RATES;
use crate::telemetry::HISTORY_CAPACITY;

/// Port name that selects the first device from the default path list
pub const AUTO_PORT: &str = "auto";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    /// Fixed receiver position; the default location is used when absent
    #[serde(default)]
    pub receiver: Option<ReceiverLocation>,

    #[serde(default)]
    pub link: LinkParameters,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
}

/// Snapshot output format
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable dashboard
    Text,
    /// One JSON object per refresh
    Json,
}

/// Dashboard configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DashboardConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    #[serde(default = "default_history_rows")]
    pub history_rows: usize,

    #[serde(default = "default_max_error_events")]
    pub max_error_events: usize,

    #[serde(default = "default_output_format")]
    pub format: OutputFormat,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files; console only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { AUTO_PORT.to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 100 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_reconnect_interval_ms() -> u64 { 2000 }
fn default_auto_reconnect() -> bool { true }

fn default_refresh_interval_ms() -> u64 { 1000 }
fn default_history_rows() -> usize { 10 }
fn default_max_error_events() -> usize { 20 }
fn default_output_format() -> OutputFormat { OutputFormat::Text }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            auto_reconnect: default_auto_reconnect(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            history_rows: default_history_rows(),
            max_error_events: default_max_error_events(),
            format: default_output_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: None,
        }
    }
}

impl SerialConfig {
    /// Reader timing derived from this configuration
    pub fn reader_settings(&self) -> ReaderSettings {
        ReaderSettings {
            read_timeout: Duration::from_millis(self.timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn is_auto_port(&self) -> bool {
        self.port.eq_ignore_ascii_case(AUTO_PORT)
    }
}

impl DashboardConfig {
    pub fn settings(&self) -> DashboardSettings {
        DashboardSettings {
            max_error_events: self.max_error_events,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use link_budget_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No configuration at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Self::load(path)
    }

    /// Receiver location to start with.
    ///
    /// Uses the configured location, otherwise the external `fix`, otherwise
    /// the default location.
    pub fn initial_receiver(&self, fix: Option<GeoFix>) -> ReceiverLocation {
        match &self.receiver {
            Some(location) => location.clone(),
            None => ReceiverLocation::resolve(fix),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(LinkMonitorError::Config(
                toml::de::Error::custom("serial port cannot be empty")
            ));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(LinkMonitorError::Config(
                toml::de::Error::custom(format!(
                    "baud_rate must be one of: {:?}",
                    SUPPORTED_BAUD_RATES
                ))
            ));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(LinkMonitorError::Config(
                toml::de::Error::custom("timeout_ms must be between 1 and 10000")
            ));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 10000 {
            return Err(LinkMonitorError::Config(
                toml::de::Error::custom("poll_interval_ms must be between 1 and 10000")
            ));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(LinkMonitorError::Config(
                toml::de::Error::custom("reconnect_interval_ms must be between 1 and 60000")
            ));
        }

        if let Some(receiver) = &self.receiver {
            if !receiver.latitude.is_finite() || !receiver.longitude.is_finite() {
                return Err(LinkMonitorError::Config(
                    toml::de::Error::custom("receiver latitude/longitude must be finite numbers")
                ));
            }
        }

        self.link.validate()?;

        if self.dashboard.refresh_interval_ms == 0 || self.dashboard.refresh_interval_ms > 60000 {
            return Err(LinkMonitorError::Config(
                toml::de::Error::custom("refresh_interval_ms must be between 1 and 60000")
            ));
        }

        if self.dashboard.history_rows > HISTORY_CAPACITY {
            return Err(LinkMonitorError::Config(
                toml::de::Error::custom(format!(
                    "history_rows cannot exceed {}",
                    HISTORY_CAPACITY
                ))
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(LinkMonitorError::Config(
                toml::de::Error::custom("logging level cannot be empty")
            ));
        }

        Ok(())
    }
}

/// Detects edits to the configuration file so operator changes apply
/// without a restart.
#[derive(Debug)]
pub struct ConfigReloader {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigReloader {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let last_modified = modified_time(&path);
        Self { path, last_modified }
    }

    /// Reload the file if it changed since the last call.
    ///
    /// # Returns
    ///
    /// * `None` - File unchanged (or unreadable metadata)
    /// * `Some(Ok(config))` - File changed and is valid
    /// * `Some(Err(e))` - File changed but failed to load
    pub fn poll(&mut self) -> Option<Result<Config>> {
        let modified = modified_time(&self.path)?;
        if self.last_modified == Some(modified) {
            return None;
        }
        self.last_modified = Some(modified);
        Some(Config::load(&self.path))
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> Config {
        Config::default()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert!(config.serial.is_auto_port());
        assert!(config.receiver.is_none());
        assert_eq!(config.link, LinkParameters::default());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_file = write_config(
            r#"
[serial]
port = "/dev/ttyUSB0"
baud_rate = 57600

[receiver]
latitude = 18.5204
longitude = 73.8567
label = "Rooftop"

[link]
tx_power_dbm = 14.0
frequency_mhz = 868.0

[dashboard]
format = "json"
history_rows = 5
"#,
        );

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 57600);
        assert!(!config.serial.is_auto_port());
        assert_eq!(
            config.receiver,
            Some(ReceiverLocation::new(18.5204, 73.8567, "Rooftop"))
        );
        assert_eq!(config.link.tx_power_dbm, 14.0);
        assert_eq!(config.link.frequency_mhz, 868.0);
        assert_eq!(config.link.rx_sensitivity_dbm, -110.0);
        assert_eq!(config.dashboard.format, OutputFormat::Json);
        assert_eq!(config.dashboard.history_rows, 5);
    }

    #[test]
    fn test_load_rejects_invalid_link_parameter() {
        let temp_file = write_config("[link]\nfrequency_mhz = 5800.0\n");
        match Config::load(temp_file.path()) {
            Err(LinkMonitorError::InvalidParameter { name, .. }) => assert_eq!(name, "frequency_mhz"),
            other => panic!("Expected InvalidParameter, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_unknown_format() {
        let temp_file = write_config("[dashboard]\nformat = \"xml\"\n");
        assert!(matches!(
            Config::load(temp_file.path()),
            Err(LinkMonitorError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/link-budget-monitor.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            Config::load("/nonexistent/link-budget-monitor.toml"),
            Err(LinkMonitorError::Io(_))
        ));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = create_valid_config();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 420000; // Not offered by the receiver firmware
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in SUPPORTED_BAUD_RATES {
            let mut config = create_valid_config();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_timeout_ms_bounds() {
        let mut config = create_valid_config();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
        config.serial.timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_bounds() {
        let mut config = create_valid_config();
        config.serial.poll_interval_ms = 0;
        assert!(config.validate().is_err());
        config.serial.poll_interval_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_interval_bounds() {
        let mut config = create_valid_config();
        config.serial.reconnect_interval_ms = 0;
        assert!(config.validate().is_err());
        config.serial.reconnect_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_interval_bounds() {
        let mut config = create_valid_config();
        config.dashboard.refresh_interval_ms = 0;
        assert!(config.validate().is_err());
        config.dashboard.refresh_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_rows_exceed_capacity() {
        let mut config = create_valid_config();
        config.dashboard.history_rows = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_stays_bounded_with_stale_capacity_key() {
        use crate::dashboard::Dashboard;
        use crate::serial::reader::{ingest_channel, IngestItem};

        let temp_file = write_config("[dashboard]\nhistory_capacity = 500\n");
        let config = Config::load(temp_file.path()).unwrap();

        let (tx, rx) = ingest_channel();
        let (mut dashboard, _controls) =
            Dashboard::new(rx, None, config.link, config.dashboard.settings());
        for ts in 1..=200 {
            tx.try_send(IngestItem::Line(format!("{},1,2,3,-90,5", ts)))
                .unwrap();
        }
        dashboard.drain();

        assert_eq!(dashboard.history().len(), HISTORY_CAPACITY);
        assert_eq!(dashboard.history().capacity(), HISTORY_CAPACITY);
        assert_eq!(dashboard.history().latest().map(|s| s.timestamp), Some(200));
    }

    #[test]
    fn test_non_finite_receiver() {
        let mut config = create_valid_config();
        config.receiver = Some(ReceiverLocation::new(f64::NAN, 0.0, "Broken"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_receiver_precedence() {
        let fix = GeoFix {
            latitude: 1.0,
            longitude: 2.0,
            label: "Somewhere".to_string(),
        };

        let mut config = create_valid_config();
        assert_eq!(config.initial_receiver(None), ReceiverLocation::fallback());
        assert_eq!(
            config.initial_receiver(Some(fix.clone())),
            ReceiverLocation::new(1.0, 2.0, "Somewhere")
        );

        config.receiver = Some(ReceiverLocation::new(3.0, 4.0, "Configured"));
        assert_eq!(
            config.initial_receiver(Some(fix)),
            ReceiverLocation::new(3.0, 4.0, "Configured")
        );
    }

    #[test]
    fn test_reader_and_dashboard_settings() {
        let config = create_valid_config();
        let reader = config.serial.reader_settings();
        assert_eq!(reader.read_timeout, Duration::from_millis(100));
        assert_eq!(reader.poll_interval, Duration::from_millis(100));

        let dashboard = config.dashboard.settings();
        assert_eq!(dashboard.max_error_events, 20);
    }

    #[test]
    fn test_reloader_detects_changes() {
        let temp_file = write_config("[link]\ntx_power_dbm = 10.0\n");
        let mut reloader = ConfigReloader::new(temp_file.path());
        assert!(reloader.poll().is_none());

        fs::write(temp_file.path(), "[link]\ntx_power_dbm = 12.0\n").unwrap();
        let later = SystemTime::now() + Duration::from_secs(10);
        fs::File::options()
            .write(true)
            .open(temp_file.path())
            .unwrap()
            .set_modified(later)
            .unwrap();

        let config = reloader.poll().unwrap().unwrap();
        assert_eq!(config.link.tx_power_dbm, 12.0);
        assert!(reloader.poll().is_none());
    }

    #[test]
    fn test_reloader_reports_invalid_edit() {
        let temp_file = write_config("");
        let mut reloader = ConfigReloader::new(temp_file.path());

        fs::write(temp_file.path(), "[link]\nfilter_loss_db = 50.0\n").unwrap();
        let later = SystemTime::now() + Duration::from_secs(10);
        fs::File::options()
            .write(true)
            .open(temp_file.path())
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(matches!(reloader.poll(), Some(Err(_))));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "auto");
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_timeout_ms(), 100);
        assert_eq!(default_poll_interval_ms(), 100);
        assert_eq!(default_reconnect_interval_ms(), 2000);
        assert!(default_auto_reconnect());
        assert_eq!(default_refresh_interval_ms(), 1000);
        assert_eq!(default_history_rows(), 10);
        assert_eq!(default_max_error_events(), 20);
        assert_eq!(default_output_format(), OutputFormat::Text);
        assert_eq!(default_log_level(), "info");
    }
}
