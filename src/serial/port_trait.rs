//! Trait abstraction for line-oriented serial input to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Source of newline-terminated records
#[async_trait]
pub trait LineSource: Send {
    /// Read the next line, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when no complete line arrived in time. Bytes of a
    /// partially received line are kept for the next call. End of stream is
    /// reported as an [`io::ErrorKind::UnexpectedEof`] error.
    async fn read_line(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>>;
}

/// Wrapper around tokio_serial::SerialStream that implements LineSource
pub struct TokioSerialPort {
    reader: BufReader<tokio_serial::SerialStream>,
    pending: Vec<u8>,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self {
            reader: BufReader::new(port),
            pending: Vec::new(),
        }
    }
}

#[async_trait]
impl LineSource for TokioSerialPort {
    async fn read_line(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        // read_until appends straight into `pending`, so a timeout mid-line
        // loses nothing.
        match tokio::time::timeout(timeout, self.reader.read_until(b'\n', &mut self.pending)).await {
            Err(_elapsed) => Ok(None),
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial stream closed",
            )),
            Ok(Ok(_)) => Ok(Some(std::mem::take(&mut self.pending))),
            Ok(Err(e)) => Err(e),
        }
    }
}
