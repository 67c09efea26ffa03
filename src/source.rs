//! Byte sources feeding the gateway.
//!
//! A byte source is polled once per scheduler cycle and hands back whatever
//! text arrived since the last poll, possibly nothing. It never blocks.
//!
//! - [`SerialSource`]: RS-232/USB-serial line, 8N1 without flow control
//! - [`ReaderSource`]: any `std::io::Read`, for files, pipes and tests

use std::io::{self, Read};
use std::time::Duration;

/// Non-blocking supplier of raw chunks.
pub trait ByteSource {
    /// Port path or other description, for logs.
    fn describe(&self) -> &str;

    /// Copy newly available bytes into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is available. Only real failures are errors.
    fn poll(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// True for errors that only mean "no data right now".
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Builder for [`SerialSource`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use telemetry_gateway::source::SerialSourceBuilder;
///
/// let source = SerialSourceBuilder::new("/dev/ttyACM0".to_string(), 115_200)
///     .with_timeout(Duration::ZERO)
///     .open()?;
/// # Ok::<(), telemetry_gateway::error::GatewayError>(())
/// ```
pub struct SerialSourceBuilder {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialSourceBuilder {
    /// Create a new builder with required parameters
    ///
    /// Default configuration:
    /// * timeout: zero (reads return immediately)
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            timeout: Duration::ZERO,
        }
    }

    /// Set the read timeout duration
    ///
    /// Anything but zero makes each poll wait up to this long for data.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open and configure the port.
    #[cfg(feature = "serial")]
    pub fn open(self) -> crate::error::AppResult<SerialSource> {
        use serialport::{DataBits, FlowControl, Parity, StopBits};

        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open()
            .map_err(|e| crate::error::GatewayError::ByteSource {
                source_name: self.port_name.clone(),
                error: e.into(),
            })?;

        tracing::info!(
            port = %self.port_name,
            baud_rate = self.baud_rate,
            "serial port opened"
        );

        Ok(SerialSource {
            port_name: self.port_name,
            port,
        })
    }

    /// Serial support is compiled out.
    #[cfg(not(feature = "serial"))]
    pub fn open(self) -> crate::error::AppResult<SerialSource> {
        Err(crate::error::GatewayError::SerialFeatureDisabled)
    }
}

/// Serial line byte source.
pub struct SerialSource {
    port_name: String,
    #[cfg(feature = "serial")]
    port: Box<dyn serialport::SerialPort>,
}

impl ByteSource for SerialSource {
    fn describe(&self) -> &str {
        &self.port_name
    }

    #[cfg(feature = "serial")]
    fn poll(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(feature = "serial"))]
    fn poll(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "serial support not enabled",
        ))
    }
}

/// Byte source over any reader.
///
/// End of input is reported as "no data", so a drained reader simply goes quiet.
pub struct ReaderSource<R> {
    name: String,
    reader: R,
}

impl<R: Read> ReaderSource<R> {
    /// Wrap `reader`, naming it `name` in logs.
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn describe(&self) -> &str {
        &self.name
    }

    fn poll(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_source_reads_then_goes_quiet() {
        let mut source = ReaderSource::new("cursor", Cursor::new(b"abc".to_vec()));
        let mut buf = [0u8; 8];
        assert_eq!(source.poll(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(source.poll(&mut buf).unwrap(), 0);
    }

    struct WouldBlockReader;

    impl Read for WouldBlockReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
    }

    #[test]
    fn test_would_block_is_no_data() {
        let mut source = ReaderSource::new("wb", WouldBlockReader);
        assert_eq!(source.poll(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_real_error_is_reported() {
        let mut source = ReaderSource::new("broken", BrokenReader);
        assert!(source.poll(&mut [0u8; 4]).is_err());
    }

    #[test]
    fn test_serial_builder_defaults() {
        let builder = SerialSourceBuilder::new("/dev/ttyUSB0".to_string(), 9600);
        assert_eq!(builder.timeout, Duration::ZERO);
        let builder = builder.with_timeout(Duration::from_millis(5));
        assert_eq!(builder.timeout, Duration::from_millis(5));
    }
}
