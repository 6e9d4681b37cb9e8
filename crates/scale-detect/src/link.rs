//! Transport seam between the detection logic and the serial hardware
//!
//! [`ScaleLink`] is the small slice of a serial port the read strategies need.
//! [`PortOpener`] opens a link for a port/configuration pair. The real
//! implementation is [`SerialOpener`]; tests substitute a simulated scale.

use std::io::{self, Read, Write};

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use crate::config::SerialConfig;
use crate::error::DetectError;

/// Byte-level access to an open scale connection
pub trait ScaleLink: Send {
    /// Number of bytes waiting in the input buffer
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read whatever is currently waiting (possibly nothing)
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Discard pending input
    fn clear_input(&mut self) -> io::Result<()>;

    /// Discard pending output
    fn clear_output(&mut self) -> io::Result<()>;

    /// Write a request to the device
    fn send(&mut self, data: &[u8]) -> io::Result<()>;
}

/// Opens links to named ports
pub trait PortOpener {
    /// Link type produced by this opener
    type Link: ScaleLink;

    /// Open `port` with the given line configuration
    fn open(&self, port: &str, config: &SerialConfig) -> Result<Self::Link, DetectError>;
}

impl ScaleLink for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let waiting = self.bytes_available()?;
        if waiting == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; waiting];
        match self.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                trace!("Read {} bytes: {:?}", n, String::from_utf8_lossy(&buf));
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn clear_output(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Output)?;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        trace!("Writing {:02X?}", data);
        self.write_all(data)?;
        self.flush()
    }
}

/// Opens real serial ports through the `serialport` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    type Link = Box<dyn SerialPort>;

    fn open(&self, port: &str, config: &SerialConfig) -> Result<Self::Link, DetectError> {
        debug!("Opening {} at {}", port, config);

        serialport::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| DetectError::PortUnavailable {
                port: port.to_string(),
                reason: e.to_string(),
            })
    }
}
