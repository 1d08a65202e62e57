//! Byte-stream channel over a Linux device file.
//!
//! A [`Channel`] owns exactly one open handle and exposes the same four
//! operations whatever is behind it. The two construction profiles differ only
//! in how the handle is opened and configured:
//!
//! - [`SerialConfig`]: raw UART, 8N1 at a fixed line speed, reads block until
//!   a minimum number of bytes has arrived (no inter-byte timeout).
//! - [`BusConfig`]: I2C adapter bound to one 7-bit peripheral address.
//!
//! Register reads are two bus transactions (pointer write, then read) with no
//! locking in between. Callers must not share a peripheral across threads.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, trace};
use rppal::i2c::I2c;
use rppal::uart::{Parity, Uart};

use crate::error::{i2c_into_io, uart_into_io, Error, Result};

// Serial line settings used by the MH-Z19.
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/serial0";
pub const SERIAL_LINE_SPEED: u32 = 9600;
pub const SERIAL_DATA_BITS: u8 = 8;
pub const SERIAL_STOP_BITS: u8 = 1;
pub const SERIAL_MIN_READ: u8 = 4;

// BME280 I2C default slave address.
pub const DEFAULT_BUS_DEVICE: &str = "/dev/i2c-1";
pub const DEFAULT_BUS_ADDRESS: u16 = 0x76;

/// Raw device access underneath a [`Channel`].
///
/// Both calls report how many bytes actually moved. Interpreting short
/// transfers is left to the channel and its callers.
pub trait Transport {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl Transport for Uart {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf).map_err(uart_into_io)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf).map_err(uart_into_io)
    }
}

impl Transport for I2c {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf).map_err(i2c_into_io)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf).map_err(i2c_into_io)
    }
}

/// Settings for the framed-serial profile.
///
/// Line speed and the blocking read threshold are fixed by the MH-Z19
/// protocol; only the device path varies.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub path: PathBuf,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            path: PathBuf::from(DEFAULT_SERIAL_DEVICE),
        }
    }
}

impl SerialConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SerialConfig { path: path.into() }
    }

    /// Opens the UART in raw mode and applies the blocking read threshold.
    pub fn open(&self) -> Result<Channel<Uart>> {
        let device = self.path.display().to_string();
        let open_err = |source| Error::ChannelOpen {
            device: device.clone(),
            source,
        };

        let mut uart = Uart::with_path(
            &self.path,
            SERIAL_LINE_SPEED,
            Parity::None,
            SERIAL_DATA_BITS,
            SERIAL_STOP_BITS,
        )
        .map_err(|e| open_err(uart_into_io(e)))?;
        uart.set_read_mode(SERIAL_MIN_READ, Duration::ZERO)
            .map_err(|e| open_err(uart_into_io(e)))?;

        debug!(
            "opened serial channel {} at {} baud (min read {} bytes)",
            device, SERIAL_LINE_SPEED, SERIAL_MIN_READ
        );
        Ok(Channel::new(device, uart))
    }
}

/// Settings for the register-bus profile.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub path: PathBuf,
    pub address: u16,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            path: PathBuf::from(DEFAULT_BUS_DEVICE),
            address: DEFAULT_BUS_ADDRESS,
        }
    }
}

impl BusConfig {
    pub fn new(path: impl Into<PathBuf>, address: u16) -> Self {
        BusConfig {
            path: path.into(),
            address,
        }
    }

    /// Opens the I2C adapter and binds the peripheral address to the handle.
    pub fn open(&self) -> Result<Channel<I2c>> {
        let device = self.path.display().to_string();
        let open_err = |source| Error::ChannelOpen {
            device: device.clone(),
            source,
        };

        let bus = bus_number(&self.path).ok_or_else(|| {
            open_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "expected an i2c adapter path such as /dev/i2c-1",
            ))
        })?;
        let mut i2c = I2c::with_bus(bus).map_err(|e| open_err(i2c_into_io(e)))?;
        i2c.set_slave_address(self.address)
            .map_err(|e| open_err(i2c_into_io(e)))?;

        debug!("opened bus channel {} at address {:#04x}", device, self.address);
        Ok(Channel::new(device, i2c))
    }
}

/// Extracts the adapter number from an `i2c-N` device path.
pub fn bus_number(path: &Path) -> Option<u8> {
    path.file_name()?
        .to_str()?
        .strip_prefix("i2c-")?
        .parse()
        .ok()
}

/// One open device handle and the operations the sensor drivers speak.
pub struct Channel<T> {
    device: String,
    transport: T,
}

impl<T: Transport> Channel<T> {
    pub fn new(device: impl Into<String>, transport: T) -> Self {
        Channel {
            device: device.into(),
            transport,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Writes the whole buffer. A partial write is an error; nothing is resent.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_with_context(bytes, |device| format!("write to {}", device))
    }

    /// Writes `reg` followed by `bytes` as a single transfer.
    pub fn write_register(&mut self, reg: u8, bytes: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(bytes.len() + 1);
        frame.push(reg);
        frame.extend_from_slice(bytes);
        self.write_with_context(&frame, |device| {
            format!("write register {:#04x} on {}", reg, device)
        })
    }

    /// Blocking read into `buf`, returning how many bytes arrived.
    ///
    /// The count is not checked against `buf.len()`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self
            .transport
            .receive(buf)
            .map_err(|e| Error::io(format!("read from {}", self.device), e))?;
        trace!("{}: read {:02x?}", self.device, &buf[..n.min(buf.len())]);
        Ok(n)
    }

    /// Selects `reg` and then reads from it. The two steps are not atomic.
    pub fn read_register(&mut self, reg: u8, buf: &mut [u8]) -> Result<usize> {
        self.write_with_context(&[reg], |device| {
            format!("select register {:#04x} on {}", reg, device)
        })?;
        let n = self.transport.receive(buf).map_err(|e| {
            Error::io(
                format!("read register {:#04x} on {}", reg, self.device),
                e,
            )
        })?;
        trace!(
            "{}: register {:#04x} -> {:02x?}",
            self.device,
            reg,
            &buf[..n.min(buf.len())]
        );
        Ok(n)
    }

    /// Releases the handle. Consuming `self` rules out a second close.
    pub fn close(self) -> Result<()> {
        debug!("closing channel {}", self.device);
        drop(self.transport);
        Ok(())
    }

    fn write_with_context<F>(&mut self, bytes: &[u8], context: F) -> Result<()>
    where
        F: Fn(&str) -> String,
    {
        let written = self
            .transport
            .send(bytes)
            .map_err(|e| Error::io(context(&self.device), e))?;
        if written != bytes.len() {
            return Err(Error::ShortWrite {
                context: context(&self.device),
                expected: bytes.len(),
                written,
            });
        }
        trace!("{}: wrote {:02x?}", self.device, bytes);
        Ok(())
    }
}
