//! # rpenvmon
//!
//! Drivers for an MH-Z19 CO2 sensor on the Raspberry Pi UART and a BME280
//! temperature/pressure/humidity sensor on I2C, plus the small polling
//! monitor that publishes their readings over HTTP.
//!
//! ```ignore
//! use rpenvmon::{Bme280, BusConfig, MhZ19, Mode, SerialConfig};
//!
//! let mut co2 = MhZ19::new(SerialConfig::default().open()?);
//! println!("co2 {} ppm", co2.read()?);
//!
//! let mut bme280 = Bme280::new(BusConfig::default().open()?, Mode::Forced)?;
//! let reading = bme280.read()?;
//! println!(
//!     "{:.2} C, {} hPa, {:.2} %",
//!     reading.celsius(),
//!     reading.hectopascal(),
//!     reading.relative_humidity()
//! );
//! ```

pub mod bme280;
pub mod channel;
pub mod compensation;
pub mod error;
pub mod mhz19;
pub mod monitor;
pub mod server;
pub mod structs;

#[cfg(test)]
mod mock;

pub use bme280::{Bme280, Mode};
pub use channel::{BusConfig, Channel, SerialConfig, Transport};
pub use error::{Error, Result};
pub use mhz19::MhZ19;
pub use structs::{CalibrationSet, CompensatedReading, FineTemperature, RawSample};
