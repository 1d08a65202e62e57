//! Bosch BME280 temperature/pressure/humidity sensor over I2C.

use log::{debug, trace};

use crate::channel::{Channel, Transport};
use crate::compensation::{compensate_humidity, compensate_pressure, compensate_temperature};
use crate::error::{Error, Result};
use crate::structs::{CalibrationSet, CompensatedReading, FineTemperature, RawSample};

// BME280 register addresses.
pub const REG_CHIP_ID: u8 = 0xD0;
pub const REG_CALIB_00: u8 = 0x88;
pub const REG_CALIB_26: u8 = 0xE1;
pub const REG_CTRL_HUM: u8 = 0xF2;
pub const REG_STATUS: u8 = 0xF3;
pub const REG_CTRL_MEAS: u8 = 0xF4;
pub const REG_CONFIG: u8 = 0xF5;
pub const REG_PRESS_MSB: u8 = 0xF7;

pub const REG_CALIB_00_LEN: usize = 26;
pub const REG_CALIB_26_LEN: usize = 7;
pub const REG_ADC_VALUE_LEN: usize = 8;

pub const CHIP_ID: u8 = 0x60;

// Tstandby 500ms, filter off, 3-wire SPI disabled.
const CONFIG: u8 = 0x80;
// Humidity oversampling x16.
const CTRL_HUM: u8 = 0x05;
// Temperature x16, pressure x2 oversampling. Low two bits carry the mode.
const CTRL_MEAS: u8 = 0xA9;

const STATUS_MEASURING: u8 = 0x08;

/// Power mode written into the low bits of `ctrl_meas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sleep = 0x00,
    Forced = 0x01,
    Normal = 0x03,
}

impl Mode {
    pub fn ctrl_meas(self) -> u8 {
        (CTRL_MEAS & !0x03) | self as u8
    }
}

/// A configured BME280 with its calibration loaded.
pub struct Bme280<T> {
    channel: Channel<T>,
    mode: Mode,
    calib: CalibrationSet,
    fine_temperature: Option<FineTemperature>,
}

impl<T: Transport> Bme280<T> {
    /// Writes the measurement settings and reads the calibration block.
    pub fn new(channel: Channel<T>, mode: Mode) -> Result<Self> {
        let mut sensor = Bme280 {
            channel,
            mode,
            calib: CalibrationSet::default(),
            fine_temperature: None,
        };
        sensor.configure()?;
        sensor.calib = sensor.read_calibration()?;
        debug!("bme280 on {} ready in {:?} mode", sensor.channel.device(), mode);
        Ok(sensor)
    }

    fn configure(&mut self) -> Result<()> {
        // ctrl_hum only takes effect after the following ctrl_meas write.
        self.channel.write_register(REG_CTRL_HUM, &[CTRL_HUM])?;
        self.channel
            .write_register(REG_CTRL_MEAS, &[self.mode.ctrl_meas()])?;
        self.channel.write_register(REG_CONFIG, &[CONFIG])?;
        Ok(())
    }

    fn read_calibration(&mut self) -> Result<CalibrationSet> {
        let mut calib00 = [0u8; REG_CALIB_00_LEN];
        self.read_block(REG_CALIB_00, &mut calib00)?;
        let mut calib26 = [0u8; REG_CALIB_26_LEN];
        self.read_block(REG_CALIB_26, &mut calib26)?;

        let calib = CalibrationSet::decode(&calib00, &calib26);
        trace!("bme280 calibration {:?}", calib);
        Ok(calib)
    }

    /// Reads 0xF7..0xFE in one burst so the three values belong together.
    pub fn read_raw_sample(&mut self) -> Result<RawSample> {
        let mut data = [0u8; REG_ADC_VALUE_LEN];
        self.read_block(REG_PRESS_MSB, &mut data)?;
        Ok(RawSample::decode(&data))
    }

    /// Reads one sample and compensates it.
    ///
    /// Nothing is compensated if the bus read fails.
    pub fn read(&mut self) -> Result<CompensatedReading> {
        let raw = self.read_raw_sample()?;
        let (temperature, fine) = compensate_temperature(&self.calib, raw.temperature);
        let pressure = compensate_pressure(&self.calib, raw.pressure, fine);
        let humidity = compensate_humidity(&self.calib, raw.humidity, fine);
        self.fine_temperature = Some(fine);

        let reading = CompensatedReading {
            temperature,
            pressure,
            humidity,
        };
        trace!("bme280 {:?} -> {:?}", raw, reading);
        Ok(reading)
    }

    /// Starts a single conversion. The sensor returns to sleep afterwards,
    /// so in forced mode this has to precede every [`read`](Self::read).
    ///
    /// Does nothing in normal mode, where the sensor converts on its own
    /// and a forced write would leave it asleep after one sample.
    pub fn trigger_measurement(&mut self) -> Result<()> {
        if self.mode == Mode::Normal {
            debug!("bme280 in normal mode, ignoring trigger");
            return Ok(());
        }
        self.channel
            .write_register(REG_CTRL_MEAS, &[Mode::Forced.ctrl_meas()])
    }

    /// Whether a conversion is still running.
    pub fn is_measuring(&mut self) -> Result<bool> {
        let mut status = [0u8; 1];
        self.read_block(REG_STATUS, &mut status)?;
        Ok(status[0] & STATUS_MEASURING != 0)
    }

    pub fn chip_id(&mut self) -> Result<u8> {
        let mut id = [0u8; 1];
        self.read_block(REG_CHIP_ID, &mut id)?;
        Ok(id[0])
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calib
    }

    /// Fine temperature of the most recent [`read`](Self::read).
    pub fn fine_temperature(&self) -> Option<FineTemperature> {
        self.fine_temperature
    }

    pub fn close(self) -> Result<()> {
        self.channel.close()
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        let received = self.channel.read_register(reg, buf)?;
        if received != buf.len() {
            return Err(Error::ShortRead {
                context: format!("read register {:#04x} on {}", reg, self.channel.device()),
                expected: buf.len(),
                received,
            });
        }
        Ok(())
    }
}
