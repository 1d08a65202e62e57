//! Periodic sampling of both sensors into a shared latest snapshot.

use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::bme280::{Bme280, Mode};
use crate::channel::Transport;
use crate::error::Result;
use crate::mhz19::MhZ19;

const MEASURING_POLLS: u32 = 20;
const MEASURING_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One combined reading as published over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// CO2 in ppm.
    pub co2: u16,
    /// False when the CO2 frame failed its checksum but the value was kept.
    pub co2_verified: bool,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Whole hPa.
    pub pressure: u32,
    /// Percent relative humidity.
    pub humidity: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

/// Latest snapshot, shared between the poller and the HTTP handlers.
pub type SharedSnapshot = Arc<RwLock<Option<Snapshot>>>;

pub fn shared_snapshot() -> SharedSnapshot {
    Arc::new(RwLock::new(None))
}

pub fn latest(shared: &SharedSnapshot) -> Option<Snapshot> {
    match shared.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn publish(shared: &SharedSnapshot, snapshot: Snapshot) {
    match shared.write() {
        Ok(mut guard) => *guard = Some(snapshot),
        Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
    }
}

/// The CO2 sensor and the climate sensor, each on its own channel.
pub struct Station<C, B> {
    co2: MhZ19<C>,
    climate: Bme280<B>,
}

impl<C: Transport, B: Transport> Station<C, B> {
    pub fn new(co2: MhZ19<C>, climate: Bme280<B>) -> Self {
        Station { co2, climate }
    }

    /// Reads both sensors once.
    ///
    /// A CO2 value that fails its checksum is accepted and flagged; a CO2
    /// value of zero is treated as a failed read.
    pub fn sample(&mut self) -> anyhow::Result<Snapshot> {
        let (co2, co2_verified) = match self.co2.read() {
            Ok(ppm) => (ppm, true),
            Err(err) => match err.unverified_concentration() {
                Some(ppm) => {
                    warn!("using unverified CO2 value: {}", err);
                    (ppm, false)
                }
                None => return Err(err.into()),
            },
        };
        if co2 == 0 {
            anyhow::bail!("CO2 sensor reported 0 ppm");
        }

        if self.climate.mode() != Mode::Normal {
            self.climate.trigger_measurement()?;
            self.wait_for_conversion()?;
        }
        let climate = self.climate.read()?;

        Ok(Snapshot {
            co2,
            co2_verified,
            temperature: climate.celsius(),
            pressure: climate.hectopascal(),
            humidity: climate.relative_humidity(),
            timestamp: unix_time(),
        })
    }

    fn wait_for_conversion(&mut self) -> Result<()> {
        for _ in 0..MEASURING_POLLS {
            if !self.climate.is_measuring()? {
                return Ok(());
            }
            thread::sleep(MEASURING_POLL_INTERVAL);
        }
        warn!("bme280 still measuring, reading previous result");
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.co2.close()?;
        self.climate.close()
    }
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// One polling step: opens the station if needed, samples and publishes.
///
/// A failed sample closes the station so the next step reopens both
/// channels from scratch.
pub fn poll_once<C, B, F>(
    station: &mut Option<Station<C, B>>,
    open: &mut F,
    shared: &SharedSnapshot,
) where
    C: Transport,
    B: Transport,
    F: FnMut() -> anyhow::Result<Station<C, B>>,
{
    if station.is_none() {
        match open() {
            Ok(opened) => *station = Some(opened),
            Err(err) => {
                error!("failed to open sensors: {:#}", err);
                return;
            }
        }
    }
    let Some(current) = station.as_mut() else {
        return;
    };

    match current.sample() {
        Ok(snapshot) => {
            info!(
                "co2 {} ppm, {:.2} C, {} hPa, {:.2} %RH",
                snapshot.co2, snapshot.temperature, snapshot.pressure, snapshot.humidity
            );
            publish(shared, snapshot);
        }
        Err(err) => {
            error!("sampling failed: {:#}", err);
            if let Some(failed) = station.take() {
                if let Err(err) = failed.close() {
                    debug!("closing sensors after failure: {}", err);
                }
            }
        }
    }
}

/// Polls forever at `interval`. Blocks the calling thread.
pub fn run<C, B, F>(mut open: F, shared: SharedSnapshot, interval: Duration)
where
    C: Transport,
    B: Transport,
    F: FnMut() -> anyhow::Result<Station<C, B>>,
{
    let mut station = None;
    loop {
        poll_once(&mut station, &mut open, &shared);
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bme280::{REG_CALIB_00, REG_CALIB_26, REG_PRESS_MSB, REG_STATUS};
    use crate::channel::Channel;
    use crate::mock::{RegisterFile, ScriptedPort, CALIB00, CALIB26};

    const RESPONSE_300: [u8; 9] = [0xFF, 0x86, 0x01, 0x2C, 0x00, 0x00, 0x00, 0x00, 0x4D];
    const SAMPLE: [u8; 8] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];

    fn station(co2_response: &[u8]) -> anyhow::Result<Station<ScriptedPort, RegisterFile>> {
        station_with(co2_response, RegisterFile::new())
    }

    fn station_with(
        co2_response: &[u8],
        mut regs: RegisterFile,
    ) -> anyhow::Result<Station<ScriptedPort, RegisterFile>> {
        regs.load(REG_CALIB_00, &CALIB00);
        regs.load(REG_CALIB_26, &CALIB26);
        regs.load(REG_PRESS_MSB, &SAMPLE);

        let co2 = MhZ19::new(Channel::new("serial", ScriptedPort::new(co2_response)));
        let climate = Bme280::new(Channel::new("i2c", regs), Mode::Forced)?;
        Ok(Station::new(co2, climate))
    }

    #[test]
    fn sample_combines_both_sensors() {
        let snapshot = station(&RESPONSE_300).unwrap().sample().unwrap();
        assert_eq!(snapshot.co2, 300);
        assert!(snapshot.co2_verified);
        assert!((snapshot.temperature - 25.08).abs() < 1e-9);
        assert_eq!(snapshot.pressure, 1006);
        assert!((snapshot.humidity - 56.203125).abs() < 1e-9);
    }

    #[test]
    fn stuck_status_bit_still_reads_sample() {
        let mut regs = RegisterFile::new();
        regs.load(REG_STATUS, &[0x08]);
        let mut station = station_with(&RESPONSE_300, regs).unwrap();

        let snapshot = station.sample().unwrap();
        assert_eq!(snapshot.co2, 300);
        assert_eq!(snapshot.pressure, 1006);
    }

    #[test]
    fn checksum_failure_is_flagged_not_dropped() {
        let mut response = RESPONSE_300;
        response[8] = 0x00;
        let snapshot = station(&response).unwrap().sample().unwrap();
        assert_eq!(snapshot.co2, 300);
        assert!(!snapshot.co2_verified);
    }

    #[test]
    fn zero_ppm_is_rejected() {
        let response = [0xFF, 0x86, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7A];
        assert!(station(&response).unwrap().sample().is_err());
    }

    #[test]
    fn poll_publishes_snapshot() {
        let shared = shared_snapshot();
        let mut current = None;
        let mut open = || station(&RESPONSE_300);

        poll_once(&mut current, &mut open, &shared);
        assert!(current.is_some());
        assert_eq!(latest(&shared).map(|s| s.co2), Some(300));
    }

    #[test]
    fn failed_poll_drops_station() {
        let shared = shared_snapshot();
        let mut current = None;
        // Second poll finds the CO2 script exhausted.
        let mut open = || station(&RESPONSE_300);

        poll_once(&mut current, &mut open, &shared);
        poll_once(&mut current, &mut open, &shared);
        assert!(current.is_none());
        assert_eq!(latest(&shared).map(|s| s.co2), Some(300));
    }

    #[test]
    fn failed_open_publishes_nothing() {
        let shared = shared_snapshot();
        let mut current: Option<Station<ScriptedPort, RegisterFile>> = None;
        let mut open = || -> anyhow::Result<Station<ScriptedPort, RegisterFile>> {
            anyhow::bail!("no device")
        };

        poll_once(&mut current, &mut open, &shared);
        assert!(current.is_none());
        assert!(latest(&shared).is_none());
    }
}
