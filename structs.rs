use serde::Serialize;

/// Factory trimming constants of one BME280, as read from its NVM.
///
/// Decoded once when the driver is configured and never touched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationSet {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,

    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,

    pub dig_h1: i8,
    pub dig_h2: i16,
    pub dig_h3: i8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibrationSet {
    /// Decodes the 0x88..0xA1 block (26 bytes) and the 0xE1..0xE7 block
    /// (7 bytes).
    pub fn decode(calib00: &[u8; 26], calib26: &[u8; 7]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([calib00[i], calib00[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([calib00[i], calib00[i + 1]]);

        // H4 and H5 share the nibbles of 0xE5.
        let dig_h4 = ((calib26[3] as i16) << 4) + (calib26[4] & 0x0F) as i16;
        let dig_h5 = (((calib26[4] & 0xF0) as i16) << 4) | calib26[5] as i16;

        CalibrationSet {
            dig_t1: u16_at(0),
            dig_t2: i16_at(2),
            dig_t3: i16_at(4),

            dig_p1: u16_at(6),
            dig_p2: i16_at(8),
            dig_p3: i16_at(10),
            dig_p4: i16_at(12),
            dig_p5: i16_at(14),
            dig_p6: i16_at(16),
            dig_p7: i16_at(18),
            dig_p8: i16_at(20),
            dig_p9: i16_at(22),

            dig_h1: calib00[25] as i8,
            dig_h2: i16::from_le_bytes([calib26[0], calib26[1]]),
            dig_h3: calib26[2] as i8,
            dig_h4,
            dig_h5,
            dig_h6: calib26[6] as i8,
        }
    }
}

/// Uncompensated ADC values from one burst read of 0xF7..0xFE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub pressure: u32,
    pub temperature: u32,
    pub humidity: u32,
}

impl RawSample {
    pub fn decode(data: &[u8; 8]) -> Self {
        let data = data.map(u32::from);
        RawSample {
            pressure: (data[0] << 12) | (data[1] << 4) | (data[2] >> 4),
            temperature: (data[3] << 12) | (data[4] << 4) | (data[5] >> 4),
            humidity: (data[6] << 8) | data[7],
        }
    }
}

/// Intermediate temperature shared by the pressure and humidity formulas.
///
/// Only [`compensate_temperature`](crate::compensation::compensate_temperature)
/// hands these out, so a pressure or humidity result can only be computed
/// after the temperature of some sample has been.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineTemperature(pub(crate) i32);

impl FineTemperature {
    pub fn value(self) -> i32 {
        self.0
    }
}

/// One compensated BME280 sample in the sensor's native fixed-point units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompensatedReading {
    /// Hundredths of a degree Celsius.
    pub temperature: i32,
    /// Pascal in Q24.8.
    pub pressure: u32,
    /// %RH in Q22.10, left-shifted by another 12 bits.
    pub humidity: u32,
}

impl CompensatedReading {
    pub fn celsius(&self) -> f64 {
        self.temperature as f64 / 100.0
    }

    /// Whole hectopascals, truncated.
    pub fn hectopascal(&self) -> u32 {
        self.pressure / 25600
    }

    pub fn relative_humidity(&self) -> f64 {
        (self.humidity >> 12) as f64 / 1024.0
    }
}
