//! BME280 fixed-point compensation.
//!
//! Integer formulas from section 4.2.3 of the BME280 datasheet
//! (BST-BME280-DS002). Intermediate products are allowed to overflow: every
//! multiply, add and subtract wraps at the type width, and right shifts of
//! signed values are arithmetic, exactly as the reference C code behaves.
//!
//! Temperature has to be compensated first. It yields the [`FineTemperature`]
//! that the pressure and humidity formulas take as input.

use crate::structs::{CalibrationSet, FineTemperature};

/// Upper bound of the humidity result, 100 %RH.
pub const HUMIDITY_MAX: u32 = 419_430_400;

/// Returns the temperature in 1/100 °C together with the fine temperature.
pub fn compensate_temperature(calib: &CalibrationSet, adc_t: u32) -> (i32, FineTemperature) {
    let adc_t = adc_t as i32;
    let t1 = calib.dig_t1 as i32;
    let t2 = calib.dig_t2 as i32;
    let t3 = calib.dig_t3 as i32;

    let var1 = ((adc_t >> 3).wrapping_sub(t1 << 1)).wrapping_mul(t2) >> 11;
    let d = (adc_t >> 4).wrapping_sub(t1);
    let var2 = ((d.wrapping_mul(d) >> 12).wrapping_mul(t3)) >> 14;

    let fine = var1.wrapping_add(var2);
    let temperature = fine.wrapping_mul(5).wrapping_add(128) >> 8;
    (temperature, FineTemperature(fine))
}

/// Returns pressure in Pa as Q24.8 (divide by 256 for Pa, 25600 for hPa).
///
/// A zero denominator yields 0 instead of a division fault. That value is a
/// sentinel for a degenerate calibration, never a physical reading.
pub fn compensate_pressure(calib: &CalibrationSet, adc_p: u32, fine: FineTemperature) -> u32 {
    let p1 = calib.dig_p1 as i64;
    let p2 = calib.dig_p2 as i64;
    let p3 = calib.dig_p3 as i64;
    let p4 = calib.dig_p4 as i64;
    let p5 = calib.dig_p5 as i64;
    let p6 = calib.dig_p6 as i64;
    let p7 = calib.dig_p7 as i64;
    let p8 = calib.dig_p8 as i64;
    let p9 = calib.dig_p9 as i64;

    let mut var1 = (fine.0 as i64).wrapping_sub(128000);
    let mut var2 = var1.wrapping_mul(var1).wrapping_mul(p6);
    var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 17);
    var2 = var2.wrapping_add(p4 << 35);
    var1 = (var1.wrapping_mul(var1).wrapping_mul(p3) >> 8)
        .wrapping_add(var1.wrapping_mul(p2) << 12);
    var1 = ((1i64 << 47).wrapping_add(var1)).wrapping_mul(p1) >> 33;
    if var1 == 0 {
        return 0;
    }

    let mut p = 1_048_576i64.wrapping_sub(adc_p as i64);
    p = ((p << 31).wrapping_sub(var2)).wrapping_mul(3125).wrapping_div(var1);
    var1 = p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
    var2 = p8.wrapping_mul(p) >> 19;
    p = (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(p7 << 4);
    p as u32
}

/// Returns relative humidity as Q22.10 %RH shifted left by 12 more bits,
/// clamped to `0..=HUMIDITY_MAX`.
pub fn compensate_humidity(calib: &CalibrationSet, adc_h: u32, fine: FineTemperature) -> u32 {
    let adc_h = adc_h as i32;
    let h1 = calib.dig_h1 as i32;
    let h2 = calib.dig_h2 as i32;
    let h3 = calib.dig_h3 as i32;
    let h4 = calib.dig_h4 as i32;
    let h5 = calib.dig_h5 as i32;
    let h6 = calib.dig_h6 as i32;

    let mut v = fine.0.wrapping_sub(76800);

    let offset = ((adc_h << 14)
        .wrapping_sub(h4 << 20)
        .wrapping_sub(h5.wrapping_mul(v))
        .wrapping_add(16384))
        >> 15;
    let scale = ((((v.wrapping_mul(h6) >> 10)
        .wrapping_mul((v.wrapping_mul(h3) >> 11).wrapping_add(32768))
        >> 10)
        .wrapping_add(2_097_152))
    .wrapping_mul(h2)
    .wrapping_add(8192))
        >> 14;
    v = offset.wrapping_mul(scale);

    let square = (v >> 15).wrapping_mul(v >> 15) >> 7;
    v = v.wrapping_sub(square.wrapping_mul(h1) >> 4);

    v.clamp(0, HUMIDITY_MAX as i32) as u32
}
