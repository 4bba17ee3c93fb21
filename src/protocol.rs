//! Command protocol shared by the Scd30 and Scd4x families
//!
//! Each logical operation is mapped by a [`CommandTable`] to the command word,
//! argument, response length and execution time used by a specific chip.
//!
//! Copyright 2019 Ryan Kurte

use crate::Measurement;
use crate::device::*;

/// Logical sensor operation
/// Arguments are already encoded as the 16-bit word sent to the device
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Operation {
    StartContinuous(u16),
    StartLowPowerContinuous,
    StopContinuous,
    SetMeasurementInterval(u16),
    GetMeasurementInterval,
    GetDataReady,
    ReadMeasurement,
    SetAsc(bool),
    GetAsc,
    SetFrc(u16),
    GetFrc,
    ForcedRecalibration(u16),
    SetTemperatureOffset(u16),
    GetTemperatureOffset,
    SetAltitude(u16),
    GetAltitude,
    SetAmbientPressure(u16),
    GetFirmwareVersion,
    GetSerialNumber,
    SelfTest,
    PersistSettings,
    FactoryReset,
    SoftReset,
    MeasureSingleShot,
}

impl Operation {
    /// Name of the operation, for error reporting
    pub fn name(&self) -> &'static str {
        use Operation::*;

        match self {
            StartContinuous(_) => "start_continuous",
            StartLowPowerContinuous => "start_low_power_continuous",
            StopContinuous => "stop_continuous",
            SetMeasurementInterval(_) => "set_measurement_interval",
            GetMeasurementInterval => "get_measurement_interval",
            GetDataReady => "data_ready",
            ReadMeasurement => "read_measurement",
            SetAsc(_) => "set_asc",
            GetAsc => "get_asc",
            SetFrc(_) => "set_frc",
            GetFrc => "get_frc",
            ForcedRecalibration(_) => "forced_recalibration",
            SetTemperatureOffset(_) => "set_temperature_offset",
            GetTemperatureOffset => "get_temperature_offset",
            SetAltitude(_) => "set_altitude",
            GetAltitude => "get_altitude",
            SetAmbientPressure(_) => "set_ambient_pressure",
            GetFirmwareVersion => "firmware_version",
            GetSerialNumber => "serial_number",
            SelfTest => "self_test",
            PersistSettings => "persist_settings",
            FactoryReset => "factory_reset",
            SoftReset => "soft_reset",
            MeasureSingleShot => "measure_single_shot",
        }
    }

    /// Range check the operation argument, run before the operation is encoded
    pub fn validate(&self) -> Result<(), &'static str> {
        use Operation::*;

        match *self {
            StartContinuous(p) => check_pressure(p).map(|_| ()),
            // Compensation is always active on the Scd4x, there is no disable value
            SetAmbientPressure(0) => Err("pressure must be 700-1400 mBar"),
            SetAmbientPressure(p) => check_pressure(p).map(|_| ()),
            SetMeasurementInterval(i) => check_interval(i).map(|_| ()),
            SetFrc(v) | ForcedRecalibration(v) => check_frc(v).map(|_| ()),
            _ => Ok(()),
        }
    }
}

/// Wire level description of an operation
#[derive(PartialEq, Clone, Debug)]
pub struct CommandSpec {
    /// 16-bit command word
    pub code: u16,
    /// Optional argument word (sent with CRC)
    pub arg: Option<u16>,
    /// Number of data words to read back, 0 for write-only commands
    pub response_words: usize,
    /// Execution time in ms between the write and the read (or the next command)
    pub delay_ms: u32,
}

impl CommandSpec {
    /// Write-only command with no argument or execution time
    pub const fn action(code: u16) -> Self {
        Self{ code, arg: None, response_words: 0, delay_ms: 0 }
    }

    /// Write-only command with an argument word
    pub const fn set(code: u16, arg: u16) -> Self {
        Self{ code, arg: Some(arg), response_words: 0, delay_ms: 0 }
    }

    /// Command returning `response_words` data words
    pub const fn read(code: u16, response_words: usize) -> Self {
        Self{ code, arg: None, response_words, delay_ms: 0 }
    }

    /// Set the execution time for the command
    pub fn delay(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Data words read back from a device
#[derive(PartialEq, Clone, Debug)]
pub struct Response {
    words: [u16; MAX_RESPONSE_WORDS],
    len: usize,
}

impl Response {
    pub fn new(words: [u16; MAX_RESPONSE_WORDS], len: usize) -> Self {
        Self{ words, len: len.min(MAX_RESPONSE_WORDS) }
    }

    pub fn words(&self) -> &[u16] {
        &self.words[..self.len]
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u16] {
        &mut self.words[..self.len]
    }

    /// First data word, zero for an empty response
    pub fn word(&self) -> u16 {
        self.words[0]
    }
}

/// Per-family command table
///
/// Selected once when the device is created, this maps each [`Operation`] to
/// its wire encoding and interprets responses in the family's number formats.
pub trait CommandTable {
    /// I2C address of the device
    fn address(&self) -> u8;

    /// Encode an operation, `None` if the family does not support it
    /// Responses are limited to `MAX_RESPONSE_WORDS` data words
    fn encode(&self, op: Operation) -> Option<CommandSpec>;

    /// Decode a `ReadMeasurement` response
    fn decode_measurement(&self, resp: &Response) -> Measurement;

    /// Decode a `GetDataReady` response
    fn decode_data_ready(&self, raw: u16) -> bool;

    /// Convert a temperature offset in degrees celsius into the argument word
    fn encode_temperature_offset(&self, offset: f32) -> Option<u16>;

    /// Convert a temperature offset argument word into degrees celsius
    fn decode_temperature_offset(&self, raw: u16) -> f32;
}

/// Assemble a big endian IEEE-754 float from two data words
pub fn float_from_words(msw: u16, lsw: u16) -> f32 {
    f32::from_bits((msw as u32) << 16 | (lsw as u32))
}

/// Fixed point temperature conversion, -45 + 175 * raw / 2^16 degrees celsius
pub fn temperature_from_ticks(raw: u16) -> f32 {
    -45.0 + 175.0 * (raw as f32) / 65536.0
}

/// Fixed point humidity conversion, 100 * raw / 2^16 %RH
pub fn humidity_from_ticks(raw: u16) -> f32 {
    100.0 * (raw as f32) / 65536.0
}

/// Combine three data words into a 48-bit serial number
pub fn serial_from_words(words: &[u16; 3]) -> u64 {
    (words[0] as u64) << 32 | (words[1] as u64) << 16 | (words[2] as u64)
}

/// Decode a forced recalibration result into the applied correction in ppm
/// Returns `None` where the device reports the calibration failed (0xFFFF)
pub fn frc_correction(raw: u16) -> Option<i16> {
    match raw {
        0xffff => None,
        _ => Some((raw as i32 - 0x8000) as i16),
    }
}

/// Check an ambient pressure in mBar, 0 disables compensation
/// Validators run before anything is encoded, so rejected values never reach the bus
pub fn check_pressure(pressure: u16) -> Result<u16, &'static str> {
    match pressure {
        0 | PRESSURE_MIN..=PRESSURE_MAX => Ok(pressure),
        _ => Err("pressure must be 0 or 700-1400 mBar"),
    }
}

/// Check a continuous measurement interval in seconds
pub fn check_interval(interval: u16) -> Result<u16, &'static str> {
    match interval {
        INTERVAL_MIN..=INTERVAL_MAX => Ok(interval),
        _ => Err("interval must be 2-1800 s"),
    }
}

/// Check a forced recalibration reference concentration in ppm
pub fn check_frc(co2_ppm: u16) -> Result<u16, &'static str> {
    match co2_ppm {
        FRC_MIN..=FRC_MAX => Ok(co2_ppm),
        _ => Err("reference CO2 must be 400-2000 ppm"),
    }
}

/// Scale a non-negative value into a 16-bit word, `None` if it does not fit
pub(crate) fn scale_to_word(value: f32, scale: f32) -> Option<u16> {
    let v = (value * scale).round();
    if !v.is_finite() || v < 0.0 || v > u16::MAX as f32 {
        return None;
    }
    Some(v as u16)
}

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_float_from_words() {
        let tests = &[
            ((0x4520, 0x0000), 2560.0),
            ((0x4522, 0x8000), 2600.0),
            ((0x43db, 0x8c2e), 439.09),
            ((0x41d9, 0xe7ff), 27.24),
            ((0x4243, 0x3a1b), 48.81),
        ];

        for t in tests {
            let v = float_from_words((t.0).0, (t.0).1);
            assert_approx_eq!(v, t.1, 0.01);
        }
    }

    #[test]
    fn test_fixed_point() {
        assert_approx_eq!(temperature_from_ticks(0x8000), 42.5);
        assert_approx_eq!(temperature_from_ticks(0x0000), -45.0);
        assert_approx_eq!(temperature_from_ticks(0x6667), 25.0, 0.01);

        assert_approx_eq!(humidity_from_ticks(0x8000), 50.0);
        assert_approx_eq!(humidity_from_ticks(0x0000), 0.0);
    }

    #[test]
    fn test_serial() {
        assert_eq!(serial_from_words(&[0xf896, 0x9f07, 0x3bb8]), 0xf896_9f07_3bb8);
        assert_eq!(serial_from_words(&[0x0000, 0x0000, 0x0001]), 1);
    }

    #[test]
    fn test_frc_correction() {
        assert_eq!(frc_correction(0xffff), None);
        assert_eq!(frc_correction(0x8032), Some(50));
        assert_eq!(frc_correction(0x8000), Some(0));
        assert_eq!(frc_correction(0x7fce), Some(-50));
    }

    #[test]
    fn test_check_interval() {
        assert_eq!(check_interval(2), Ok(2));
        assert_eq!(check_interval(1800), Ok(1800));

        for v in &[0, 1, 1801, u16::MAX] {
            assert!(check_interval(*v).is_err(), "interval {}", v);
        }
    }

    #[test]
    fn test_check_pressure() {
        for v in &[0, 700, 1013, 1400] {
            assert_eq!(check_pressure(*v), Ok(*v));
        }

        for v in &[1, 699, 1401] {
            assert!(check_pressure(*v).is_err(), "pressure {}", v);
        }
    }

    #[test]
    fn test_check_frc() {
        assert_eq!(check_frc(400), Ok(400));
        assert_eq!(check_frc(2000), Ok(2000));

        for v in &[0, 399, 2001] {
            assert!(check_frc(*v).is_err(), "frc {}", v);
        }
    }

    #[test]
    fn test_validate() {
        assert_eq!(Operation::StartContinuous(0).validate(), Ok(()));
        assert_eq!(Operation::SetMeasurementInterval(2).validate(), Ok(()));
        assert_eq!(Operation::SetAmbientPressure(1013).validate(), Ok(()));
        assert_eq!(Operation::ForcedRecalibration(400).validate(), Ok(()));
        assert_eq!(Operation::ReadMeasurement.validate(), Ok(()));

        let invalid = &[
            Operation::StartContinuous(5),
            Operation::SetMeasurementInterval(1),
            Operation::SetMeasurementInterval(1801),
            Operation::SetAmbientPressure(0),
            Operation::SetAmbientPressure(1401),
            Operation::SetFrc(399),
            Operation::ForcedRecalibration(2001),
        ];

        for op in invalid {
            assert!(op.validate().is_err(), "{:?}", op);
        }
    }

    #[test]
    fn test_scale_to_word() {
        assert_eq!(scale_to_word(5.0, 100.0), Some(500));
        assert_eq!(scale_to_word(0.0, 100.0), Some(0));
        assert_eq!(scale_to_word(-0.5, 100.0), None);
        assert_eq!(scale_to_word(700.0, 100.0), None);
        assert_eq!(scale_to_word(f32::NAN, 100.0), None);
    }
}
