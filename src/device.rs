//! Scd30 / Scd4x device definitions
//!
//! Copyright 2019 Ryan Kurte

/// Scd30 default I2C address
/// (note this is shifted left 1 bit on the wire)
pub const SCD30_ADDRESS: u8 = 0x61;

/// Scd4x (SCD40 / SCD41) default I2C address
pub const SCD4X_ADDRESS: u8 = 0x62;

pub const CRC_POLY: u8 = 0x31;
pub const CRC_INIT: u8 = 0xff;
pub const CRC_XOR: u8 = 0x00;

/// Size of a data word on the wire (two data bytes and a CRC-8 byte)
pub const WIRE_WORD_LEN: usize = 3;

/// Largest response (in data words) issued by any supported command
pub const MAX_RESPONSE_WORDS: usize = 6;

/// Ambient pressure compensation range in mBar (0 disables compensation on the Scd30)
pub const PRESSURE_MIN: u16 = 700;
pub const PRESSURE_MAX: u16 = 1400;

/// Continuous measurement interval range in seconds
pub const INTERVAL_MIN: u16 = 2;
pub const INTERVAL_MAX: u16 = 1800;

/// Forced recalibration reference range in ppm
pub const FRC_MIN: u16 = 400;
pub const FRC_MAX: u16 = 2000;

/// Scd30 I2C Command
/// Command and data are big endian 16-bit unsigned integers, all Command with data are followed by a CRC-8 checksum
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Scd30Command {
    /// Start continuous mode
    /// Data is a u16 representing pressure in mBar for compensation
    /// or zero for no pressure compensation
    StartContinuousMode = 0x0010,

    /// Stop continuous mode
    /// No associated data or CRC
    StopContinuousMode = 0x0104,

    /// Set (or with no data, read) interval for continuous measurement mode
    /// Data is a u16 in seconds between 2 and 1800
    MeasurementInterval = 0x4600,

    /// Fetch data ready status
    /// This returns 1 if data is available in the buffer, 0 otherwise
    GetDataReady = 0x0202,

    /// Read a measurement from the buffer
    ReadMeasurement = 0x0300,

    /// Enable or Disable Automatic Self Calibration (ASC)
    /// Data is a u16, 1 enables ASC and 0 disables ASC
    Asc = 0x5306,

    /// Set Forced Recalibration Value (FRC)
    /// This is used to compensate for sensor drift when a CO2 reference value is available
    /// Data is a u16 CO2 concentration in ppm
    Frc = 0x5204,

    /// Set temperature offset
    /// Data is a uint16 in hundredths of a degree celsius, ie. 4.3 degrees -> 430u16
    TempOffset = 0x5403,

    /// Set altitude compensation
    /// This allows NDIR CO2 sensing to be calibrated by altitude
    /// Data is uint16 in meters above sea level
    AltComp = 0x5102,

    /// Soft Reset the device
    /// No associated data or CRC
    SoftReset = 0xd304,

    GetFirmwareVersion = 0xd100,
}

/// Scd4x I2C Command
/// Same framing as the Scd30, but most commands require an execution time
/// before the result may be read (or the next command issued)
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Scd4xCommand {
    StartPeriodicMeasurement = 0x21b1,
    StartLowPowerPeriodicMeasurement = 0x21ac,
    /// 500ms execution time
    StopPeriodicMeasurement = 0x3f86,
    ReadMeasurement = 0xec05,
    GetDataReadyStatus = 0xe4b8,

    /// Data is offset * 65536 / 175
    SetTemperatureOffset = 0x241d,
    GetTemperatureOffset = 0x2318,
    /// Data is uint16 in meters above sea level
    SetSensorAltitude = 0x2427,
    GetSensorAltitude = 0x2322,
    /// Data is uint16 in hPa (equivalent to mBar)
    SetAmbientPressure = 0xe000,

    /// Data is the reference concentration in ppm, returns the applied correction + 0x8000
    /// 400ms execution time
    PerformForcedRecalibration = 0x362f,
    SetAutomaticSelfCalibration = 0x2416,
    GetAutomaticSelfCalibration = 0x2313,

    /// Write settings to EEPROM, 800ms execution time
    PersistSettings = 0x3615,
    GetSerialNumber = 0x3682,
    /// 10s execution time
    PerformSelfTest = 0x3639,
    /// 1200ms execution time
    PerformFactoryReset = 0x3632,
    /// Reload settings from EEPROM, 20ms execution time
    Reinit = 0x3646,

    /// SCD41 only, 5s execution time
    MeasureSingleShot = 0x219d,
}
