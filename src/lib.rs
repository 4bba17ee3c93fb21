//! Driver for Sensirion Scd30 and Scd4x NDIR CO2 sensors over I2C
//!
//! The two sensor families share a framing (16-bit command words, data words
//! each followed by a CRC-8) but differ in command codes, execution times and
//! number formats. These differences are captured by a [`CommandTable`]
//! ([`Scd30`] or [`Scd4x`]) selected when the device is connected.
//!
//! Copyright 2019 Ryan Kurte

//#![no_std]

use core::fmt::Debug;
use core::marker::PhantomData;

extern crate embedded_hal;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

#[macro_use]
extern crate log;

pub mod device;
pub mod base;
pub mod protocol;
pub mod scd30;
pub mod scd4x;

use crate::base::Base;
use crate::device::MAX_RESPONSE_WORDS;
pub use crate::protocol::{CommandTable, Operation, Response};
pub use crate::scd30::Scd30;
pub use crate::scd4x::Scd4x;

/// Scd sensor object
/// This is generic over a command table, an I2C connector, a delay provider and associated error type
pub struct Scd<Table, Conn, Delay, Err> {
    table: Table,
    conn: Option<Conn>,
    delay: Delay,
    _err: PhantomData<Err>,
}

/// Scd error object
#[derive(Debug, PartialEq)]
pub enum Error<ConnErr> {
    /// Underlying bus error
    Conn(ConnErr),
    /// CRC mismatch (computed, received)
    Crc(u8, u8),
    /// Buffer length is not a whole number of data words
    Framing(usize),
    /// Argument out of range, nothing was sent to the device
    InvalidArgument(&'static str),
    /// Forced recalibration was rejected by the device
    CalibrationFailed,
    /// Operation not available on this sensor family
    Unsupported(&'static str),
    /// Device has been disconnected
    AlreadyClosed,
    NoDevice,
}

/// Scd measurement object
#[derive(PartialEq, Clone, Debug)]
pub struct Measurement {
    /// CO2 concentration in parts-per-million (PPM)
    /// Range: 0 - 10,000 (Scd30), 0 - 40,000 (Scd4x)
    pub co2: f32,
    /// Temperature in degrees celsius
    /// Range: -40 - 125 C (Scd30), -10 - 60 C (Scd4x)
    pub temp: f32,
    /// Relative Humidity (%)
    /// Range: 0 - 100
    pub rh: f32,
}

impl <Table, Conn, Delay, Err> Scd <Table, Conn, Delay, Err> where
    Table: CommandTable,
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
{
    /// Connect to a sensor using the provided I2C connector and command table
    ///
    /// The Scd30 is probed by reading its firmware version. The Scd4x is not,
    /// as it ignores most commands while periodic measurement is running.
    pub fn connect(conn: Conn, delay: Delay, table: Table) -> Result<Self, Error<Err>> {
        // Create sensor object
        let mut s = Scd{ table, conn: Some(conn), delay, _err: PhantomData };

        // Check communication
        if s.table.encode(Operation::GetFirmwareVersion).is_some() {
            let v = s.firmware_version()?;
            if v == 0x0000 || v == 0xFFFF {
                return Err(Error::NoDevice)
            }
            debug!("Connected to device at 0x{:02x}, firmware: 0x{:04x}", s.table.address(), v);
        }

        // Return sensor
        Ok(s)
    }

    /// Disconnect from the sensor, returning the underlying I2C connector
    /// Subsequent calls (and any other operation) fail with `AlreadyClosed`
    pub fn disconnect(&mut self) -> Result<Conn, Error<Err>> {
        debug!("Disconnecting from device at 0x{:02x}", self.table.address());
        self.conn.take().ok_or(Error::AlreadyClosed)
    }

    /// Start continuous sensing mode with optional pressure compensation
    /// pressure_compensation should either be the current pressure in millibar or 0 to disable compensation
    /// (the Scd4x only accepts 0 here, see `set_ambient_pressure`)
    pub fn start_continuous(&mut self, pressure_compensation: u16) -> Result<(), Error<Err>> {
        self.execute(Operation::StartContinuous(pressure_compensation)).map(|_| ())
    }

    /// Start low power periodic measurement (Scd4x, 30s interval)
    pub fn start_low_power_continuous(&mut self) -> Result<(), Error<Err>> {
        self.execute(Operation::StartLowPowerContinuous).map(|_| ())
    }

    /// Stop continuous sensing mode
    pub fn stop_continuous(&mut self) -> Result<(), Error<Err>> {
        self.execute(Operation::StopContinuous).map(|_| ())
    }

    /// Configure measurement interval in seconds (2 - 1800)
    pub fn set_measurement_interval(&mut self, interval: u16) -> Result<(), Error<Err>> {
        self.execute(Operation::SetMeasurementInterval(interval)).map(|_| ())
    }

    /// Fetch measurement interval in seconds
    pub fn get_measurement_interval(&mut self) -> Result<u16, Error<Err>> {
        self.execute(Operation::GetMeasurementInterval).map(|r| r.word())
    }

    /// Check whether measurement data is available in the buffer
    pub fn data_ready(&mut self) -> Result<bool, Error<Err>> {
        let r = self.execute(Operation::GetDataReady)?;
        Ok(self.table.decode_data_ready(r.word()))
    }

    /// Read measurement data from the buffer
    pub fn read_measurement(&mut self) -> Result<Measurement, Error<Err>> {
        let r = self.execute(Operation::ReadMeasurement)?;
        Ok(self.table.decode_measurement(&r))
    }

    /// Enable or disable Automatic Self-Calibration
    pub fn set_asc(&mut self, enabled: bool) -> Result<(), Error<Err>> {
        self.execute(Operation::SetAsc(enabled)).map(|_| ())
    }

    /// Check whether Automatic Self-Calibration is enabled
    pub fn get_asc(&mut self) -> Result<bool, Error<Err>> {
        self.execute(Operation::GetAsc).map(|r| r.word() != 0)
    }

    /// Set Forced Recalibration Value (Scd30)
    /// This allows the sensor to be recalibrated using a reference CO2 source (400 - 2000 ppm)
    pub fn set_frc(&mut self, cal_ppm: u16) -> Result<(), Error<Err>> {
        self.execute(Operation::SetFrc(cal_ppm)).map(|_| ())
    }

    /// Fetch Forced Recalibration Value (Scd30)
    pub fn get_frc(&mut self) -> Result<u16, Error<Err>> {
        self.execute(Operation::GetFrc).map(|r| r.word())
    }

    /// Perform Forced Recalibration against a reference CO2 source (Scd4x, 400 - 2000 ppm)
    /// Returns the correction applied in ppm
    pub fn forced_recalibration(&mut self, cal_ppm: u16) -> Result<i16, Error<Err>> {
        let r = self.execute(Operation::ForcedRecalibration(cal_ppm))?;

        let correction = protocol::frc_correction(r.word()).ok_or(Error::CalibrationFailed)?;
        debug!("Forced recalibration to {} ppm, correction: {} ppm", cal_ppm, correction);

        Ok(correction)
    }

    /// Set Temperature Compensation in degrees celsius
    /// Allows compensation for temperature variation during operation
    pub fn set_temperature_offset(&mut self, temperature: f32) -> Result<(), Error<Err>> {
        let t = self.table.encode_temperature_offset(temperature)
            .ok_or(Error::InvalidArgument("temperature offset out of range"))?;
        self.execute(Operation::SetTemperatureOffset(t)).map(|_| ())
    }

    /// Fetch Temperature Compensation in degrees celsius
    pub fn get_temperature_offset(&mut self) -> Result<f32, Error<Err>> {
        let r = self.execute(Operation::GetTemperatureOffset)?;
        Ok(self.table.decode_temperature_offset(r.word()))
    }

    /// Set Altitude Compensation
    /// Allows compensation for CO2 measurement using altitude over sea level
    pub fn set_altitude(&mut self, altitude: u16) -> Result<(), Error<Err>> {
        self.execute(Operation::SetAltitude(altitude)).map(|_| ())
    }

    /// Fetch Altitude Compensation in meters above sea level
    pub fn get_altitude(&mut self) -> Result<u16, Error<Err>> {
        self.execute(Operation::GetAltitude).map(|r| r.word())
    }

    /// Set ambient pressure compensation in mBar (Scd4x, 700 - 1400)
    ///
    /// The Scd4x has no value that disables pressure compensation, so 0 is
    /// rejected here. `factory_reset` returns it to the default of 1013 mBar.
    pub fn set_ambient_pressure(&mut self, pressure: u16) -> Result<(), Error<Err>> {
        self.execute(Operation::SetAmbientPressure(pressure)).map(|_| ())
    }

    /// Fetch firmware version (Scd30)
    pub fn firmware_version(&mut self) -> Result<u16, Error<Err>> {
        self.execute(Operation::GetFirmwareVersion).map(|r| r.word())
    }

    /// Fetch 48-bit serial number (Scd4x)
    pub fn serial_number(&mut self) -> Result<u64, Error<Err>> {
        let r = self.execute(Operation::GetSerialNumber)?;
        let w = r.words();
        Ok(protocol::serial_from_words(&[w[0], w[1], w[2]]))
    }

    /// Run the on-chip self test (Scd4x), returns true on success
    /// This blocks for 10 seconds
    pub fn self_test(&mut self) -> Result<bool, Error<Err>> {
        self.execute(Operation::SelfTest).map(|r| r.word() == 0)
    }

    /// Persist settings to EEPROM (Scd4x)
    pub fn persist_settings(&mut self) -> Result<(), Error<Err>> {
        self.execute(Operation::PersistSettings).map(|_| ())
    }

    /// Reset settings to factory defaults (Scd4x)
    pub fn factory_reset(&mut self) -> Result<(), Error<Err>> {
        self.execute(Operation::FactoryReset).map(|_| ())
    }

    /// Soft reset the underlying device (reinit on the Scd4x)
    pub fn soft_reset(&mut self) -> Result<(), Error<Err>> {
        self.execute(Operation::SoftReset).map(|_| ())
    }

    /// Take a single shot measurement (SCD41), blocks for 5 seconds
    /// The result is then available via `read_measurement`
    pub fn measure_single_shot(&mut self) -> Result<(), Error<Err>> {
        self.execute(Operation::MeasureSingleShot).map(|_| ())
    }

    /// Execute an operation using the command table, returning any response words
    /// Arguments are range checked first, an invalid operation never reaches the bus
    pub fn execute(&mut self, op: Operation) -> Result<Response, Error<Err>> {
        let conn = self.conn.as_mut().ok_or(Error::AlreadyClosed)?;
        op.validate().map_err(Error::InvalidArgument)?;
        let spec = self.table.encode(op).ok_or(Error::Unsupported(op.name()))?;
        let address = self.table.address();

        debug!("Executing {:?} (command: 0x{:04x})", op, spec.code);

        let mut resp = Response::new([0u16; MAX_RESPONSE_WORDS], spec.response_words);
        if spec.response_words == 0 {
            conn.perform_command(address, spec.code, spec.arg)?;

            // Wait for execution before the next command
            if spec.delay_ms > 0 {
                self.delay.delay_ms(spec.delay_ms);
            }
        } else {
            conn.perform_command_and_read(address, spec.code, spec.arg, &mut self.delay, spec.delay_ms, resp.words_mut())?;
        }

        Ok(resp)
    }
}
