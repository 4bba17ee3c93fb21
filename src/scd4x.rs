//! Scd4x (SCD40 / SCD41) command table
//!
//! Copyright 2019 Ryan Kurte

use crate::Measurement;
use crate::device::*;
use crate::protocol::*;

/// Low 11 bits of the data ready status, non-zero when a measurement is available
const DATA_READY_MASK: u16 = 0x07ff;

/// Temperature offset scale, word = offset * 2^16 / 175
const TEMP_OFFSET_SCALE: f32 = 65536.0 / 175.0;

/// Scd4x command table
/// Measurements are fixed point 16-bit words, commands carry execution times
#[derive(PartialEq, Clone, Copy, Debug, Default)]
pub struct Scd4x;

impl CommandTable for Scd4x {
    fn address(&self) -> u8 {
        SCD4X_ADDRESS
    }

    fn encode(&self, op: Operation) -> Option<CommandSpec> {
        use Scd4xCommand::*;

        let spec = match op {
            // Pressure is set separately with SetAmbientPressure
            Operation::StartContinuous(0) => CommandSpec::action(StartPeriodicMeasurement as u16),
            Operation::StartLowPowerContinuous => CommandSpec::action(StartLowPowerPeriodicMeasurement as u16),
            Operation::StopContinuous => CommandSpec::action(StopPeriodicMeasurement as u16).delay(500),
            Operation::GetDataReady => CommandSpec::read(GetDataReadyStatus as u16, 1).delay(1),
            Operation::ReadMeasurement => CommandSpec::read(ReadMeasurement as u16, 3).delay(1),
            Operation::SetAsc(enabled) => CommandSpec::set(SetAutomaticSelfCalibration as u16, enabled as u16).delay(1),
            Operation::GetAsc => CommandSpec::read(GetAutomaticSelfCalibration as u16, 1).delay(1),
            Operation::ForcedRecalibration(ppm) => CommandSpec {
                code: PerformForcedRecalibration as u16,
                arg: Some(ppm),
                response_words: 1,
                delay_ms: 400,
            },
            Operation::SetTemperatureOffset(t) => CommandSpec::set(SetTemperatureOffset as u16, t).delay(1),
            Operation::GetTemperatureOffset => CommandSpec::read(GetTemperatureOffset as u16, 1).delay(1),
            Operation::SetAltitude(a) => CommandSpec::set(SetSensorAltitude as u16, a).delay(1),
            Operation::GetAltitude => CommandSpec::read(GetSensorAltitude as u16, 1).delay(1),
            Operation::SetAmbientPressure(p) => CommandSpec::set(SetAmbientPressure as u16, p).delay(1),
            Operation::GetSerialNumber => CommandSpec::read(GetSerialNumber as u16, 3).delay(1),
            Operation::SelfTest => CommandSpec::read(PerformSelfTest as u16, 1).delay(10_000),
            Operation::PersistSettings => CommandSpec::action(PersistSettings as u16).delay(800),
            Operation::FactoryReset => CommandSpec::action(PerformFactoryReset as u16).delay(1200),
            Operation::SoftReset => CommandSpec::action(Reinit as u16).delay(20),
            Operation::MeasureSingleShot => CommandSpec::action(MeasureSingleShot as u16).delay(5000),
            _ => return None,
        };

        Some(spec)
    }

    fn decode_measurement(&self, resp: &Response) -> Measurement {
        let w = resp.words();

        Measurement {
            co2: w[0] as f32,
            temp: temperature_from_ticks(w[1]),
            rh: humidity_from_ticks(w[2]),
        }
    }

    fn decode_data_ready(&self, raw: u16) -> bool {
        raw & DATA_READY_MASK != 0
    }

    fn encode_temperature_offset(&self, offset: f32) -> Option<u16> {
        scale_to_word(offset, TEMP_OFFSET_SCALE)
    }

    fn decode_temperature_offset(&self, raw: u16) -> f32 {
        raw as f32 / TEMP_OFFSET_SCALE
    }
}
