//! Scd30 command table
//!
//! Copyright 2019 Ryan Kurte

use crate::Measurement;
use crate::device::*;
use crate::protocol::*;

/// Scd30 command table
/// Measurements are big endian IEEE-754 floats split across two data words
#[derive(PartialEq, Clone, Copy, Debug, Default)]
pub struct Scd30;

impl CommandTable for Scd30 {
    fn address(&self) -> u8 {
        SCD30_ADDRESS
    }

    fn encode(&self, op: Operation) -> Option<CommandSpec> {
        use Scd30Command::*;

        let spec = match op {
            Operation::StartContinuous(pressure) => CommandSpec::set(StartContinuousMode as u16, pressure),
            Operation::StopContinuous => CommandSpec::action(StopContinuousMode as u16),
            Operation::SetMeasurementInterval(i) => CommandSpec::set(MeasurementInterval as u16, i),
            Operation::GetMeasurementInterval => CommandSpec::read(MeasurementInterval as u16, 1),
            Operation::GetDataReady => CommandSpec::read(GetDataReady as u16, 1),
            Operation::ReadMeasurement => CommandSpec::read(ReadMeasurement as u16, 6),
            Operation::SetAsc(enabled) => CommandSpec::set(Asc as u16, enabled as u16),
            Operation::GetAsc => CommandSpec::read(Asc as u16, 1),
            Operation::SetFrc(ppm) => CommandSpec::set(Frc as u16, ppm),
            Operation::GetFrc => CommandSpec::read(Frc as u16, 1),
            Operation::SetTemperatureOffset(t) => CommandSpec::set(TempOffset as u16, t),
            Operation::GetTemperatureOffset => CommandSpec::read(TempOffset as u16, 1),
            Operation::SetAltitude(a) => CommandSpec::set(AltComp as u16, a),
            Operation::GetAltitude => CommandSpec::read(AltComp as u16, 1),
            Operation::GetFirmwareVersion => CommandSpec::read(GetFirmwareVersion as u16, 1),
            Operation::SoftReset => CommandSpec::action(SoftReset as u16),
            _ => return None,
        };

        Some(spec)
    }

    fn decode_measurement(&self, resp: &Response) -> Measurement {
        let w = resp.words();

        Measurement {
            co2: float_from_words(w[0], w[1]),
            temp: float_from_words(w[2], w[3]),
            rh: float_from_words(w[4], w[5]),
        }
    }

    fn decode_data_ready(&self, raw: u16) -> bool {
        raw == 1
    }

    fn encode_temperature_offset(&self, offset: f32) -> Option<u16> {
        // Hundredths of a degree
        scale_to_word(offset, 100.0)
    }

    fn decode_temperature_offset(&self, raw: u16) -> f32 {
        raw as f32 / 100.0
    }
}
