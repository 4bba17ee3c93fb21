//! Scd30 / Scd4x command-line utility
//!
//! Copyright 2019 Ryan Kurte

use std::fmt::Debug;
use std::str::FromStr;

extern crate embedded_hal;
use embedded_hal::blocking::i2c;

extern crate linux_embedded_hal;
use linux_embedded_hal::{Delay, I2cdev};

extern crate structopt;
use structopt::StructOpt;

extern crate humantime;
use humantime::{Duration as HumanDuration};

#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::{TermLogger, LevelFilter};

extern crate sensor_scd;
use sensor_scd::{CommandTable, Error, Scd, Scd30, Scd4x};

#[derive(StructOpt)]
#[structopt(name = "scd-util")]
/// A Command Line Interface (CLI) for interacting with a local Scd30 or Scd4x CO2 sensor over I2C
pub struct Options {

    /// Number of the I2C bus to open (0 for /dev/i2c-0, 1 for /dev/i2c-1, ...)
    #[structopt(short = "b", long = "bus", default_value = "1", env = "SCD_I2C_BUS")]
    bus: u8,

    /// Sensor family connected to the bus (scd30 or scd4x)
    #[structopt(short = "s", long = "sensor", default_value = "scd30", env = "SCD_SENSOR")]
    sensor: Sensor,

    /// Enable verbose logging
    #[structopt(long = "log-level", default_value = "info")]
    level: LevelFilter,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Sensor {
    Scd30,
    Scd4x,
}

impl FromStr for Sensor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scd30" => Ok(Sensor::Scd30),
            "scd4x" | "scd40" | "scd41" => Ok(Sensor::Scd4x),
            _ => Err(format!("unrecognised sensor '{}' (expected scd30 or scd4x)", s)),
        }
    }
}

#[derive(StructOpt, Debug)]
pub enum Command {
    #[structopt(name = "is-data-ready")]
    /// Determines if a measurement can be read from the sensor's buffer
    IsDataReady,

    #[structopt(name = "read-measurement")]
    /// Read a measurement of CO2 concentration, temperature, and humidity
    ReadMeasurement,

    #[structopt(name = "start-continuous-measurement")]
    /// Starts continuous measurement of CO2 concentration, temperature, and humidity
    StartContinuousMeasurement {
        /// Ambient pressure to compensate CO2 measurements, 700-1400 mBar, 0 to disable
        #[structopt(default_value = "0")]
        pressure: u16,
    },

    #[structopt(name = "start-low-power-measurement")]
    /// Starts low power periodic measurement (Scd4x)
    StartLowPowerMeasurement,

    #[structopt(name = "stop-continuous-measurement")]
    /// Stops continuous measurement of CO2 concentration, temperature, and humidity
    StopContinuousMeasurement,

    #[structopt(name = "set-measurement-interval")]
    /// Sets the interval of continuous measurement (Scd30)
    SetMeasurementInterval {
        /// Interval of 2-1800 seconds
        interval: u16,
    },

    #[structopt(name = "get-measurement-interval")]
    /// Returns the interval of continuous measurement (Scd30)
    GetMeasurementInterval,

    #[structopt(name = "start-asc")]
    /// Starts the automatic self-calibration
    StartAsc,

    #[structopt(name = "stop-asc")]
    /// Stops the automatic self-calibration
    StopAsc,

    #[structopt(name = "get-asc-status")]
    /// Returns the status of automatic self-calibration
    GetAscStatus,

    #[structopt(name = "set-frc-value")]
    /// Sets the reference CO2 concentration for forced re-calibration (Scd30)
    SetFrcValue {
        /// Concentration of CO2, 400-2000 ppm
        co2ppm: u16,
    },

    #[structopt(name = "get-frc-value")]
    /// Returns the reference CO2 concentration for forced re-calibration (Scd30)
    GetFrcValue,

    #[structopt(name = "forced-recalibration")]
    /// Performs forced re-calibration against a reference CO2 concentration (Scd4x)
    ForcedRecalibration {
        /// Concentration of CO2, 400-2000 ppm
        co2ppm: u16,
    },

    #[structopt(name = "set-temp-offset")]
    /// Sets the temperature offset
    SetTempOffset {
        /// Temperature offset in degrees celsius
        offset: f32,
    },

    #[structopt(name = "get-temp-offset")]
    /// Returns the temperature offset
    GetTempOffset,

    #[structopt(name = "set-altitude-compensation")]
    /// Sets the altitude compensation value
    SetAltitudeCompensation {
        /// Altitude in meters above sea level
        altitude: u16,
    },

    #[structopt(name = "get-altitude-compensation")]
    /// Returns the altitude compensation value
    GetAltitudeCompensation,

    #[structopt(name = "set-ambient-pressure")]
    /// Sets the ambient pressure compensation value (Scd4x)
    SetAmbientPressure {
        /// Ambient pressure, 700-1400 mBar
        pressure: u16,
    },

    #[structopt(name = "get-firmware-version")]
    /// Returns the firmware version (Scd30)
    GetFirmwareVersion,

    #[structopt(name = "get-serial-number")]
    /// Returns the serial number (Scd4x)
    GetSerialNumber,

    #[structopt(name = "self-test")]
    /// Performs the on-chip self test, takes 10 seconds (Scd4x)
    SelfTest,

    #[structopt(name = "persist-settings")]
    /// Stores the current configuration in EEPROM (Scd4x)
    PersistSettings,

    #[structopt(name = "factory-reset")]
    /// Resets configuration and calibration to factory defaults (Scd4x)
    FactoryReset,

    #[structopt(name = "soft-reset")]
    /// Performs a soft reset
    SoftReset,

    #[structopt(name = "measure-single-shot")]
    /// Takes a single measurement, takes 5 seconds (SCD41)
    MeasureSingleShot,

    #[structopt(name = "monitor")]
    /// Continuously polls the sensor and logs measurements
    Monitor {
        /// Specify period for taking measurements
        #[structopt(short = "p", long = "sample-period", default_value = "10s")]
        period: HumanDuration,

        /// Delay between sensor poll operations
        #[structopt(long = "poll-delay", default_value = "100ms")]
        poll_delay: HumanDuration,

        /// Number of allowed I2C errors (per measurement attempt) prior to exiting
        #[structopt(long = "allowed-errors", default_value = "3")]
        allowed_errors: usize,
    },
}

fn main() {
    // Load options
    let opts = Options::from_args();

    // Setup logging
    TermLogger::init(opts.level, simplelog::Config::default()).unwrap();

    let path = format!("/dev/i2c-{}", opts.bus);

    debug!("Connecting to I2C device");
    let i2c = match I2cdev::new(&path) {
        Ok(v) => v,
        Err(e) => {
            error!("Error opening I2C device '{}': {:?}", &path, e);
            std::process::exit(-1);
        }
    };

    debug!("Connecting to {:?}", opts.sensor);
    let res = match opts.sensor {
        Sensor::Scd30 => connect_and_run(i2c, Scd30, &opts.command),
        Sensor::Scd4x => connect_and_run(i2c, Scd4x, &opts.command),
    };

    match res {
        Ok(()) => (),
        Err(Error::NoDevice) => {
            error!("No {:?} found on bus {}", opts.sensor, opts.bus);
            std::process::exit(-2);
        },
        Err(e) => {
            error!("Error executing {:?}: {:?}", opts.command, e);
            std::process::exit(-3);
        }
    }
}

/// Connect to the sensor, run a single command, then release the bus
fn connect_and_run<T, Conn, Err>(conn: Conn, table: T, command: &Command) -> Result<(), Error<Err>> where
    T: CommandTable,
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Err: Debug,
{
    let mut sensor = Scd::connect(conn, Delay, table)?;

    let res = run(&mut sensor, command);

    // Release the bus regardless of the command outcome
    let _ = sensor.disconnect()?;

    res
}

fn print_row(label: &str, value: &str) {
    println!("{:<32} {}", label, value);
}

fn run<T, Conn, Err>(sensor: &mut Scd<T, Conn, Delay, Err>, command: &Command) -> Result<(), Error<Err>> where
    T: CommandTable,
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Err: Debug,
{
    match command {
        Command::IsDataReady => {
            let ready = sensor.data_ready()?;
            println!("Data is {}.", if ready { "ready" } else { "NOT ready" });
        },
        Command::ReadMeasurement => {
            if !sensor.data_ready()? {
                println!("No measurement available.");
                return Ok(());
            }

            let m = sensor.read_measurement()?;
            print_row("CO2 concentration", &format!("{:.0} ppm", m.co2));
            print_row("Temperature", &format!("{:.2} C", m.temp));
            print_row("Humidity", &format!("{:.2} %", m.rh));
        },
        Command::StartContinuousMeasurement{ pressure } => {
            sensor.start_continuous(*pressure)?;
            println!("Continuous measurement started.");
            if *pressure != 0 {
                println!("Ambient pressure compensation set to {} mBar", pressure);
            }
        },
        Command::StartLowPowerMeasurement => {
            sensor.start_low_power_continuous()?;
            println!("Low power measurement started.");
        },
        Command::StopContinuousMeasurement => {
            sensor.stop_continuous()?;
            println!("Continuous measurement stopped.");
        },
        Command::SetMeasurementInterval{ interval } => {
            sensor.set_measurement_interval(*interval)?;
            println!("Continuous measurement interval set to {} seconds", interval);
        },
        Command::GetMeasurementInterval => {
            let interval = sensor.get_measurement_interval()?;
            print_row("Continuous measurement interval", &format!("{} seconds", interval));
        },
        Command::StartAsc => {
            sensor.set_asc(true)?;
            println!("Automatic self-calibration started.");
        },
        Command::StopAsc => {
            sensor.set_asc(false)?;
            println!("Automatic self-calibration stopped.");
        },
        Command::GetAscStatus => {
            let active = sensor.get_asc()?;
            println!("Automatic self-calibration is {}.", if active { "active" } else { "NOT active" });
        },
        Command::SetFrcValue{ co2ppm } => {
            sensor.set_frc(*co2ppm)?;
            println!("Reference CO2 concentration for forced re-calibration set to {} ppm", co2ppm);
        },
        Command::GetFrcValue => {
            let v = sensor.get_frc()?;
            print_row("Forced re-calibration value", &format!("{} ppm", v));
        },
        Command::ForcedRecalibration{ co2ppm } => {
            match sensor.forced_recalibration(*co2ppm) {
                Ok(correction) => print_row("Forced re-calibration correction", &format!("{} ppm", correction)),
                Err(Error::CalibrationFailed) => {
                    println!("Forced re-calibration failed.");
                    return Err(Error::CalibrationFailed);
                },
                Err(e) => return Err(e),
            }
        },
        Command::SetTempOffset{ offset } => {
            sensor.set_temperature_offset(*offset)?;
            println!("Temperature offset set to {} C", offset);
        },
        Command::GetTempOffset => {
            let offset = sensor.get_temperature_offset()?;
            print_row("Temperature offset", &format!("{:.2} C", offset));
        },
        Command::SetAltitudeCompensation{ altitude } => {
            sensor.set_altitude(*altitude)?;
            println!("Altitude set to {} meters above sea level.", altitude);
        },
        Command::GetAltitudeCompensation => {
            let altitude = sensor.get_altitude()?;
            print_row("Altitude", &format!("{} meters above sea level", altitude));
        },
        Command::SetAmbientPressure{ pressure } => {
            sensor.set_ambient_pressure(*pressure)?;
            println!("Ambient pressure compensation set to {} mBar", pressure);
        },
        Command::GetFirmwareVersion => {
            let v = sensor.firmware_version()?;
            print_row("Firmware version", &format!("{}.{}", v >> 8, v & 0xFF));
        },
        Command::GetSerialNumber => {
            let serial = sensor.serial_number()?;
            print_row("Serial number", &format!("0x{:012x}", serial));
        },
        Command::SelfTest => {
            let ok = sensor.self_test()?;
            println!("Self test {}.", if ok { "passed" } else { "FAILED" });
        },
        Command::PersistSettings => {
            sensor.persist_settings()?;
            println!("Settings persisted.");
        },
        Command::FactoryReset => {
            sensor.factory_reset()?;
            println!("Factory reset performed.");
        },
        Command::SoftReset => {
            sensor.soft_reset()?;
            println!("Soft reset performed.");
        },
        Command::MeasureSingleShot => {
            sensor.measure_single_shot()?;
            let m = sensor.read_measurement()?;
            print_row("CO2 concentration", &format!("{:.0} ppm", m.co2));
            print_row("Temperature", &format!("{:.2} C", m.temp));
            print_row("Humidity", &format!("{:.2} %", m.rh));
        },
        Command::Monitor{ period, poll_delay, allowed_errors } => {
            monitor(sensor, period, poll_delay, *allowed_errors)?;
        },
    }

    Ok(())
}

/// Convert the monitor sample period into a measurement interval in whole seconds
fn measurement_interval<E>(period: &std::time::Duration) -> Result<u16, Error<E>> {
    u16::try_from(period.as_secs())
        .map_err(|_| Error::InvalidArgument("sample period must be 2-1800 s"))
}

fn monitor<T, Conn, Err>(sensor: &mut Scd<T, Conn, Delay, Err>, period: &HumanDuration, poll_delay: &HumanDuration, allowed_errors: usize) -> Result<(), Error<Err>> where
    T: CommandTable,
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Err: Debug,
{
    let interval = measurement_interval(period)?;

    // Scd4x measures on a fixed interval
    match sensor.set_measurement_interval(interval) {
        Ok(()) | Err(Error::Unsupported(_)) => (),
        Err(e) => return Err(e),
    }

    debug!("Starting sensor polling");
    sensor.start_continuous(0)?;

    debug!("Waiting for sensor to initialise");
    std::thread::sleep(**period);

    loop {
        debug!("Starting sensor read cycle");

        let mut ready = false;
        let mut errors = 0;

        // Poll for sensor ready
        for _i in 0..100 {
            match sensor.data_ready() {
                Ok(true) => {
                    ready = true;
                    break;
                },
                Ok(false) => {
                    std::thread::sleep(**poll_delay);
                },
                Err(e) => {
                    warn!("Error polling for sensor ready: {:?}", e);
                    errors += 1;

                    if errors > allowed_errors {
                        error!("Exceeded maximum allowed I2C errors");
                        return Err(e);
                    }
                }
            };
        }

        debug!("Sensor data ready state: {:?}", ready);

        if !ready {
            warn!("Sensor data ready timed-out");
            std::thread::sleep(**period);
            continue;
        }

        // If we're ready, attempt to read the data
        for _i in 0..10 {
            match sensor.read_measurement() {
                Ok(m) => {
                    info!("CO2: {:.2} ppm, Temperature: {:.2} C, Humidity: {:.2} %", m.co2, m.temp, m.rh);
                    break;
                },
                Err(e) => {
                    warn!("Error reading sensor data: {:?}", e);
                    errors += 1;

                    if errors > allowed_errors {
                        error!("Exceeded maximum allowed I2C errors");
                        return Err(e);
                    }
                },
            }
        }

        // Wait for enough time for another sensor reading
        std::thread::sleep(**period);
    }
}
