//! Base communication implementation for interacting with Scd30 / Scd4x devices
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

use crate::Error;
use crate::device::*;

/// Base API for reading and writing to the device
/// This should not be required by consumers, but is exposed to support alternate use (or in future provide ModBus support)
pub trait Base<Err> {
    /// Write a command to the device with an optional (CRC protected) argument word
    fn perform_command(&mut self, address: u8, command: u16, arg: Option<u16>) -> Result<(), Error<Err>>;

    /// Write a command, wait `delay_ms`, then read and verify `words.len()` data words
    fn perform_command_and_read<D: DelayMs<u32>>(
        &mut self,
        address: u8,
        command: u16,
        arg: Option<u16>,
        delay: &mut D,
        delay_ms: u32,
        words: &mut [u16],
    ) -> Result<(), Error<Err>>;
}

/// Helper for device CRC-8 calculation
/// The device computes this independently over each 2-byte data word
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC_INIT;

    // For each byte
    for v in data {
        // XOR with current byte
        crc ^= v;

        // For each bit, MSB first
        for _bit in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    // Apply final xor
    crc ^ CRC_XOR
}

/// Check a received CRC-8 against the data it covers
pub fn crc8_verify(data: &[u8], crc: u8) -> bool {
    crc8(data) == crc
}

/// Serialise data words into wire format, each word followed by its CRC-8 byte
///
/// `wire` must be exactly 3 bytes per word, returns the number of bytes written
pub fn encode_words<E>(words: &[u16], wire: &mut [u8]) -> Result<usize, Error<E>> {
    if wire.len() != words.len() * WIRE_WORD_LEN {
        return Err(Error::Framing(wire.len()));
    }

    for (w, chunk) in words.iter().zip(wire.chunks_exact_mut(WIRE_WORD_LEN)) {
        chunk[..2].copy_from_slice(&w.to_be_bytes());
        chunk[2] = crc8(&chunk[..2]);
    }

    Ok(wire.len())
}

/// Deserialise wire format into data words, checking the CRC-8 of every word
///
/// Every CRC is verified before any word is written to `words`, so a corrupt
/// buffer never yields partial output.
pub fn decode_words<E>(wire: &[u8], words: &mut [u16]) -> Result<(), Error<E>> {
    if wire.len() % WIRE_WORD_LEN != 0 || wire.len() / WIRE_WORD_LEN != words.len() {
        return Err(Error::Framing(wire.len()));
    }

    for chunk in wire.chunks_exact(WIRE_WORD_LEN) {
        let crc = crc8(&chunk[..2]);
        if crc != chunk[2] {
            return Err(Error::Crc(crc, chunk[2]));
        }
    }

    for (w, chunk) in words.iter_mut().zip(wire.chunks_exact(WIRE_WORD_LEN)) {
        *w = u16::from_be_bytes([chunk[0], chunk[1]]);
    }

    Ok(())
}

/// Base implementation for I2C devices
/// Only plain writes and reads are used, the sensors require a stop condition between the two
impl <Conn, Err> Base<Err> for Conn where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Err: Debug,
{
    fn perform_command(&mut self, address: u8, command: u16, arg: Option<u16>) -> Result<(), Error<Err>> {
        // Command word itself is not CRC protected
        let mut buff: [u8; 2 + WIRE_WORD_LEN] = [0u8; 2 + WIRE_WORD_LEN];
        buff[..2].copy_from_slice(&command.to_be_bytes());

        let len = match arg {
            Some(d) => 2 + encode_words::<Err>(&[d], &mut buff[2..])?,
            None => 2,
        };

        trace!("Writing command: {:04x?} data: {:?} ({:02x?})", command, arg, &buff[..len]);

        self.write(address, &buff[..len]).map_err(Error::Conn)
    }

    fn perform_command_and_read<D: DelayMs<u32>>(
        &mut self,
        address: u8,
        command: u16,
        arg: Option<u16>,
        delay: &mut D,
        delay_ms: u32,
        words: &mut [u16],
    ) -> Result<(), Error<Err>> {
        let len = words.len() * WIRE_WORD_LEN;
        if words.len() > MAX_RESPONSE_WORDS {
            return Err(Error::Framing(len));
        }

        // First write the read command
        self.perform_command(address, command, arg)?;

        // Wait for the device to execute the command
        if delay_ms > 0 {
            trace!("Waiting {} ms", delay_ms);
            delay.delay_ms(delay_ms);
        }

        // Then, read the data back
        let mut buff = [0u8; MAX_RESPONSE_WORDS * WIRE_WORD_LEN];
        self.read(address, &mut buff[..len])
            .map_err(Error::Conn)?;

        // Note: this two-phase approach is specified in the datasheet

        trace!("Read data: {:02x?}", &buff[..len]);

        decode_words(&buff[..len], words)
    }
}

#[cfg(test)]
pub(crate) mod test {
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    use embedded_hal_mock::MockError;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use super::*;

    type TestError = Error<()>;

    /// Delay implementation recording requested delays instead of sleeping
    #[derive(Debug, Default, Clone)]
    pub(crate) struct RecordingDelay {
        pub calls: Vec<u32>,
    }

    impl DelayMs<u32> for RecordingDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.calls.push(ms);
        }
    }

    #[test]
    fn test_crc() {
        // Test vectors from datasheet
        let tests = &[
            ([0xbe, 0xef], 0x92),
            ([0x00, 0x00], 0x81),
            ([0x43, 0xDB], 0xCB),
            ([0x01, 0x90], 0x4C),
        ];

        for t in tests {
            let v = crc8(&t.0);
            assert_eq!(v, t.1);
        }
    }

    #[test]
    fn test_crc_detects_single_bit_errors() {
        for v in 0..=u16::MAX {
            let data = v.to_be_bytes();
            let crc = crc8(&data);
            assert!(crc8_verify(&data, crc));

            for bit in 0..16 {
                let flipped = (v ^ (1 << bit)).to_be_bytes();
                assert!(!crc8_verify(&flipped, crc), "data flip {:04x} bit {}", v, bit);
            }

            for bit in 0..8 {
                assert!(!crc8_verify(&data, crc ^ (1 << bit)), "crc flip {:04x} bit {}", v, bit);
            }
        }
    }

    #[test]
    fn test_encode_words() {
        let mut wire = [0u8; 6];
        let n = encode_words::<()>(&[0x0190, 0xbeef], &mut wire).unwrap();

        assert_eq!(n, 6);
        assert_eq!(wire, [0x01, 0x90, 0x4c, 0xbe, 0xef, 0x92]);
    }

    #[test]
    fn test_decode_words() {
        let wire = [0x43, 0xDB, 0xCB, 0x8C, 0x2E, 0x8F, 0x00, 0x00, 0x81];
        let mut words = [0u16; 3];

        decode_words::<()>(&wire, &mut words).unwrap();
        assert_eq!(words, [0x43db, 0x8c2e, 0x0000]);
    }

    #[test]
    fn test_frame_round_trip() {
        let sequences: &[&[u16]] = &[
            &[],
            &[0x0000],
            &[0xffff, 0x8000],
            &[0x4520, 0x0000, 0x1234, 0x5678, 0x9abc, 0x0001],
        ];

        for s in sequences {
            let mut wire = [0u8; MAX_RESPONSE_WORDS * WIRE_WORD_LEN];
            let wire = &mut wire[..s.len() * WIRE_WORD_LEN];
            encode_words::<()>(s, wire).unwrap();

            let mut words = [0u16; MAX_RESPONSE_WORDS];
            decode_words::<()>(wire, &mut words[..s.len()]).unwrap();
            assert_eq!(&words[..s.len()], *s);
        }
    }

    #[test]
    fn test_decode_framing_error() {
        let wire = [0x01, 0x90, 0x4c, 0x00];
        let mut words = [0u16; 1];

        let r: Result<(), TestError> = decode_words(&wire, &mut words);
        assert_eq!(r, Err(Error::Framing(4)));

        // Whole words, but not the number requested
        let r: Result<(), TestError> = decode_words(&wire[..3], &mut [0u16; 2]);
        assert_eq!(r, Err(Error::Framing(3)));
    }

    #[test]
    fn test_decode_checksum_error() {
        let mut wire = [0u8; 3];
        encode_words::<()>(&[0x0190], &mut wire).unwrap();
        wire[2] ^= 0x01;

        let r: Result<(), TestError> = decode_words(&wire, &mut [0u16; 1]);
        assert_eq!(r, Err(Error::Crc(0x4c, 0x4d)));
    }

    #[test]
    fn test_decode_no_partial_output() {
        // First word valid, second corrupt
        let wire = [0x01, 0x90, 0x4c, 0xbe, 0xef, 0x00];
        let mut words = [0xaaaa, 0xaaaa];

        let r: Result<(), TestError> = decode_words(&wire, &mut words);
        assert!(r.is_err());
        assert_eq!(words, [0xaaaa, 0xaaaa]);
    }

    #[test]
    fn test_perform_command() {
        let expectations = [
            I2cTransaction::write(SCD30_ADDRESS, vec![0x01, 0x04]),
            I2cTransaction::write(SCD30_ADDRESS, vec![0x46, 0x00, 0x00, 0x02, 0xE3]),
        ];
        let mut i2c = I2cMock::new(&expectations);

        i2c.perform_command(SCD30_ADDRESS, 0x0104, None).unwrap();
        i2c.perform_command(SCD30_ADDRESS, 0x4600, Some(2)).unwrap();

        i2c.done();
    }

    #[test]
    fn test_perform_command_and_read() {
        let expectations = [
            I2cTransaction::write(SCD4X_ADDRESS, vec![0x36, 0x2f, 0x01, 0x90, 0x4c]),
            I2cTransaction::read(SCD4X_ADDRESS, vec![0x80, 0x32, 0x05]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = RecordingDelay::default();

        let mut words = [0u16; 1];
        i2c.perform_command_and_read(SCD4X_ADDRESS, 0x362f, Some(400), &mut delay, 400, &mut words).unwrap();

        assert_eq!(words, [0x8032]);
        assert_eq!(delay.calls, vec![400]);

        i2c.done();
    }

    #[test]
    fn test_perform_command_and_read_too_long() {
        let expectations: [I2cTransaction; 0] = [];
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = RecordingDelay::default();

        let mut words = [0u16; MAX_RESPONSE_WORDS + 1];
        let r: Result<(), Error<MockError>> = i2c.perform_command_and_read(SCD30_ADDRESS, 0x0300, None, &mut delay, 0, &mut words);

        assert!(matches!(r, Err(Error::Framing(21))));

        i2c.done();
    }

    #[test]
    fn test_perform_command_and_read_crc_error() {
        let expectations = [
            I2cTransaction::write(SCD30_ADDRESS, vec![0x02, 0x02]),
            I2cTransaction::read(SCD30_ADDRESS, vec![0x00, 0x01, 0xB1]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = RecordingDelay::default();

        let mut words = [0u16; 1];
        let r: Result<(), Error<MockError>> = i2c.perform_command_and_read(SCD30_ADDRESS, 0x0202, None, &mut delay, 0, &mut words);

        assert!(matches!(r, Err(Error::Crc(0xB0, 0xB1))));
        assert!(delay.calls.is_empty());

        i2c.done();
    }
}
