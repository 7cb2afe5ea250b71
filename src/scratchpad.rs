use heapless::{consts::*, Vec};

use crate::temperature::Temperature;

pub const SCRATCHPAD_SIZE: usize = 9;

const TEMPERATURE_LSB: usize = 0;
const TEMPERATURE_MSB: usize = 1;
const ALARM_HIGH: usize = 2;
const ALARM_LOW: usize = 3;
const CONFIGURATION: usize = 4;
const CRC: usize = 8;

/// The probe's 9-byte scratchpad, filled one byte at a time.
#[derive(Clone, Debug)]
pub struct Scratchpad {
    bytes: Vec<u8, U9>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ()> {
        Ok(Self {
            bytes: Vec::from_slice(bytes)?,
        })
    }

    pub(crate) fn push(&mut self, byte: u8) -> Result<(), u8> {
        self.bytes.push(byte)
    }

    pub(crate) fn clear(&mut self) {
        // heapless 0.5 `Vec::clear` indexes past the truncated length
        self.bytes = Vec::new();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.bytes.len() == SCRATCHPAD_SIZE
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes 0..1, little endian. Zero until both bytes are present.
    pub fn temperature(&self) -> Temperature {
        match (self.byte(TEMPERATURE_LSB), self.byte(TEMPERATURE_MSB)) {
            (Some(lsb), Some(msb)) => Temperature::from_raw(i16::from_le_bytes([lsb, msb])),
            _ => Temperature::default(),
        }
    }

    pub fn alarm_high(&self) -> Option<u8> {
        self.byte(ALARM_HIGH)
    }

    pub fn alarm_low(&self) -> Option<u8> {
        self.byte(ALARM_LOW)
    }

    pub fn configuration(&self) -> Option<u8> {
        self.byte(CONFIGURATION)
    }

    pub fn is_crc_valid(&self) -> bool {
        match self.byte(CRC) {
            Some(crc) => crc8(&self.bytes[..CRC]) == crc,
            None => false,
        }
    }

    fn byte(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }
}

impl Default for Scratchpad {
    fn default() -> Self {
        Self::new()
    }
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}
