use crate::platform::{AlignedOps, FnCrc32, Platform};
use alloc::vec;
use core::fmt;
use core::fmt::{Debug, Formatter};
#[cfg(feature = "defmt")]
use defmt::trace;

pub const FLASH_SECTOR_SIZE: usize = 4096;
pub(crate) const HEADER_SIZE: usize = 32;
/// Bytes reserved behind the header. Only [`crate::PAYLOAD_SIZE`] of them carry a color.
pub const MAX_PAYLOAD_SIZE: usize = 64;
pub(crate) const RECORD_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Maximum Key length is 15 bytes + 1 byte for the null terminator.
const MAX_KEY_LENGTH: usize = 15;
const MAX_KEY_NUL_TERMINATED_LENGTH: usize = MAX_KEY_LENGTH + 1;

const CRC_RANGE: core::ops::Range<usize> = 4..25;

const _: () = assert!(
    4 + 4 + MAX_KEY_NUL_TERMINATED_LENGTH + 1 + 3 + 4 == HEADER_SIZE,
    "Record header must be 32 bytes"
);
const _: () = assert!(RECORD_SIZE <= FLASH_SECTOR_SIZE);

/// Name written into every record, so foreign data in the partition is never mistaken for a color.
pub(crate) const RECORD_KEY: Key = Key::from_str("necklace-color");

/// A 16-byte, null-padded record name (15 characters + null terminator)
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct Key([u8; MAX_KEY_NUL_TERMINATED_LENGTH]);

impl Key {
    pub(crate) const fn from_str(s: &str) -> Self {
        let src = s.as_bytes();
        assert!(src.len() <= MAX_KEY_LENGTH);
        let mut dst = [0u8; MAX_KEY_NUL_TERMINATED_LENGTH];
        let mut i = 0;
        while i < src.len() {
            dst[i] = src[i];
            i += 1;
        }
        Self(dst)
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(b\"")?;

        // the last byte is always the terminator
        for &byte in &self.0[..self.0.len() - 1] {
            if byte == 0 {
                write!(f, "\\0")?;
                continue;
            }

            write!(f, "{}", core::ascii::escape_default(byte))?;
        }

        write!(f, "\")")
    }
}

const RSB_WRITTEN: u32 = 0x1;

/// Records only ever move from `Empty` to `Written` by clearing bits, the only direction NOR
/// flash can be programmed without an erase.
#[derive(strum::FromRepr, strum::Display, Debug, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub(crate) enum RecordState {
    // All bits set, default state after flash erase.
    Empty = u32::MAX,

    // Header and payload are complete.
    Written = RecordState::Empty as u32 & !RSB_WRITTEN,

    // Anything else, e.g. an interrupted header write.
    Corrupt = 0,
}

impl From<u32> for RecordState {
    fn from(val: u32) -> Self {
        RecordState::from_repr(val).unwrap_or(RecordState::Corrupt)
    }
}

#[derive(Copy, Clone, PartialEq)]
pub(crate) struct RecordHeader {
    pub(crate) state: u32,
    pub(crate) sequence: u32,
    pub(crate) key: Key,
    pub(crate) length: u8,
    pub(crate) crc: u32,
}

impl RecordHeader {
    pub(crate) fn new(sequence: u32, payload: &[u8], crc32: FnCrc32) -> Self {
        let mut header = Self {
            state: RecordState::Written as u32,
            sequence,
            key: RECORD_KEY,
            length: payload.len() as u8,
            crc: u32::MAX,
        };
        header.crc = header.calculate_crc32(crc32, payload);
        header
    }

    pub(crate) fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Self {
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        let mut key = [0u8; MAX_KEY_NUL_TERMINATED_LENGTH];
        key.copy_from_slice(&raw[8..24]);
        Self {
            state: word(0),
            sequence: word(4),
            key: Key(key),
            length: raw[24],
            crc: word(28),
        }
    }

    pub(crate) fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0xFFu8; HEADER_SIZE];
        raw[0..4].copy_from_slice(&self.state.to_le_bytes());
        raw[4..8].copy_from_slice(&self.sequence.to_le_bytes());
        raw[8..24].copy_from_slice(&self.key.0);
        raw[24] = self.length;
        raw[28..32].copy_from_slice(&self.crc.to_le_bytes());
        raw
    }

    pub(crate) fn state(&self) -> RecordState {
        RecordState::from(self.state)
    }

    /// Covers sequence, key and length of the header plus the payload itself. The state word
    /// is excluded since it is checked on its own.
    pub(crate) fn calculate_crc32(&self, crc32: FnCrc32, payload: &[u8]) -> u32 {
        let raw = self.to_bytes();
        let result = crc32(u32::MAX, &raw[CRC_RANGE]);
        crc32(result, payload)
    }
}

impl Debug for RecordHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let state = self.state();
        let sequence = self.sequence;
        let length = self.length;
        let crc = self.crc;
        match state {
            RecordState::Written => f.write_fmt(format_args!(
                "RecordHeader {{ state: {state:>7}, sequence: {sequence:>4}, key: {:?}, length: {length}, crc: 0x{crc:0>8x}}}",
                self.key
            )),
            _ => f.write_fmt(format_args!("RecordHeader {{ state: {state:>7} }}")),
        }
    }
}

#[inline(always)]
pub(crate) fn write_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &[u8],
) -> Result<(), T::Error> {
    #[cfg(feature = "defmt")]
    trace!("write_aligned @{:#08x}: [{}]", offset, bytes.len());

    if bytes.len().is_multiple_of(T::WRITE_SIZE) {
        hal.write(offset, bytes)
    } else {
        let pivot = T::align_write_floor(bytes.len());
        let header = &bytes[..pivot];
        let trailer = &bytes[pivot..];
        if !header.is_empty() {
            hal.write(offset, header)?;
        }

        // no need to write the trailer if remaining data is all ones - this the default state of the flash
        if trailer.iter().any(|&e| e != 0xFF) {
            let mut buf = vec![0xFFu8; T::WRITE_SIZE];
            buf[..trailer.len()].copy_from_slice(trailer);
            hal.write(offset + (pivot as u32), &buf)?
        }

        Ok(())
    }
}
