//! A slot is one flash sector of the partition holding at most one record. Every access goes
//! through a [`SlotHandle`], which is acquired for a single operation and released when dropped,
//! so no handle survives past the call that opened it, whichever way that call returns.

use crate::platform::{AlignedOps, Platform};
use crate::raw::{
    FLASH_SECTOR_SIZE, HEADER_SIZE, RECORD_KEY, RECORD_SIZE, RecordHeader, RecordState,
    write_aligned,
};
use alloc::vec;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

#[derive(Debug, PartialEq)]
pub(crate) enum SlotContent {
    /// Freshly erased.
    Empty,
    /// A complete record with a matching checksum.
    Record { sequence: u32, payload: Vec<u8> },
    /// Torn or foreign data. Treated like an empty slot by readers.
    Corrupt,
}

pub(crate) struct SlotHandle<'a, T: Platform> {
    hal: &'a mut T,
    open_handles: &'a mut usize,
    address: usize,
}

impl<'a, T: Platform> SlotHandle<'a, T> {
    pub(crate) fn open(hal: &'a mut T, open_handles: &'a mut usize, address: usize) -> Self {
        *open_handles += 1;
        Self {
            hal,
            open_handles,
            address,
        }
    }

    pub(crate) fn read(&mut self) -> Result<SlotContent, T::Error> {
        #[cfg(feature = "defmt")]
        trace!("slot read: @{:#08x}", self.address);

        let mut buf = vec![0u8; T::align_read(RECORD_SIZE)];
        self.hal.read(self.address as _, &mut buf)?;

        let mut raw_header = [0u8; HEADER_SIZE];
        raw_header.copy_from_slice(&buf[..HEADER_SIZE]);
        let header = RecordHeader::from_bytes(&raw_header);

        #[cfg(feature = "debug-logs")]
        println!("  slot: read 0x{:04X}: {header:?}", self.address);

        let content = match header.state() {
            RecordState::Empty => {
                // an aborted save may have left payload bytes behind an unwritten header
                if buf[..RECORD_SIZE].iter().all(|&b| b == 0xFF) {
                    SlotContent::Empty
                } else {
                    SlotContent::Corrupt
                }
            }
            RecordState::Corrupt => SlotContent::Corrupt,
            RecordState::Written => {
                let length = header.length as usize;
                if header.key != RECORD_KEY || length > RECORD_SIZE - HEADER_SIZE {
                    SlotContent::Corrupt
                } else {
                    let payload = &buf[HEADER_SIZE..HEADER_SIZE + length];
                    if header.calculate_crc32(T::crc32, payload) == header.crc {
                        SlotContent::Record {
                            sequence: header.sequence,
                            payload: payload.to_vec(),
                        }
                    } else {
                        SlotContent::Corrupt
                    }
                }
            }
        };

        #[cfg(feature = "defmt")]
        {
            if content == SlotContent::Corrupt {
                warn!("slot read: @{:#08x} corrupt", self.address);
            }
        }

        Ok(content)
    }

    /// Replaces whatever the slot holds with a new record. The header is written last and is
    /// the only write that makes the record visible to [`SlotHandle::read`].
    pub(crate) fn write(&mut self, sequence: u32, payload: &[u8]) -> Result<(), T::Error> {
        #[cfg(feature = "defmt")]
        trace!(
            "slot write: @{:#08x} sequence {} [{}]",
            self.address,
            sequence,
            payload.len()
        );

        #[cfg(feature = "debug-logs")]
        println!("  slot: write 0x{:04X}: sequence {sequence}", self.address);

        let from = self.address as u32;
        self.hal.erase(from, from + FLASH_SECTOR_SIZE as u32)?;

        write_aligned(&mut *self.hal, from + HEADER_SIZE as u32, payload)?;

        let header = RecordHeader::new(sequence, payload, T::crc32);
        self.hal.write(from, &header.to_bytes())
    }
}

impl<T: Platform> Drop for SlotHandle<'_, T> {
    fn drop(&mut self) {
        *self.open_handles -= 1;
    }
}
