#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

mod color;
pub mod error;
pub mod platform;
mod raw;
mod slot;

pub use color::{DEFAULT_COLOR, HexColor, PAYLOAD_SIZE};
pub use raw::{FLASH_SECTOR_SIZE, MAX_PAYLOAD_SIZE};

extern crate alloc;

use crate::error::Error;
use crate::platform::Platform;
use crate::raw::HEADER_SIZE;
use crate::slot::{SlotContent, SlotHandle};
use alloc::string::String;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// The smallest partition holds two slots, so a new record never replaces the one before it.
const MIN_SECTORS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct SlotStatistics {
    pub empty: u16,
    pub written: u16,
    pub corrupt: u16,
    /// Sequence number of the record `load` would return, if any.
    pub newest_sequence: Option<u32>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum State {
    Uninitialized,
    Initialized,
}

struct Newest {
    slot: usize,
    sequence: u32,
    payload: Vec<u8>,
}

struct Scan {
    newest: Option<Newest>,
    statistics: SlotStatistics,
}

/// Persists a single hex color in a flash partition.
///
/// Every save writes a complete record into the slot after the newest one, so an interrupted
/// save leaves the previous record intact. Nothing is cached in memory: each call reads the slot
/// headers back from flash.
pub struct ColorStore<T: Platform> {
    pub(crate) hal: T,
    pub(crate) base_address: usize,
    pub(crate) sectors: u16,
    state: State,
    open_handles: usize,
}

impl<T: Platform> ColorStore<T> {
    /// Validates the partition geometry. No flash access happens until [`ColorStore::initialize`].
    pub fn new(
        partition_offset: usize,
        partition_size: usize,
        hal: T,
    ) -> Result<ColorStore<T>, Error> {
        if !partition_offset.is_multiple_of(FLASH_SECTOR_SIZE) {
            return Err(Error::InvalidPartitionOffset);
        }

        if !partition_size.is_multiple_of(FLASH_SECTOR_SIZE) {
            return Err(Error::InvalidPartitionSize);
        }

        let sectors = partition_size / FLASH_SECTOR_SIZE;
        if !(MIN_SECTORS..=u16::MAX as usize).contains(&sectors) {
            return Err(Error::InvalidPartitionSize);
        }

        Ok(Self {
            hal,
            base_address: partition_offset,
            sectors: sectors as u16,
            state: State::Uninitialized,
            open_handles: 0,
        })
    }

    /// Mounts the partition: checks that the flash can hold it and reads every slot once.
    ///
    /// Calling it again after a successful mount does nothing.
    pub fn initialize(&mut self) -> Result<(), Error> {
        if self.state == State::Initialized {
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        trace!("initialize: @{:#08x} sectors {}", self.base_address, self.sectors);

        #[cfg(feature = "debug-logs")]
        println!("store: initialize");

        let end = self.base_address + self.sectors as usize * FLASH_SECTOR_SIZE;
        if end > self.hal.capacity()
            || !FLASH_SECTOR_SIZE.is_multiple_of(T::ERASE_SIZE)
            || !HEADER_SIZE.is_multiple_of(T::WRITE_SIZE)
            || !FLASH_SECTOR_SIZE.is_multiple_of(T::READ_SIZE)
        {
            return Err(Error::MediumUnavailable);
        }

        self.scan().map_err(|_| Error::MediumUnavailable)?;
        self.state = State::Initialized;
        Ok(())
    }

    /// Stores `value`, replacing the previous color.
    ///
    /// `value` has to be exactly six hex digits. If the flash fails midway or power is lost, a
    /// later [`ColorStore::load`] returns either the previous color or `value`.
    pub fn save(&mut self, value: &str) -> Result<(), Error> {
        let color = HexColor::parse(value)?;
        self.ensure_initialized()?;

        #[cfg(feature = "defmt")]
        trace!("save: {}", color);

        #[cfg(feature = "debug-logs")]
        println!("store: save {color}");

        let newest = self.scan().map_err(|_| Error::WriteFailed)?.newest;
        let (slot, sequence) = match newest {
            Some(newest) => (
                (newest.slot + 1) % self.sectors as usize,
                newest.sequence.checked_add(1).ok_or(Error::WriteFailed)?,
            ),
            None => (0, 0),
        };

        let address = self.slot_address(slot);
        let mut handle = SlotHandle::open(&mut self.hal, &mut self.open_handles, address);
        handle
            .write(sequence, color.as_bytes())
            .map_err(|_| Error::WriteFailed)
    }

    /// Returns the most recently saved color, or [`DEFAULT_COLOR`] if none was saved or the
    /// stored bytes are not a color.
    pub fn load(&mut self) -> Result<String, Error> {
        Ok(String::from(self.load_color()?.as_str()))
    }

    /// Same as [`ColorStore::load`], typed.
    pub fn load_color(&mut self) -> Result<HexColor, Error> {
        self.ensure_initialized()?;

        let Some(newest) = self.scan().map_err(|_| Error::ReadFailed)?.newest else {
            #[cfg(feature = "debug-logs")]
            println!("store: load: nothing stored, using default");

            return Ok(HexColor::default());
        };

        match HexColor::from_bytes(&newest.payload) {
            Ok(color) => {
                #[cfg(feature = "debug-logs")]
                println!("store: load: found {color}");

                Ok(color)
            }
            Err(_) => {
                #[cfg(feature = "defmt")]
                warn!("load: malformed payload in sequence {}", newest.sequence);

                #[cfg(feature = "debug-logs")]
                println!("store: load: malformed {:?}, using default", newest.payload);

                Ok(HexColor::default())
            }
        }
    }

    /// Slot usage of the partition, read back from flash.
    pub fn statistics(&mut self) -> Result<SlotStatistics, Error> {
        self.ensure_initialized()?;
        Ok(self.scan().map_err(|_| Error::ReadFailed)?.statistics)
    }

    /// Number of slot handles currently held. Every operation releases its handles before it
    /// returns, so this is zero whenever the caller can observe it.
    pub fn open_handles(&self) -> usize {
        self.open_handles
    }

    fn ensure_initialized(&self) -> Result<(), Error> {
        match self.state {
            State::Initialized => Ok(()),
            State::Uninitialized => Err(Error::NotInitialized),
        }
    }

    fn slot_address(&self, slot: usize) -> usize {
        self.base_address + slot * FLASH_SECTOR_SIZE
    }

    fn scan(&mut self) -> Result<Scan, T::Error> {
        let mut statistics = SlotStatistics {
            empty: 0,
            written: 0,
            corrupt: 0,
            newest_sequence: None,
        };
        let mut newest: Option<Newest> = None;

        for slot in 0..self.sectors as usize {
            let address = self.slot_address(slot);
            let content =
                SlotHandle::open(&mut self.hal, &mut self.open_handles, address).read()?;

            match content {
                SlotContent::Empty => statistics.empty += 1,
                SlotContent::Corrupt => statistics.corrupt += 1,
                SlotContent::Record { sequence, payload } => {
                    statistics.written += 1;
                    if newest.as_ref().is_none_or(|n| sequence > n.sequence) {
                        newest = Some(Newest {
                            slot,
                            sequence,
                            payload,
                        });
                    }
                }
            }
        }

        statistics.newest_sequence = newest.as_ref().map(|n| n.sequence);
        Ok(Scan {
            newest,
            statistics,
        })
    }
}
