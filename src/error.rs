use thiserror::Error;

/// Errors that can occur during color store operations. Marked as non-exhaustive to allow for
/// future additions without breaking the API.
///
/// A missing or damaged record is not an error: [`crate::ColorStore::load`] substitutes
/// [`crate::DEFAULT_COLOR`] in that case.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The partition offset has to be aligned to the size of a flash sector (4k)
    #[error("invalid partition offset")]
    InvalidPartitionOffset,

    /// The partition size has to be a multiple of the flash sector size (4k) and hold at
    /// least two sectors.
    #[error("invalid partition size")]
    InvalidPartitionSize,

    /// The flash could not be mounted: the partition exceeds its capacity or the initial
    /// scan failed.
    #[error("medium unavailable")]
    MediumUnavailable,

    /// The flash reported an error while saving. The previously stored value is untouched.
    #[error("write failed")]
    WriteFailed,

    /// The flash reported an error while loading.
    #[error("read failed")]
    ReadFailed,

    /// The value does not match the fixed payload size of 6 bytes.
    #[error("value too large")]
    ValueTooLarge,

    /// The value has the right size but is not made of hex digits.
    #[error("invalid color")]
    InvalidColor,

    /// `initialize` has not been called yet.
    #[error("not initialized")]
    NotInitialized,
}
