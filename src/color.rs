use crate::error::Error;
use core::fmt;

/// Number of bytes of a stored color: six ASCII hex digits, `RRGGBB`.
pub const PAYLOAD_SIZE: usize = 6;

/// Returned whenever nothing valid has been stored yet.
pub const DEFAULT_COLOR: &str = "FF00FF";

/// A validated `RRGGBB` color as it is kept on flash. Lowercase digits are preserved verbatim.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HexColor([u8; PAYLOAD_SIZE]);

impl HexColor {
    /// Validates `value` as a stored color.
    ///
    /// Anything that is not exactly [`PAYLOAD_SIZE`] bytes long is rejected with
    /// [`Error::ValueTooLarge`], six bytes with a non hex digit with [`Error::InvalidColor`].
    pub fn parse(value: &str) -> Result<Self, Error> {
        Self::from_bytes(value.as_bytes())
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let raw: [u8; PAYLOAD_SIZE] = bytes.try_into().map_err(|_| Error::ValueTooLarge)?;
        if !raw.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::InvalidColor);
        }
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // only ascii hex digits pass `from_bytes`
        core::str::from_utf8(&self.0).unwrap_or(DEFAULT_COLOR)
    }

    /// Splits the color into its red, green and blue channel.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |i: usize| (nibble(self.0[i]) << 4) | nibble(self.0[i + 1]);
        (channel(0), channel(2), channel(4))
    }
}

const fn nibble(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self(*b"FF00FF")
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexColor(\"{}\")", self.as_str())
    }
}

impl AsRef<str> for HexColor {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
