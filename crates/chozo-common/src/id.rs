//! Resource identifiers and four-character codes.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{Error, IdWidth, Result};

/// Opaque resource identifier.
///
/// One release uses a single id width (32 bits for Mp1/Mp2, 64 bits for Mp3).
/// Zero and all-ones both mean "no resource".
#[derive(Clone, Copy)]
pub struct ResourceId {
    raw: u64,
    width: IdWidth,
}

impl ResourceId {
    /// Create an id, masking `raw` down to `width`.
    #[inline]
    pub const fn new(raw: u64, width: IdWidth) -> Self {
        Self {
            raw: raw & width.all_ones(),
            width,
        }
    }

    /// A 32-bit id.
    #[inline]
    pub const fn new32(raw: u32) -> Self {
        Self::new(raw as u64, IdWidth::Bits32)
    }

    /// A 64-bit id.
    #[inline]
    pub const fn new64(raw: u64) -> Self {
        Self::new(raw, IdWidth::Bits64)
    }

    /// The "no resource" id of the given width.
    #[inline]
    pub const fn invalid(width: IdWidth) -> Self {
        Self { raw: 0, width }
    }

    /// Raw value widened to 64 bits.
    #[inline]
    pub const fn to_u64(self) -> u64 {
        self.raw
    }

    /// Id width.
    #[inline]
    pub const fn width(self) -> IdWidth {
        self.width
    }

    /// Whether this id names a resource.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.raw != 0 && self.raw != self.width.all_ones()
    }

    /// Big-endian on-disk bytes.
    pub fn to_be_bytes(self) -> Vec<u8> {
        match self.width {
            IdWidth::Bits32 => (self.raw as u32).to_be_bytes().to_vec(),
            IdWidth::Bits64 => self.raw.to_be_bytes().to_vec(),
        }
    }

    /// Parse a hex string (as produced by `Display`) with the given width.
    pub fn parse_hex(text: &str, width: IdWidth) -> Result<Self> {
        let raw = u64::from_str_radix(text.trim(), 16).map_err(|_| Error::ExpectedValue {
            expected: "hexadecimal resource id".to_string(),
            actual: text.to_string(),
        })?;
        Ok(Self::new(raw, width))
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.width == other.width
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.width, self.raw).cmp(&(other.width, other.raw))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.width {
            IdWidth::Bits32 => write!(f, "{:08X}", self.raw),
            IdWidth::Bits64 => write!(f, "{:016X}", self.raw),
        }
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ResourceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ResourceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        // Width follows the digit count written by `Display`.
        let width = if text.len() > 8 {
            IdWidth::Bits64
        } else {
            IdWidth::Bits32
        };
        ResourceId::parse_hex(&text, width).map_err(serde::de::Error::custom)
    }
}

/// Four-character type code, e.g. `MREA` or `TXTR`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Build from a byte literal.
    #[inline]
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }

    /// Big-endian integer value.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// From a big-endian integer value.
    #[inline]
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// Lower-case string form, used for cooked file extensions.
    pub fn to_lowercase(self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

impl std::str::FromStr for FourCC {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err(Error::ExpectedValue {
                expected: "four-character code".to_string(),
                actual: s.to_string(),
            });
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FourCC {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
