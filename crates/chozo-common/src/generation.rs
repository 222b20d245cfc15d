//! Release generation layout descriptor.
//!
//! The three releases share one codec; everything that differs between them
//! (id width, PAK table layout, payload compression, chunk versions) is read
//! off a [`Generation`] value instead of being spread over per-game types.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Game release generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Generation {
    /// Metroid Prime.
    Mp1,
    /// Metroid Prime 2: Echoes.
    Mp2,
    /// Metroid Prime 3: Corruption.
    Mp3,
}

/// Width of resource ids on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdWidth {
    /// 32-bit ids.
    Bits32,
    /// 64-bit ids.
    Bits64,
}

impl IdWidth {
    /// Size of one id in bytes.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            IdWidth::Bits32 => 4,
            IdWidth::Bits64 => 8,
        }
    }

    /// The all-ones value for this width.
    #[inline]
    pub const fn all_ones(self) -> u64 {
        match self {
            IdWidth::Bits32 => u32::MAX as u64,
            IdWidth::Bits64 => u64::MAX,
        }
    }
}

/// Archive entry table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PakFormat {
    /// Version 3.5 table: name list followed by entry list (Mp1, Mp2).
    Classic,
    /// Version 2 sectioned archive with STRN/RSHD/DATA sections (Mp3).
    Sectioned,
}

/// How compressed archive entries are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryCompression {
    /// Decompressed size followed by a zlib stream.
    Zlib,
    /// Decompressed size followed by length-prefixed LZO segments.
    LzoSegments,
    /// `CMPD` block table followed by stored or LZO-segmented blocks.
    Cmpd,
}

impl Generation {
    /// All known generations.
    pub const ALL: [Generation; 3] = [Generation::Mp1, Generation::Mp2, Generation::Mp3];

    /// Resource id width.
    #[inline]
    pub const fn id_width(self) -> IdWidth {
        match self {
            Generation::Mp1 | Generation::Mp2 => IdWidth::Bits32,
            Generation::Mp3 => IdWidth::Bits64,
        }
    }

    /// Archive table layout.
    #[inline]
    pub const fn pak_format(self) -> PakFormat {
        match self {
            Generation::Mp1 | Generation::Mp2 => PakFormat::Classic,
            Generation::Mp3 => PakFormat::Sectioned,
        }
    }

    /// Compression scheme of compressed archive entries.
    #[inline]
    pub const fn entry_compression(self) -> EntryCompression {
        match self {
            Generation::Mp1 => EntryCompression::Zlib,
            Generation::Mp2 => EntryCompression::LzoSegments,
            Generation::Mp3 => EntryCompression::Cmpd,
        }
    }

    /// Whether MREA payloads after the header are block-compressed.
    #[inline]
    pub const fn has_block_compression(self) -> bool {
        !matches!(self, Generation::Mp1)
    }

    /// MLVL chunk version.
    #[inline]
    pub const fn mlvl_version(self) -> u32 {
        match self {
            Generation::Mp1 => 0x11,
            Generation::Mp2 => 0x17,
            Generation::Mp3 => 0x19,
        }
    }

    /// MREA chunk version.
    #[inline]
    pub const fn mrea_version(self) -> u32 {
        match self {
            Generation::Mp1 => 0xF,
            Generation::Mp2 => 0x19,
            Generation::Mp3 => 0x1E,
        }
    }

    /// Identify a generation from an MREA version field.
    pub fn from_mrea_version(version: u32) -> Option<Self> {
        // Bit 16 marks PC-cooked areas; the layout is the same.
        match version & 0xFFFF {
            0xF => Some(Generation::Mp1),
            0x19 => Some(Generation::Mp2),
            0x1E => Some(Generation::Mp3),
            _ => None,
        }
    }

    /// Identify a generation from an MLVL version field.
    pub fn from_mlvl_version(version: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.mlvl_version() == version)
    }

    /// Short lower-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Generation::Mp1 => "mp1",
            Generation::Mp2 => "mp2",
            Generation::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Generation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp1" | "prime" => Ok(Generation::Mp1),
            "mp2" | "echoes" => Ok(Generation::Mp2),
            "mp3" | "corruption" => Ok(Generation::Mp3),
            other => Err(Error::UnknownGeneration(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_values() {
        assert_eq!(Generation::Mp1.id_width().bytes(), 4);
        assert_eq!(Generation::Mp3.id_width().bytes(), 8);
        assert!(!Generation::Mp1.has_block_compression());
        assert!(Generation::Mp2.has_block_compression());
        assert_eq!(Generation::Mp3.pak_format(), PakFormat::Sectioned);
    }

    #[test]
    fn test_version_lookup() {
        assert_eq!(Generation::from_mrea_version(0x1000F), Some(Generation::Mp1));
        assert_eq!(Generation::from_mrea_version(0x19), Some(Generation::Mp2));
        assert_eq!(Generation::from_mlvl_version(0x19), Some(Generation::Mp3));
        assert_eq!(Generation::from_mlvl_version(0x42), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("MP2".parse::<Generation>().unwrap(), Generation::Mp2);
        assert!("mp4".parse::<Generation>().is_err());
    }
}
