//! On-disk PAK structures.
//!
//! This module contains the fixed-size, big-endian records of both archive
//! layouts. Variable-length parts (name strings, section bodies) are read by
//! the archive parser around these records.

mod classic;
mod sectioned;

pub use classic::{ClassicEntry, ClassicHeader};
pub use sectioned::{SectionRecord, SectionedEntry, SectionedHeader};

use zerocopy::byteorder::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// One block descriptor of a `CMPD` compressed payload.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CmpdBlock {
    /// Compressed size in the low 24 bits; the top byte is a flag.
    pub compressed_size: U32,
    /// Decompressed size of the block.
    pub decompressed_size: U32,
}

impl CmpdBlock {
    /// `CMPD` magic.
    pub const MAGIC: [u8; 4] = *b"CMPD";

    /// Compressed size with the flag byte masked off.
    #[inline]
    pub fn compressed(&self) -> usize {
        (self.compressed_size.get() & 0x00FF_FFFF) as usize
    }

    /// Whether the block is stored without compression.
    #[inline]
    pub fn is_stored(&self) -> bool {
        self.compressed() == self.decompressed_size.get() as usize
    }
}
