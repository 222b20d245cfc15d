//! Common utilities for chozo.
//!
//! This crate provides the foundational types shared by every chozo crate:
//!
//! - [`BinaryReader`] - Zero-copy big-endian reading from byte slices
//! - [`BinaryWriter`] - Big-endian writer with 32-byte alignment helpers
//! - [`EntryReadStream`] - Bounded random-access stream over a decoded resource
//! - [`ReadStream`] - The seekable stream interface all section walkers read through
//! - [`ResourceId`] and [`FourCC`] - Resource identification
//! - [`Generation`] - Per-release layout descriptor (id width, PAK format, compression)
//! - [`math`] - Vectors, bounding boxes and area transforms

mod error;
mod generation;
mod id;
mod reader;
mod stream;
mod writer;

pub mod math;

pub use error::{Error, ErrorKind, Result};
pub use generation::{EntryCompression, Generation, IdWidth, PakFormat};
pub use id::{FourCC, ResourceId};
pub use reader::BinaryReader;
pub use stream::{resolve_seek, EntryReadStream, ReadStream, SeekOrigin};
pub use writer::BinaryWriter;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Round `value` up to the next multiple of 32.
#[inline]
pub const fn round_up_32(value: u64) -> u64 {
    (value + 31) & !31
}

/// Round `value` up to the next multiple of 32 (`usize` flavour).
#[inline]
pub const fn round_up_32_usize(value: usize) -> usize {
    (value + 31) & !31
}
