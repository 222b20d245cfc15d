//! PAK archive reader and writer for the Metroid Prime series.
//!
//! Two container layouts exist across the three releases:
//!
//! - Version 3.5 archives (Mp1, Mp2): a name table followed by a flat entry
//!   table with absolute payload offsets
//! - Version 2 sectioned archives (Mp3): `STRN`, `RSHD` and `DATA` sections
//!
//! Compressed payloads use zlib (Mp1), length-prefixed LZO segments (Mp2) or
//! `CMPD` block tables (Mp3). The crate also decodes the small level-side
//! chunks the resource router needs: STRG names, MLVL levels, MAPW world
//! maps and CHAR character heads.
//!
//! # Example
//!
//! ```no_run
//! use chozo_common::Generation;
//! use chozo_pak::PakArchive;
//!
//! let archive = PakArchive::open("Metroid1.pak", Generation::Mp1)?;
//!
//! for entry in archive.entries() {
//!     println!("{} {}: {} bytes", entry.kind(), entry.id(), entry.size());
//! }
//!
//! if let Some(entry) = archive.entries().first() {
//!     let data = archive.read_entry(entry)?;
//! }
//! # Ok::<(), chozo_pak::Error>(())
//! ```

mod archive;
mod builder;
mod character;
mod decompress;
mod entry;
mod error;
pub mod format;
mod mapw;
mod mlvl;
mod strg;

pub use archive::{is_no_share_name, PakArchive};
pub use builder::PakBuilder;
pub use character::{Character, CharacterOverlay};
pub use decompress::{
    compress_entry, compress_lzo_segments, decompress_entry, decompress_lzo_segments,
    lzo_compress, lzo_decompress_into, LZO_SEGMENT_SIZE,
};
pub use entry::PakEntry;
pub use error::{Error, Result};
pub use mapw::{read_mapw, write_mapw};
pub use mlvl::{AudioGroup, Dependency, Dock, LayerFlags, MemRelay, Mlvl, MlvlArea};
pub use strg::{read_strg_name, Strg, StrgLanguage};
