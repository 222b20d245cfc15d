//! Chozo - Metroid Prime PAK/MREA extraction and re-cooking library.
//!
//! This crate provides a unified interface to the chozo library ecosystem
//! for working with Metroid Prime, Metroid Prime 2 and Metroid Prime 3
//! game archives.
//!
//! # Crates
//!
//! - [`chozo_common`] - Big-endian streams, resource ids, generation layouts
//! - [`chozo_pak`] - PAK archives and the level chunks the router reads
//! - [`chozo_mrea`] - MREA area decoding, scene output and re-cooking
//! - [`chozo_router`] - Unique/shared resource routing and extraction
//!
//! # Example
//!
//! ```no_run
//! use chozo::prelude::*;
//!
//! let archive = PakArchive::open("Metroid1.pak", Generation::Mp1)?;
//! let router = PakRouter::build(vec![archive], RouterPaths::new("working", "cooked"), |_| {})?;
//!
//! for routed in router.enumerate_resources() {
//!     if let Some(path) = router.get_working(routed.entry.id(), None, true) {
//!         println!("{} -> {}", routed.entry.best_name(), path.display());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use chozo_common as common;
pub use chozo_mrea as mrea;
pub use chozo_pak as pak;
pub use chozo_router as router;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use chozo_common::{ErrorKind, FourCC, Generation, IdWidth, ResourceId};
    pub use chozo_mrea::{
        cook_area, decode_area, extract_area, read_header, AreaLayout, CookOptions, DecodeContext,
        JsonSceneSink, MreaHeader,
    };
    pub use chozo_pak::{Mlvl, PakArchive, PakBuilder, PakEntry};
    pub use chozo_router::{
        discover_archives, extract_all, ExtractEvent, ExtractOptions, ExtractOutcome, PakRouter,
        RouterPaths, UniqueKind,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
