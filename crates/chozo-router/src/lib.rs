//! Resource router for Metroid Prime releases.
//!
//! A release is a set of PAK archives. The router indexes the levels of
//! each archive into a Level/Area/Layer tree, decides for every resource
//! whether it is unique to one scope or shared across archives, and maps
//! resource ids to working and cooked paths. [`extract_all`] drives a
//! parallel extraction over the routed release.
//!
//! # Example
//!
//! ```no_run
//! use chozo_common::Generation;
//! use chozo_router::{discover_archives, extract_all, ExtractOptions, PakRouter, RouterPaths};
//!
//! let archives = discover_archives("game/files".as_ref(), Generation::Mp1)?;
//! let router = PakRouter::build(archives, RouterPaths::new("working", "cooked"), |p| {
//!     println!("indexed {:.0}%", p * 100.0);
//! })?;
//! let stats = extract_all(&router, &ExtractOptions::new(Generation::Mp1), None)?;
//! println!("{} extracted, {} skipped", stats.extracted, stats.skipped);
//! # Ok::<(), chozo_router::Error>(())
//! ```

mod error;
mod extract;
mod level;
mod locks;
mod router;
mod unique;

pub use error::{Error, Result};
pub use extract::{
    discover_archives, extract_all, ExtractEvent, ExtractOptions, ExtractOutcome, ExtractStats,
};
pub use level::{area_dir_name, build_levels, level_string, Area, Layer, Level};
pub use locks::{ResourceLockGuard, ResourceLocks};
pub use router::{
    cooked_extension, working_extension, AttachmentRig, Matrix4, PakRouter, RigPair, RoutedEntry,
    RouterPaths, RouterScope, SHARED_DIR,
};
pub use unique::{UniqueKind, UniqueResult};
