//! MREA area codec for the Metroid Prime series.
//!
//! An area is a header naming its sections plus a table of padded section
//! sizes. Mp2 and Mp3 areas may store the sections as LZO-compressed
//! blocks; [`BlockDecompressionStream`] hides that behind a seekable
//! stream so one section walker serves all three generations.
//!
//! - [`decode_area`] walks the sections and emits [`SceneCommand`]s
//! - [`extract_area`] writes the scene, layer, VISI and decompressed files
//! - [`cook_area`] reads them back and rebuilds a binary area, including a
//!   fresh [`Arot`] octree
//!
//! # Example
//!
//! ```no_run
//! use chozo_common::Generation;
//! use chozo_mrea::{cook_area, extract_area, AreaLayout, CookOptions};
//!
//! let data = std::fs::read("MREA_1234ABCD.mrea")?;
//! let layout = AreaLayout {
//!     area_dir: "work/Area".into(),
//!     area_name: "Area".into(),
//!     ..AreaLayout::default()
//! };
//! let out = extract_area(data, &layout)?;
//! let cooked = cook_area(&out.scene_path, &CookOptions::new(Generation::Mp1))?;
//! # Ok::<(), chozo_mrea::Error>(())
//! ```

mod arot;
mod block;
mod collision;
mod cook;
mod decode;
mod deps;
mod error;
mod extract;
mod header;
mod lights;
mod material;
mod mesh;
mod scene;
mod scly;
mod section;
mod serde_hex;
mod visi;

pub use arot::{Arot, ArotNode, AROT_MAGIC};
pub use block::{compress_sections, BlockDecompressionStream, BlockInfo, CompressedBlocks, BLOCK_SIZE, SEGMENT_SIZE};
pub use collision::{CollisionMesh, DEAFBABE_MAGIC};
pub use cook::{cook_area, discover_layers, discover_path_id, CookOptions, DiscoveredLayer};
pub use decode::{
    decode_area, decomp_sidecar, extract_layer_deps, get_egmc_id, get_path_id, read_header, DecodeContext,
    DecodedArea,
};
pub use deps::{AreaDependencies, AreaDependency, LayerDeps};
pub use error::{Error, Result};
pub use extract::{
    extract_area, layer_dir_name, scene_path, AreaLayout, AreaOutput, LayerDir, GENERATED_FILE, LAYER_ACTIVE_FILE,
    LAYER_OBJECTS_FILE, VISI_INFO_FILE,
};
pub use header::{MreaHeader, SectionSlots, MREA_MAGIC};
pub use lights::{Light, LightLayers, BABEDEAD_MAGIC};
pub use material::{Material, MaterialSet};
pub use mesh::{decode_display_list, encode_display_list, Mesh, Primitive, Surface};
pub use scene::{scene_sidecar, AreaScene, JsonSceneSink, SceneCommand, SceneSink};
pub use scly::{Connection, ScriptLayer, ScriptObject};
pub use section::{SectionCursor, SectionStream};
pub use visi::{VisiInfo, VISI_MAGIC};
