//! Area cooking.
//!
//! Cook reads an extracted area back (scene file, layer directories, VISI
//! sidecar, path graph file), rebuilds the AROT octree from mesh bounds and
//! writes sections in the fixed order of the target generation. Every
//! section is padded to 32 bytes and the size table holds the padded
//! lengths.

use std::fs;
use std::path::{Path, PathBuf};

use chozo_common::math::{Aabb, Transform};
use chozo_common::{BinaryWriter, Generation, IdWidth, ResourceId};
use tracing::{debug, warn};

use crate::arot::Arot;
use crate::block::compress_sections;
use crate::extract::{GENERATED_FILE, LAYER_ACTIVE_FILE, LAYER_OBJECTS_FILE, VISI_INFO_FILE};
use crate::header::MreaHeader;
use crate::lights::LightLayers;
use crate::scene::{scene_sidecar, AreaScene};
use crate::scly::{write_generated_section, write_layer_section, write_scly, ScriptLayer};
use crate::visi::{VisiInfo, MIN_RECYCLE_LEN};
use crate::Result;

/// Cook settings.
#[derive(Debug, Clone)]
pub struct CookOptions {
    pub generation: Generation,
    /// Pack Mp2/Mp3 sections into LZO blocks.
    pub compress_blocks: bool,
    /// Area transform overriding the one recorded in the scene.
    pub transform: Option<Transform>,
}

impl CookOptions {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            compress_blocks: generation.has_block_compression(),
            transform: None,
        }
    }
}

/// A script layer found on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredLayer {
    pub dir: PathBuf,
    pub active: bool,
    pub layer: ScriptLayer,
}

fn layer_order(dir: &Path) -> (u32, String) {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let index = name
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX);
    (index, name)
}

/// Layer directories under `area_dir`, ordered by their index prefix.
pub fn discover_layers(area_dir: &Path) -> Result<Vec<DiscoveredLayer>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(area_dir)? {
        let path = entry?.path();
        if path.is_dir() && path.join(LAYER_OBJECTS_FILE).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort_by_key(|d| layer_order(d));

    let mut layers = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let text = fs::read_to_string(dir.join(LAYER_OBJECTS_FILE))?;
        layers.push(DiscoveredLayer {
            active: dir.join(LAYER_ACTIVE_FILE).exists(),
            layer: serde_json::from_str(&text)?,
            dir,
        });
    }
    Ok(layers)
}

/// Path graph id from a `!path_<id>.*` file in the area directory.
pub fn discover_path_id(area_dir: &Path, width: IdWidth) -> Result<Option<ResourceId>> {
    for entry in fs::read_dir(area_dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        let Some(rest) = name.strip_prefix("!path_") else {
            continue;
        };
        let hex = rest.split('.').next().unwrap_or(rest);
        match ResourceId::parse_hex(hex, width) {
            Ok(id) => return Ok(Some(id)),
            Err(e) => warn!(file = %name, error = %e, "ignoring unparsable path graph file"),
        }
    }
    Ok(None)
}

/// VISI section bytes: a previous `.visi` sidecar when one exists,
/// otherwise an empty section.
fn recycle_visi(scene_path: &Path, light_count: usize) -> Result<Vec<u8>> {
    let visi_path = scene_sidecar(scene_path, "visi");
    let len = fs::metadata(&visi_path).map(|m| m.len()).unwrap_or(0);
    if len <= MIN_RECYCLE_LEN {
        return Ok(vec![0; 4]);
    }
    let bytes = fs::read(&visi_path)?;
    let info_path = visi_path.with_file_name(VISI_INFO_FILE);
    if let Ok(text) = fs::read_to_string(&info_path) {
        let info: VisiInfo = serde_json::from_str(&text)?;
        if info.light_count as usize != light_count {
            debug!(
                recorded = info.light_count,
                current = light_count,
                "recycling VISI with a different light count"
            );
        }
    }
    debug!(path = %visi_path.display(), bytes = bytes.len(), "recycled VISI");
    Ok(bytes)
}

fn encode(f: impl FnOnce(&mut BinaryWriter)) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    f(&mut w);
    w.into_inner()
}

fn id_bytes(id: Option<ResourceId>, width: IdWidth) -> Vec<u8> {
    encode(|w| w.write_id(id.unwrap_or(ResourceId::invalid(width))))
}

/// Cook the area whose scene file is `scene_path`.
pub fn cook_area(scene_path: &Path, options: &CookOptions) -> Result<Vec<u8>> {
    let generation = options.generation;
    let width = generation.id_width();
    let area_dir = scene_path.parent().unwrap_or(Path::new("."));
    let scene = AreaScene::load(scene_path)?;

    let materials = scene.material_set()?;
    let meshes = scene.meshes()?;
    let boxes: Vec<Aabb> = meshes.iter().map(|m| m.world_bounds()).collect();
    let full = boxes.iter().fold(Aabb::empty(), |acc, b| acc.union(b));

    let mut header = MreaHeader::new(generation);
    header.transform = options.transform.unwrap_or_else(|| scene.transform());
    header.mesh_count = meshes.len() as u32;

    let mut sections: Vec<Vec<u8>> = Vec::new();
    let slots = &mut header.slots;

    slots.geometry = 0;
    sections.push(encode(|w| materials.write(w)));
    for (mesh, aabb) in meshes.iter().zip(&boxes) {
        sections.extend(mesh.write_sections(generation, aabb));
    }

    slots.arot = sections.len() as u32;
    let arot = Arot::build(&full, &boxes);
    sections.push(encode(|w| arot.write(w)));
    if generation == Generation::Mp2 {
        slots.bvh = Some(sections.len() as u32);
        sections.push(0u32.to_be_bytes().to_vec());
        slots.bitmap = Some(sections.len() as u32);
        sections.push(0u32.to_be_bytes().to_vec());
    }

    let layers = discover_layers(area_dir)?;
    slots.scly = sections.len() as u32;
    match generation {
        Generation::Mp1 => {
            let layers: Vec<ScriptLayer> = layers.into_iter().map(|l| l.layer).collect();
            sections.push(write_scly(&layers));
        }
        Generation::Mp2 | Generation::Mp3 => {
            header.scly_layer_count = layers.len() as u32;
            for (i, l) in layers.iter().enumerate() {
                sections.push(write_layer_section(i as u32, &l.layer));
            }
            let generated_path = area_dir.join(GENERATED_FILE);
            let generated: ScriptLayer = if generated_path.is_file() {
                serde_json::from_str(&fs::read_to_string(&generated_path)?)?
            } else {
                ScriptLayer::default()
            };
            slots.scgn = Some(sections.len() as u32);
            sections.push(write_generated_section(&generated));
        }
    }

    slots.collision = sections.len() as u32;
    sections.push(match scene.collision() {
        Some(collision) => encode(|w| collision.write(w)),
        None => Vec::new(),
    });

    slots.unknown = sections.len() as u32;
    sections.push(encode(|w| {
        w.write_u32(1);
        w.write_u32(0);
    }));

    let lights = LightLayers {
        layers: scene.lights()?,
    };
    slots.lights = sections.len() as u32;
    sections.push(encode(|w| lights.write(w)));

    slots.visi = sections.len() as u32;
    sections.push(recycle_visi(scene_path, lights.total())?);

    let path_id = match discover_path_id(area_dir, width)? {
        Some(id) => Some(id),
        None => scene.path_id(),
    };
    slots.path = sections.len() as u32;
    sections.push(id_bytes(path_id, width));

    if generation != Generation::Mp1 {
        slots.egmc = Some(sections.len() as u32);
        sections.push(id_bytes(scene.egmc(), width));
    }
    if generation == Generation::Mp3 {
        let deps = scene.dependencies().cloned().unwrap_or_default();
        slots.deps = Some(sections.len() as u32);
        sections.push(encode(|w| deps.write(w)));
    }

    for section in &mut sections {
        section.resize(chozo_common::round_up_32_usize(section.len()), 0);
    }
    header.sec_sizes = sections.iter().map(|s| s.len() as u32).collect();
    header.validate()?;

    let mut w = BinaryWriter::new();
    if options.compress_blocks && generation.has_block_compression() {
        let blocks = compress_sections(&sections)?;
        header.block_count = blocks.infos.len() as u32;
        header.write(&mut w);
        blocks.write_to(&mut w);
    } else {
        header.write(&mut w);
        for section in &sections {
            w.write_bytes(section);
        }
    }

    debug!(
        scene = %scene_path.display(),
        generation = %generation,
        sections = header.sec_count(),
        blocks = header.block_count,
        bytes = w.len(),
        "cooked area"
    );
    Ok(w.into_inner())
}
