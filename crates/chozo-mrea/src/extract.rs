//! Writing a decoded area to its working directory.
//!
//! Layout of an extracted area:
//!
//! ```text
//! <area dir>/<area>.scene.json     scene commands
//! <area dir>/<NN name>/!objects.json  one directory per script layer
//! <area dir>/<NN name>/!defaultactive marker for default-active layers
//! <area dir>/!generated.json        Mp2/Mp3 generated objects
//! <area dir>/<area>.visi           raw VISI section, when present
//! <area dir>/!visi.json            VISI entity metadata
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::decode::{decode_area, decomp_sidecar, DecodeContext, DecodedArea};
use crate::scene::{scene_sidecar, JsonSceneSink};
use crate::Result;

/// Script objects of one layer.
pub const LAYER_OBJECTS_FILE: &str = "!objects.json";
/// Marker for a layer that is active by default.
pub const LAYER_ACTIVE_FILE: &str = "!defaultactive";
/// Mp2/Mp3 generated-object layer.
pub const GENERATED_FILE: &str = "!generated.json";
/// VISI metadata.
pub const VISI_INFO_FILE: &str = "!visi.json";

/// Directory name of script layer `index`.
pub fn layer_dir_name(index: usize, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => format!("{:02} {}", index, sanitize(name.trim())),
        _ => format!("{:02} Layer", index),
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// Where and under which names an area is extracted.
#[derive(Debug, Clone, Default)]
pub struct AreaLayout {
    pub area_dir: PathBuf,
    pub area_name: String,
    /// Layer names and default-active flags from the level.
    pub layers: Vec<(String, bool)>,
    pub world_link: Option<String>,
    /// Destination for the decompressed copy of a block-compressed area.
    pub decomp_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LayerDir {
    pub path: PathBuf,
    pub active: bool,
}

/// Files produced for one area.
#[derive(Debug, Clone)]
pub struct AreaOutput {
    pub scene_path: PathBuf,
    pub layer_dirs: Vec<LayerDir>,
    pub visi_path: Option<PathBuf>,
    pub decomp_path: Option<PathBuf>,
    pub area: DecodedArea,
}

pub fn scene_path(area_dir: &Path, area_name: &str) -> PathBuf {
    area_dir.join(format!("{}.scene.json", area_name))
}

fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Decode `data` and write the area's working files.
pub fn extract_area(data: Vec<u8>, layout: &AreaLayout) -> Result<AreaOutput> {
    fs::create_dir_all(&layout.area_dir)?;

    let decomp_path = match &layout.decomp_path {
        Some(path) => match decomp_sidecar(&data)? {
            Some(bytes) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, bytes)?;
                Some(path.clone())
            }
            None => None,
        },
        None => None,
    };

    let ctx = DecodeContext {
        area_name: layout.area_name.clone(),
        world_link: layout.world_link.clone(),
    };
    let scene_path = scene_path(&layout.area_dir, &layout.area_name);
    let mut sink = JsonSceneSink::new(&scene_path);
    let area = decode_area(data, &ctx, &mut sink)?;
    sink.finish()?;

    let mut layer_dirs = Vec::with_capacity(area.layers.len());
    for (i, layer) in area.layers.iter().enumerate() {
        let (name, active) = match layout.layers.get(i) {
            Some((name, active)) => (Some(name.as_str()), *active),
            None => (None, true),
        };
        let dir = layout.area_dir.join(layer_dir_name(i, name));
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(LAYER_OBJECTS_FILE), serde_json::to_string_pretty(layer)?)?;
        let marker = dir.join(LAYER_ACTIVE_FILE);
        if active {
            fs::write(&marker, b"")?;
        } else {
            remove_stale(&marker)?;
        }
        layer_dirs.push(LayerDir { path: dir, active });
    }

    if let Some(generated) = &area.generated {
        fs::write(
            layout.area_dir.join(GENERATED_FILE),
            serde_json::to_string_pretty(generated)?,
        )?;
    }

    let visi_path = scene_sidecar(&scene_path, "visi");
    let info_path = layout.area_dir.join(VISI_INFO_FILE);
    let visi_path = match &area.visi {
        Some(bytes) => {
            fs::write(&visi_path, bytes)?;
            match &area.visi_info {
                Some(info) => fs::write(&info_path, serde_json::to_string_pretty(info)?)?,
                None => remove_stale(&info_path)?,
            }
            Some(visi_path)
        }
        None => {
            // Cook recycles any `.visi` it finds next to the scene.
            remove_stale(&visi_path)?;
            remove_stale(&info_path)?;
            None
        }
    };

    debug!(
        area = %layout.area_name,
        meshes = area.mesh_count,
        layers = layer_dirs.len(),
        visi = visi_path.is_some(),
        "extracted area"
    );

    Ok(AreaOutput {
        scene_path,
        layer_dirs,
        visi_path,
        decomp_path,
        area,
    })
}
