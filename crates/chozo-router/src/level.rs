//! Level/Area/Layer dependency tree.
//!
//! One tree is built per archive from its MLVL entries. Each area records
//! the ids referenced by its script layers and by the area as a whole; the
//! tree is read-only once built and drives uniqueness classification.

use chozo_common::math::Transform;
use chozo_common::{FourCC, Generation, ResourceId};
use chozo_mrea::{extract_layer_deps, get_path_id, layer_dir_name, LayerDeps};
use chozo_pak::{read_mapw, read_strg_name, Mlvl, MlvlArea, PakArchive};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::Result;

const MLVL: FourCC = FourCC::new(b"MLVL");

/// A script layer of an area.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    /// Layer name as stored in the level, trimmed.
    pub name: String,
    /// `NN name` directory name under the area.
    pub dir_name: String,
    pub active: bool,
    pub resources: FxHashSet<ResourceId>,
}

/// An area of a level.
#[derive(Debug, Clone)]
pub struct Area {
    pub mrea_id: ResourceId,
    pub name_id: ResourceId,
    /// `NN name` directory name under the level.
    pub name: String,
    pub transform: Transform,
    pub path_id: Option<ResourceId>,
    pub layers: Vec<Layer>,
    pub resources: FxHashSet<ResourceId>,
}

/// A level (MLVL) and its areas.
#[derive(Debug, Clone)]
pub struct Level {
    pub mlvl_id: ResourceId,
    /// Directory name: the MLVL's best entry name.
    pub name: String,
    pub world_name_id: ResourceId,
    pub world_name: Option<String>,
    /// World map MAPA per area index.
    pub mapas: Vec<ResourceId>,
    pub areas: Vec<Area>,
    pub resources: FxHashSet<ResourceId>,
}

impl Level {
    /// Area owning the MREA `mrea_id`.
    pub fn area(&self, mrea_id: ResourceId) -> Option<(usize, &Area)> {
        self.areas.iter().enumerate().find(|(_, a)| a.mrea_id == mrea_id)
    }
}

/// `NN name` for area `index`, falling back to the internal name and then
/// to `MREA_<id>`.
pub fn area_dir_name(
    index: usize,
    display: Option<&str>,
    internal: Option<&str>,
    mrea_id: ResourceId,
) -> String {
    let name = [display, internal]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("MREA_{}", mrea_id));
    format!("{:02} {}", index, name)
}

/// English name held by the STRG `id`, if the archive has it.
pub(crate) fn strg_name(archive: &PakArchive, id: ResourceId) -> Option<String> {
    let entry = archive.lookup(id)?;
    let name = archive
        .read_entry(entry)
        .and_then(|data| read_strg_name(&data));
    match name {
        Ok(name) => name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        Err(e) => {
            warn!(archive = %archive.name(), id = %id, error = %e, "unreadable name string");
            None
        }
    }
}

/// Build the dependency tree of every level in `archive`.
pub fn build_levels(archive: &PakArchive) -> Result<Vec<Level>> {
    let generation = archive.generation();
    let width = generation.id_width();
    let mut levels = Vec::new();

    for entry in archive.entries_of_kind(MLVL) {
        let mlvl = Mlvl::read(&archive.read_entry(entry)?, generation)?;

        let mapas = match archive.lookup(mlvl.world_map_id) {
            Some(mapw) => read_mapw(&archive.read_entry(mapw)?, width)?,
            None => Vec::new(),
        };

        let mut resources = FxHashSet::default();
        for id in [mlvl.world_map_id, mlvl.save_world_id, mlvl.skybox_id] {
            if id.is_valid() {
                resources.insert(id);
            }
        }

        let mut areas = Vec::with_capacity(mlvl.areas.len());
        for (ai, level_area) in mlvl.areas.iter().enumerate() {
            areas.push(build_area(archive, &mlvl, ai, level_area, mapas.get(ai).copied())?);
        }

        let level = Level {
            mlvl_id: entry.id(),
            name: entry.best_name(),
            world_name_id: mlvl.world_name_id,
            world_name: strg_name(archive, mlvl.world_name_id),
            mapas,
            areas,
            resources,
        };
        debug!(
            archive = %archive.name(),
            level = %level.name,
            areas = level.areas.len(),
            "indexed level"
        );
        levels.push(level);
    }
    Ok(levels)
}

fn build_area(
    archive: &PakArchive,
    mlvl: &Mlvl,
    index: usize,
    level_area: &MlvlArea,
    mapa: Option<ResourceId>,
) -> Result<Area> {
    let display = strg_name(archive, level_area.name_id);
    let name = area_dir_name(
        index,
        display.as_deref(),
        level_area.internal_name.as_deref(),
        level_area.mrea_id,
    );

    let (deps, path_id) = match archive.lookup(level_area.mrea_id) {
        Some(mrea) => {
            let data = archive.read_entry(mrea)?;
            let deps = extract_layer_deps(data.clone(), Some(level_area))?;
            (deps, get_path_id(data)?)
        }
        None => (level_only_deps(level_area, archive.generation()), None),
    };

    let names = mlvl.area_layer_names(index);
    let layer_count = names.len().max(deps.layers.len());
    let mut layers = Vec::with_capacity(layer_count);
    for l in 0..layer_count {
        let raw = names.get(l).map(|n| n.trim().to_string()).unwrap_or_default();
        layers.push(Layer {
            dir_name: layer_dir_name(l, Some(&raw)),
            name: raw,
            active: l >= names.len() || mlvl.area_layer_active(index, l),
            resources: deps.layers.get(l).into_iter().flatten().copied().collect(),
        });
    }

    let mut resources: FxHashSet<ResourceId> = deps.area.iter().copied().collect();
    resources.insert(level_area.mrea_id);
    if let Some(mapa) = mapa.filter(|m| m.is_valid()) {
        resources.insert(mapa);
    }

    Ok(Area {
        mrea_id: level_area.mrea_id,
        name_id: level_area.name_id,
        name,
        transform: level_area.transform,
        path_id,
        layers,
        resources,
    })
}

/// Dependencies of an area whose MREA lives elsewhere: all dependency
/// layers but the last are script layers.
fn level_only_deps(level_area: &MlvlArea, generation: Generation) -> LayerDeps {
    let count = level_area.dep_layer_offsets.len();
    let mut deps = LayerDeps::default();
    if generation == Generation::Mp3 {
        return deps;
    }
    for i in 0..count {
        let ids = level_area.layer_dependencies(i).iter().map(|d| d.id);
        if i + 1 < count {
            deps.layers.push(ids.collect());
        } else {
            deps.area.extend(ids);
        }
    }
    deps
}

/// Sorted, case-insensitively deduplicated world names, comma-joined.
pub fn level_string(levels: &[Level]) -> String {
    let mut names: Vec<&str> = levels.iter().filter_map(|l| l.world_name.as_deref()).collect();
    names.sort_by_key(|n| n.to_lowercase());
    names.dedup_by(|a, b| a.eq_ignore_ascii_case(*b));
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_pak::{Dependency, PakBuilder, Strg};

    fn id(v: u32) -> ResourceId {
        ResourceId::new32(v)
    }

    fn dep(v: u32) -> Dependency {
        Dependency {
            id: id(v),
            kind: FourCC::new(b"TXTR"),
        }
    }

    fn archive_with_level() -> PakArchive {
        let mut mlvl = Mlvl::new(Generation::Mp1);
        mlvl.world_name_id = id(0x100);
        mlvl.world_map_id = id(0x200);

        let mut area = MlvlArea::new(id(0x101), id(0x1000), id(0));
        area.set_layer_dependencies(&[vec![dep(0x10)], vec![dep(0x11)], vec![dep(0x12)]]);
        mlvl.push_area(area, &[("Default", true), ("Boss/Fight", false)]);

        let mut unnamed = MlvlArea::new(id(0x999), id(0x2000), id(1));
        unnamed.set_layer_dependencies(&[vec![]]);
        mlvl.push_area(unnamed, &[]);

        let mut builder = PakBuilder::new(Generation::Mp1);
        builder
            .add_named(id(0x50), FourCC::new(b"MLVL"), "IntroWorld", mlvl.write())
            .add(id(0x100), FourCC::new(b"STRG"), Strg::single("Space Pirate Frigate").write())
            .add(id(0x101), FourCC::new(b"STRG"), Strg::single("  Exterior Docking Hangar ").write())
            .add(id(0x200), FourCC::new(b"MAPW"), chozo_pak::write_mapw(&[id(0x300), id(0x301)]));
        PakArchive::from_bytes("Metroid1.pak", builder.build().unwrap(), Generation::Mp1).unwrap()
    }

    #[test]
    fn test_area_dir_names() {
        assert_eq!(area_dir_name(3, Some(" Hall "), None, id(1)), "03 Hall");
        assert_eq!(area_dir_name(0, Some(""), Some("int"), id(1)), "00 int");
        assert_eq!(area_dir_name(12, None, None, id(0xAB)), "12 MREA_000000AB");
    }

    #[test]
    fn test_build_levels_from_level_lists() {
        let archive = archive_with_level();
        let levels = build_levels(&archive).unwrap();
        assert_eq!(levels.len(), 1);

        let level = &levels[0];
        assert_eq!(level.name, "IntroWorld_00000050");
        assert_eq!(level.world_name.as_deref(), Some("Space Pirate Frigate"));
        assert!(level.resources.contains(&id(0x200)));

        let area = &level.areas[0];
        assert_eq!(area.name, "00 Exterior Docking Hangar");
        assert_eq!(area.layers.len(), 2);
        assert_eq!(area.layers[0].dir_name, "00 Default");
        assert!(area.layers[0].active);
        assert_eq!(area.layers[1].dir_name, "01 Boss-Fight");
        assert!(!area.layers[1].active);
        assert!(area.layers[0].resources.contains(&id(0x10)));
        assert!(area.layers[1].resources.contains(&id(0x11)));
        assert!(area.resources.contains(&id(0x12)));
        assert!(area.resources.contains(&id(0x1000)));
        assert!(area.resources.contains(&id(0x300)));
        assert_eq!(area.path_id, None);

        let unnamed = &level.areas[1];
        assert_eq!(unnamed.name, "01 MREA_00002000");
        assert!(unnamed.layers.is_empty());
        assert!(unnamed.resources.contains(&id(0x301)));
        assert_eq!(level.area(id(0x2000)).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_level_string() {
        let archive = archive_with_level();
        let mut levels = build_levels(&archive).unwrap();
        let mut twin = levels[0].clone();
        twin.world_name = Some("SPACE PIRATE FRIGATE".to_string());
        levels.push(twin);
        let mut other = levels[0].clone();
        other.world_name = Some("Chozo Ruins".to_string());
        levels.push(other);
        assert_eq!(level_string(&levels), "Chozo Ruins, Space Pirate Frigate");
    }
}
