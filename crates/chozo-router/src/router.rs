//! Resource router.
//!
//! The router owns every archive of a release. [`PakRouter::build`] indexes
//! the levels of each archive, classifies each entry against them and
//! splits ids into unique and shared sets; after that the router is
//! read-only and lookups from any number of workers need no locking.
//!
//! Paths follow one scheme:
//!
//! ```text
//! <working>/<archive>/<level>/<area>/<layer>/<name>.<ext>   unique
//! <working>/Shared/<name>.<ext>                             shared
//! ```
//!
//! with the same layout under the cooked root.

use std::path::{Path, PathBuf};

use chozo_common::{FourCC, Generation, ResourceId};
use chozo_pak::{Character, PakArchive, PakEntry};
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace, warn};

use crate::level::{build_levels, level_string, Area, Level};
use crate::unique::{UniqueKind, UniqueResult};
use crate::{Error, Result};

const CHAR: FourCC = FourCC::new(b"CHAR");

/// Directory name shared resources are routed to.
pub const SHARED_DIR: &str = "Shared";

/// Column-major 4x4 matrix.
pub type Matrix4 = [[f32; 4]; 4];

/// Roots of the working and cooked trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterPaths {
    pub working: PathBuf,
    pub cooked: PathBuf,
}

impl RouterPaths {
    pub fn new(working: impl Into<PathBuf>, cooked: impl Into<PathBuf>) -> Self {
        Self {
            working: working.into(),
            cooked: cooked.into(),
        }
    }
}

/// The archive a worker is currently extracting.
///
/// Lookups given a scope prefer that archive's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterScope {
    index: usize,
}

impl RouterScope {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// An entry together with the archive holding it.
#[derive(Debug, Clone, Copy)]
pub struct RoutedEntry<'a> {
    pub entry: &'a PakEntry,
    pub archive: &'a PakArchive,
    pub archive_index: usize,
}

/// Skin and skeleton bound to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigPair {
    pub cskr: ResourceId,
    pub cinf: ResourceId,
}

/// An overlay model attached to a character's skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentRig {
    pub name: FourCC,
    pub cmdl: ResourceId,
    pub cskr: ResourceId,
    pub cinf: ResourceId,
}

struct Bridge {
    archive: PakArchive,
    levels: Vec<Level>,
    unique: FxHashMap<ResourceId, UniqueResult>,
    working: PathBuf,
    cooked: PathBuf,
    level_string: String,
}

/// Extension of a resource's working file.
pub fn working_extension(kind: FourCC) -> String {
    match &kind.0 {
        b"MREA" | b"MLVL" | b"CMDL" | b"CINF" | b"MAPA" | b"PATH" => ".scene.json".to_string(),
        b"STRG" | b"SAVW" | b"HINT" | b"CAUD" | b"FONT" | b"DGRP" | b"FSM2" | b"CHAR" => {
            ".json".to_string()
        }
        b"TXTR" => ".png".to_string(),
        _ => cooked_extension(kind),
    }
}

/// Extension of a resource's cooked file: the lower-case type code.
pub fn cooked_extension(kind: FourCC) -> String {
    format!(".{}", kind.to_string().to_ascii_lowercase())
}

/// Routes resource ids to archive entries and output paths.
pub struct PakRouter {
    paths: RouterPaths,
    generation: Generation,
    bridges: Vec<Bridge>,
    unique_entries: FxHashMap<ResourceId, usize>,
    shared_entries: FxHashMap<ResourceId, usize>,
    overrides: FxHashMap<ResourceId, PathBuf>,
    rig_pairs: FxHashMap<ResourceId, RigPair>,
    attachments: FxHashMap<ResourceId, Vec<AttachmentRig>>,
    mapa_transforms: FxHashMap<ResourceId, Matrix4>,
}

impl PakRouter {
    /// Index `archives` and classify every entry.
    ///
    /// `progress` receives the completed fraction once per archive.
    pub fn build(
        archives: Vec<PakArchive>,
        paths: RouterPaths,
        mut progress: impl FnMut(f32),
    ) -> Result<Self> {
        let generation = archives
            .first()
            .map_or(Generation::Mp1, PakArchive::generation);
        if let Some(odd) = archives.iter().find(|a| a.generation() != generation) {
            return Err(Error::GenerationMismatch {
                archive: odd.name().to_string(),
                expected: generation,
                actual: odd.generation(),
            });
        }

        let mut router = Self {
            paths,
            generation,
            bridges: Vec::with_capacity(archives.len()),
            unique_entries: FxHashMap::default(),
            shared_entries: FxHashMap::default(),
            overrides: FxHashMap::default(),
            rig_pairs: FxHashMap::default(),
            attachments: FxHashMap::default(),
            mapa_transforms: FxHashMap::default(),
        };

        let total = archives.len();
        for (index, archive) in archives.into_iter().enumerate() {
            let bridge = router.index_archive(archive)?;
            router.register_entries(index, &bridge.archive);
            router.bridges.push(bridge);
            progress((index + 1) as f32 / total as f32);
        }

        for index in 0..router.bridges.len() {
            router.add_rig_pairs(index)?;
            router.add_level_paths(index);
        }

        info!(
            archives = router.bridges.len(),
            unique = router.unique_entries.len(),
            shared = router.shared_entries.len(),
            "built resource router"
        );
        Ok(router)
    }

    fn index_archive(&self, archive: PakArchive) -> Result<Bridge> {
        let levels = build_levels(&archive)?;
        let mut unique = FxHashMap::default();
        let mut not_found = 0usize;
        for entry in archive.entries() {
            let result = UniqueResult::classify(&levels, entry.id());
            if result.kind == UniqueKind::NotFound {
                trace!(archive = %archive.name(), id = %entry.id(), kind = %entry.kind(), "not referenced by any level");
                not_found += 1;
            }
            unique.insert(entry.id(), result);
        }
        if not_found > 0 && !levels.is_empty() {
            warn!(
                archive = %archive.name(),
                count = not_found,
                "entries not referenced by any level; routing to the archive root"
            );
        }

        let base = archive.base_name().to_string();
        Ok(Bridge {
            working: self.paths.working.join(&base),
            cooked: self.paths.cooked.join(&base),
            level_string: level_string(&levels),
            levels,
            unique,
            archive,
        })
    }

    fn register_entries(&mut self, index: usize, archive: &PakArchive) {
        for entry in archive.entries() {
            let id = entry.id();
            if archive.is_no_share() {
                self.unique_entries.insert(id, index);
                continue;
            }
            if self.shared_entries.contains_key(&id) {
                continue;
            }
            if self.unique_entries.remove(&id).is_some() {
                self.shared_entries.insert(id, index);
            } else {
                self.unique_entries.insert(id, index);
            }
        }
        debug!(archive = %archive.name(), no_share = archive.is_no_share(), "registered entries");
    }

    fn add_rig_pairs(&mut self, index: usize) -> Result<()> {
        let archive = &self.bridges[index].archive;
        let width = archive.generation().id_width();
        for entry in archive.entries_of_kind(CHAR) {
            let character = Character::read(&archive.read_entry(entry)?, width)?;
            for (cmdl, cskr) in character.rig_pairs() {
                self.rig_pairs.insert(
                    cmdl,
                    RigPair {
                        cskr,
                        cinf: character.cinf,
                    },
                );
            }
            let rigs = character
                .overlays
                .iter()
                .map(|o| AttachmentRig {
                    name: o.kind,
                    cmdl: o.cmdl,
                    cskr: o.cskr,
                    cinf: character.cinf,
                })
                .collect();
            self.attachments.insert(entry.id(), rigs);
        }
        Ok(())
    }

    /// Name-string overrides, path-graph files and MAPA transforms.
    fn add_level_paths(&mut self, index: usize) {
        let bridge = &self.bridges[index];
        for level in &bridge.levels {
            let level_dir = bridge.working.join(&level.name);
            if level.world_name_id.is_valid() {
                self.overrides.insert(
                    level.world_name_id,
                    level_dir.join(format!("!name_{}.json", level.world_name_id)),
                );
            }
            for (ai, area) in level.areas.iter().enumerate() {
                let area_dir = level_dir.join(&area.name);
                let matrix = area.transform.to_matrix4_transposed();
                if area.name_id.is_valid() {
                    self.overrides
                        .insert(area.name_id, area_dir.join(format!("!name_{}.json", area.name_id)));
                }
                if let Some(path_id) = area.path_id {
                    self.overrides
                        .insert(path_id, area_dir.join(format!("!path_{}.path", path_id)));
                    self.mapa_transforms.insert(path_id, matrix);
                }
                if let Some(mapa) = level.mapas.get(ai).filter(|m| m.is_valid()) {
                    self.mapa_transforms.insert(*mapa, matrix);
                }
            }
        }
    }

    pub fn paths(&self) -> &RouterPaths {
        &self.paths
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn archive_count(&self) -> usize {
        self.bridges.len()
    }

    pub fn archive(&self, index: usize) -> Option<&PakArchive> {
        self.bridges.get(index).map(|b| &b.archive)
    }

    /// Level tree of archive `index`.
    pub fn levels(&self, index: usize) -> &[Level] {
        self.bridges.get(index).map_or(&[][..], |b| b.levels.as_slice())
    }

    /// World names of archive `index`.
    pub fn level_string(&self, index: usize) -> &str {
        self.bridges.get(index).map_or("", |b| b.level_string.as_str())
    }

    /// Classification of `id` within archive `index`.
    pub fn unique_result(&self, index: usize, id: ResourceId) -> Option<UniqueResult> {
        self.bridges.get(index)?.unique.get(&id).copied()
    }

    /// Whether `id` is routed to the shared directory.
    pub fn is_shared(&self, id: ResourceId) -> bool {
        self.shared_entries.contains_key(&id)
    }

    /// Select archive `index` as the current archive.
    pub fn enter_archive(&self, index: usize) -> Option<RouterScope> {
        (index < self.bridges.len()).then_some(RouterScope { index })
    }

    /// Select the archive with file name `name` (case-insensitive).
    pub fn enter_archive_named(&self, name: &str) -> Option<RouterScope> {
        self.bridges
            .iter()
            .position(|b| b.archive.name().eq_ignore_ascii_case(name))
            .map(|index| RouterScope { index })
    }

    /// Resolve `id` to its entry.
    ///
    /// With `current_only`, only the scope's archive is searched; otherwise
    /// the scope's archive comes first, then every archive in order.
    /// Invalid ids resolve to nothing without a warning.
    pub fn lookup_entry(
        &self,
        id: ResourceId,
        scope: Option<&RouterScope>,
        silence_warnings: bool,
        current_only: bool,
    ) -> Option<RoutedEntry<'_>> {
        if !id.is_valid() {
            return None;
        }
        let current = scope.and_then(|s| self.routed_in(s.index, id));
        let found = if current_only {
            if scope.is_none() && !silence_warnings {
                warn!(id = %id, "current-archive lookup without an entered archive");
            }
            current
        } else {
            current.or_else(|| (0..self.bridges.len()).find_map(|i| self.routed_in(i, id)))
        };
        if found.is_none() && !silence_warnings {
            warn!(id = %id, "unable to find entry");
        }
        found
    }

    /// Like [`lookup_entry`](Self::lookup_entry) but absence is an error.
    pub fn lookup_entry_required(
        &self,
        id: ResourceId,
        scope: Option<&RouterScope>,
    ) -> Result<RoutedEntry<'_>> {
        self.lookup_entry(id, scope, true, false)
            .ok_or(Error::MissingResource { id })
    }

    fn routed_in(&self, index: usize, id: ResourceId) -> Option<RoutedEntry<'_>> {
        let bridge = self.bridges.get(index)?;
        bridge.archive.lookup(id).map(|entry| RoutedEntry {
            entry,
            archive: &bridge.archive,
            archive_index: index,
        })
    }

    /// Archive whose directory owns `id`, and whether it is shared.
    fn owner(&self, id: ResourceId, scope: Option<&RouterScope>) -> Option<(usize, bool)> {
        if let Some(scope) = scope {
            let bridge = self.bridges.get(scope.index)?;
            if bridge.archive.is_no_share() && bridge.archive.lookup(id).is_some() {
                return Some((scope.index, false));
            }
        }
        if let Some(&index) = self.unique_entries.get(&id) {
            return Some((index, false));
        }
        self.shared_entries.get(&id).map(|&index| (index, true))
    }

    /// `<name>_<id>` or `<TYPE>_<id>` for the routed entry.
    pub fn best_entry_name(&self, id: ResourceId, scope: Option<&RouterScope>) -> Option<String> {
        let (index, _) = self.owner(id, scope)?;
        self.bridges[index].archive.lookup(id).map(PakEntry::best_name)
    }

    fn routed_path(&self, id: ResourceId, scope: Option<&RouterScope>, cooked: bool) -> Option<PathBuf> {
        let (index, shared) = self.owner(id, scope)?;
        let bridge = &self.bridges[index];
        let entry = bridge.archive.lookup(id)?;
        let ext = if cooked {
            cooked_extension(entry.kind())
        } else {
            working_extension(entry.kind())
        };
        let file = format!("{}{}", entry.best_name(), ext);

        if shared {
            let root = if cooked { &self.paths.cooked } else { &self.paths.working };
            return Some(root.join(SHARED_DIR).join(file));
        }
        let pak_dir = if cooked { &bridge.cooked } else { &bridge.working };
        let result = bridge
            .unique
            .get(&id)
            .copied()
            .unwrap_or(UniqueResult::NOT_FOUND);
        Some(result.unique_dir(pak_dir, &bridge.levels).join(file))
    }

    /// Working (editable) path of `id`. Overrides win over routed paths.
    pub fn get_working(
        &self,
        id: ResourceId,
        scope: Option<&RouterScope>,
        silence_warnings: bool,
    ) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(&id) {
            return Some(path.clone());
        }
        let path = self.routed_path(id, scope, false);
        if path.is_none() && !silence_warnings && id.is_valid() {
            warn!(id = %id, "no working path");
        }
        path
    }

    /// Cooked (binary) path of `id`.
    pub fn get_cooked(
        &self,
        id: ResourceId,
        scope: Option<&RouterScope>,
        silence_warnings: bool,
    ) -> Option<PathBuf> {
        let path = self.routed_path(id, scope, true);
        if path.is_none() && !silence_warnings && id.is_valid() {
            warn!(id = %id, "no cooked path");
        }
        path
    }

    pub fn get_working_required(&self, id: ResourceId, scope: Option<&RouterScope>) -> Result<PathBuf> {
        self.get_working(id, scope, true)
            .ok_or(Error::MissingResource { id })
    }

    pub fn get_cooked_required(&self, id: ResourceId, scope: Option<&RouterScope>) -> Result<PathBuf> {
        self.get_cooked(id, scope, true)
            .ok_or(Error::MissingResource { id })
    }

    /// Override path registered for `id`, if any.
    pub fn override_path(&self, id: ResourceId) -> Option<&Path> {
        self.overrides.get(&id).map(PathBuf::as_path)
    }

    /// Level and area owning the MREA `mrea_id`, preferring the scope's archive.
    pub fn find_area(
        &self,
        mrea_id: ResourceId,
        scope: Option<&RouterScope>,
    ) -> Option<(usize, &Level, &Area)> {
        let order = scope
            .map(|s| s.index)
            .into_iter()
            .chain((0..self.bridges.len()).filter(move |&i| Some(i) != scope.map(|s| s.index)));
        for index in order {
            let Some(bridge) = self.bridges.get(index) else {
                continue;
            };
            for level in &bridge.levels {
                if let Some((_, area)) = level.area(mrea_id) {
                    return Some((index, level, area));
                }
            }
        }
        None
    }

    /// Working directory of one script layer of an area, and whether the
    /// layer is active by default.
    pub fn get_area_layer_working(
        &self,
        area_id: ResourceId,
        layer: usize,
        scope: Option<&RouterScope>,
    ) -> Option<(PathBuf, bool)> {
        let (index, level, area) = self.find_area(area_id, scope)?;
        let layer = area.layers.get(layer)?;
        let area_dir = match self.get_working(area_id, scope, true) {
            Some(scene) => scene.parent()?.to_path_buf(),
            None => self.bridges[index].working.join(&level.name).join(&area.name),
        };
        Some((area_dir.join(&layer.dir_name), layer.active))
    }

    /// Skin and skeleton of a character model.
    pub fn lookup_cmdl_rig_pair(&self, cmdl: ResourceId) -> Option<RigPair> {
        self.rig_pairs.get(&cmdl).copied()
    }

    /// Overlay models of a character.
    pub fn lookup_character_attachment_rigs(&self, character: ResourceId) -> &[AttachmentRig] {
        self.attachments.get(&character).map_or(&[][..], Vec::as_slice)
    }

    /// World transform of a MAPA or path graph.
    pub fn lookup_mapa_transform(&self, id: ResourceId) -> Option<&Matrix4> {
        self.mapa_transforms.get(&id)
    }

    /// Whether the MREA `id` follows a duplicated entry in its archive.
    pub fn mrea_has_dupe_resources(&self, id: ResourceId, scope: Option<&RouterScope>) -> bool {
        self.lookup_entry(id, scope, true, false)
            .is_some_and(|r| r.archive.mrea_has_dupe_resources(id))
    }

    /// Every entry of every archive, in archive then table order.
    pub fn enumerate_resources(&self) -> impl Iterator<Item = RoutedEntry<'_>> + '_ {
        self.bridges.iter().enumerate().flat_map(|(index, bridge)| {
            bridge.archive.entries().iter().map(move |entry| RoutedEntry {
                entry,
                archive: &bridge.archive,
                archive_index: index,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_pak::{CharacterOverlay, Dependency, Mlvl, MlvlArea, PakBuilder, Strg};

    fn id(v: u32) -> ResourceId {
        ResourceId::new32(v)
    }

    fn deps(ids: &[u32]) -> Vec<Dependency> {
        ids.iter()
            .map(|&v| Dependency {
                id: id(v),
                kind: FourCC::new(b"TXTR"),
            })
            .collect()
    }

    const T: u32 = 0x7E;
    const U: u32 = 0x7F;
    const X: u32 = 0xA000;
    const Y: u32 = 0xB000;

    /// Archive holding one level with one area whose script layer uses
    /// `layer` and whose own list uses `own`.
    fn single_area_pak(
        name: &str,
        mlvl_id: u32,
        mrea_id: u32,
        layer: &[u32],
        own: &[u32],
        extra: &[(u32, &[u8; 4], Vec<u8>)],
    ) -> PakArchive {
        let mut mlvl = Mlvl::new(Generation::Mp1);
        mlvl.world_name_id = id(mlvl_id + 1);
        mlvl.world_map_id = id(mlvl_id + 2);
        let mut area = MlvlArea::new(id(mlvl_id + 3), id(mrea_id), id(0));
        area.transform.rows[0][3] = 100.0;
        area.set_layer_dependencies(&[deps(layer), deps(own)]);
        mlvl.push_area(area, &[("Default", true)]);

        let mut builder = PakBuilder::new(Generation::Mp1);
        builder
            .add_named(id(mlvl_id), FourCC::new(b"MLVL"), name, mlvl.write())
            .add(id(mlvl_id + 1), FourCC::new(b"STRG"), Strg::single(name).write())
            .add(
                id(mlvl_id + 2),
                FourCC::new(b"MAPW"),
                chozo_pak::write_mapw(&[id(mlvl_id + 4)]),
            );
        for (v, kind, data) in extra {
            builder.add(id(*v), FourCC::new(kind), data.clone());
        }
        let bytes = builder.build().unwrap();
        PakArchive::from_bytes(format!("{}.pak", name), bytes, Generation::Mp1).unwrap()
    }

    fn two_archive_release() -> PakRouter {
        let a = single_area_pak(
            "Metroid1",
            0x100,
            X,
            &[T],
            &[U],
            &[(T, b"TXTR", vec![1; 8]), (U, b"TXTR", vec![2; 8])],
        );
        let b = single_area_pak("Metroid2", 0x200, Y, &[T], &[], &[(T, b"TXTR", vec![1; 8])]);
        PakRouter::build(vec![a, b], RouterPaths::new("/w", "/c"), |_| {}).unwrap()
    }

    #[test]
    fn test_shared_and_unique_across_archives() {
        let router = two_archive_release();

        assert!(router.is_shared(id(T)));
        assert!(!router.is_shared(id(U)));
        assert_eq!(
            router.get_working(id(T), None, false).unwrap(),
            PathBuf::from("/w/Shared/TXTR_0000007E.png")
        );
        assert_eq!(
            router.get_cooked(id(T), None, false).unwrap(),
            PathBuf::from("/c/Shared/TXTR_0000007E.txtr")
        );

        let u = router.unique_result(0, id(U)).unwrap();
        assert_eq!(u.kind, UniqueKind::Area);
        let (_, _, area) = router.find_area(id(X), None).unwrap();
        assert_eq!(router.levels(0)[0].areas[u.area.unwrap()].mrea_id, area.mrea_id);
        assert_eq!(
            router.get_working(id(U), None, false).unwrap(),
            PathBuf::from("/w/Metroid1/Metroid1_00000100/00 MREA_0000A000/TXTR_0000007F.png")
        );
        assert_eq!(
            router.get_cooked(id(U), None, false).unwrap(),
            PathBuf::from("/c/Metroid1/Metroid1_00000100/00 MREA_0000A000/TXTR_0000007F.txtr")
        );
    }

    #[test]
    fn test_lookup_entry() {
        let router = two_archive_release();
        let scope = router.enter_archive(1).unwrap();

        let t = router.lookup_entry(id(T), Some(&scope), false, false).unwrap();
        assert_eq!(t.archive_index, 1);
        let t = router.lookup_entry(id(T), None, false, false).unwrap();
        assert_eq!(t.archive_index, 0);

        assert!(router.lookup_entry(id(U), Some(&scope), true, true).is_none());
        assert_eq!(router.lookup_entry(id(U), Some(&scope), true, false).unwrap().archive_index, 0);

        assert!(router.lookup_entry(id(0xDEAD), None, true, false).is_none());
        assert!(router.lookup_entry(ResourceId::new32(0xFFFF_FFFF), None, false, false).is_none());
        let err = router.lookup_entry_required(id(0xDEAD), None).unwrap_err();
        assert_eq!(err.kind(), chozo_common::ErrorKind::Missing);

        let all: Vec<_> = router.enumerate_resources().map(|r| r.entry.id()).collect();
        assert_eq!(all.len(), router.archive(0).unwrap().entry_count() + router.archive(1).unwrap().entry_count());
        assert!(all.contains(&id(U)));
    }

    #[test]
    fn test_no_share_archive_keeps_its_copy() {
        let a = single_area_pak("Metroid1", 0x100, X, &[T], &[], &[(T, b"TXTR", vec![1; 8])]);
        let mut b = single_area_pak("Metroid2", 0x200, Y, &[T], &[], &[(T, b"TXTR", vec![1; 8])]);
        b.set_no_share(true);
        let router = PakRouter::build(vec![a, b], RouterPaths::new("/w", "/c"), |_| {}).unwrap();

        assert!(!router.is_shared(id(T)));
        let scope = router.enter_archive_named("metroid2.PAK").unwrap();
        assert_eq!(
            router.get_working(id(T), Some(&scope), false).unwrap(),
            PathBuf::from("/w/Metroid2/Metroid2_00000200/00 MREA_0000B000/00 Default/TXTR_0000007E.png")
        );
    }

    #[test]
    fn test_overrides_and_transforms() {
        let router = two_archive_release();

        assert_eq!(
            router.get_working(id(0x101), None, false).unwrap(),
            PathBuf::from("/w/Metroid1/Metroid1_00000100/!name_00000101.json")
        );
        assert_eq!(
            router.override_path(id(0x103)).unwrap(),
            Path::new("/w/Metroid1/Metroid1_00000100/00 MREA_0000A000/!name_00000103.json")
        );
        // Overrides affect working paths only.
        assert_eq!(
            router.get_cooked(id(0x101), None, false).unwrap(),
            PathBuf::from("/c/Metroid1/STRG_00000101.strg")
        );

        let m = router.lookup_mapa_transform(id(0x104)).unwrap();
        assert_eq!(m[3][0], 100.0);
        assert_eq!(m[3][3], 1.0);
        assert!(router.lookup_mapa_transform(id(0x204)).is_some());
        assert!(router.lookup_mapa_transform(id(0x999)).is_none());
        assert_eq!(router.level_string(0), "Metroid1");
    }

    #[test]
    fn test_area_layer_working() {
        let router = two_archive_release();
        let (dir, active) = router.get_area_layer_working(id(X), 0, None).unwrap();
        assert_eq!(dir, PathBuf::from("/w/Metroid1/Metroid1_00000100/00 MREA_0000A000/00 Default"));
        assert!(active);
        assert!(router.get_area_layer_working(id(X), 1, None).is_none());
        assert!(router.get_area_layer_working(id(0x5555), 0, None).is_none());
    }

    #[test]
    fn test_character_rigs() {
        let character = Character {
            name: "Samus".to_string(),
            cmdl: id(0x10),
            cskr: id(0x11),
            overlays: vec![CharacterOverlay {
                kind: FourCC::new(b"ATTC"),
                cmdl: id(0x12),
                cskr: id(0x13),
            }],
            cinf: id(0x14),
        };
        let a = single_area_pak("Metroid1", 0x100, X, &[], &[], &[(0x40, b"CHAR", character.write())]);
        let router = PakRouter::build(vec![a], RouterPaths::new("/w", "/c"), |_| {}).unwrap();

        assert_eq!(
            router.lookup_cmdl_rig_pair(id(0x12)),
            Some(RigPair {
                cskr: id(0x13),
                cinf: id(0x14)
            })
        );
        assert_eq!(router.lookup_cmdl_rig_pair(id(0x10)).unwrap().cskr, id(0x11));
        let rigs = router.lookup_character_attachment_rigs(id(0x40));
        assert_eq!(rigs.len(), 1);
        assert_eq!(rigs[0].name, FourCC::new(b"ATTC"));
        assert!(router.lookup_character_attachment_rigs(id(0x41)).is_empty());
    }

    #[test]
    fn test_generation_mismatch_rejected() {
        let a = single_area_pak("Metroid1", 0x100, X, &[], &[], &[]);
        let b = PakArchive::from_bytes(
            "Metroid4.pak",
            PakBuilder::new(Generation::Mp2).build().unwrap(),
            Generation::Mp2,
        )
        .unwrap();
        let err = PakRouter::build(vec![a, b], RouterPaths::new("/w", "/c"), |_| {})
            .err()
            .unwrap();
        assert!(matches!(err, Error::GenerationMismatch { .. }));
    }

    #[test]
    fn test_progress_reported_per_archive() {
        let a = single_area_pak("Metroid1", 0x100, X, &[], &[], &[]);
        let b = single_area_pak("Metroid2", 0x200, Y, &[], &[], &[]);
        let mut seen = Vec::new();
        PakRouter::build(vec![a, b], RouterPaths::new("/w", "/c"), |p| seen.push(p)).unwrap();
        assert_eq!(seen, vec![0.5, 1.0]);
    }

    #[test]
    fn test_extension_tables() {
        assert_eq!(working_extension(FourCC::new(b"MREA")), ".scene.json");
        assert_eq!(working_extension(FourCC::new(b"STRG")), ".json");
        assert_eq!(working_extension(FourCC::new(b"TXTR")), ".png");
        assert_eq!(working_extension(FourCC::new(b"CHAR")), ".json");
        assert_eq!(working_extension(FourCC::new(b"AGSC")), ".agsc");
        assert_eq!(cooked_extension(FourCC::new(b"MREA")), ".mrea");
    }
}
