//! MLVL level chunks.
//!
//! A level lists its areas (MREA id, world transform, bounds, docks), the
//! per-area layer names and default-active bitmasks, and for Mp1/Mp2 the
//! per-layer resource dependency lists.

use chozo_common::math::{Aabb, Transform, Vec3};
use chozo_common::{
    BinaryWriter, EntryReadStream, FourCC, Generation, ReadStream, ResourceId,
};

use crate::{Error, Result};

pub const MLVL_MAGIC: u32 = 0xDEAF_BABE;

/// Script relay connection (Mp1 only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRelay {
    pub relay_id: u32,
    pub target_id: u32,
    pub message: u16,
    pub active: bool,
}

/// A resource dependency with its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub id: ResourceId,
    pub kind: FourCC,
}

/// One dock between two areas.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dock {
    /// `(area index, dock index)` pairs this dock connects to.
    pub connections: Vec<(u32, u32)>,
    pub plane_verts: Vec<Vec3>,
}

/// One area of the level.
#[derive(Debug, Clone, PartialEq)]
pub struct MlvlArea {
    pub name_id: ResourceId,
    pub transform: Transform,
    pub aabb: Aabb,
    pub mrea_id: ResourceId,
    pub area_id: ResourceId,
    pub attached_areas: Vec<u16>,
    /// Mp1/Mp2 dependency list, partitioned by `dep_layer_offsets`.
    pub dependencies: Vec<Dependency>,
    pub dep_layer_offsets: Vec<u32>,
    pub docks: Vec<Dock>,
    /// Mp2/Mp3 internal area name.
    pub internal_name: Option<String>,
}

/// Layer count and default-active bitmask of one area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerFlags {
    pub layer_count: u32,
    pub flags: u64,
}

/// Audio group reference (Mp1/Mp2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioGroup {
    pub group_id: u32,
    pub agsc_id: ResourceId,
}

/// A decoded level.
#[derive(Debug, Clone, PartialEq)]
pub struct Mlvl {
    pub generation: Generation,
    pub world_name_id: ResourceId,
    pub dark_world_name_id: Option<ResourceId>,
    pub temple_key_world_index: Option<u32>,
    pub save_world_id: ResourceId,
    pub skybox_id: ResourceId,
    pub relays: Vec<MemRelay>,
    pub areas: Vec<MlvlArea>,
    pub world_map_id: ResourceId,
    pub unknown_byte: u8,
    pub unknown_word: u32,
    pub audio_groups: Vec<AudioGroup>,
    pub unknown_string: String,
    pub layer_flags: Vec<LayerFlags>,
    pub layer_names: Vec<String>,
    pub layer_name_offsets: Vec<u32>,
}

impl Mlvl {
    /// An empty level for `generation`.
    pub fn new(generation: Generation) -> Self {
        let none = ResourceId::invalid(generation.id_width());
        Self {
            generation,
            world_name_id: none,
            dark_world_name_id: (generation == Generation::Mp2).then_some(none),
            temple_key_world_index: (generation == Generation::Mp2).then_some(0),
            save_world_id: none,
            skybox_id: none,
            relays: Vec::new(),
            areas: Vec::new(),
            world_map_id: none,
            unknown_byte: 0,
            unknown_word: 0,
            audio_groups: Vec::new(),
            unknown_string: String::new(),
            layer_flags: Vec::new(),
            layer_names: Vec::new(),
            layer_name_offsets: Vec::new(),
        }
    }

    /// Decode an MLVL payload.
    pub fn read(data: &[u8], generation: Generation) -> Result<Self> {
        let mut r = EntryReadStream::from_vec(data.to_vec())?;
        Self::read_from(&mut r, generation)
    }

    pub fn read_from<R: ReadStream>(r: &mut R, generation: Generation) -> Result<Self> {
        let magic = r.read_u32()?;
        if magic != MLVL_MAGIC {
            return Err(Error::InvalidMagic {
                what: "MLVL",
                expected: MLVL_MAGIC,
                actual: magic,
            });
        }
        let version = r.read_u32()?;
        if version != generation.mlvl_version() {
            return Err(Error::UnsupportedVersion {
                what: "MLVL",
                version,
            });
        }

        let width = generation.id_width();
        let mut mlvl = Self::new(generation);
        mlvl.world_name_id = r.read_id(width)?;
        if generation == Generation::Mp2 {
            mlvl.dark_world_name_id = Some(r.read_id(width)?);
            mlvl.temple_key_world_index = Some(r.read_u32()?);
        }
        mlvl.save_world_id = r.read_id(width)?;
        mlvl.skybox_id = r.read_id(width)?;

        if generation == Generation::Mp1 {
            let count = r.read_u32()?;
            for _ in 0..count {
                mlvl.relays.push(MemRelay {
                    relay_id: r.read_u32()?,
                    target_id: r.read_u32()?,
                    message: r.read_u16()?,
                    active: r.read_bool()?,
                });
            }
        }

        let area_count = r.read_u32()?;
        let _unknown = r.read_u32()?;
        for _ in 0..area_count {
            mlvl.areas.push(read_area(r, generation)?);
        }

        mlvl.world_map_id = r.read_id(width)?;
        mlvl.unknown_byte = r.read_u8()?;
        mlvl.unknown_word = r.read_u32()?;

        if generation != Generation::Mp3 {
            let count = r.read_u32()?;
            for _ in 0..count {
                mlvl.audio_groups.push(AudioGroup {
                    group_id: r.read_u32()?,
                    agsc_id: r.read_id(width)?,
                });
            }
        }

        mlvl.unknown_string = r.read_cstring()?;

        let count = r.read_u32()?;
        for _ in 0..count {
            mlvl.layer_flags.push(LayerFlags {
                layer_count: r.read_u32()?,
                flags: r.read_u64()?,
            });
        }
        let count = r.read_u32()?;
        for _ in 0..count {
            mlvl.layer_names.push(r.read_cstring()?);
        }
        let count = r.read_u32()?;
        for _ in 0..count {
            mlvl.layer_name_offsets.push(r.read_u32()?);
        }

        Ok(mlvl)
    }

    /// Encode the level.
    pub fn write(&self) -> Vec<u8> {
        let g = self.generation;
        let none = ResourceId::invalid(g.id_width());
        let mut w = BinaryWriter::new();
        w.write_u32(MLVL_MAGIC);
        w.write_u32(g.mlvl_version());
        w.write_id(self.world_name_id);
        if g == Generation::Mp2 {
            w.write_id(self.dark_world_name_id.unwrap_or(none));
            w.write_u32(self.temple_key_world_index.unwrap_or(0));
        }
        w.write_id(self.save_world_id);
        w.write_id(self.skybox_id);
        if g == Generation::Mp1 {
            w.write_u32(self.relays.len() as u32);
            for relay in &self.relays {
                w.write_u32(relay.relay_id);
                w.write_u32(relay.target_id);
                w.write_u16(relay.message);
                w.write_bool(relay.active);
            }
        }

        w.write_u32(self.areas.len() as u32);
        w.write_u32(1);
        for area in &self.areas {
            write_area(&mut w, area, g);
        }

        w.write_id(self.world_map_id);
        w.write_u8(self.unknown_byte);
        w.write_u32(self.unknown_word);
        if g != Generation::Mp3 {
            w.write_u32(self.audio_groups.len() as u32);
            for group in &self.audio_groups {
                w.write_u32(group.group_id);
                w.write_id(group.agsc_id);
            }
        }
        w.write_cstring(&self.unknown_string);

        w.write_u32(self.layer_flags.len() as u32);
        for flags in &self.layer_flags {
            w.write_u32(flags.layer_count);
            w.write_u64(flags.flags);
        }
        w.write_u32(self.layer_names.len() as u32);
        for name in &self.layer_names {
            w.write_cstring(name);
        }
        w.write_u32(self.layer_name_offsets.len() as u32);
        for offset in &self.layer_name_offsets {
            w.write_u32(*offset);
        }
        w.into_inner()
    }

    /// Layer names of area `area_idx`.
    pub fn area_layer_names(&self, area_idx: usize) -> &[String] {
        let count = self
            .layer_flags
            .get(area_idx)
            .map_or(0, |f| f.layer_count as usize);
        let start = self
            .layer_name_offsets
            .get(area_idx)
            .map_or(self.layer_names.len(), |&o| o as usize)
            .min(self.layer_names.len());
        let end = (start + count).min(self.layer_names.len());
        &self.layer_names[start..end]
    }

    /// Whether layer `layer_idx` of area `area_idx` is active by default.
    pub fn area_layer_active(&self, area_idx: usize, layer_idx: usize) -> bool {
        self.layer_flags
            .get(area_idx)
            .is_some_and(|f| layer_idx < 64 && (f.flags >> layer_idx) & 1 != 0)
    }

    /// Append an area with its layers, keeping the name table in step.
    pub fn push_area(&mut self, area: MlvlArea, layers: &[(&str, bool)]) {
        let mut flags = 0u64;
        for (i, (_, active)) in layers.iter().enumerate() {
            if *active && i < 64 {
                flags |= 1 << i;
            }
        }
        self.layer_name_offsets.push(self.layer_names.len() as u32);
        self.layer_names.extend(layers.iter().map(|(n, _)| n.to_string()));
        self.layer_flags.push(LayerFlags {
            layer_count: layers.len() as u32,
            flags,
        });
        self.areas.push(area);
    }
}

impl MlvlArea {
    /// An area with identity transform and no dependencies.
    pub fn new(name_id: ResourceId, mrea_id: ResourceId, area_id: ResourceId) -> Self {
        Self {
            name_id,
            transform: Transform::identity(),
            aabb: Aabb::new([0.0; 3], [0.0; 3]),
            mrea_id,
            area_id,
            attached_areas: Vec::new(),
            dependencies: Vec::new(),
            dep_layer_offsets: Vec::new(),
            docks: Vec::new(),
            internal_name: None,
        }
    }

    /// Dependencies of dependency layer `layer`. The last layer holds the
    /// area's own resources.
    pub fn layer_dependencies(&self, layer: usize) -> &[Dependency] {
        let Some(&start) = self.dep_layer_offsets.get(layer) else {
            return &[];
        };
        let end = self
            .dep_layer_offsets
            .get(layer + 1)
            .map_or(self.dependencies.len(), |&e| e as usize);
        let start = (start as usize).min(self.dependencies.len());
        &self.dependencies[start..end.clamp(start, self.dependencies.len())]
    }

    /// Replace the dependency lists with one list per layer.
    pub fn set_layer_dependencies(&mut self, layers: &[Vec<Dependency>]) {
        self.dependencies.clear();
        self.dep_layer_offsets.clear();
        for layer in layers {
            self.dep_layer_offsets.push(self.dependencies.len() as u32);
            self.dependencies.extend_from_slice(layer);
        }
    }
}

fn read_area<R: ReadStream>(r: &mut R, g: Generation) -> Result<MlvlArea> {
    let width = g.id_width();
    let name_id = r.read_id(width)?;
    let transform = Transform::read(r)?;
    let aabb = Aabb::read(r)?;
    let mrea_id = r.read_id(width)?;
    let area_id = r.read_id(width)?;
    let mut area = MlvlArea::new(name_id, mrea_id, area_id);
    area.transform = transform;
    area.aabb = aabb;

    let count = r.read_u32()?;
    for _ in 0..count {
        area.attached_areas.push(r.read_u16()?);
    }

    if g != Generation::Mp3 {
        let _padding = r.read_u32()?;
        let count = r.read_u32()?;
        for _ in 0..count {
            area.dependencies.push(Dependency {
                id: r.read_id(width)?,
                kind: r.read_fourcc()?,
            });
        }
        let count = r.read_u32()?;
        for _ in 0..count {
            area.dep_layer_offsets.push(r.read_u32()?);
        }
    }

    let count = r.read_u32()?;
    for _ in 0..count {
        let mut dock = Dock::default();
        let conns = r.read_u32()?;
        for _ in 0..conns {
            dock.connections.push((r.read_u32()?, r.read_u32()?));
        }
        let verts = r.read_u32()?;
        for _ in 0..verts {
            dock.plane_verts.push(r.read_vec3()?);
        }
        area.docks.push(dock);
    }

    if g != Generation::Mp1 {
        area.internal_name = Some(r.read_cstring()?);
    }
    Ok(area)
}

fn write_area(w: &mut BinaryWriter, area: &MlvlArea, g: Generation) {
    w.write_id(area.name_id);
    for v in area.transform.to_floats() {
        w.write_f32(v);
    }
    w.write_vec3(area.aabb.min);
    w.write_vec3(area.aabb.max);
    w.write_id(area.mrea_id);
    w.write_id(area.area_id);
    w.write_u32(area.attached_areas.len() as u32);
    for a in &area.attached_areas {
        w.write_u16(*a);
    }
    if g != Generation::Mp3 {
        w.write_u32(0);
        w.write_u32(area.dependencies.len() as u32);
        for dep in &area.dependencies {
            w.write_id(dep.id);
            w.write_fourcc(dep.kind);
        }
        w.write_u32(area.dep_layer_offsets.len() as u32);
        for o in &area.dep_layer_offsets {
            w.write_u32(*o);
        }
    }
    w.write_u32(area.docks.len() as u32);
    for dock in &area.docks {
        w.write_u32(dock.connections.len() as u32);
        for (a, d) in &dock.connections {
            w.write_u32(*a);
            w.write_u32(*d);
        }
        w.write_u32(dock.plane_verts.len() as u32);
        for v in &dock.plane_verts {
            w.write_vec3(*v);
        }
    }
    if g != Generation::Mp1 {
        w.write_cstring(area.internal_name.as_deref().unwrap_or(""));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(g: Generation) -> Mlvl {
        let id = |v: u64| ResourceId::new(v, g.id_width());
        let mut mlvl = Mlvl::new(g);
        mlvl.world_name_id = id(0x100);
        let mut area = MlvlArea::new(id(0x200), id(0x300), id(0x400));
        area.transform.rows[0][3] = 12.5;
        area.docks.push(Dock {
            connections: vec![(1, 0)],
            plane_verts: vec![[0.0, 1.0, 2.0]; 4],
        });
        area.set_layer_dependencies(&[
            vec![Dependency {
                id: id(0x500),
                kind: FourCC::new(b"TXTR"),
            }],
            vec![],
            vec![Dependency {
                id: id(0x600),
                kind: FourCC::new(b"CMDL"),
            }],
        ]);
        if g != Generation::Mp1 {
            area.internal_name = Some("00_intro".to_string());
        }
        mlvl.push_area(area, &[("Default", true), ("Cinematic", false)]);
        mlvl
    }

    #[test]
    fn test_rewrite_each_generation() {
        for g in Generation::ALL {
            let mut mlvl = sample(g);
            if g == Generation::Mp3 {
                // Mp3 keeps dependencies in the area itself.
                mlvl.areas[0].set_layer_dependencies(&[]);
            }
            let back = Mlvl::read(&mlvl.write(), g).unwrap();
            assert_eq!(back, mlvl, "generation {}", g);
        }
    }

    #[test]
    fn test_layer_queries() {
        let mlvl = sample(Generation::Mp1);
        assert_eq!(mlvl.area_layer_names(0), &["Default".to_string(), "Cinematic".to_string()]);
        assert!(mlvl.area_layer_active(0, 0));
        assert!(!mlvl.area_layer_active(0, 1));
        assert!(mlvl.area_layer_names(3).is_empty());

        let area = &mlvl.areas[0];
        assert_eq!(area.layer_dependencies(0).len(), 1);
        assert!(area.layer_dependencies(1).is_empty());
        assert_eq!(area.layer_dependencies(2)[0].kind, FourCC::new(b"CMDL"));
        assert!(area.layer_dependencies(3).is_empty());
    }

    #[test]
    fn test_wrong_version_rejected() {
        let bytes = sample(Generation::Mp1).write();
        assert!(Mlvl::read(&bytes, Generation::Mp2).is_err());
    }
}
