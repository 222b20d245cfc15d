//! Area decoding.
//!
//! The header's size table drives every step: each section is opened at
//! the offset the table gives, whether the payload is plain (Mp1, or an
//! uncompressed Mp2/Mp3 area) or block compressed.

use chozo_common::{BinaryWriter, EntryReadStream, Generation, ReadStream, ResourceId};
use chozo_pak::MlvlArea;
use tracing::{debug, trace};

use crate::block::BlockDecompressionStream;
use crate::collision::CollisionMesh;
use crate::deps::{AreaDependencies, AreaDependency, LayerDeps};
use crate::header::MreaHeader;
use crate::lights::LightLayers;
use crate::material::MaterialSet;
use crate::mesh::Mesh;
use crate::scene::{SceneCommand, SceneSink};
use crate::scly::{read_generated_section, read_layer_section, read_scly, ScriptLayer};
use crate::section::SectionCursor;
use crate::visi::{has_visi_magic, VisiInfo};
use crate::{Error, Result};

/// Naming inputs for the scene output.
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    /// Scene name and prefix of every object name.
    pub area_name: String,
    /// Level background scene to link, if any.
    pub world_link: Option<String>,
}

impl DecodeContext {
    pub fn new(area_name: impl Into<String>) -> Self {
        Self {
            area_name: area_name.into(),
            world_link: None,
        }
    }

    pub fn mesh_name(&self, index: u32) -> String {
        format!("{}_mesh{:03}", self.area_name, index)
    }

    pub fn material_name(&self, index: u32) -> String {
        format!("{}_mat{:03}", self.area_name, index)
    }

    pub fn light_name(&self, layer: u32, index: usize) -> String {
        format!("{}_light{}_{:03}", self.area_name, layer, index)
    }

    pub fn collision_name(&self) -> String {
        format!("{}_collision", self.area_name)
    }
}

/// Everything decode recovers besides what goes to the scene sink.
#[derive(Debug, Clone)]
pub struct DecodedArea {
    pub header: MreaHeader,
    pub materials: MaterialSet,
    pub mesh_count: u32,
    /// Script layers in index order.
    pub layers: Vec<ScriptLayer>,
    /// Mp2/Mp3 generated-object layer.
    pub generated: Option<ScriptLayer>,
    pub collision: Option<CollisionMesh>,
    pub lights: LightLayers,
    /// Raw VISI section, only when it carries the VISI magic.
    pub visi: Option<Vec<u8>>,
    pub visi_info: Option<VisiInfo>,
    pub path_id: Option<ResourceId>,
    pub egmc_id: Option<ResourceId>,
    pub dependencies: Option<AreaDependencies>,
}

impl DecodedArea {
    pub fn generation(&self) -> Generation {
        self.header.generation
    }
}

fn check_sections(header: &MreaHeader, length: u64) -> Result<()> {
    let total = header.sections_total();
    if total > length {
        return Err(Error::SectionOverflow { total, length });
    }
    Ok(())
}

/// Parse the header and hand a cursor over the sections to `f`.
fn with_sections<T>(
    data: Vec<u8>,
    f: impl FnOnce(&MreaHeader, &mut SectionCursor<'_>) -> Result<T>,
) -> Result<(MreaHeader, T)> {
    let mut stream = EntryReadStream::from_vec(data)?;
    let header = MreaHeader::read(&mut stream)?;
    let out = if header.block_count > 0 {
        let mut blocks = BlockDecompressionStream::new(&mut stream, header.block_count)?;
        check_sections(&header, blocks.length())?;
        let mut cursor = SectionCursor::new(&mut blocks, 0, header.sec_sizes.clone());
        f(&header, &mut cursor)?
    } else {
        let base = stream.position();
        check_sections(&header, stream.length() - base)?;
        let mut cursor = SectionCursor::new(&mut stream, base, header.sec_sizes.clone());
        f(&header, &mut cursor)?
    };
    Ok((header, out))
}

/// Read an id from a section, treating short sections and the sentinel as
/// no reference.
fn read_section_id(cursor: &mut SectionCursor<'_>, idx: u32, generation: Generation) -> Result<Option<ResourceId>> {
    let width = generation.id_width();
    let size = cursor.open(idx)?;
    if (size as usize) < width.bytes() {
        return Ok(None);
    }
    let id = cursor.stream().read_id(width)?;
    Ok(id.is_valid().then_some(id))
}

/// Decode an area payload, emitting its scene into `sink`.
pub fn decode_area(data: Vec<u8>, ctx: &DecodeContext, sink: &mut dyn SceneSink) -> Result<DecodedArea> {
    let (_, area) = with_sections(data, |header, cursor| walk(header, cursor, ctx, sink))?;
    Ok(area)
}

fn walk(
    header: &MreaHeader,
    cursor: &mut SectionCursor<'_>,
    ctx: &DecodeContext,
    sink: &mut dyn SceneSink,
) -> Result<DecodedArea> {
    let generation = header.generation;
    let slots = &header.slots;

    sink.emit(SceneCommand::SetSceneName {
        name: ctx.area_name.clone(),
    })?;
    sink.emit(SceneCommand::SetAreaTransform {
        transform: header.transform,
    })?;

    cursor.open(slots.geometry)?;
    let materials = MaterialSet::read(cursor.stream(), generation.id_width())?;
    sink.emit(SceneCommand::RegisterTextures {
        textures: materials.textures.clone(),
    })?;
    for (i, material) in materials.materials.iter().enumerate() {
        sink.emit(SceneCommand::RegisterMaterial {
            index: i as u32,
            name: ctx.material_name(i as u32),
            material: material.clone(),
        })?;
    }

    for i in 0..header.mesh_count {
        let mesh = Mesh::read(cursor, generation, &materials)?;
        trace!(mesh = i, surfaces = mesh.surfaces.len(), "decoded mesh");
        let name = ctx.mesh_name(i);
        sink.emit(SceneCommand::CreateMesh {
            index: i,
            name: name.clone(),
            mesh,
        })?;
        sink.emit(SceneCommand::ParentObject {
            child: name,
            parent: ctx.area_name.clone(),
        })?;
    }

    // AROT is rebuilt from mesh bounds on cook.

    let mut layers = Vec::new();
    let mut generated = None;
    match generation {
        Generation::Mp1 => {
            if cursor.open(slots.scly)? > 0 {
                layers = read_scly(cursor.stream())?;
            }
        }
        Generation::Mp2 | Generation::Mp3 => {
            for i in 0..header.scly_layer_count {
                cursor.open(slots.scly + i)?;
                let (index, layer) = read_layer_section(cursor.stream())?;
                if index != i {
                    debug!(section = i, stored = index, "script layer index differs from position");
                }
                layers.push(layer);
            }
            if let Some(idx) = slots.scgn {
                if cursor.open(idx)? > 0 {
                    generated = Some(read_generated_section(cursor.stream())?);
                }
            }
        }
    }

    let collision = if cursor.open(slots.collision)? > 0 {
        let collision = CollisionMesh::read(cursor.stream())?;
        sink.emit(SceneCommand::CreateCollision {
            name: ctx.collision_name(),
            collision: collision.clone(),
        })?;
        Some(collision)
    } else {
        None
    };

    let lights = if cursor.open(slots.lights)? > 0 {
        LightLayers::read(cursor.stream())?
    } else {
        LightLayers::default()
    };
    for (layer, list) in lights.layers.iter().enumerate() {
        for (i, light) in list.iter().enumerate() {
            sink.emit(SceneCommand::CreateLight {
                name: ctx.light_name(layer as u32, i),
                layer: layer as u32,
                light: light.clone(),
            })?;
        }
    }

    let size = cursor.open(slots.visi)?;
    let visi = if size >= 4 {
        let bytes = cursor.stream().read_vec(size as usize)?;
        has_visi_magic(&bytes).then_some(bytes)
    } else {
        None
    };
    let visi_info = match &visi {
        Some(bytes) => VisiInfo::parse(bytes)?,
        None => None,
    };

    let path_id = read_section_id(cursor, slots.path, generation)?;
    let egmc_id = match slots.egmc {
        Some(idx) => read_section_id(cursor, idx, generation)?,
        None => None,
    };
    let dependencies = match slots.deps {
        Some(idx) if cursor.open(idx)? > 0 => {
            Some(AreaDependencies::read(cursor.stream(), generation.id_width())?)
        }
        _ => None,
    };

    sink.emit(SceneCommand::SetReferences {
        path: path_id,
        egmc: egmc_id,
        dependencies: dependencies.clone(),
    })?;
    if let Some(path) = &ctx.world_link {
        sink.emit(SceneCommand::LinkWorld { path: path.clone() })?;
    }

    Ok(DecodedArea {
        header: header.clone(),
        materials,
        mesh_count: header.mesh_count,
        layers,
        generated,
        collision,
        lights,
        visi,
        visi_info,
        path_id,
        egmc_id,
        dependencies,
    })
}

/// Read only the header of an area.
pub fn read_header(data: &[u8]) -> Result<MreaHeader> {
    let mut stream = EntryReadStream::from_vec(data.to_vec())?;
    MreaHeader::read(&mut stream)
}

/// The area's path graph id, without decoding anything else.
pub fn get_path_id(data: Vec<u8>) -> Result<Option<ResourceId>> {
    let (_, id) = with_sections(data, |header, cursor| {
        read_section_id(cursor, header.slots.path, header.generation)
    })?;
    Ok(id)
}

/// The area's EGMC id (Mp2/Mp3).
pub fn get_egmc_id(data: Vec<u8>) -> Result<Option<ResourceId>> {
    let (_, id) = with_sections(data, |header, cursor| match header.slots.egmc {
        Some(idx) => read_section_id(cursor, idx, header.generation),
        None => Ok(None),
    })?;
    Ok(id)
}

/// Resources referenced by each script layer and by the area as a whole.
///
/// Mp3 areas carry their own dependency table; its last partition is the
/// area's. Mp1/Mp2 lists live in the level, so `level_area` supplies them;
/// dependency layers past the script layer count belong to the area.
/// Material textures always belong to the area.
pub fn extract_layer_deps(data: Vec<u8>, level_area: Option<&MlvlArea>) -> Result<LayerDeps> {
    let (header, (textures, table)) = with_sections(data, |header, cursor| {
        cursor.open(header.slots.geometry)?;
        let materials = MaterialSet::read(cursor.stream(), header.generation.id_width())?;
        let table = match header.slots.deps {
            Some(idx) if cursor.open(idx)? > 0 => Some(AreaDependencies::read(
                cursor.stream(),
                header.generation.id_width(),
            )?),
            _ => None,
        };
        Ok((materials.textures, table))
    })?;

    let mut out = LayerDeps::default();
    match (header.generation, table) {
        (Generation::Mp3, Some(table)) => {
            let mut parts = table.partitions();
            let area: &[AreaDependency] = if parts.len() > header.scly_layer_count as usize {
                parts.pop().unwrap_or_default()
            } else {
                &[]
            };
            out.layers = parts.iter().map(|p| p.iter().map(|d| d.id).collect()).collect();
            out.area = area.iter().map(|d| d.id).collect();
        }
        _ => {
            if let Some(level_area) = level_area {
                let layer_count = match header.generation {
                    Generation::Mp1 => level_area.dep_layer_offsets.len().saturating_sub(1),
                    _ => header.scly_layer_count as usize,
                };
                for i in 0..level_area.dep_layer_offsets.len() {
                    let ids = level_area.layer_dependencies(i).iter().map(|d| d.id);
                    if i < layer_count {
                        out.layers.push(ids.collect());
                    } else {
                        out.area.extend(ids);
                    }
                }
            }
        }
    }
    out.area.extend(textures.into_iter().filter(|t| t.is_valid()));
    Ok(out)
}

/// For block-compressed areas: the same area with every block stored
/// (`comp_size = 0`) and the logical stream written out in full.
pub fn decomp_sidecar(data: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut stream = EntryReadStream::from_vec(data.to_vec())?;
    let header = MreaHeader::read(&mut stream)?;
    if header.block_count == 0 {
        return Ok(None);
    }
    let header_end = stream.position() as usize;
    let mut blocks = BlockDecompressionStream::new(&mut stream, header.block_count)?;
    let logical = blocks.read_vec(blocks.length() as usize)?;

    let mut w = BinaryWriter::with_capacity(header_end + logical.len() + 0x40);
    w.write_bytes(&data[..header_end]);
    blocks.write_decomp_infos(&mut w);
    w.align32();
    w.write_bytes(&logical);
    Ok(Some(w.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::SectionSlots;
    use crate::scly::write_scly;
    use chozo_common::{round_up_32_usize, IdWidth};
    use chozo_pak::Dependency;

    /// Minimal Mp1 area: no meshes, one empty script layer, no VISI.
    fn empty_mp1() -> Vec<u8> {
        let mut materials = BinaryWriter::new();
        MaterialSet::default().write(&mut materials);
        let mut lights = BinaryWriter::new();
        LightLayers::default().write(&mut lights);
        let sections: Vec<Vec<u8>> = vec![
            materials.into_inner(),
            Vec::new(),
            write_scly(&[]),
            Vec::new(),
            vec![0, 0, 0, 1, 0, 0, 0, 0],
            lights.into_inner(),
            vec![0; 4],
            vec![0xFF; 4],
        ];
        let mut header = MreaHeader::new(Generation::Mp1);
        header.slots = SectionSlots {
            geometry: 0,
            arot: 1,
            scly: 2,
            collision: 3,
            unknown: 4,
            lights: 5,
            visi: 6,
            path: 7,
            ..SectionSlots::default()
        };
        header.sec_sizes = sections
            .iter()
            .map(|s| round_up_32_usize(s.len()) as u32)
            .collect();
        let mut w = BinaryWriter::new();
        header.write(&mut w);
        for s in &sections {
            w.write_bytes(s);
            w.align32();
        }
        w.into_inner()
    }

    #[test]
    fn test_zero_mesh_area() {
        let mut sink: Vec<SceneCommand> = Vec::new();
        let area = decode_area(empty_mp1(), &DecodeContext::new("MREA_1"), &mut sink).unwrap();
        assert_eq!(area.mesh_count, 0);
        assert!(area.layers.is_empty());
        assert!(area.visi.is_none());
        assert!(area.collision.is_none());
        assert_eq!(area.path_id, None);
        assert!(!sink
            .iter()
            .any(|c| matches!(c, SceneCommand::CreateMesh { .. })));
    }

    #[test]
    fn test_padded_sizes_sum_to_payload() {
        let data = empty_mp1();
        let header = read_header(&data).unwrap();
        let mut w = BinaryWriter::new();
        header.write(&mut w);
        assert_eq!(header.sections_total() as usize, data.len() - w.len());
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut data = empty_mp1();
        data.truncate(data.len() - 32);
        let err = decode_area(data, &DecodeContext::new("x"), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::SectionOverflow { .. }));
    }

    #[test]
    fn test_path_id_without_full_decode() {
        let mut data = empty_mp1();
        let path_at = data.len() - 32;
        data[path_at..path_at + 4].copy_from_slice(&0x1234_5678u32.to_be_bytes());
        assert_eq!(
            get_path_id(data.clone()).unwrap(),
            Some(ResourceId::new32(0x1234_5678))
        );
        assert!(get_egmc_id(data).unwrap().is_none());
    }

    #[test]
    fn test_layer_deps_from_level() {
        let data = empty_mp1();
        let id = |v| ResourceId::new(v, IdWidth::Bits32);
        let dep = |v| Dependency {
            id: id(v),
            kind: chozo_common::FourCC::new(b"TXTR"),
        };
        let mut area = MlvlArea::new(id(1), id(2), id(3));
        area.set_layer_dependencies(&[vec![dep(10), dep(11)], vec![dep(12)], vec![dep(20)]]);
        let deps = extract_layer_deps(data, Some(&area)).unwrap();
        assert_eq!(deps.layers, vec![vec![id(10), id(11)], vec![id(12)]]);
        assert_eq!(deps.area, vec![id(20)]);
    }

    #[test]
    fn test_no_sidecar_for_plain_area() {
        assert!(decomp_sidecar(&empty_mp1()).unwrap().is_none());
    }
}
