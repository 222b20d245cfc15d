//! World geometry meshes.
//!
//! A mesh occupies a run of consecutive sections: a header, the vertex
//! attribute arrays, a surface offset table and one section per surface.
//! Mp2 and Mp3 append two AROT relation sections to every mesh.

use serde::{Deserialize, Serialize};

use chozo_common::math::{Aabb, Transform, Vec3};
use chozo_common::{round_up_32_usize, BinaryReader, BinaryWriter, Generation, ReadStream};

use crate::material::MaterialSet;
use crate::section::SectionCursor;
use crate::Result;

/// Visor flag bit selecting 16-bit fixed-point normals.
pub const SHORT_NORMALS: u32 = 1 << 8;

/// Fixed-point scale of short normals.
const NORMAL_SCALE: f32 = 32768.0;

/// Sections every mesh occupies besides its surfaces.
pub fn fixed_sections(generation: Generation) -> u32 {
    match generation {
        Generation::Mp1 => 7,
        Generation::Mp2 | Generation::Mp3 => 9,
    }
}

/// One GX draw command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Primitive {
    /// Primitive opcode with the vertex format in the low 3 bits.
    pub opcode: u8,
    /// One index per enabled attribute, per vertex.
    pub vertices: Vec<Vec<u16>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub centroid: Vec3,
    pub material: u32,
    pub q_div: i16,
    pub unknown1: u32,
    pub unknown2: u32,
    pub reflection_normal: Vec3,
    pub aabb: Option<Aabb>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub visor_flags: u32,
    pub transform: Transform,
    pub aabb: Aabb,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<u32>,
    pub uvs: Vec<[f32; 2]>,
    pub short_uvs: Vec<[i16; 2]>,
    pub surfaces: Vec<Surface>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            visor_flags: 0,
            transform: Transform::identity(),
            aabb: Aabb::empty(),
            positions: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            uvs: Vec::new(),
            short_uvs: Vec::new(),
            surfaces: Vec::new(),
        }
    }

    pub fn short_normals(&self) -> bool {
        self.visor_flags & SHORT_NORMALS != 0
    }

    /// Sections this mesh occupies.
    pub fn section_count(&self, generation: Generation) -> u32 {
        fixed_sections(generation) + self.surfaces.len() as u32
    }

    /// World-space bounds of the positions the surfaces draw. Trailing
    /// vertices that only exist as section padding are not counted.
    pub fn world_bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for surface in &self.surfaces {
            for prim in &surface.primitives {
                for vertex in &prim.vertices {
                    let Some(&pos_idx) = vertex.first() else {
                        continue;
                    };
                    if let Some(p) = self.positions.get(pos_idx as usize) {
                        aabb.extend(self.transform.transform_point(*p));
                    }
                }
            }
        }
        aabb
    }

    /// Read one mesh starting at the cursor's next section.
    pub fn read(cursor: &mut SectionCursor<'_>, generation: Generation, materials: &MaterialSet) -> Result<Self> {
        let mut mesh = Mesh::new();

        cursor.next_section()?;
        {
            let r = cursor.stream();
            mesh.visor_flags = r.read_u32()?;
            mesh.transform = Transform::read(r)?;
            mesh.aabb = Aabb::read(r)?;
        }

        let size = cursor.next_section()?;
        for _ in 0..size / 12 {
            mesh.positions.push(cursor.stream().read_vec3()?);
        }

        let size = cursor.next_section()?;
        if mesh.short_normals() {
            for _ in 0..size / 6 {
                let r = cursor.stream();
                let n = [r.read_i16()?, r.read_i16()?, r.read_i16()?];
                mesh.normals.push(n.map(|v| v as f32 / NORMAL_SCALE));
            }
        } else {
            for _ in 0..size / 12 {
                mesh.normals.push(cursor.stream().read_vec3()?);
            }
        }

        let size = cursor.next_section()?;
        for _ in 0..size / 4 {
            mesh.colors.push(cursor.stream().read_u32()?);
        }

        let size = cursor.next_section()?;
        for _ in 0..size / 8 {
            let r = cursor.stream();
            mesh.uvs.push([r.read_f32()?, r.read_f32()?]);
        }

        let size = cursor.next_section()?;
        for _ in 0..size / 4 {
            let r = cursor.stream();
            mesh.short_uvs.push([r.read_i16()?, r.read_i16()?]);
        }

        let size = cursor.next_section()?;
        let surface_count = if size >= 4 { cursor.stream().read_u32()? } else { 0 };

        for _ in 0..surface_count {
            let idx = cursor.next_index();
            cursor.next_section()?;
            let (mut surface, dl_size) = read_surface_header(cursor.stream())?;
            let header_len = cursor.consumed_in(idx) as usize;
            cursor
                .stream()
                .skip((round_up_32_usize(header_len) - header_len) as u64)?;
            let dl = cursor.stream().read_vec(dl_size as usize)?;
            let attributes = materials.attribute_count(surface.material)?;
            surface.primitives = decode_display_list(&dl, attributes)?;
            mesh.surfaces.push(surface);
        }

        if generation != Generation::Mp1 {
            // AROT relation sections are rebuilt on cook.
            cursor.next_section()?;
            cursor.next_section()?;
        }
        Ok(mesh)
    }

    /// Encode the mesh as unpadded section buffers, in table order.
    pub fn write_sections(&self, generation: Generation, world_aabb: &Aabb) -> Vec<Vec<u8>> {
        let mut sections = Vec::with_capacity(self.section_count(generation) as usize);

        let mut w = BinaryWriter::new();
        w.write_u32(self.visor_flags);
        self.transform.write(&mut w);
        world_aabb.write(&mut w);
        sections.push(w.into_inner());

        let mut w = BinaryWriter::new();
        for p in &self.positions {
            w.write_vec3(*p);
        }
        sections.push(w.into_inner());

        let mut w = BinaryWriter::new();
        for n in &self.normals {
            if self.short_normals() {
                for v in n {
                    w.write_i16((v * NORMAL_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16);
                }
            } else {
                w.write_vec3(*n);
            }
        }
        sections.push(w.into_inner());

        let mut w = BinaryWriter::new();
        for c in &self.colors {
            w.write_u32(*c);
        }
        sections.push(w.into_inner());

        let mut w = BinaryWriter::new();
        for uv in &self.uvs {
            w.write_f32(uv[0]);
            w.write_f32(uv[1]);
        }
        sections.push(w.into_inner());

        let mut w = BinaryWriter::new();
        for uv in &self.short_uvs {
            w.write_i16(uv[0]);
            w.write_i16(uv[1]);
        }
        sections.push(w.into_inner());

        let surfaces: Vec<Vec<u8>> = self.surfaces.iter().map(write_surface).collect();
        let mut w = BinaryWriter::new();
        w.write_u32(surfaces.len() as u32);
        let mut end = 0u32;
        for s in &surfaces {
            end += round_up_32_usize(s.len()) as u32;
            w.write_u32(end);
        }
        sections.push(w.into_inner());
        sections.extend(surfaces);

        if generation != Generation::Mp1 {
            sections.push(0u32.to_be_bytes().to_vec());
            sections.push(0u32.to_be_bytes().to_vec());
        }
        sections
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

fn read_surface_header(r: &mut dyn crate::section::SectionStream) -> Result<(Surface, u16)> {
    let centroid = r.read_vec3()?;
    let material = r.read_u32()?;
    let q_div = r.read_i16()?;
    let dl_size = r.read_u16()?;
    let unknown1 = r.read_u32()?;
    let unknown2 = r.read_u32()?;
    let aabb_size = r.read_u32()?;
    let reflection_normal = r.read_vec3()?;
    let aabb = if aabb_size >= 24 {
        let aabb = Aabb::read(r)?;
        r.skip(aabb_size as u64 - 24)?;
        Some(aabb)
    } else {
        r.skip(aabb_size as u64)?;
        None
    };
    Ok((
        Surface {
            centroid,
            material,
            q_div,
            unknown1,
            unknown2,
            reflection_normal,
            aabb,
            primitives: Vec::new(),
        },
        dl_size,
    ))
}

fn write_surface(surface: &Surface) -> Vec<u8> {
    let mut dl = encode_display_list(&surface.primitives);
    dl.resize(round_up_32_usize(dl.len()), 0);

    let mut w = BinaryWriter::new();
    w.write_vec3(surface.centroid);
    w.write_u32(surface.material);
    w.write_i16(surface.q_div);
    w.write_u16(dl.len() as u16);
    w.write_u32(surface.unknown1);
    w.write_u32(surface.unknown2);
    w.write_u32(if surface.aabb.is_some() { 24 } else { 0 });
    w.write_vec3(surface.reflection_normal);
    if let Some(aabb) = &surface.aabb {
        aabb.write(&mut w);
    }
    w.align32();
    w.write_bytes(&dl);
    w.into_inner()
}

/// Decode a GX display list. A zero opcode (NOP or padding) ends it.
pub fn decode_display_list(dl: &[u8], attributes: usize) -> Result<Vec<Primitive>> {
    let mut r = BinaryReader::new(dl);
    let mut primitives = Vec::new();
    while !r.is_empty() {
        let opcode = r.read_u8()?;
        if opcode & 0xF8 == 0 {
            break;
        }
        let count = r.read_u16()?;
        let mut vertices = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut vertex = Vec::with_capacity(attributes);
            for _ in 0..attributes {
                vertex.push(r.read_u16()?);
            }
            vertices.push(vertex);
        }
        primitives.push(Primitive { opcode, vertices });
    }
    Ok(primitives)
}

pub fn encode_display_list(primitives: &[Primitive]) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    for prim in primitives {
        w.write_u8(prim.opcode);
        w.write_u16(prim.vertices.len() as u16);
        for vertex in &prim.vertices {
            for idx in vertex {
                w.write_u16(*idx);
            }
        }
    }
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_list_stops_at_padding() {
        let prims = vec![
            Primitive {
                opcode: 0x90,
                vertices: vec![vec![0, 1], vec![1, 2], vec![2, 0]],
            },
            Primitive {
                opcode: 0x98,
                vertices: vec![vec![3, 3]; 4],
            },
        ];
        let mut dl = encode_display_list(&prims);
        dl.resize(round_up_32_usize(dl.len()), 0);
        assert_eq!(decode_display_list(&dl, 2).unwrap(), prims);
    }

    #[test]
    fn test_truncated_display_list_fails() {
        assert!(decode_display_list(&[0x90, 0x00, 0x02, 0x00], 1).is_err());
    }

    #[test]
    fn test_world_bounds_ignores_unreferenced() {
        let mut mesh = Mesh::new();
        mesh.transform.rows[0][3] = 10.0;
        mesh.positions = vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-50.0, -50.0, -50.0]];
        mesh.surfaces.push(Surface {
            centroid: [0.0; 3],
            material: 0,
            q_div: 0,
            unknown1: 0,
            unknown2: 0,
            reflection_normal: [0.0; 3],
            aabb: None,
            primitives: vec![Primitive {
                opcode: 0x90,
                vertices: vec![vec![0], vec![1], vec![1]],
            }],
        });
        let b = mesh.world_bounds();
        assert_eq!(b.min, [10.0, 0.0, 0.0]);
        assert_eq!(b.max, [11.0, 2.0, 3.0]);
    }

    #[test]
    fn test_section_count() {
        let mesh = Mesh::new();
        assert_eq!(mesh.section_count(Generation::Mp1), 7);
        assert_eq!(mesh.write_sections(Generation::Mp2, &Aabb::empty()).len(), 9);
    }
}
