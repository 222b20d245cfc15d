//! Script layers.
//!
//! Objects are kept as typed records with their connections decoded and
//! their property block carried as opaque bytes.

use serde::{Deserialize, Serialize};

use chozo_common::{BinaryReader, BinaryWriter, ReadStream};

use crate::{Error, Result};

/// `'SCLY'`.
pub const SCLY_MAGIC: u32 = 0x5343_4C59;
/// `'SCGN'`.
pub const SCGN_MAGIC: u32 = 0x5343_474E;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub state: u32,
    pub message: u32,
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptObject {
    pub kind: u8,
    pub id: u32,
    pub connections: Vec<Connection>,
    #[serde(with = "crate::serde_hex")]
    pub properties: Vec<u8>,
}

impl ScriptObject {
    /// Id with the layer and area bits cleared.
    pub fn editor_id(&self) -> u32 {
        self.id & !0x03FF_0000
    }

    fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        let kind = r.read_u8()?;
        let size = r.read_u32()? as usize;
        let body = r.read_vec(size)?;
        let mut b = BinaryReader::new(&body);
        let id = b.read_u32()?;
        let count = b.read_u32()?;
        let mut connections = Vec::with_capacity(count as usize);
        for _ in 0..count {
            connections.push(Connection {
                state: b.read_u32()?,
                message: b.read_u32()?,
                target: b.read_u32()?,
            });
        }
        Ok(Self {
            kind,
            id,
            connections,
            properties: b.remaining_bytes().to_vec(),
        })
    }

    fn write(&self, w: &mut BinaryWriter) {
        w.write_u8(self.kind);
        w.write_u32((8 + self.connections.len() * 12 + self.properties.len()) as u32);
        w.write_u32(self.id);
        w.write_u32(self.connections.len() as u32);
        for c in &self.connections {
            w.write_u32(c.state);
            w.write_u32(c.message);
            w.write_u32(c.target);
        }
        w.write_bytes(&self.properties);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLayer {
    pub unknown: u8,
    pub objects: Vec<ScriptObject>,
}

impl ScriptLayer {
    pub fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        let unknown = r.read_u8()?;
        let count = r.read_u32()?;
        let mut objects = Vec::with_capacity(count as usize);
        for _ in 0..count {
            objects.push(ScriptObject::read(r)?);
        }
        Ok(Self { unknown, objects })
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_u8(self.unknown);
        w.write_u32(self.objects.len() as u32);
        for obj in &self.objects {
            obj.write(w);
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        self.write(&mut w);
        w.into_inner()
    }
}

fn expect<R: ReadStream + ?Sized>(r: &mut R, what: &'static str, expected: u32) -> Result<()> {
    let actual = r.read_u32()?;
    if actual != expected {
        return Err(Error::InvalidMagic {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Mp1 SCLY section: every layer in one section behind a size table.
pub fn read_scly<R: ReadStream + ?Sized>(r: &mut R) -> Result<Vec<ScriptLayer>> {
    expect(r, "SCLY", SCLY_MAGIC)?;
    let _version = r.read_u32()?;
    let count = r.read_u32()?;
    let mut sizes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        sizes.push(r.read_u32()?);
    }
    let mut layers = Vec::with_capacity(sizes.len());
    for size in sizes {
        let bytes = r.read_vec(size as usize)?;
        layers.push(ScriptLayer::read(&mut BinaryReader::new(&bytes))?);
    }
    Ok(layers)
}

pub fn write_scly(layers: &[ScriptLayer]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = layers.iter().map(ScriptLayer::to_bytes).collect();
    let mut w = BinaryWriter::new();
    w.write_u32(SCLY_MAGIC);
    w.write_u32(1);
    w.write_u32(encoded.len() as u32);
    for layer in &encoded {
        w.write_u32(layer.len() as u32);
    }
    for layer in &encoded {
        w.write_bytes(layer);
    }
    w.into_inner()
}

/// Mp2/Mp3 per-layer SCLY section. Returns the stored layer index.
pub fn read_layer_section<R: ReadStream + ?Sized>(r: &mut R) -> Result<(u32, ScriptLayer)> {
    expect(r, "SCLY", SCLY_MAGIC)?;
    let _version = r.read_u8()?;
    let index = r.read_u32()?;
    Ok((index, ScriptLayer::read(r)?))
}

pub fn write_layer_section(index: u32, layer: &ScriptLayer) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_u32(SCLY_MAGIC);
    w.write_u8(1);
    w.write_u32(index);
    layer.write(&mut w);
    w.into_inner()
}

/// Mp2/Mp3 generated-object section.
pub fn read_generated_section<R: ReadStream + ?Sized>(r: &mut R) -> Result<ScriptLayer> {
    expect(r, "SCGN", SCGN_MAGIC)?;
    let _version = r.read_u8()?;
    ScriptLayer::read(r)
}

pub fn write_generated_section(layer: &ScriptLayer) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_u32(SCGN_MAGIC);
    w.write_u8(1);
    layer.write(&mut w);
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_common::EntryReadStream;

    fn layer(n: u32) -> ScriptLayer {
        ScriptLayer {
            unknown: 0,
            objects: (0..n)
                .map(|i| ScriptObject {
                    kind: 0x0E,
                    id: 0x0010_0000 | i,
                    connections: vec![Connection {
                        state: 9,
                        message: 13,
                        target: 0x0010_0000,
                    }],
                    properties: vec![i as u8; 5],
                })
                .collect(),
        }
    }

    fn stream(mut bytes: Vec<u8>) -> EntryReadStream {
        bytes.resize(chozo_common::round_up_32_usize(bytes.len()) + 32, 0);
        EntryReadStream::from_vec(bytes).unwrap()
    }

    #[test]
    fn test_scly_layers() {
        let layers = vec![layer(2), ScriptLayer::default(), layer(1)];
        let back = read_scly(&mut stream(write_scly(&layers))).unwrap();
        assert_eq!(back, layers);
    }

    #[test]
    fn test_scly_zero_layers() {
        assert!(read_scly(&mut stream(write_scly(&[]))).unwrap().is_empty());
    }

    #[test]
    fn test_per_layer_sections() {
        let (idx, back) = read_layer_section(&mut stream(write_layer_section(3, &layer(4)))).unwrap();
        assert_eq!(idx, 3);
        assert_eq!(back, layer(4));
        let generated = read_generated_section(&mut stream(write_generated_section(&layer(1)))).unwrap();
        assert_eq!(generated, layer(1));
        assert!(read_generated_section(&mut stream(write_layer_section(0, &layer(1)))).is_err());
    }

    #[test]
    fn test_editor_id() {
        let obj = &layer(1).objects[0];
        assert_eq!(obj.editor_id(), 0);
    }
}
