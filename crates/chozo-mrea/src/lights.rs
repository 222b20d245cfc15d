//! BABEDEAD area lights.

use serde::{Deserialize, Serialize};

use chozo_common::math::Vec3;
use chozo_common::{BinaryWriter, ReadStream};

use crate::{Error, Result};

/// `0xBABEDEAD`.
pub const BABEDEAD_MAGIC: u32 = 0xBABE_DEAD;

/// Encoded size of one light.
pub const LIGHT_SIZE: usize = 65;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: u32,
    pub color: Vec3,
    pub position: Vec3,
    pub direction: Vec3,
    pub q: f32,
    pub spot_cutoff: f32,
    pub unknown5: f32,
    pub cast_shadows: bool,
    pub unknown7: f32,
    pub falloff: u32,
    pub unknown9: f32,
}

impl Light {
    fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        Ok(Self {
            kind: r.read_u32()?,
            color: r.read_vec3()?,
            position: r.read_vec3()?,
            direction: r.read_vec3()?,
            q: r.read_f32()?,
            spot_cutoff: r.read_f32()?,
            unknown5: r.read_f32()?,
            cast_shadows: r.read_bool()?,
            unknown7: r.read_f32()?,
            falloff: r.read_u32()?,
            unknown9: r.read_f32()?,
        })
    }

    fn write(&self, w: &mut BinaryWriter) {
        w.write_u32(self.kind);
        w.write_vec3(self.color);
        w.write_vec3(self.position);
        w.write_vec3(self.direction);
        w.write_f32(self.q);
        w.write_f32(self.spot_cutoff);
        w.write_f32(self.unknown5);
        w.write_bool(self.cast_shadows);
        w.write_f32(self.unknown7);
        w.write_u32(self.falloff);
        w.write_f32(self.unknown9);
    }
}

/// The two light layers of an area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightLayers {
    pub layers: [Vec<Light>; 2],
}

impl LightLayers {
    pub fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        let magic = r.read_u32()?;
        if magic != BABEDEAD_MAGIC {
            return Err(Error::InvalidMagic {
                what: "lights",
                expected: BABEDEAD_MAGIC,
                actual: magic,
            });
        }
        let mut out = Self::default();
        for layer in out.layers.iter_mut() {
            let count = r.read_u32()?;
            for _ in 0..count {
                layer.push(Light::read(r)?);
            }
        }
        Ok(out)
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_u32(BABEDEAD_MAGIC);
        for layer in &self.layers {
            w.write_u32(layer.len() as u32);
            for light in layer {
                light.write(w);
            }
        }
    }

    pub fn total(&self) -> usize {
        self.layers[0].len() + self.layers[1].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_common::EntryReadStream;

    fn light(kind: u32) -> Light {
        Light {
            kind,
            color: [1.0, 0.5, 0.25],
            position: [10.0, -3.0, 2.0],
            direction: [0.0, 0.0, -1.0],
            q: 1.0,
            spot_cutoff: 45.0,
            unknown5: 0.0,
            cast_shadows: true,
            unknown7: 1.0,
            falloff: 2,
            unknown9: 0.0,
        }
    }

    #[test]
    fn test_light_layers() {
        let lights = LightLayers {
            layers: [vec![light(0), light(2)], vec![light(3)]],
        };
        let mut w = BinaryWriter::new();
        lights.write(&mut w);
        assert_eq!(w.len(), 12 + 3 * LIGHT_SIZE);
        w.align32();
        let mut r = EntryReadStream::from_vec(w.into_inner()).unwrap();
        let back = LightLayers::read(&mut r).unwrap();
        assert_eq!(back, lights);
        assert_eq!(back.total(), 3);
    }
}
