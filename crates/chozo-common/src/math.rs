//! Vectors, axis-aligned boxes and affine area transforms.
//!
//! Everything is stored the way the game stores it: Z-up, row-major 3x4
//! transforms.

use crate::{BinaryWriter, ReadStream, Result};

/// 3-component vector.
pub type Vec3 = [f32; 3];

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any `extend` call replaces.
    pub const fn empty() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Read `min` then `max`.
    pub fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        Ok(Self {
            min: r.read_vec3()?,
            max: r.read_vec3()?,
        })
    }

    /// Write `min` then `max`.
    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_vec3(self.min);
        w.write_vec3(self.max);
    }

    pub fn extend(&mut self, point: Vec3) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(point[i]);
            self.max[i] = self.max[i].max(point[i]);
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        for i in 0..3 {
            out.min[i] = out.min[i].min(other.min[i]);
            out.max[i] = out.max[i].max(other.max[i]);
        }
        out
    }

    /// Closed-interval overlap test.
    pub fn intersects(&self, other: &Aabb) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
    }

    pub fn extents(&self) -> Vec3 {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn center(&self) -> Vec3 {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Largest of the three extents.
    pub fn max_extent(&self) -> f32 {
        let e = self.extents();
        e[0].max(e[1]).max(e[2])
    }

    fn split_axis(&self, axis: usize, upper: bool) -> Aabb {
        let mid = self.center()[axis];
        let mut out = *self;
        if upper {
            out.min[axis] = mid;
        } else {
            out.max[axis] = mid;
        }
        out
    }

    /// Lower or upper half along X.
    pub fn split_x(&self, upper: bool) -> Aabb {
        self.split_axis(0, upper)
    }

    /// Lower or upper half along Y.
    pub fn split_y(&self, upper: bool) -> Aabb {
        self.split_axis(1, upper)
    }

    /// Lower or upper half along Z.
    pub fn split_z(&self, upper: bool) -> Aabb {
        self.split_axis(2, upper)
    }

    /// Octant `i`: bit 4 selects upper Z, bit 2 upper Y, bit 1 upper X.
    pub fn octant(&self, i: usize) -> Aabb {
        self.split_z(i & 4 != 0)
            .split_y(i & 2 != 0)
            .split_x(i & 1 != 0)
    }

    /// Box enclosing this box after transformation.
    pub fn transformed(&self, xf: &Transform) -> Aabb {
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = [
                if i & 1 != 0 { self.max[0] } else { self.min[0] },
                if i & 2 != 0 { self.max[1] } else { self.min[1] },
                if i & 4 != 0 { self.max[2] } else { self.min[2] },
            ];
            out.extend(xf.transform_point(corner));
        }
        out
    }
}

/// Row-major 3x4 affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub rows: [[f32; 4]; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub const fn identity() -> Self {
        Self {
            rows: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    /// Read 12 floats, row by row.
    pub fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        let mut rows = [[0.0f32; 4]; 3];
        for row in rows.iter_mut() {
            for v in row.iter_mut() {
                *v = r.read_f32()?;
            }
        }
        Ok(Self { rows })
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        for v in self.to_floats() {
            w.write_f32(v);
        }
    }

    /// The 12 floats in on-disk order.
    pub fn to_floats(&self) -> [f32; 12] {
        let mut out = [0.0f32; 12];
        for (r, row) in self.rows.iter().enumerate() {
            out[r * 4..r * 4 + 4].copy_from_slice(row);
        }
        out
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let mut out = [0.0f32; 3];
        for (i, row) in self.rows.iter().enumerate() {
            out[i] = row[0] * p[0] + row[1] * p[1] + row[2] * p[2] + row[3];
        }
        out
    }

    /// Full 4x4 matrix with a `0 0 0 1` bottom row, transposed to
    /// column-major order.
    pub fn to_matrix4_transposed(&self) -> [[f32; 4]; 4] {
        let mut m = [[0.0f32; 4]; 4];
        for (r, row) in self.rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                m[c][r] = *v;
            }
        }
        m[3][3] = 1.0;
        m
    }
}
