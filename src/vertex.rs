//! Struct and functions for working with the `Vertex` records stored in a
//! mesh buffer.

use crate::float_types::Real;
use nalgebra::{Point3, Vector3, Vector4};

/// A vertex record: position, shading normal and RGBA color.
///
/// Vertices live in one growable sequence owned by the mesh and are
/// referenced only by 0-based index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Point3<Real>,
    pub normal: Vector3<Real>,
    pub color: Vector4<Real>,
}

impl Vertex {
    /// Create a new [`Vertex`].
    ///
    /// * `pos`    – the position in model space
    /// * `normal` – (optionally non-unit) normal; it is **copied verbatim**,
    ///   so make sure it is oriented the way you need it for lighting / BSP
    ///   tests.
    /// * `color`  – RGBA, each channel usually in `[0, 1]`
    pub const fn new(pos: Point3<Real>, normal: Vector3<Real>, color: Vector4<Real>) -> Self {
        Vertex { pos, normal, color }
    }

    /// Return the linear interpolation between `self` (`t = 0`) and `other`
    /// (`t = 1`).
    ///
    /// Position and color are lerped; the normal is lerped and then
    /// renormalized so shading stays unit length across an edge cut.
    pub fn interpolate(&self, other: &Vertex, t: Real) -> Vertex {
        let new_pos = self.pos + (other.pos - self.pos) * t;
        let new_normal = self.normal + (other.normal - self.normal) * t;
        let new_color = self.color + (other.color - self.color) * t;
        Vertex::new(
            new_pos,
            new_normal.try_normalize(Real::EPSILON).unwrap_or(new_normal),
            new_color,
        )
    }

    /// Distance between vertex positions.
    pub fn distance_to(&self, other: &Vertex) -> Real {
        (self.pos - other.pos).norm()
    }
}
