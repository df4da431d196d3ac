//! Splitting planes and the point/triangle classification constants used by
//! the BSP tree.

use crate::float_types::Real;
use nalgebra::{Point3, Vector3};

// Classification constants, combined by bitwise OR over a triangle's
// corners.
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// A plane in normal/offset form: `normal · p = w`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    normal: Vector3<Real>,
    w: Real,
}

impl Plane {
    /// Create a plane from a unit-length `normal` and offset `w`.
    pub const fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        Plane { normal, w }
    }

    /// Create a plane from three points, normal following the right-hand
    /// rule: `(b - a) × (c - b)`. Returns `None` when the points are
    /// (nearly) collinear and do not define a plane.
    pub fn from_points(
        a: &Point3<Real>,
        b: &Point3<Real>,
        c: &Point3<Real>,
        epsilon: Real,
    ) -> Option<Self> {
        let normal = (b - a).cross(&(c - b));
        if normal.norm_squared() < epsilon * epsilon {
            return None;
        }
        let normal = normal.normalize();
        Some(Plane {
            normal,
            w: normal.dot(&a.coords),
        })
    }

    /// Plane normal.
    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    /// Offset (signed distance of the plane from the origin along its
    /// normal).
    pub const fn offset(&self) -> Real {
        self.w
    }

    /// Reverse the half-spaces.
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Signed distance of `point` from the plane; positive on the front
    /// (normal) side.
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.w
    }

    /// Classify `point` as [`FRONT`], [`BACK`] or [`COPLANAR`], treating
    /// distances within `epsilon` of zero as coplanar.
    pub fn orient_point(&self, point: &Point3<Real>, epsilon: Real) -> i8 {
        let distance = self.signed_distance(point);
        if distance > epsilon {
            FRONT
        } else if distance < -epsilon {
            BACK
        } else {
            COPLANAR
        }
    }

    /// Classify a triangle as the OR-mask of its corner classifications:
    /// [`COPLANAR`], [`FRONT`], [`BACK`] or [`SPANNING`].
    pub fn orient_triangle(&self, corners: &[Point3<Real>; 3], epsilon: Real) -> i8 {
        corners
            .iter()
            .fold(COPLANAR, |acc, p| acc | self.orient_point(p, epsilon))
    }
}
