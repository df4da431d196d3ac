//! Scalar type selection and the default geometric tolerance.

// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

/// Default tolerance below which two distances (or plane offsets) are
/// treated as equal. Every [`Mesh`](crate::mesh::Mesh) starts with this
/// value; override it per instance with
/// [`Mesh::with_epsilon`](crate::mesh::Mesh::with_epsilon).
#[cfg(feature = "f32")]
pub const EPSILON: Real = 1e-4;
/// Default tolerance below which two distances (or plane offsets) are
/// treated as equal. Every [`Mesh`](crate::mesh::Mesh) starts with this
/// value; override it per instance with
/// [`Mesh::with_epsilon`](crate::mesh::Mesh::with_epsilon).
#[cfg(feature = "f64")]
pub const EPSILON: Real = 1e-6;
