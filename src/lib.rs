//! **Constructive Solid Geometry (CSG)** on indexed triangle buffers,
//! built around Boolean operations (*union*, *difference*, *intersection*, *xor*)
//! on meshes classified against [BSP](bsp) trees.
//!
//! Unlike polygon-soup CSG libraries, all geometry lives in one append-only
//! vertex/index buffer per [`Mesh`]. Bracketed scopes recorded on a cursor
//! stack decide which buffer ranges form the two operands of a Boolean call,
//! so a procedural front end can build both meshes in place and then combine
//! them with [`Mesh::apply_csg`].
//!
//! # Features
//! - **f64**: use f64 as Real (default)
//! - **f32**: use f32 as Real, this conflicts with f64

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod bsp;
pub mod csg;
pub mod errors;
pub mod float_types;
pub mod mesh;
pub mod plane;
pub mod vertex;
pub mod weld;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use csg::CsgOp;
pub use errors::CsgError;
pub use mesh::Mesh;
pub use vertex::Vertex;
