#![warn(missing_docs)]

//! Triangle meshes and anti-warping tab solids.
//!
//! Produces the closed solids placed under a model's footprint to hold its
//! edges down: a plain cylinder ("pastille") and a flanged capsule.
//!
//! # Example
//!
//! ```
//! use tabplus_mesh::make_pastille;
//!
//! let mesh = make_pastille(10.0, 10.0, 1.0, 0.2).unwrap();
//! assert_eq!(mesh.num_vertices(), 432);
//! assert_eq!(mesh.num_triangles(), 144);
//! ```

pub mod error;
pub mod export;
pub mod mesh;
pub mod solid;

pub use error::{MeshError, Result};
pub use export::{stl_bytes, write_stl};
pub use mesh::{MeshBuilder, TriangleMesh};
pub use solid::{make_capsule, make_pastille, TabShape, TabSolid};
