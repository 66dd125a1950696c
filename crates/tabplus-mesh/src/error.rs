//! Error types for mesh construction and export.

use thiserror::Error;

/// Errors that can occur while building or exporting a mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Solid parameters outside their valid range.
    #[error("invalid solid parameters: {0}")]
    InvalidParams(String),

    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// IO error while exporting.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
