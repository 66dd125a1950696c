//! Error types for tab placement.

use thiserror::Error;

/// Errors that can occur while placing or removing tabs.
#[derive(Error, Debug)]
pub enum PlaceError {
    /// The node handle does not refer to a live scene node.
    #[error("unknown scene node")]
    UnknownNode,

    /// The scene root cannot be removed or re-parented.
    #[error("operation not allowed on the scene root")]
    RootNode,

    /// Re-parenting would make a node its own ancestor.
    #[error("node cannot be its own ancestor")]
    Cycle,

    /// A model has no usable footprint polygon.
    #[error("model {0:?} has no footprint")]
    MissingFootprint(String),

    /// A print setting needed to size the tab is absent or not numeric.
    #[error("print setting {0:?} is missing")]
    MissingSetting(&'static str),

    /// Tab solid generation failed.
    #[error(transparent)]
    Mesh(#[from] tabplus_mesh::MeshError),

    /// Preference file could not be read or written.
    #[error("preference file: {0}")]
    Io(#[from] std::io::Error),

    /// Preference file is not valid TOML.
    #[error("preference file: {0}")]
    PreferenceParse(#[from] toml::de::Error),

    /// Preferences could not be encoded.
    #[error("preference file: {0}")]
    PreferenceEncode(#[from] toml::ser::Error),
}

/// Result type for placement operations.
pub type Result<T> = std::result::Result<T, PlaceError>;
