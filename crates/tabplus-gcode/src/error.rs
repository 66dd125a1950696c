//! Error types for G-code rewriting.

use thiserror::Error;

use crate::line::Axis;

/// Errors that can occur while rewriting G-code.
#[derive(Error, Debug)]
pub enum GcodeError {
    /// An axis letter is present but not followed by a number.
    #[error("malformed {axis} coordinate in {text:?}")]
    MalformedCoordinate {
        /// Axis whose value failed to parse.
        axis: Axis,
        /// The offending line.
        text: String,
    },

    /// A required axis is absent.
    #[error("missing {axis} coordinate in {text:?}")]
    MissingAxis {
        /// Axis that was required.
        axis: Axis,
        /// The offending line.
        text: String,
    },

    /// Error located in the document.
    #[error("block {block}, line {line}: {source}")]
    At {
        /// Block (layer) index in the document.
        block: usize,
        /// Line index within the block.
        line: usize,
        /// Underlying error.
        #[source]
        source: Box<GcodeError>,
    },

    /// Invalid rewrite settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl GcodeError {
    /// Attach a document location to this error.
    pub fn at(self, block: usize, line: usize) -> Self {
        match self {
            located @ GcodeError::At { .. } => located,
            other => GcodeError::At {
                block,
                line,
                source: Box::new(other),
            },
        }
    }
}

/// Result type for G-code operations.
pub type Result<T> = std::result::Result<T, GcodeError>;
