#![warn(missing_docs)]

//! Brim/skirt post-processing for sliced G-code.
//!
//! Works on Cura-style output split into per-layer blocks. Two rewrites are
//! available:
//!
//! - **Duplicate**: replay the layer-0 brim on the next few layers.
//! - **Compress**: print the layer-0 brim lower, with scaled flow.
//!
//! Rewrites are transactional: the document is only modified once the whole
//! pass has succeeded.
//!
//! # Example
//!
//! ```
//! use tabplus_gcode::{rewrite_text, BrimMode, CompressSettings};
//!
//! let gcode = ";LAYER:0\nG0 F6000 X10 Y10 Z0.2\n;TYPE:SKIRT\nG1 F1200 X20 Y10 E0.5\n;TYPE:WALL-OUTER\nG1 X30 Y10 E1.0";
//! let mode = BrimMode::Compress(CompressSettings::default());
//! let (out, report) = rewrite_text(gcode, &mode).unwrap();
//! assert!(out.contains("M221 S40"));
//! assert_eq!(report.sections_compressed, 1);
//! ```

pub mod compress;
pub mod document;
pub mod duplicate;
pub mod error;
pub mod line;
pub mod rewrite;
pub mod settings;

pub use compress::CompressRewriter;
pub use document::GcodeDocument;
pub use duplicate::{DuplicateRewriter, BEGIN_MARKER, END_MARKER};
pub use error::{GcodeError, Result};
pub use line::{Axis, ExtrusionMode, Line, LineKind, Motion};
pub use rewrite::{rewrite, rewrite_text, BlockRewriter, BlockWriter, RewriteReport};
pub use settings::{BrimMode, CompressSettings, DuplicateSettings};
