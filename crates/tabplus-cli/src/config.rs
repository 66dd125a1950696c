//! Optional TOML configuration file.
//!
//! ```toml
//! [tab]
//! diameter = 8.0
//! capsule = true
//!
//! [profile]
//! layer_height_0 = 0.3
//!
//! [brim]
//! reduce = 0.1
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tabplus_place::{ProfileValues, TabConfig};

/// Defaults for the `brim` subcommands. Flags win over these.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrimDefaults {
    pub layers: Option<u32>,
    pub reduce: Option<f64>,
    pub extruder: Option<u32>,
    pub lcd_feedback: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub tab: TabConfig,
    pub profile: ProfileValues,
    pub brim: BrimDefaults,
}

impl FileConfig {
    /// Read `path`, or the defaults when no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
