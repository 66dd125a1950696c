//! Persistent key-value preferences.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::value::SettingValue;

/// Tab diameter (mm).
pub const PREF_DIAMETER: &str = "tabplus/diameter";
/// Support-to-model XY distance applied to tabs (mm).
pub const PREF_XY_OFFSET: &str = "tabplus/xy_offset";
/// Generate capsules instead of plain cylinders.
pub const PREF_CAPSULE: &str = "tabplus/capsule";
/// Sample the adhesion area instead of the convex hull.
pub const PREF_ADHESION_AREA: &str = "tabplus/adhesion_area";
/// Layer-count multiplier.
pub const PREF_LAYER_COUNT: &str = "tabplus/layer_count";

/// A typed key-value store that survives restarts.
pub trait PreferenceStore {
    /// Raw value for `key`.
    fn get(&self, key: &str) -> Option<SettingValue>;

    /// Store `value` under `key`.
    fn set(&mut self, key: &str, value: SettingValue) -> Result<()>;

    /// Real value for `key`, or `default` when absent or not numeric.
    fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    /// Flag for `key`, or `default`.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    /// Non-negative integer for `key`, or `default`.
    fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(|v| v.as_i64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    }
}

/// Preferences held in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: BTreeMap<String, SettingValue>,
}

impl MemoryPreferences {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: SettingValue) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Preferences stored in a TOML file, rewritten on every change.
#[derive(Debug, Clone)]
pub struct TomlPreferences {
    path: PathBuf,
    values: BTreeMap<String, SettingValue>,
}

impl TomlPreferences {
    /// Load `path`; a missing file starts an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = values.len(), "Loaded preferences");
        Ok(Self { path, values })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        let text = toml::to_string(&self.values)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl PreferenceStore for TomlPreferences {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: SettingValue) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.save()
    }
}
