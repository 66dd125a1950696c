//! Access to the slicer's print profile.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{PlaceError, Result};
use crate::value::SettingValue;

/// First layer height (mm).
pub const LAYER_HEIGHT_0: &str = "layer_height_0";
/// Regular layer height (mm).
pub const LAYER_HEIGHT: &str = "layer_height";
/// Extrusion line width (mm).
pub const LINE_WIDTH: &str = "line_width";
/// Where supports may start: `buildplate` or `everywhere`.
pub const SUPPORT_TYPE: &str = "support_type";
/// Horizontal gap between support and model (mm).
pub const SUPPORT_XY_DISTANCE: &str = "support_xy_distance";
/// Support infill density (%).
pub const SUPPORT_INFILL_RATE: &str = "support_infill_rate";
/// Object is printed as support.
pub const SUPPORT_MESH: &str = "support_mesh";
/// Support mesh is extended down to the plate.
pub const SUPPORT_MESH_DROP_DOWN: &str = "support_mesh_drop_down";
/// Object modifies infill of other meshes.
pub const INFILL_MESH: &str = "infill_mesh";
/// Object blocks support.
pub const ANTI_OVERHANG_MESH: &str = "anti_overhang_mesh";
/// Object cuts other meshes.
pub const CUTTING_MESH: &str = "cutting_mesh";

/// Extra thickness given to the tab's first layer.
const FIRST_LAYER_FACTOR: f64 = 1.2;
/// Extra width given to the capsule's flange lines.
const LINE_WIDTH_FACTOR: f64 = 1.2;

/// Which settings container a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingScope {
    /// Machine-wide (global stack).
    Global,
    /// A single extruder, zero-based.
    Extruder(usize),
}

/// The host's print settings.
pub trait PrintProfile {
    /// Number of extruders on the machine.
    fn extruder_count(&self) -> usize;

    /// Current value of `key` in `scope`.
    fn value(&self, scope: SettingScope, key: &str) -> Option<SettingValue>;

    /// Overwrite `key` in `scope`.
    fn set_value(&mut self, scope: SettingScope, key: &str, value: SettingValue);

    /// Human-readable label of `key`.
    fn label(&self, key: &str) -> Option<String>;

    /// Whether `key` is enabled for the current machine.
    fn is_enabled(&self, key: &str) -> bool;

    /// Numeric value of `key` in `scope`.
    fn float(&self, scope: SettingScope, key: &str) -> Option<f64> {
        self.value(scope, key).and_then(|v| v.as_f64())
    }
}

/// Thickness and line width of a tab, derived from the profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TabDimensions {
    /// Tab thickness (mm).
    pub height: f64,
    /// Line width used for the capsule flange (mm).
    pub line_width: f64,
}

/// Size a tab from the first extruder's settings.
///
/// Height is `layer_height_0 * 1.2 + layer_height * (layer_count - 1)`.
pub fn tab_dimensions(profile: &dyn PrintProfile, layer_count: u32) -> Result<TabDimensions> {
    let scope = SettingScope::Extruder(0);
    let read = |key: &'static str| {
        profile
            .float(scope, key)
            .ok_or(PlaceError::MissingSetting(key))
    };
    let first = read(LAYER_HEIGHT_0)?;
    let layer = read(LAYER_HEIGHT)?;
    let line_width = read(LINE_WIDTH)?;
    let extra_layers = f64::from(layer_count.saturating_sub(1));
    Ok(TabDimensions {
        height: first * FIRST_LAYER_FACTOR + layer * extra_layers,
        line_width: line_width * LINE_WIDTH_FACTOR,
    })
}

/// Extruder-level print values used to seed a [`MemoryProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileValues {
    /// Number of extruders.
    pub extruder_count: usize,
    /// First layer height (mm).
    pub layer_height_0: f64,
    /// Layer height (mm).
    pub layer_height: f64,
    /// Line width (mm).
    pub line_width: f64,
    /// `buildplate` or `everywhere`.
    pub support_type: String,
    /// Support XY distance (mm).
    pub support_xy_distance: f64,
    /// Support infill density (%).
    pub support_infill_rate: f64,
}

impl Default for ProfileValues {
    fn default() -> Self {
        Self {
            extruder_count: 1,
            layer_height_0: 0.2,
            layer_height: 0.2,
            line_width: 0.4,
            support_type: "buildplate".into(),
            support_xy_distance: 0.7,
            support_infill_rate: 15.0,
        }
    }
}

/// In-memory profile for tests and the command line.
#[derive(Debug, Clone)]
pub struct MemoryProfile {
    global: BTreeMap<String, SettingValue>,
    extruders: Vec<BTreeMap<String, SettingValue>>,
    labels: BTreeMap<String, String>,
    disabled: BTreeSet<String>,
}

impl MemoryProfile {
    /// Build a profile from `values`.
    ///
    /// Extruder-level values are copied into every extruder.
    pub fn new(values: &ProfileValues) -> Self {
        let mut extruder = BTreeMap::new();
        for (key, value) in [
            (LAYER_HEIGHT_0, values.layer_height_0),
            (LAYER_HEIGHT, values.layer_height),
            (LINE_WIDTH, values.line_width),
            (SUPPORT_XY_DISTANCE, values.support_xy_distance),
            (SUPPORT_INFILL_RATE, values.support_infill_rate),
        ] {
            extruder.insert(key.to_string(), SettingValue::Float(value));
        }

        let mut global = extruder.clone();
        global.insert(SUPPORT_TYPE.into(), values.support_type.as_str().into());

        let labels = [
            (SUPPORT_TYPE, "Support Placement"),
            (SUPPORT_XY_DISTANCE, "Support X/Y Distance"),
            (SUPPORT_INFILL_RATE, "Support Density"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            global,
            extruders: vec![extruder; values.extruder_count.max(1)],
            labels,
            disabled: BTreeSet::new(),
        }
    }

    /// Mark `key` as enabled or disabled.
    pub fn set_enabled(&mut self, key: &str, enabled: bool) {
        if enabled {
            self.disabled.remove(key);
        } else {
            self.disabled.insert(key.to_string());
        }
    }

    fn container(&self, scope: SettingScope) -> Option<&BTreeMap<String, SettingValue>> {
        match scope {
            SettingScope::Global => Some(&self.global),
            SettingScope::Extruder(i) => self.extruders.get(i),
        }
    }
}

impl Default for MemoryProfile {
    fn default() -> Self {
        Self::new(&ProfileValues::default())
    }
}

impl PrintProfile for MemoryProfile {
    fn extruder_count(&self) -> usize {
        self.extruders.len()
    }

    fn value(&self, scope: SettingScope, key: &str) -> Option<SettingValue> {
        self.container(scope)?.get(key).cloned()
    }

    fn set_value(&mut self, scope: SettingScope, key: &str, value: SettingValue) {
        let container = match scope {
            SettingScope::Global => Some(&mut self.global),
            SettingScope::Extruder(i) => self.extruders.get_mut(i),
        };
        if let Some(container) = container {
            container.insert(key.to_string(), value);
        }
    }

    fn label(&self, key: &str) -> Option<String> {
        self.labels.get(key).cloned()
    }

    fn is_enabled(&self, key: &str) -> bool {
        !self.disabled.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tab_dimensions() {
        let profile = MemoryProfile::new(&ProfileValues {
            layer_height_0: 0.3,
            layer_height: 0.2,
            line_width: 0.4,
            ..Default::default()
        });
        let single = tab_dimensions(&profile, 1).unwrap();
        assert_relative_eq!(single.height, 0.36, epsilon = 1e-12);
        assert_relative_eq!(single.line_width, 0.48, epsilon = 1e-12);
        let triple = tab_dimensions(&profile, 3).unwrap();
        assert_relative_eq!(triple.height, 0.76, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_setting_is_reported() {
        let mut profile = MemoryProfile::default();
        profile.set_value(SettingScope::Extruder(0), LINE_WIDTH, "wide".into());
        assert!(matches!(
            tab_dimensions(&profile, 1),
            Err(PlaceError::MissingSetting(LINE_WIDTH))
        ));
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut profile = MemoryProfile::new(&ProfileValues {
            extruder_count: 2,
            ..Default::default()
        });
        profile.set_value(SettingScope::Global, SUPPORT_INFILL_RATE, 100.0.into());
        assert_eq!(profile.float(SettingScope::Global, SUPPORT_INFILL_RATE), Some(100.0));
        assert_eq!(profile.float(SettingScope::Extruder(1), SUPPORT_INFILL_RATE), Some(15.0));
        assert_eq!(profile.value(SettingScope::Extruder(5), LAYER_HEIGHT), None);
        assert_eq!(profile.extruder_count(), 2);
    }

    #[test]
    fn test_enabled_flags() {
        let mut profile = MemoryProfile::default();
        assert!(profile.is_enabled(SUPPORT_MESH));
        profile.set_enabled(SUPPORT_MESH, false);
        assert!(!profile.is_enabled(SUPPORT_MESH));
    }
}
