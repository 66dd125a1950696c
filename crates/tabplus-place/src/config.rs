//! Tab configuration.

use serde::{Deserialize, Serialize};
use tabplus_mesh::TabShape;

use crate::error::Result;
use crate::prefs::{
    PreferenceStore, PREF_ADHESION_AREA, PREF_CAPSULE, PREF_DIAMETER, PREF_LAYER_COUNT,
    PREF_XY_OFFSET,
};

/// Which profile coercions have already been announced.
///
/// Each flag is cleared by the setter of the tab option the coercion
/// depends on, so editing that option re-arms the notice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoticeFlags {
    /// `support_type` forced to `everywhere`.
    pub support_type: bool,
    /// `support_xy_distance` aligned with the tab offset.
    pub xy_distance: bool,
    /// `support_infill_rate` forced to 100.
    pub infill_rate: bool,
}

/// User-editable tab options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabConfig {
    /// Tab diameter (mm).
    pub diameter: f64,
    /// Support-to-model XY distance written on each tab (mm).
    pub xy_offset: f64,
    /// Capsule tabs instead of plain cylinders.
    pub capsule: bool,
    /// Layer-count multiplier for the tab height.
    pub layer_count: u32,
    /// Sample the adhesion area instead of the convex hull.
    pub adhesion_area: bool,
    #[serde(skip)]
    notices: NoticeFlags,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            diameter: 10.0,
            xy_offset: 0.16,
            capsule: false,
            layer_count: 1,
            adhesion_area: false,
            notices: NoticeFlags::default(),
        }
    }
}

impl TabConfig {
    /// Read every option from `prefs`, falling back to the defaults.
    pub fn load(prefs: &dyn PreferenceStore) -> Self {
        let d = Self::default();
        let mut config = Self {
            diameter: prefs.get_f64(PREF_DIAMETER, d.diameter),
            xy_offset: prefs.get_f64(PREF_XY_OFFSET, d.xy_offset),
            capsule: prefs.get_bool(PREF_CAPSULE, d.capsule),
            layer_count: prefs.get_u32(PREF_LAYER_COUNT, d.layer_count),
            adhesion_area: prefs.get_bool(PREF_ADHESION_AREA, d.adhesion_area),
            notices: NoticeFlags::default(),
        };
        // A corrupt store must not yield an unusable tab.
        if !(config.diameter.is_finite() && config.diameter > 0.0) {
            config.diameter = d.diameter;
        }
        if config.layer_count == 0 {
            config.layer_count = d.layer_count;
        }
        config
    }

    /// Write every option to `prefs`.
    pub fn save(&self, prefs: &mut dyn PreferenceStore) -> Result<()> {
        prefs.set(PREF_DIAMETER, self.diameter.into())?;
        prefs.set(PREF_XY_OFFSET, self.xy_offset.into())?;
        prefs.set(PREF_CAPSULE, self.capsule.into())?;
        prefs.set(PREF_LAYER_COUNT, self.layer_count.into())?;
        prefs.set(PREF_ADHESION_AREA, self.adhesion_area.into())?;
        Ok(())
    }

    /// Set the diameter from user text. Rejects non-numbers and values `<= 0`.
    pub fn set_diameter(&mut self, text: &str) -> bool {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => {
                self.diameter = v;
                true
            }
            _ => false,
        }
    }

    /// Set the XY offset from user text. Rejects non-numbers and negative values.
    pub fn set_xy_offset(&mut self, text: &str) -> bool {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => {
                self.xy_offset = v;
                self.notices.xy_distance = false;
                true
            }
            _ => false,
        }
    }

    /// Set the layer-count multiplier from user text. Rejects values `< 1`.
    pub fn set_layer_count(&mut self, text: &str) -> bool {
        match text.trim().parse::<u32>() {
            Ok(v) if v >= 1 => {
                self.layer_count = v;
                self.notices.infill_rate = false;
                true
            }
            _ => false,
        }
    }

    /// Switch between capsule and cylinder tabs.
    pub fn set_capsule(&mut self, capsule: bool) {
        self.capsule = capsule;
        self.notices.support_type = false;
    }

    /// Choose the footprint polygon sampled by auto-placement.
    pub fn set_adhesion_area(&mut self, adhesion_area: bool) {
        self.adhesion_area = adhesion_area;
    }

    /// Shape of the generated tabs.
    pub fn shape(&self) -> TabShape {
        if self.capsule {
            TabShape::Capsule
        } else {
            TabShape::Pastille
        }
    }

    /// Minimum distance between auto-placed tabs.
    pub fn min_spacing(&self) -> f64 {
        self.diameter * 0.5
    }

    /// Announced coercions.
    pub fn notices(&self) -> &NoticeFlags {
        &self.notices
    }

    pub(crate) fn notices_mut(&mut self) -> &mut NoticeFlags {
        &mut self.notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferences;
    use crate::value::SettingValue;

    #[test]
    fn test_rejected_input_keeps_previous_value() {
        let mut config = TabConfig::default();
        assert!(!config.set_diameter("abc"));
        assert!(!config.set_diameter("0"));
        assert!(!config.set_diameter("-4"));
        assert_eq!(config.diameter, 10.0);
        assert!(config.set_diameter(" 7.5 "));
        assert_eq!(config.diameter, 7.5);

        assert!(!config.set_layer_count("0"));
        assert!(!config.set_layer_count("2.5"));
        assert!(config.set_layer_count("3"));
        assert_eq!(config.layer_count, 3);

        assert!(!config.set_xy_offset("-0.1"));
        assert!(config.set_xy_offset("0.2"));
    }

    #[test]
    fn test_setters_rearm_notices() {
        let mut config = TabConfig::default();
        *config.notices_mut() = NoticeFlags {
            support_type: true,
            xy_distance: true,
            infill_rate: true,
        };

        config.set_capsule(true);
        assert!(!config.notices().support_type);
        assert!(config.notices().xy_distance);

        config.set_xy_offset("0.3");
        assert!(!config.notices().xy_distance);

        // Rejected input does not touch the flag.
        config.set_layer_count("nope");
        assert!(config.notices().infill_rate);
        config.set_layer_count("2");
        assert!(!config.notices().infill_rate);
    }

    #[test]
    fn test_load_and_save() {
        let mut prefs = MemoryPreferences::new();
        assert_eq!(TabConfig::load(&prefs), TabConfig::default());

        let mut config = TabConfig::default();
        config.set_diameter("6");
        config.set_capsule(true);
        config.save(&mut prefs).unwrap();
        assert_eq!(TabConfig::load(&prefs), config);

        prefs.set(PREF_DIAMETER, SettingValue::Float(-1.0)).unwrap();
        assert_eq!(TabConfig::load(&prefs).diameter, 10.0);
    }
}
