//! Brim rewrite settings.

use serde::{Deserialize, Serialize};

use crate::error::{GcodeError, Result};

/// Smallest accepted brim height reduction (mm).
pub const MIN_REDUCE: f64 = 0.06;

/// Largest accepted brim height reduction (mm).
pub const MAX_REDUCE: f64 = 0.3;

/// Settings for replaying the first-layer brim on the following layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateSettings {
    /// Number of layers after layer 0 that receive a brim replay.
    pub layers: u32,
}

impl Default for DuplicateSettings {
    fn default() -> Self {
        Self { layers: 1 }
    }
}

/// Settings for squashing the brim to a lower first-layer height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressSettings {
    /// Height the brim is printed at (mm).
    pub reduce: f64,
    /// Nominal first-layer height of the print (mm).
    pub layer_height_0: f64,
    /// 1-based extruder whose skirt is compressed.
    pub extruder: u32,
    /// Emit `M117` progress messages.
    pub lcd_feedback: bool,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            reduce: 0.08,
            layer_height_0: 0.2,
            extruder: 1,
            lcd_feedback: false,
        }
    }
}

impl CompressSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_REDUCE..=MAX_REDUCE).contains(&self.reduce) {
            return Err(GcodeError::InvalidSettings(format!(
                "reduce must be between {MIN_REDUCE} and {MAX_REDUCE}mm, got {}",
                self.reduce
            )));
        }
        if !(self.layer_height_0.is_finite() && self.layer_height_0 > 0.0) {
            return Err(GcodeError::InvalidSettings(
                "layer_height_0 must be positive".into(),
            ));
        }
        if self.reduce > self.layer_height_0 {
            return Err(GcodeError::InvalidSettings(format!(
                "reduce {} exceeds first layer height {}",
                self.reduce, self.layer_height_0
            )));
        }
        if self.extruder == 0 {
            return Err(GcodeError::InvalidSettings(
                "extruder is 1-based".into(),
            ));
        }
        Ok(())
    }

    /// Flow percentage that keeps the brim volume constant at the reduced height.
    pub fn flow_percent(&self) -> u32 {
        (self.reduce / self.layer_height_0 * 100.0).round() as u32
    }

    /// Zero-based tool index matching `T<n>` commands.
    pub fn tool(&self) -> u32 {
        self.extruder.saturating_sub(1)
    }
}

/// Which brim rewrite to run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BrimMode {
    /// Replay the layer-0 brim on the next layers.
    Duplicate(DuplicateSettings),
    /// Print the brim lower with scaled flow.
    Compress(CompressSettings),
}

impl BrimMode {
    /// Validate the settings for this mode.
    pub fn validate(&self) -> Result<()> {
        match self {
            BrimMode::Duplicate(_) => Ok(()),
            BrimMode::Compress(settings) => settings.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_percent() {
        let settings = CompressSettings {
            reduce: 0.08,
            layer_height_0: 0.2,
            ..Default::default()
        };
        assert_eq!(settings.flow_percent(), 40);
        let settings = CompressSettings {
            reduce: 0.1,
            layer_height_0: 0.3,
            ..Default::default()
        };
        assert_eq!(settings.flow_percent(), 33);
    }

    #[test]
    fn test_validate_bounds() {
        assert!(CompressSettings::default().validate().is_ok());
        for bad in [
            CompressSettings { reduce: 0.05, ..Default::default() },
            CompressSettings { reduce: 0.31, ..Default::default() },
            CompressSettings { layer_height_0: 0.0, ..Default::default() },
            CompressSettings { reduce: 0.25, layer_height_0: 0.2, ..Default::default() },
            CompressSettings { extruder: 0, ..Default::default() },
        ] {
            assert!(bad.validate().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_mode_from_toml() {
        let mode: BrimMode = toml::from_str(
            r#"
            mode = "compress"
            reduce = 0.1
            layer_height_0 = 0.3
            extruder = 2
            "#,
        )
        .unwrap();
        let BrimMode::Compress(settings) = mode else {
            panic!("expected compress mode");
        };
        assert_eq!(settings.tool(), 1);
        assert!(!settings.lcd_feedback);
        assert!(mode.validate().is_ok());

        let mode: BrimMode = toml::from_str("mode = \"duplicate\"\nlayers = 3").unwrap();
        assert_eq!(mode, BrimMode::Duplicate(DuplicateSettings { layers: 3 }));
    }
}
