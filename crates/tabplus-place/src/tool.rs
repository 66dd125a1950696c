//! The interactive tab tool.
//!
//! [`TabTool`] is the surface a host registers: editable properties backed
//! by a [`PreferenceStore`], pointer handling for click-to-place and
//! click-to-delete, and the two batch commands.

use serde::Serialize;
use tabplus_math::Point3;
use tracing::debug;

use crate::config::TabConfig;
use crate::error::Result;
use crate::placement::PlacementEngine;
use crate::prefs::{
    PreferenceStore, PREF_ADHESION_AREA, PREF_CAPSULE, PREF_DIAMETER, PREF_LAYER_COUNT,
    PREF_XY_OFFSET,
};
use crate::profile::{PrintProfile, ANTI_OVERHANG_MESH, INFILL_MESH, SUPPORT_MESH};
use crate::scene::{NodeId, Scene};

/// Resolves screen coordinates against the rendered scene.
pub trait Picker {
    /// Node under the cursor.
    fn node_at(&self, x: f64, y: f64) -> Option<NodeId>;

    /// World position of the surface under the cursor.
    fn world_position_at(&self, x: f64, y: f64) -> Option<Point3>;
}

/// Mouse button of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    /// Primary button.
    Left,
    /// Wheel button.
    Middle,
    /// Secondary button.
    Right,
}

/// A pointer press in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Horizontal screen coordinate.
    pub x: f64,
    /// Vertical screen coordinate.
    pub y: f64,
    /// Pressed button.
    pub button: MouseButton,
    /// Ctrl modifier held.
    pub ctrl: bool,
}

impl PointerEvent {
    /// Plain left click.
    pub fn left(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            button: MouseButton::Left,
            ctrl: false,
        }
    }
}

/// What a pointer press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// Not handled by the tool.
    Ignored,
    /// Swallowed without effect (re-selection click).
    Consumed,
    /// The host should switch to its translate tool.
    SwitchToTranslate,
    /// A tab was deleted.
    Removed(NodeId),
    /// A tab was created.
    Placed(NodeId),
}

/// Snapshot of the tool's live properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolProperties {
    /// Tab diameter (mm).
    pub diameter: f64,
    /// XY offset (mm).
    pub xy_offset: f64,
    /// Capsule tabs.
    pub capsule: bool,
    /// Layer-count multiplier.
    pub layer_count: u32,
    /// Footprint source.
    pub adhesion_area: bool,
    /// Label of the removal action.
    pub action_label: &'static str,
}

/// Tab tool state.
#[derive(Debug)]
pub struct TabTool<P: PreferenceStore> {
    engine: PlacementEngine,
    prefs: P,
    had_selection: bool,
    skip_press: bool,
    enabled: bool,
}

impl<P: PreferenceStore> TabTool<P> {
    /// Tool configured from `prefs`.
    pub fn new(prefs: P) -> Self {
        let config = TabConfig::load(&prefs);
        debug!(?config, "Tab tool created");
        Self {
            engine: PlacementEngine::new(config),
            prefs,
            had_selection: false,
            skip_press: false,
            enabled: true,
        }
    }

    /// Placement engine.
    pub fn engine(&self) -> &PlacementEngine {
        &self.engine
    }

    /// Placement engine, for taking notices.
    pub fn engine_mut(&mut self) -> &mut PlacementEngine {
        &mut self.engine
    }

    /// Backing preference store.
    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    fn config(&self) -> &TabConfig {
        self.engine.config()
    }

    /// Tab diameter (mm).
    pub fn diameter(&self) -> f64 {
        self.config().diameter
    }

    /// Set and persist the diameter. `Ok(false)` when the text is rejected.
    pub fn set_diameter(&mut self, text: &str) -> Result<bool> {
        if !self.engine.config_mut().set_diameter(text) {
            return Ok(false);
        }
        self.prefs.set(PREF_DIAMETER, self.diameter().into())?;
        Ok(true)
    }

    /// XY offset (mm).
    pub fn xy_offset(&self) -> f64 {
        self.config().xy_offset
    }

    /// Set and persist the XY offset. `Ok(false)` when the text is rejected.
    pub fn set_xy_offset(&mut self, text: &str) -> Result<bool> {
        if !self.engine.config_mut().set_xy_offset(text) {
            return Ok(false);
        }
        self.prefs.set(PREF_XY_OFFSET, self.xy_offset().into())?;
        Ok(true)
    }

    /// Capsule tabs.
    pub fn capsule(&self) -> bool {
        self.config().capsule
    }

    /// Set and persist the capsule flag.
    pub fn set_capsule(&mut self, capsule: bool) -> Result<()> {
        self.engine.config_mut().set_capsule(capsule);
        self.prefs.set(PREF_CAPSULE, capsule.into())
    }

    /// Layer-count multiplier.
    pub fn layer_count(&self) -> u32 {
        self.config().layer_count
    }

    /// Set and persist the layer count. `Ok(false)` when the text is rejected.
    pub fn set_layer_count(&mut self, text: &str) -> Result<bool> {
        if !self.engine.config_mut().set_layer_count(text) {
            return Ok(false);
        }
        self.prefs.set(PREF_LAYER_COUNT, self.layer_count().into())?;
        Ok(true)
    }

    /// Footprint source for auto-placement.
    pub fn adhesion_area(&self) -> bool {
        self.config().adhesion_area
    }

    /// Set and persist the footprint source.
    pub fn set_adhesion_area(&mut self, adhesion_area: bool) -> Result<()> {
        self.engine.config_mut().set_adhesion_area(adhesion_area);
        self.prefs.set(PREF_ADHESION_AREA, adhesion_area.into())
    }

    /// `Remove Last` once a tab was placed, `Remove All` otherwise.
    pub fn action_label(&self) -> &'static str {
        if self.engine.placed().is_empty() {
            "Remove All"
        } else {
            "Remove Last"
        }
    }

    /// All properties at once.
    pub fn properties(&self) -> ToolProperties {
        ToolProperties {
            diameter: self.diameter(),
            xy_offset: self.xy_offset(),
            capsule: self.capsule(),
            layer_count: self.layer_count(),
            adhesion_area: self.adhesion_area(),
            action_label: self.action_label(),
        }
    }

    /// Whether pointer input is handled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Follow the machine's support-mesh capability.
    pub fn update_enabled(&mut self, profile: &dyn PrintProfile) {
        self.enabled = profile.is_enabled(SUPPORT_MESH);
    }

    /// Record the selection state once the host's selection has settled.
    ///
    /// Losing the selection arms a skip so the next click only re-selects.
    pub fn on_selection_settled(&mut self, has_selection: bool) {
        self.skip_press = self.had_selection && !has_selection;
        self.had_selection = has_selection;
    }

    /// Handle a pointer press.
    pub fn on_pointer_press(
        &mut self,
        scene: &mut Scene,
        profile: &mut dyn PrintProfile,
        picker: &dyn Picker,
        event: PointerEvent,
    ) -> Result<PointerOutcome> {
        if event.button != MouseButton::Left || !self.enabled {
            return Ok(PointerOutcome::Ignored);
        }
        if event.ctrl {
            return Ok(PointerOutcome::SwitchToTranslate);
        }
        if self.skip_press {
            self.skip_press = false;
            return Ok(PointerOutcome::Consumed);
        }

        let Some(picked) = picker.node_at(event.x, event.y) else {
            return Ok(PointerOutcome::Ignored);
        };
        let Some(node) = scene.get(picked) else {
            return Ok(PointerOutcome::Ignored);
        };
        if node.settings.is_support_mesh() {
            self.engine.remove_one(scene, picked)?;
            return Ok(PointerOutcome::Removed(picked));
        }
        if node.settings.flag(ANTI_OVERHANG_MESH) || node.settings.flag(INFILL_MESH) {
            return Ok(PointerOutcome::Ignored);
        }

        let Some(position) = picker.world_position_at(event.x, event.y) else {
            return Ok(PointerOutcome::Ignored);
        };
        let tab = self.engine.place_one(scene, profile, picked, position)?;
        Ok(PointerOutcome::Placed(tab))
    }

    /// Place tabs along every eligible footprint.
    pub fn place_auto(&mut self, scene: &mut Scene, profile: &mut dyn PrintProfile) -> Result<usize> {
        self.engine.place_auto(scene, profile)
    }

    /// Remove every placed tab.
    pub fn remove_all(&mut self, scene: &mut Scene) -> usize {
        self.engine.remove_all(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferences;
    use crate::profile::MemoryProfile;

    #[test]
    fn test_setters_persist_accepted_values_only() {
        let mut tool = TabTool::new(MemoryPreferences::new());
        assert!(!tool.set_diameter("-1").unwrap());
        assert_eq!(tool.prefs().get(PREF_DIAMETER), None);

        assert!(tool.set_diameter("6").unwrap());
        assert!(tool.set_layer_count("2").unwrap());
        tool.set_capsule(true).unwrap();
        assert_eq!(tool.prefs().get_f64(PREF_DIAMETER, 0.0), 6.0);
        assert_eq!(tool.prefs().get_u32(PREF_LAYER_COUNT, 0), 2);
        assert!(tool.prefs().get_bool(PREF_CAPSULE, false));

        // A new tool picks the stored values up.
        let reloaded = TabTool::new(tool.prefs().clone());
        let props = reloaded.properties();
        assert_eq!(props.diameter, 6.0);
        assert_eq!(props.layer_count, 2);
        assert!(props.capsule);
        assert_eq!(props.action_label, "Remove All");
    }

    #[test]
    fn test_enablement_follows_support_mesh() {
        let mut tool = TabTool::new(MemoryPreferences::new());
        let mut profile = MemoryProfile::default();
        profile.set_enabled(SUPPORT_MESH, false);
        tool.update_enabled(&profile);
        assert!(!tool.is_enabled());
        profile.set_enabled(SUPPORT_MESH, true);
        tool.update_enabled(&profile);
        assert!(tool.is_enabled());
    }

    #[test]
    fn test_selection_loss_arms_skip() {
        let mut tool = TabTool::new(MemoryPreferences::new());
        tool.on_selection_settled(true);
        assert!(!tool.skip_press);
        tool.on_selection_settled(false);
        assert!(tool.skip_press);
        tool.on_selection_settled(true);
        assert!(!tool.skip_press);
    }
}
