//! Creating and removing tabs.
//!
//! A tab is a small support mesh parented to the model it holds down. The
//! engine sizes it from the print profile, attaches it to the scene and
//! remembers its handle so the whole batch can be removed later.

use std::fmt;

use tabplus_math::{bed_point, Point3, Tolerance};
use tabplus_mesh::TabSolid;
use tracing::{debug, info, warn};

use crate::config::TabConfig;
use crate::error::{PlaceError, Result};
use crate::footprint::spaced_points;
use crate::profile::{
    tab_dimensions, PrintProfile, SettingScope, SUPPORT_INFILL_RATE, SUPPORT_MESH,
    SUPPORT_MESH_DROP_DOWN, SUPPORT_TYPE, SUPPORT_XY_DISTANCE,
};
use crate::scene::{NodeId, Scene, SceneNode};
use crate::value::SettingValue;

/// Name given to every tab node.
pub const TAB_NODE_NAME: &str = "RoundTab";

/// Angular step of generated tabs (degrees).
pub const TAB_ANGLE_STEP: f64 = 10.0;

/// Infill rates at or above this are treated as solid.
const SOLID_INFILL_RATE: i64 = 99;

/// A print setting the engine changed so tabs print correctly.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileNotice {
    /// Setting key.
    pub key: &'static str,
    /// Human-readable setting name.
    pub label: String,
    /// Container the new value was written to.
    pub scope: SettingScope,
    /// Value before the change, if there was one.
    pub old_value: Option<SettingValue>,
    /// Value written.
    pub new_value: SettingValue,
}

impl fmt::Display for ProfileNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modified profile parameter '{}'", self.label)?;
        if let Some(old) = &self.old_value {
            write!(f, " (was {old})")?;
        }
        write!(f, "\nNew value : {}", self.new_value)
    }
}

/// Places tabs and keeps track of the ones it created.
#[derive(Debug, Clone, Default)]
pub struct PlacementEngine {
    config: TabConfig,
    placed: Vec<NodeId>,
    notices: Vec<ProfileNotice>,
}

impl PlacementEngine {
    /// Engine using `config`.
    pub fn new(config: TabConfig) -> Self {
        Self {
            config,
            placed: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Current tab options.
    pub fn config(&self) -> &TabConfig {
        &self.config
    }

    /// Tab options, for editing.
    pub fn config_mut(&mut self) -> &mut TabConfig {
        &mut self.config
    }

    /// Tabs created since the last full removal.
    pub fn placed(&self) -> &[NodeId] {
        &self.placed
    }

    /// Take the profile notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<ProfileNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Build the solid for a tab whose origin sits `height` above the bed.
    pub fn tab_solid(&self, profile: &dyn PrintProfile, height: f64) -> Result<TabSolid> {
        let dims = tab_dimensions(profile, self.config.layer_count)?;
        Ok(TabSolid {
            shape: self.config.shape(),
            diameter: self.config.diameter,
            angle_step: TAB_ANGLE_STEP,
            height_below_pick: height,
            layer_height: dims.height,
            line_width: dims.line_width,
            layer_count: self.config.layer_count,
        })
    }

    /// Create one tab under `parent` at world `position`.
    pub fn place_one(
        &mut self,
        scene: &mut Scene,
        profile: &mut dyn PrintProfile,
        parent: NodeId,
        position: Point3,
    ) -> Result<NodeId> {
        if !scene.contains(parent) {
            return Err(PlaceError::UnknownNode);
        }
        let mesh = self.tab_solid(profile, position.y)?.build()?;

        let mut node = SceneNode::new(TAB_NODE_NAME);
        node.mesh = Some(mesh);
        node.selectable = true;
        node.sliceable = true;
        node.build_plate = scene.active_build_plate();
        node.settings.set(SUPPORT_MESH, true);
        node.settings.set(SUPPORT_MESH_DROP_DOWN, false);
        node.settings.set(SUPPORT_XY_DISTANCE, self.config.xy_offset);

        self.coerce_profile(profile);

        let id = scene.attach(node, parent, position)?;
        self.placed.push(id);
        scene.notify_changed(id);
        debug!(x = position.x, y = position.y, z = position.z, "Placed tab");
        Ok(id)
    }

    /// Place tabs along the footprint of every eligible model.
    ///
    /// Candidates are the selected models with their descendants, or the
    /// whole scene when nothing is selected. A model without a footprint
    /// is skipped. Returns the number of tabs placed.
    pub fn place_auto(&mut self, scene: &mut Scene, profile: &mut dyn PrintProfile) -> Result<usize> {
        let mut candidates = deep_selection(scene);
        if candidates.is_empty() {
            candidates = scene.depth_first();
        }

        let mut count = 0;
        for model in candidates {
            let Some(node) = scene.get(model) else {
                continue;
            };
            if !is_eligible(node) {
                continue;
            }
            let footprint = match node.footprint(self.config.adhesion_area) {
                Some(fp) if !fp.is_empty() => fp,
                _ => {
                    let err = PlaceError::MissingFootprint(node.name.clone());
                    warn!(error = %err, "Skipping model");
                    continue;
                }
            };
            let spots = spaced_points(footprint, self.config.min_spacing());
            debug!(model = %node.name, outline = footprint.points().len(), tabs = spots.len(), "Placing along footprint");
            for spot in spots {
                self.place_one(scene, profile, model, bed_point(&spot))?;
                count += 1;
            }
        }
        info!(count, "Automatic tab placement done");
        Ok(count)
    }

    /// Remove a single tab.
    ///
    /// A non-root parent is re-selected, the way deleting a child by hand
    /// leaves its model selected.
    pub fn remove_one(&mut self, scene: &mut Scene, node: NodeId) -> Result<()> {
        let parent = scene
            .get(node)
            .ok_or(PlaceError::UnknownNode)?
            .parent()
            .filter(|&p| p != scene.root());
        scene.remove(node)?;
        self.placed.retain(|&id| id != node);
        if let Some(parent) = parent {
            if !scene.is_selected(parent) {
                scene.select(parent);
            }
        }
        scene.notify_changed(node);
        Ok(())
    }

    /// Remove every tab created since the last full removal.
    ///
    /// With nothing tracked (e.g. after a project reload) the whole scene is
    /// scanned for support meshes instead. Returns the number removed.
    pub fn remove_all(&mut self, scene: &mut Scene) -> usize {
        let targets: Vec<NodeId> = if self.placed.is_empty() {
            scene
                .depth_first()
                .into_iter()
                .filter(|&id| {
                    scene
                        .get(id)
                        .is_some_and(|n| n.sliceable && n.settings.is_support_mesh())
                })
                .collect()
        } else {
            std::mem::take(&mut self.placed)
        };

        let mut removed = 0;
        for id in targets {
            let is_support = scene.get(id).is_some_and(|n| n.settings.is_support_mesh());
            if is_support && self.remove_one(scene, id).is_ok() {
                removed += 1;
            }
        }
        self.placed.clear();
        info!(removed, "Removed tabs");
        removed
    }

    /// Adjust profile settings that would stop tabs from printing.
    fn coerce_profile(&mut self, profile: &mut dyn PrintProfile) {
        let extruder = SettingScope::Extruder(0);
        let target = if profile.extruder_count() > 1 {
            SettingScope::Global
        } else {
            extruder
        };

        if self.config.capsule && !self.config.notices().support_type {
            let current = profile.value(SettingScope::Global, SUPPORT_TYPE);
            if current.as_ref().and_then(SettingValue::as_str) == Some("buildplate") {
                self.coerce(profile, SUPPORT_TYPE, SettingScope::Global, current, "everywhere".into());
                self.config.notices_mut().support_type = true;
            }
        }

        if !self.config.notices().xy_distance {
            let offset = self.config.xy_offset;
            let current = profile.value(extruder, SUPPORT_XY_DISTANCE);
            let matches = current
                .as_ref()
                .and_then(SettingValue::as_f64)
                .is_some_and(|v| Tolerance::DEFAULT.values_equal(v, offset));
            if !matches {
                self.coerce(profile, SUPPORT_XY_DISTANCE, target, current, offset.into());
                self.config.notices_mut().xy_distance = true;
            }
        }

        if self.config.layer_count > 1 && !self.config.notices().infill_rate {
            let current = profile.value(extruder, SUPPORT_INFILL_RATE);
            let rate = current.as_ref().and_then(SettingValue::as_i64).unwrap_or(0);
            if rate < SOLID_INFILL_RATE {
                self.coerce(profile, SUPPORT_INFILL_RATE, target, current, SettingValue::Int(100));
                self.config.notices_mut().infill_rate = true;
            }
        }
    }

    fn coerce(
        &mut self,
        profile: &mut dyn PrintProfile,
        key: &'static str,
        scope: SettingScope,
        old_value: Option<SettingValue>,
        new_value: SettingValue,
    ) {
        profile.set_value(scope, key, new_value.clone());
        let notice = ProfileNotice {
            key,
            label: profile.label(key).unwrap_or_else(|| key.to_string()),
            scope,
            old_value,
            new_value,
        };
        warn!(key, scope = ?notice.scope, new = %notice.new_value, "Adjusted print profile for tabs");
        self.notices.push(notice);
    }
}

/// Whether auto-placement may put tabs on `node`.
///
/// Only sliceable printed parts qualify: support, infill, anti-overhang
/// and cutting meshes never get tabs.
pub fn is_eligible(node: &SceneNode) -> bool {
    node.sliceable && !node.settings.is_modifier()
}

/// Selected nodes plus their descendants, keeping only nodes with geometry.
pub fn deep_selection(scene: &Scene) -> Vec<NodeId> {
    let mut out = Vec::new();
    for &selected in scene.selection() {
        let Some(node) = scene.get(selected) else {
            continue;
        };
        if !node.children().is_empty() {
            out.extend(scene.descendants(selected));
        }
        if node.mesh.is_some() {
            out.push(selected);
        }
    }
    out
}
