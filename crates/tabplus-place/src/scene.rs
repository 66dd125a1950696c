//! Scene graph arena.
//!
//! Nodes live in a slot map and refer to each other through [`NodeId`]
//! handles: a parent lists its children, a child names its parent, and
//! neither owns the other. Removed handles simply stop resolving.

use std::collections::{BTreeMap, VecDeque};

use slotmap::SlotMap;
use tabplus_math::Point3;
use tabplus_mesh::TriangleMesh;
use tracing::debug;

use crate::error::{PlaceError, Result};
use crate::footprint::Footprint;
use crate::profile::{ANTI_OVERHANG_MESH, CUTTING_MESH, INFILL_MESH, SUPPORT_MESH};
use crate::value::SettingValue;

slotmap::new_key_type! {
    /// Handle to a node in a [`Scene`].
    pub struct NodeId;
}

/// Per-object setting overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSettings {
    values: BTreeMap<String, SettingValue>,
}

impl NodeSettings {
    /// Override `key`.
    pub fn set(&mut self, key: &str, value: impl Into<SettingValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Override for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    /// Flag override for `key`; absent means `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(SettingValue::as_bool).unwrap_or(false)
    }

    /// Printed as support.
    pub fn is_support_mesh(&self) -> bool {
        self.flag(SUPPORT_MESH)
    }

    /// Any role that makes the object a modifier rather than a printed part.
    pub fn is_modifier(&self) -> bool {
        [SUPPORT_MESH, INFILL_MESH, ANTI_OVERHANG_MESH, CUTTING_MESH]
            .iter()
            .any(|key| self.flag(key))
    }
}

/// A node of the scene graph.
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Display name.
    pub name: String,
    /// World-space position.
    pub position: Point3,
    /// Geometry, if the node is a mesh.
    pub mesh: Option<TriangleMesh>,
    /// Per-object settings.
    pub settings: NodeSettings,
    /// Handed to the slicer.
    pub sliceable: bool,
    /// Can be clicked.
    pub selectable: bool,
    /// Build plate the node sits on.
    pub build_plate: usize,
    /// Convex hull on the bed.
    pub convex_hull: Option<Footprint>,
    /// Bed adhesion area (hull grown by brim/skirt).
    pub adhesion_area: Option<Footprint>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    /// A named, empty node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Point3::origin(),
            mesh: None,
            settings: NodeSettings::default(),
            sliceable: false,
            selectable: false,
            build_plate: 0,
            convex_hull: None,
            adhesion_area: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// A sliceable, selectable model with a convex-hull footprint.
    pub fn model(name: impl Into<String>, mesh: TriangleMesh, hull: Footprint) -> Self {
        Self {
            mesh: Some(mesh),
            sliceable: true,
            selectable: true,
            convex_hull: Some(hull),
            ..Self::new(name)
        }
    }

    /// Parent handle; `None` only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child handles in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Footprint used for auto-placement.
    pub fn footprint(&self, adhesion_area: bool) -> Option<&Footprint> {
        if adhesion_area {
            self.adhesion_area.as_ref()
        } else {
            self.convex_hull.as_ref()
        }
    }
}

/// Notifications for the host's renderer and slicer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    /// A node was attached.
    Added(NodeId),
    /// A node and its subtree were detached.
    Removed(NodeId),
    /// Something about the scene changed; re-slice.
    Changed(NodeId),
}

/// Notifications kept before the oldest are dropped.
pub const MAX_PENDING_EVENTS: usize = 4096;

/// Arena of scene nodes with a fixed root, a selection and an event queue.
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
    selection: Vec<NodeId>,
    events: VecDeque<SceneEvent>,
    active_build_plate: usize,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Scene holding only its root.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new("Root"));
        Self {
            nodes,
            root,
            selection: Vec::new(),
            events: VecDeque::new(),
            active_build_plate: 0,
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node behind `id`, if still alive.
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Mutable node behind `id`.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes, root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Only the root is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build plate new nodes are put on.
    pub fn active_build_plate(&self) -> usize {
        self.active_build_plate
    }

    /// Switch the active build plate.
    pub fn set_active_build_plate(&mut self, plate: usize) {
        self.active_build_plate = plate;
    }

    /// Add `node` under the root.
    pub fn add(&mut self, node: SceneNode) -> NodeId {
        let root = self.root;
        self.insert_child(node, root)
    }

    /// Add `node` as a child of `parent` at world `position`, as one step.
    ///
    /// Nothing is modified if `parent` is gone.
    pub fn attach(&mut self, mut node: SceneNode, parent: NodeId, position: Point3) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(PlaceError::UnknownNode);
        }
        node.position = position;
        Ok(self.insert_child(node, parent))
    }

    fn insert_child(&mut self, mut node: SceneNode, parent: NodeId) -> NodeId {
        node.parent = Some(parent);
        node.children.clear();
        let id = self.nodes.insert(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(id);
        }
        self.push_event(SceneEvent::Added(id));
        id
    }

    /// Move `node` under `parent`, keeping its world position.
    pub fn set_parent(&mut self, node: NodeId, parent: NodeId) -> Result<()> {
        if node == self.root {
            return Err(PlaceError::RootNode);
        }
        if !self.contains(node) || !self.contains(parent) {
            return Err(PlaceError::UnknownNode);
        }
        // Refuse cycles.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == node {
                return Err(PlaceError::Cycle);
            }
            cursor = self.nodes.get(id).and_then(|n| n.parent);
        }
        self.unlink(node);
        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = Some(parent);
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(node);
        }
        Ok(())
    }

    /// Detach and drop `node` with its whole subtree.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(PlaceError::RootNode);
        }
        if !self.contains(node) {
            return Err(PlaceError::UnknownNode);
        }
        self.unlink(node);
        let subtree = self.subtree(node);
        for id in &subtree {
            self.nodes.remove(*id);
        }
        self.selection.retain(|id| !subtree.contains(id));
        debug!(removed = subtree.len(), "Removed scene subtree");
        self.push_event(SceneEvent::Removed(node));
        Ok(())
    }

    fn unlink(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|&c| c != node);
            }
        }
    }

    fn subtree(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.get(id) {
                out.push(id);
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    /// Every node below the root, parents before children.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut all = self.subtree(self.root);
        all.remove(0);
        all
    }

    /// All descendants of `node`, depth first.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut all = self.subtree(node);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// Add `node` to the selection.
    pub fn select(&mut self, node: NodeId) {
        if self.contains(node) && !self.is_selected(node) {
            self.selection.push(node);
        }
    }

    /// Drop `node` from the selection.
    pub fn deselect(&mut self, node: NodeId) {
        self.selection.retain(|&id| id != node);
    }

    /// Empty the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// `node` is selected.
    pub fn is_selected(&self, node: NodeId) -> bool {
        self.selection.contains(&node)
    }

    /// Anything is selected.
    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Selected nodes in selection order.
    pub fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    /// Queue a change notification for `node`.
    pub fn notify_changed(&mut self, node: NodeId) {
        self.push_event(SceneEvent::Changed(node));
    }

    /// Take the queued notifications, oldest first.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain(..).collect()
    }

    /// Number of notifications waiting to be drained.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    fn push_event(&mut self, event: SceneEvent) {
        if self.events.len() == MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(scene: &Scene, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| scene.get(id).map(|n| n.name.clone()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_depth_first_order() {
        let mut scene = Scene::new();
        let a = scene.add(SceneNode::new("a"));
        let b = scene.add(SceneNode::new("b"));
        scene.attach(SceneNode::new("a1"), a, Point3::origin()).unwrap();
        let a2 = scene.attach(SceneNode::new("a2"), a, Point3::origin()).unwrap();
        scene.attach(SceneNode::new("a2x"), a2, Point3::origin()).unwrap();
        scene.attach(SceneNode::new("b1"), b, Point3::origin()).unwrap();

        assert_eq!(
            named(&scene, &scene.depth_first()),
            ["a", "a1", "a2", "a2x", "b", "b1"]
        );
        assert_eq!(named(&scene, &scene.descendants(a)), ["a1", "a2", "a2x"]);
        assert_eq!(scene.len(), 6);
    }

    #[test]
    fn test_remove_drops_subtree_and_selection() {
        let mut scene = Scene::new();
        let a = scene.add(SceneNode::new("a"));
        let child = scene.attach(SceneNode::new("c"), a, Point3::origin()).unwrap();
        scene.select(child);
        scene.drain_events();

        scene.remove(a).unwrap();
        assert!(!scene.contains(a));
        assert!(!scene.contains(child));
        assert!(!scene.has_selection());
        assert!(scene.is_empty());
        assert_eq!(scene.drain_events(), vec![SceneEvent::Removed(a)]);
        assert!(matches!(scene.remove(a), Err(PlaceError::UnknownNode)));
        assert!(matches!(scene.remove(scene.root()), Err(PlaceError::RootNode)));
    }

    #[test]
    fn test_attach_to_dead_parent_changes_nothing() {
        let mut scene = Scene::new();
        let a = scene.add(SceneNode::new("a"));
        scene.remove(a).unwrap();
        scene.drain_events();
        assert!(scene.attach(SceneNode::new("x"), a, Point3::origin()).is_err());
        assert!(scene.is_empty());
        assert!(scene.drain_events().is_empty());
    }

    #[test]
    fn test_set_parent_keeps_position_and_refuses_cycles() {
        let mut scene = Scene::new();
        let a = scene.add(SceneNode::new("a"));
        let b = scene.add(SceneNode::new("b"));
        let pos = Point3::new(1.0, 2.0, 3.0);
        let c = scene.attach(SceneNode::new("c"), a, pos).unwrap();

        scene.set_parent(c, b).unwrap();
        assert_eq!(scene.get(c).unwrap().parent(), Some(b));
        assert_eq!(scene.get(c).unwrap().position, pos);
        assert!(scene.get(a).unwrap().children().is_empty());
        assert!(scene.set_parent(b, c).is_err());
    }

    #[test]
    fn test_undrained_events_are_capped() {
        let mut scene = Scene::new();
        let a = scene.add(SceneNode::new("a"));
        for _ in 0..MAX_PENDING_EVENTS + 10 {
            scene.notify_changed(a);
        }
        assert_eq!(scene.pending_events(), MAX_PENDING_EVENTS);
        let events = scene.drain_events();
        // The Added event was the oldest and fell off the front.
        assert!(events.iter().all(|e| *e == SceneEvent::Changed(a)));
        assert_eq!(scene.pending_events(), 0);
    }

    #[test]
    fn test_node_roles() {
        let mut settings = NodeSettings::default();
        assert!(!settings.is_modifier());
        settings.set(CUTTING_MESH, true);
        assert!(settings.is_modifier());
        assert!(!settings.is_support_mesh());
        settings.set(SUPPORT_MESH, "true");
        assert!(settings.is_support_mesh());
    }
}
