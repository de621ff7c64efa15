// ==============================================================================
// rig.rs — BIKE RIG (MINIMAL TRANSFORM HIERARCHY)
// ------------------------------------------------------------------------------
// The visual/kinematic skeleton of the bike: a flat arena of named nodes, each
// holding a local isometry relative to its parent. World transforms are
// composed on demand by walking up the parent chain.
//
// Typical layout:
//   bike (follows the rigid body)
//   └─ rotator (heading + ground alignment)
//      └─ wheelie pivot ─ stoppie pivot ─ lean
//         ├─ steering ─ front suspension ─ front wheel
//         └─ rear suspension (swing arm) ─ rear wheel
//
// Features never own nodes; they keep NodeId handles resolved by name once at
// initialization.
// ==============================================================================

use nalgebra::{Isometry3, Translation3};
use serde::Deserialize;

use crate::dynamics::types::{Pos3, Quat, Vec3, angle_axis, world_forward, world_right, world_up};
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Declarative node description (config side).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler angles in degrees, applied as roll (x), pitch (y), yaw (z).
    #[serde(default)]
    pub rotation_deg: [f32; 3],
}

impl NodeSpec {
    pub fn new(name: &str, parent: Option<&str>, position: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            position,
            rotation_deg: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    local: Isometry3<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct BikeRig {
    nodes: Vec<Node>,
}

impl BikeRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a rig from specs. Parents must be declared before children.
    pub fn from_specs(specs: &[NodeSpec]) -> Result<Self> {
        let mut rig = Self::new();
        for spec in specs {
            if rig.find(&spec.name).is_some() {
                return Err(ConfigError::DuplicateNode { name: spec.name.clone() });
            }
            let parent = match &spec.parent {
                Some(p) => Some(rig.find(p).ok_or_else(|| ConfigError::UnknownParent {
                    node: spec.name.clone(),
                    parent: p.clone(),
                })?),
                None => None,
            };
            let [rx, ry, rz] = spec.rotation_deg;
            let rotation = Quat::from_euler_angles(rx.to_radians(), ry.to_radians(), rz.to_radians());
            rig.add_node(&spec.name, parent, Vec3::from(spec.position), rotation);
        }
        Ok(rig)
    }

    pub fn add_node(&mut self, name: &str, parent: Option<NodeId>, position: Vec3, rotation: Quat) -> NodeId {
        self.nodes.push(Node {
            name: name.to_string(),
            parent,
            local: Isometry3::from_parts(Translation3::from(position), rotation),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    /// Resolves a node by name, reporting which owner/field wanted it.
    pub fn resolve(&self, owner: &'static str, field: &'static str, name: &str) -> Result<NodeId> {
        self.find(name).ok_or_else(|| ConfigError::MissingNode {
            owner,
            field,
            name: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ------------------------------------------------------------------
    // Local space
    // ------------------------------------------------------------------

    pub fn local_position(&self, id: NodeId) -> Vec3 {
        self.nodes[id.0].local.translation.vector
    }

    pub fn set_local_position(&mut self, id: NodeId, position: Vec3) {
        self.nodes[id.0].local.translation = Translation3::from(position);
    }

    pub fn local_rotation(&self, id: NodeId) -> Quat {
        self.nodes[id.0].local.rotation
    }

    pub fn set_local_rotation(&mut self, id: NodeId, rotation: Quat) {
        self.nodes[id.0].local.rotation = rotation;
    }

    // ------------------------------------------------------------------
    // World space
    // ------------------------------------------------------------------

    pub fn world(&self, id: NodeId) -> Isometry3<f32> {
        let node = &self.nodes[id.0];
        match node.parent {
            Some(p) => self.world(p) * node.local,
            None => node.local,
        }
    }

    fn parent_world(&self, id: NodeId) -> Isometry3<f32> {
        self.nodes[id.0]
            .parent
            .map(|p| self.world(p))
            .unwrap_or_else(Isometry3::identity)
    }

    pub fn position(&self, id: NodeId) -> Pos3 {
        Pos3::from(self.world(id).translation.vector)
    }

    pub fn rotation(&self, id: NodeId) -> Quat {
        self.world(id).rotation
    }

    /// Sets the world rotation, keeping the world position.
    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) {
        let parent = self.parent_world(id).rotation;
        self.nodes[id.0].local.rotation = parent.inverse() * rotation;
    }

    /// Rotates about a world-space axis through the node's own origin.
    pub fn rotate_world(&mut self, id: NodeId, axis: Vec3, angle_deg: f32) {
        let current = self.rotation(id);
        self.set_rotation(id, angle_axis(angle_deg, axis) * current);
    }

    pub fn transform_point(&self, id: NodeId, local: Pos3) -> Pos3 {
        self.world(id) * local
    }

    pub fn transform_direction(&self, id: NodeId, local: Vec3) -> Vec3 {
        self.rotation(id) * local
    }

    pub fn inverse_transform_direction(&self, id: NodeId, world: Vec3) -> Vec3 {
        self.rotation(id).inverse() * world
    }

    pub fn forward(&self, id: NodeId) -> Vec3 {
        self.transform_direction(id, world_forward())
    }

    pub fn up(&self, id: NodeId) -> Vec3 {
        self.transform_direction(id, world_up())
    }

    pub fn right(&self, id: NodeId) -> Vec3 {
        self.transform_direction(id, world_right())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (BikeRig, NodeId, NodeId) {
        let mut rig = BikeRig::new();
        let root = rig.add_node("root", None, Vec3::new(1.0, 0.0, 0.0), Quat::identity());
        let child = rig.add_node("child", Some(root), Vec3::new(0.0, 0.0, 2.0), Quat::identity());
        (rig, root, child)
    }

    #[test]
    fn world_position_composes_parents() {
        let (mut rig, root, child) = chain();
        assert!((rig.position(child) - Pos3::new(1.0, 0.0, 2.0)).norm() < 1e-6);

        // yaw the root 90°: child's +Z offset swings to +X
        rig.set_local_rotation(root, angle_axis(90.0, world_up()));
        assert!((rig.position(child) - Pos3::new(3.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn set_rotation_is_world_space() {
        let (mut rig, root, child) = chain();
        rig.set_local_rotation(root, angle_axis(45.0, world_up()));
        let target = angle_axis(10.0, world_right());
        rig.set_rotation(child, target);
        assert!(rig.rotation(child).angle_to(&target) < 1e-5);
    }

    #[test]
    fn inverse_direction_round_trips() {
        let (mut rig, _root, child) = chain();
        rig.set_local_rotation(child, angle_axis(30.0, world_up()));
        let v = Vec3::new(0.3, -1.0, 2.0);
        let back = rig.transform_direction(child, rig.inverse_transform_direction(child, v));
        assert!((back - v).norm() < 1e-5);
    }

    #[test]
    fn from_specs_rejects_undeclared_parent() {
        let specs = vec![NodeSpec::new("a", Some("missing"), [0.0; 3])];
        assert_eq!(
            BikeRig::from_specs(&specs).unwrap_err(),
            ConfigError::UnknownParent { node: "a".into(), parent: "missing".into() }
        );
    }

    #[test]
    fn from_specs_rejects_duplicates() {
        let specs = vec![NodeSpec::new("a", None, [0.0; 3]), NodeSpec::new("a", None, [0.0; 3])];
        assert!(matches!(BikeRig::from_specs(&specs), Err(ConfigError::DuplicateNode { .. })));
    }

    #[test]
    fn resolve_reports_owner_and_field() {
        let (rig, _, _) = chain();
        let err = rig.resolve("lean", "node", "lean_pivot").unwrap_err();
        assert_eq!(err.to_string(), "lean: node references missing rig node 'lean_pivot'");
    }
}
