// ==============================================================================
// maneuver.rs — PITCH MANEUVER HELPERS
// ------------------------------------------------------------------------------
// Shared machinery for the pitch maneuvers (wheelie, stoppie).
//
// Each maneuver owns a pivot node placed at a wheel's contact patch and
// pitches it about its local x axis. The pitch is tracked as a scalar and
// eased with an angle lerp, so it never has to be read back from a rotation.
// ==============================================================================

use crate::dynamics::types::{EPSILON, angle_deg, angle_axis, lerp_angle, world_right, world_up};
use crate::error::Result;
use crate::rig::{BikeRig, NodeId};
use crate::state::BikeState;

/// Steepest surface (degrees off world up) a maneuver survives on.
pub const SURFACE_TOLERANCE_DEG: f32 = 20.0;
/// Entry needs at least this much speed (m/s).
pub const MIN_ENTRY_SPEED: f32 = 0.1;

/// True when any of the ground normals is too steep to hold a maneuver.
pub fn surface_too_steep(state: &BikeState) -> bool {
    [state.ground_normal, state.front_ground_normal, state.rear_ground_normal]
        .iter()
        .any(|n| angle_deg(*n, world_up()) > SURFACE_TOLERANCE_DEG)
}

/// Forward speed as a fraction of top speed, clamped to `[0, 1]`.
pub fn forward_speed_ratio(state: &BikeState) -> f32 {
    if state.tunables.max_speed > EPSILON {
        (state.local_velocity.z / state.tunables.max_speed).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Default)]
pub struct PitchPivot {
    node: Option<NodeId>,
    angle: f32,      // degrees about local x, negative lifts the nose
    recovering: bool, // forced exit in progress, eases at the alignment rate
}

impl PitchPivot {
    pub fn resolve(&mut self, rig: &BikeRig, owner: &'static str, name: &str) -> Result<()> {
        self.node = Some(rig.resolve(owner, "node", name)?);
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        self.node.is_some()
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Starts a fast return to level after a forced exit.
    pub fn begin_recovery(&mut self) {
        self.recovering = true;
    }

    pub fn cancel_recovery(&mut self) {
        self.recovering = false;
    }

    /// Eases the pitch toward `target` at `rate` (1/s), or at `recovery_rate`
    /// while a forced exit is being recovered.
    pub fn advance(&mut self, rig: &mut BikeRig, target: f32, rate: f32, recovery_rate: f32, dt: f32) {
        let Some(node) = self.node else {
            return;
        };
        let rate = if self.recovering { recovery_rate } else { rate };
        self.angle = lerp_angle(self.angle, target, rate * dt);
        if self.recovering && self.angle.abs() < 0.01 {
            self.recovering = false;
        }
        rig.set_local_rotation(node, angle_axis(self.angle, world_right()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::feature::testing::fixture;
    use crate::dynamics::types::Vec3;

    #[test]
    fn steep_normal_on_either_wheel_counts() {
        let mut fx = fixture();
        assert!(!surface_too_steep(&fx.state));
        fx.state.rear_ground_normal = Vec3::new(0.0, 1.0, 0.5).normalize(); // ~26.6°
        assert!(surface_too_steep(&fx.state));
    }

    #[test]
    fn recovery_runs_faster_then_clears() {
        let mut fx = fixture();
        let mut pivot = PitchPivot::default();
        pivot.resolve(&fx.rig, "wheelie", "wheelie").unwrap();
        for _ in 0..200 {
            pivot.advance(&mut fx.rig, -30.0, 3.0, 20.0, 0.016);
        }
        assert!((pivot.angle() + 30.0).abs() < 0.1);

        pivot.begin_recovery();
        pivot.advance(&mut fx.rig, 0.0, 3.0, 20.0, 0.016);
        // 20/s * 0.016 = 32% of the way back in one frame
        assert!((pivot.angle() + 30.0 * 0.68).abs() < 0.1);
        for _ in 0..100 {
            pivot.advance(&mut fx.rig, 0.0, 3.0, 20.0, 0.016);
        }
        assert!(pivot.angle().abs() < 0.01);
        assert!(!pivot.recovering);
    }
}
