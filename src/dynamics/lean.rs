// ==============================================================================
// lean.rs — LEAN INTO TURNS
// ------------------------------------------------------------------------------
// Body lean into turns: rolls the lean node about its local forward axis and
// shifts it sideways with the roll.
// ==============================================================================

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::types::{EPSILON, Vec3, angle_axis, approx_eq, lerp_angle, move_towards, sign, world_forward};
use crate::error::Result;
use crate::rig::BikeRig;
use crate::state::BikeState;
use crate::vehicle::LeanConfig;

const SMOOTHER_RATE: f32 = 10.0; // 1/s

pub struct LeanFeature {
    config: LeanConfig,
    start_position: Vec3,
    smoother: f32,
    roll: f32, // degrees, negative leans right
}

impl LeanFeature {
    pub fn new(config: &LeanConfig) -> Self {
        Self { config: config.clone(), start_position: Vec3::zeros(), smoother: 0.0, roll: 0.0 }
    }

    /// Roll target for smoothed steer `s` at speed ratio `speed_ratio`.
    pub fn target_roll(&self, s: f32, speed_ratio: f32) -> f32 {
        -self.config.max_lean_angle * self.config.lean_curve.evaluate(speed_ratio) * sign(s) * s.abs()
    }

    fn animate(&mut self, state: &mut BikeState, rig: &mut BikeRig, steer: f32, dt: f32) {
        self.smoother = move_towards(self.smoother, steer, SMOOTHER_RATE * dt);

        let ratio = if state.tunables.max_speed > EPSILON {
            state.local_velocity.norm() / state.tunables.max_speed
        } else {
            0.0
        };
        let target = self.target_roll(self.smoother, ratio);
        self.roll = lerp_angle(self.roll, target, self.config.animation_speed * dt);

        let lean = state.refs.lean;
        rig.set_local_rotation(lean, angle_axis(self.roll, world_forward()));
        if !approx_eq(self.config.max_lean_angle, 0.0) {
            let offset = Vec3::from(self.config.max_lean_position) * (self.roll / self.config.max_lean_angle);
            rig.set_local_position(lean, self.start_position + offset);
        }
        state.current_lean_angle = self.roll;
    }
}

impl BikeFeature for LeanFeature {
    fn initialize(&mut self, rig: &BikeRig, state: &mut BikeState) -> Result<()> {
        self.start_position = rig.local_position(state.refs.lean);
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        let steer = ctx.state.input.steer;
        if approx_eq(steer, 0.0) {
            self.animate(ctx.state, ctx.rig, 0.0, dt);
        } else if ctx.state.grounded || self.config.can_lean_in_air {
            self.animate(ctx.state, ctx.rig, steer, dt);
        }
    }
}
