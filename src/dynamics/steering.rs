// ==============================================================================
// steering.rs — HANDLEBAR, YAW, SIDE FRICTION
// ------------------------------------------------------------------------------
// Frame:
// - handlebar animation about the steering axis (max angle shrinks with speed)
// - yaw of the rotator: kinematic bicycle model on the ground
//     R = wheelbase / tan(steer), ω = v_z / R
//   constant turn rate in the air (optional)
//
// Physics:
// - lateral friction cancelling rotator-local v_x, shaped by a curve,
//   weakened under the hand brake (drift)
// ==============================================================================

use crate::dynamics::curve::Curve;
use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::types::{EPSILON, Quat, Vec3, angle_axis, move_towards, slerp, world_up};
use crate::error::Result;
use crate::physics::ForceMode;
use crate::rig::{BikeRig, NodeId};
use crate::state::BikeState;
use crate::vehicle::SteeringConfig;

const MIN_STEER_RAD: f32 = 0.01; // below this the turning radius is treated as infinite

/// Yaw in degrees for one frame of the kinematic bicycle model.
pub fn bicycle_yaw_deg(wheelbase: f32, steer_rad: f32, forward_speed: f32, dt: f32) -> f32 {
    if steer_rad.abs() < MIN_STEER_RAD {
        return 0.0;
    }
    let radius = wheelbase / steer_rad.tan();
    if radius.abs() < EPSILON {
        return 0.0;
    }
    (forward_speed / radius * dt).to_degrees()
}

/// Lateral friction acceleration (rotator right axis) for side speed `v_x`.
pub fn side_friction(v_x: f32, max_speed: f32, mu: f32, curve: &Curve, dt: f32) -> f32 {
    if dt <= EPSILON {
        return 0.0;
    }
    let ratio = if max_speed.abs() > EPSILON { (v_x / max_speed).abs() } else { 0.0 };
    -v_x * mu / dt * curve.evaluate(ratio)
}

pub struct SteeringFeature {
    config: SteeringConfig,
    axis: Vec3,
    node: Option<NodeId>,
    start_rotation: Quat,
    wheelbase: f32,
    smoother: f32,
}

impl SteeringFeature {
    pub fn new(config: &SteeringConfig) -> Self {
        Self {
            config: config.clone(),
            axis: Vec3::from(config.steering_axis),
            node: None,
            start_rotation: Quat::identity(),
            wheelbase: 0.0,
            smoother: 0.0,
        }
    }

    fn animate_handlebar(&self, state: &mut BikeState, rig: &mut BikeRig, node: NodeId, steer: f32, dt: f32) {
        let cfg = &self.config;
        let ratio = if state.tunables.max_speed > EPSILON {
            state.local_velocity.z.abs() / state.tunables.max_speed
        } else {
            0.0
        };

        let mut angle = cfg.max_turn_angle * cfg.steering_curve.evaluate(ratio);
        state.current_steer_angle = angle;
        if state.input.hand_brake {
            angle = -cfg.max_turn_angle;
        }

        let target = angle_axis(angle * steer, self.axis) * self.start_rotation;
        let current = rig.local_rotation(node);
        rig.set_local_rotation(node, slerp(&current, &target, cfg.animation_speed * dt));
    }

    fn turn(&mut self, state: &BikeState, rig: &mut BikeRig, steer: f32, dt: f32) {
        let cfg = &self.config;
        self.smoother = if cfg.use_lerp_turning {
            move_towards(self.smoother, steer, cfg.turn_lerp_speed * dt)
        } else {
            steer
        };

        let rotator = state.refs.rotator;
        if state.grounded {
            let drift = if state.input.hand_brake { cfg.drift_turn_factor } else { 1.0 };
            let steer_rad = (self.smoother * state.current_steer_angle).to_radians();
            let yaw = bicycle_yaw_deg(self.wheelbase, steer_rad, state.local_velocity.z, dt);
            if yaw != 0.0 {
                rig.rotate_world(rotator, state.projected_up, yaw * drift);
            }
        } else if cfg.can_turn_in_air {
            rig.rotate_world(rotator, world_up(), cfg.turn_speed_in_air * self.smoother * dt);
        }
    }
}

impl BikeFeature for SteeringFeature {
    fn initialize(&mut self, rig: &BikeRig, _state: &mut BikeState) -> Result<()> {
        let node = rig.resolve("steering", "steering_node", &self.config.steering_node)?;
        self.start_rotation = rig.local_rotation(node);
        self.node = Some(node);
        Ok(())
    }

    fn on_start(&mut self, ctx: &mut BikeContext<'_>) {
        let refs = ctx.state.refs;
        self.wheelbase = (ctx.rig.position(refs.front_wheel) - ctx.rig.position(refs.rear_wheel)).norm();
    }

    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        let Some(node) = self.node else {
            return;
        };
        let steer = ctx.state.input.steer;
        self.animate_handlebar(ctx.state, ctx.rig, node, steer, dt);
        self.turn(ctx.state, ctx.rig, steer, dt);
    }

    fn on_physics(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        if self.node.is_none() || !ctx.state.grounded || ctx.state.burnout_rotating {
            return;
        }
        let cfg = &self.config;
        let drift = if ctx.state.input.hand_brake { cfg.drift_friction_factor } else { 1.0 };
        let friction = side_friction(
            ctx.state.local_velocity.x,
            ctx.state.tunables.max_speed,
            cfg.friction_coefficient,
            &cfg.friction_curve,
            dt,
        );

        let right = ctx.rig.right(ctx.state.refs.rotator);
        let at = ctx.host.position();
        ctx.host.add_force_at_point(right * friction * drift, at, ForceMode::Acceleration);
    }
}
