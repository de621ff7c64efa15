// ==============================================================================
// burnout.rs — BURNOUT + STANDING ROTATION
// ------------------------------------------------------------------------------
// Throttle and reverse together with both wheels down holds the bike in place
// (brake along the ground-projected forward axis). Adding steer at walking
// pace spins the rear around the front wheel:
//
//   physics: lateral velocity = -steer · right · ω · d · blend
//            (d = front wheel to rotator distance, ω in rad/s)
//   frame:   yaw the rotator about world up at steer · rate · blend
//
// `blend` ramps 0 -> 1 at `smoothness` per second and drops to 0 when the
// rotation stops.
// ==============================================================================

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::longitudinal::opposing_acceleration;
use crate::dynamics::types::{approx_eq, move_towards, normalize_or_zero, project, project_on_plane, world_up};
use crate::physics::ForceMode;
use crate::vehicle::BurnoutConfig;

const MAX_ROTATING_SPEED: f32 = 1.0; // m/s

pub struct BurnoutFeature {
    config: BurnoutConfig,
    blend: f32,
    direction: f32, // steer captured in the physics step
}

impl BurnoutFeature {
    pub fn new(config: &BurnoutConfig) -> Self {
        Self { config: config.clone(), blend: 0.0, direction: 0.0 }
    }
}

impl BikeFeature for BurnoutFeature {
    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        if !ctx.state.burnout_rotating {
            return;
        }
        let yaw = self.config.rotation_speed * self.direction * self.blend * dt;
        ctx.rig.rotate_world(ctx.state.refs.rotator, world_up(), yaw);
    }

    fn on_physics(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        let s = &mut *ctx.state;
        let accelerating = s.input.accelerate > 0.0;
        let reversing = s.input.reverse > 0.0;
        let steering = !approx_eq(s.input.steer, 0.0);

        s.doing_burnout = accelerating && reversing && s.front_grounded && s.rear_grounded;
        s.burnout_rotating = s.doing_burnout && steering && s.local_velocity.norm() < MAX_ROTATING_SPEED;

        if !s.doing_burnout {
            self.blend = 0.0;
            return;
        }

        s.applying_brake = true;
        let brake_dir = normalize_or_zero(project_on_plane(s.projected_forward, s.ground_normal));
        let brake = opposing_acceleration(s.tunables.deceleration, s.local_velocity.z, dt);
        ctx.host.add_force(brake_dir * brake, ForceMode::Acceleration);

        if !s.burnout_rotating {
            self.blend = 0.0;
            return;
        }

        self.direction = s.input.steer;
        self.blend = move_towards(self.blend, 1.0, self.config.smoothness * dt);

        let rotator = s.refs.rotator;
        let distance = (ctx.rig.position(s.refs.front_wheel) - ctx.rig.position(rotator)).norm();
        let speed = self.config.rotation_speed.to_radians() * distance * self.blend;
        let lateral = ctx.rig.right(rotator) * (-self.direction * speed);

        let vertical = project(ctx.host.linear_velocity(), s.projected_up);
        ctx.host.set_linear_velocity(lateral + vertical);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::feature::testing::fixture;
    use crate::dynamics::types::Vec3;

    #[test]
    fn brake_never_flips_direction() {
        assert!((opposing_acceleration(20.0, 0.01, 0.02) + 0.2).abs() < 1e-6);
        assert_eq!(opposing_acceleration(20.0, 5.0, 0.02), -20.0);
        assert!(opposing_acceleration(20.0, -0.3, 0.02) > 0.0);
    }

    #[test]
    fn needs_both_wheels_down() {
        let mut fx = fixture();
        let mut burnout = BurnoutFeature::new(&BurnoutConfig::default());
        fx.state.input.accelerate = 1.0;
        fx.state.input.reverse = 1.0;
        fx.state.input.steer = 1.0;
        fx.state.rear_grounded = true;
        burnout.on_physics(&mut fx.ctx(), 0.02);
        assert!(!fx.state.doing_burnout);
        assert!(!fx.state.burnout_rotating);
    }

    #[test]
    fn rotating_burnout_slides_tail_and_yaws() {
        let mut fx = fixture();
        fx.sync();
        let mut burnout = BurnoutFeature::new(&BurnoutConfig::default());
        fx.state.input.accelerate = 1.0;
        fx.state.input.reverse = 1.0;
        fx.state.input.steer = 1.0;
        fx.state.front_grounded = true;
        fx.state.rear_grounded = true;
        fx.host.velocity = Vec3::new(0.0, -0.5, 0.0);

        burnout.on_physics(&mut fx.ctx(), 0.1);
        assert!(fx.state.doing_burnout && fx.state.burnout_rotating && fx.state.applying_brake);
        // blend = 0.1 after one step at smoothness 1
        let v = fx.host.velocity;
        assert!(v.x < 0.0);
        assert!((v.y + 0.5).abs() < 1e-6, "vertical kept: {v:?}");

        burnout.on_frame(&mut fx.ctx(), 0.1);
        assert!(fx.rig.forward(fx.state.refs.rotator).x > 0.0);

        // steer released: plain burnout, no rotation
        fx.state.input.steer = 0.0;
        burnout.on_physics(&mut fx.ctx(), 0.1);
        assert!(fx.state.doing_burnout && !fx.state.burnout_rotating);
        assert_eq!(burnout.blend, 0.0);
    }
}
