// ==============================================================================
// aligner.rs — GROUND FRAME + ROTATOR ALIGNMENT
// ------------------------------------------------------------------------------
// Turns the two wheel contacts into one ground frame (projected forward /
// projected up) and slerps the rotator node toward it.
//
// Ground normal:
//   both wheels  -> normalized sum of both normals
//   one wheel    -> that wheel's normal
//   airborne     -> world up
//
// Rates (1/s, multiplied by dt):
//   over-compressed -> snap_speed
//   grounded        -> speed_in_ground
//   airborne        -> speed_in_air
// ==============================================================================

use tracing::debug;

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::types::{
    Vec3, angle_deg, look_rotation, normalize_or_zero, project_on_plane, rotate_vector, slerp, world_up,
};
use crate::rig::BikeRig;
use crate::state::{BikeEvent, BikeState};
use crate::vehicle::AlignerConfig;

/// Alignment rate for the current contact regime.
pub fn orientation_rate(grounded: bool, total_compression: f32, max_compression: f32, cfg: &AlignerConfig) -> f32 {
    if total_compression > max_compression {
        cfg.snap_speed
    } else if grounded {
        cfg.speed_in_ground
    } else {
        cfg.speed_in_air
    }
}

/// Combined ground normal from the per-wheel contacts.
pub fn combined_normal(front: Option<Vec3>, rear: Option<Vec3>) -> Vec3 {
    match (front, rear) {
        (Some(f), Some(r)) => {
            let n = normalize_or_zero(f + r);
            if n == Vec3::zeros() { world_up() } else { n }
        }
        (Some(n), None) | (None, Some(n)) => n,
        (None, None) => world_up(),
    }
}

pub struct AlignerFeature {
    config: AlignerConfig,
    forward_offset_deg: f32, // rotator forward vs. rear->front wheel line
}

impl AlignerFeature {
    pub fn new(config: &AlignerConfig) -> Self {
        Self { config: config.clone(), forward_offset_deg: 0.0 }
    }

    fn update_surface(&self, state: &mut BikeState, rig: &BikeRig) {
        let rotator = state.refs.rotator;
        state.grounded = state.front_grounded || state.rear_grounded;
        state.ground_normal = combined_normal(
            state.front_grounded.then_some(state.front_ground_normal),
            state.rear_grounded.then_some(state.rear_ground_normal),
        );

        let right = rig.right(rotator);
        if state.grounded {
            let wheel_dir =
                normalize_or_zero(rig.position(state.refs.front_wheel) - rig.position(state.refs.rear_wheel));
            state.projected_forward = normalize_or_zero(project_on_plane(wheel_dir, right));

            let side_plane = normalize_or_zero(project_on_plane(right, world_up()));
            let side_normal = normalize_or_zero(project_on_plane(state.ground_normal, side_plane));
            state.projected_up = normalize_or_zero(project_on_plane(side_normal, state.projected_forward));
        }

        let level_forward = || normalize_or_zero(project_on_plane(rig.forward(rotator), world_up()));
        if state.rear_grounded && state.doing_wheelie {
            state.projected_forward = level_forward();
            state.projected_up = world_up();
        } else if state.front_grounded && state.doing_stoppie {
            state.projected_forward = level_forward();
            state.projected_up = world_up();
        } else if !state.grounded {
            state.projected_forward = normalize_or_zero(project_on_plane(rig.forward(rotator), state.ground_normal));
            state.projected_up = state.ground_normal;
        }

        if state.grounded != state.was_grounded {
            if state.grounded {
                debug!("grounded");
                state.emit(BikeEvent::Grounded);
            } else {
                debug!("took off");
                state.emit(BikeEvent::TookOff);
            }
        }
        state.was_grounded = state.grounded;
    }

    fn align_rotator(&self, state: &BikeState, rig: &mut BikeRig, dt: f32) {
        let rotator = state.refs.rotator;
        let forward = rotate_vector(state.projected_forward, -rig.right(rotator), self.forward_offset_deg);
        let Some(target) = look_rotation(forward, state.projected_up) else {
            return;
        };

        let rate = orientation_rate(state.grounded, state.total_compression, state.tunables.max_compression, &self.config);
        let current = rig.rotation(rotator);
        rig.set_rotation(rotator, slerp(&current, &target, rate * dt));
    }
}

impl BikeFeature for AlignerFeature {
    fn on_start(&mut self, ctx: &mut BikeContext<'_>) {
        let rotator = ctx.state.refs.rotator;
        ctx.state.was_grounded = ctx.state.grounded;
        ctx.state.projected_forward = ctx.rig.forward(rotator);
        ctx.state.projected_up = ctx.rig.up(rotator);

        let wheel_offset = ctx.rig.position(ctx.state.refs.front_wheel) - ctx.rig.position(ctx.state.refs.rear_wheel);
        self.forward_offset_deg = angle_deg(ctx.rig.forward(rotator), wheel_offset);
    }

    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        self.update_surface(ctx.state, ctx.rig);
        self.align_rotator(ctx.state, ctx.rig, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::feature::testing::fixture;
    use crate::dynamics::types::{Quat, angle_axis};

    #[test]
    fn rate_regimes() {
        let cfg = AlignerConfig::default();
        assert_eq!(orientation_rate(true, 0.6, 0.5, &cfg), 50.0);
        assert_eq!(orientation_rate(false, 0.6, 0.5, &cfg), 50.0);
        assert_eq!(orientation_rate(true, 0.2, 0.5, &cfg), 20.0);
        assert_eq!(orientation_rate(false, 0.0, 0.5, &cfg), 2.0);
    }

    #[test]
    fn normal_falls_back_to_up() {
        let tilted = Vec3::new(0.0, 1.0, 1.0).normalize();
        assert_eq!(combined_normal(None, None), world_up());
        assert_eq!(combined_normal(Some(tilted), None), tilted);
        let both = combined_normal(Some(tilted), Some(world_up()));
        assert!((both.norm() - 1.0).abs() < 1e-6);
        assert!(both.z > 0.0 && both.z < tilted.z);
    }

    #[test]
    fn grounded_edges_fire_once() {
        let mut fx = fixture();
        fx.sync();
        let mut aligner = AlignerFeature::new(&AlignerConfig::default());
        aligner.on_start(&mut fx.ctx());

        fx.state.rear_grounded = true;
        aligner.on_frame(&mut fx.ctx(), 0.016);
        aligner.on_frame(&mut fx.ctx(), 0.016);
        fx.state.rear_grounded = false;
        aligner.on_frame(&mut fx.ctx(), 0.016);
        aligner.on_frame(&mut fx.ctx(), 0.016);

        assert_eq!(fx.state.drain_events(), vec![BikeEvent::Grounded, BikeEvent::TookOff]);
    }

    #[test]
    fn grounded_frame_follows_wheel_line() {
        let mut fx = fixture();
        fx.sync();
        let rotator = fx.state.refs.rotator;
        let mut aligner = AlignerFeature::new(&AlignerConfig::default());
        aligner.on_start(&mut fx.ctx());

        // front wheel pushed 0.2 m up by its fork
        let fork = fx.rig.find("front_suspension").unwrap();
        fx.rig.set_local_position(fork, Vec3::new(0.0, 0.2, 0.0));
        fx.state.front_grounded = true;
        fx.state.rear_grounded = true;
        aligner.on_frame(&mut fx.ctx(), 0.016);

        let forward = fx.state.projected_forward;
        assert!(forward.y > 0.1);
        assert!(forward.dot(&fx.state.projected_up).abs() < 1e-5);
        assert!(fx.rig.forward(rotator).y > 0.0);
    }

    #[test]
    fn airborne_keeps_heading_and_levels_out() {
        let mut fx = fixture();
        fx.sync();
        let rotator = fx.state.refs.rotator;
        fx.rig.set_local_rotation(rotator, Quat::from_euler_angles(0.2, 0.5, 0.0));
        let mut aligner = AlignerFeature::new(&AlignerConfig::default());
        aligner.on_start(&mut fx.ctx());

        for _ in 0..500 {
            aligner.on_frame(&mut fx.ctx(), 0.016);
        }
        assert!((fx.rig.up(rotator) - world_up()).norm() < 1e-2);
        let forward = fx.rig.forward(rotator);
        assert!(forward.x > 0.4, "heading kept: {forward:?}");
    }

    #[test]
    fn rotator_eases_at_the_regime_rate() {
        // rolled 20 degrees, level target: remaining = 20 * (1 - rate * dt)
        let remaining = |front: bool, rear: bool, compression: f32| {
            let mut fx = fixture();
            fx.sync();
            let rotator = fx.state.refs.rotator;
            fx.rig.set_local_rotation(rotator, angle_axis(20.0, Vec3::z()));
            let mut aligner = AlignerFeature::new(&AlignerConfig::default());
            aligner.on_start(&mut fx.ctx());
            fx.state.front_grounded = front;
            fx.state.rear_grounded = rear;
            fx.state.total_compression = compression;
            aligner.on_frame(&mut fx.ctx(), 0.01);
            fx.rig.rotation(rotator).angle().to_degrees()
        };

        let snap = remaining(true, true, 0.6);
        let ground = remaining(true, true, 0.2);
        let air = remaining(false, false, 0.0);
        assert!((snap - 10.0).abs() < 0.05, "snap: {snap}");
        assert!((ground - 16.0).abs() < 0.05, "ground: {ground}");
        assert!((air - 19.6).abs() < 0.05, "air: {air}");
        assert!(snap < ground && ground < air);
    }
}
