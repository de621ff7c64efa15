// ==============================================================================
// suspension_contact.rs — RAYCAST SUSPENSION + GROUND CONTACT
// ------------------------------------------------------------------------------
// Two wheels, one ray each. Per wheel the ray starts one radius "behind" the
// wheel's rest position (against the travel direction) and runs along the
// travel direction for radius / cos(angle) + radius.
//
// Frame phase (placement):
// - hit  : compression offset = ray length - hit distance, clamped to the
//          travel; the front fork slides along its axis, the rear swing arm
//          rotates so the wheel reaches the offset position
// - miss : suspension relaxes back to rest, ground normal = world up
// - tyres spin from forward speed (suppressed while braking)
//
// Physics phase (forces):
// - per-wheel compression ratio, total compression = mean
// - ground snap when the cos-weighted compression passes the shared
//   max-compression threshold (once per excursion)
// - spring/damper acceleration along the support normal, scaled by cos(lean)
//
// Notes:
// - A miss is a normal condition, never an error.
// - The snap threshold compares against a cosine of the travel angle in
//   radians.
// ==============================================================================

use tracing::debug;

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::types::{
    EPSILON, Pos3, Quat, Vec3, from_to_rotation, normalize_or_zero, project, project_on_plane, slerp, world_up,
};
use crate::error::Result;
use crate::physics::ForceMode;
use crate::rig::{BikeRig, NodeId};
use crate::state::{BikeState, WheelContact};
use crate::vehicle::{SuspensionConfig, WheelSuspensionConfig};

const RELAX_RATE: f32 = 20.0; // 1/s, back to rest when airborne
const MIN_FORCE_COMPRESSION: f32 = 0.05;
const SNAP_VELOCITY_DAMPING: f32 = 0.8; // share of velocity along up removed on snap

// ----------------------------------------------------------------------------
// Pure helpers
// ----------------------------------------------------------------------------

/// Full ray length for a wheel of `radius` whose travel is `angle_deg` off
/// vertical.
pub fn max_ray_distance(radius: f32, angle_deg: f32) -> f32 {
    radius / angle_deg.to_radians().cos() + radius
}

/// Compression offset along the travel for a hit at `distance`, in
/// `[0, max_travel]`.
pub fn compression_offset(radius: f32, angle_deg: f32, distance: f32, max_travel: f32) -> f32 {
    (max_ray_distance(radius, angle_deg) - distance).clamp(0.0, max_travel.max(0.0))
}

/// `(max_ray - distance) / max_ray` in `[0, 1]`; zero when airborne.
pub fn compression_ratio(grounded: bool, max_ray: f32, distance: f32) -> f32 {
    if !grounded || max_ray <= EPSILON {
        return 0.0;
    }
    ((max_ray - distance) / max_ray).clamp(0.0, 1.0)
}

/// Spring/damper acceleration along the spring direction.
///
/// The damper never removes more than the spring velocity in one step, and the
/// whole force is zero below 5% total compression.
pub fn compute_suspension_force(
    total_compression: f32,
    spring_velocity: f32,
    spring: f32,
    damper: f32,
    ground_stick: f32,
    dt: f32,
) -> f32 {
    if total_compression < MIN_FORCE_COMPRESSION {
        return 0.0;
    }

    let limit = if dt > EPSILON { spring_velocity.abs() / dt } else { 0.0 };
    let spring_force = spring * (total_compression - ground_stick * total_compression);
    let damper_force = (damper * spring_velocity).clamp(-limit, limit);

    spring_force - damper_force
}

/// Edge-triggered ground-snap latch: fires once per excursion above the
/// threshold, re-arms when the metric drops back.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapLatch {
    snapped: bool,
}

impl SnapLatch {
    pub fn update(&mut self, over_threshold: bool) -> bool {
        if !over_threshold {
            self.snapped = false;
            return false;
        }
        let fire = !self.snapped;
        self.snapped = true;
        fire
    }

    pub fn is_snapped(&self) -> bool {
        self.snapped
    }
}

// ----------------------------------------------------------------------------
// Per-wheel rig
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Travel {
    Slide, // telescopic fork: suspension node translates
    Swing, // swing arm: suspension node rotates about its pivot
}

#[derive(Debug, Clone)]
struct WheelConfig {
    node_names: [String; 3], // wheel, suspension, parent
    radius: f32,
    angle_deg: f32,
    rest_position: Pos3, // parent space
    rotate_axis: Vec3,   // suspension space
    direction: Vec3,     // parent space, unit
    max_travel: f32,
    max_ray: f32,
    travel: Travel,
}

impl WheelConfig {
    fn new(cfg: &WheelSuspensionConfig, travel: Travel) -> Self {
        Self {
            node_names: [cfg.wheel_node.clone(), cfg.suspension_node.clone(), cfg.parent_node.clone()],
            radius: cfg.radius,
            angle_deg: cfg.angle_deg,
            rest_position: Pos3::from(cfg.rest_position),
            rotate_axis: Vec3::from(cfg.rotate_axis),
            direction: normalize_or_zero(Vec3::from(cfg.direction)),
            max_travel: cfg.max_compression_length,
            max_ray: max_ray_distance(cfg.radius, cfg.angle_deg),
            travel,
        }
    }

    fn cos_angle(&self) -> f32 {
        self.angle_deg.to_radians().cos()
    }
}

#[derive(Debug, Clone, Copy)]
struct WheelNodes {
    wheel: NodeId,
    suspension: NodeId,
    parent: NodeId,
    start_position: Vec3, // suspension local
    start_rotation: Quat, // suspension local
}

// ----------------------------------------------------------------------------
// Feature
// ----------------------------------------------------------------------------

pub struct SuspensionFeature {
    spring: f32,
    damper: f32,
    ground_stick: f32,
    drivable_mask: u32,
    front: WheelConfig,
    rear: WheelConfig,
    front_nodes: Option<WheelNodes>,
    rear_nodes: Option<WheelNodes>,
    latch: SnapLatch,
    snap_metric: f32,
    snap_distance: f32,
}

impl SuspensionFeature {
    pub fn new(config: &SuspensionConfig, drivable_mask: u32) -> Self {
        Self {
            spring: config.spring,
            damper: config.damper,
            ground_stick: config.ground_stick,
            drivable_mask,
            front: WheelConfig::new(&config.front, Travel::Slide),
            rear: WheelConfig::new(&config.rear, Travel::Swing),
            front_nodes: None,
            rear_nodes: None,
            latch: SnapLatch::default(),
            snap_metric: 0.0,
            snap_distance: 0.0,
        }
    }

    fn resolve(rig: &BikeRig, wheel: &WheelConfig, owner_field: [&'static str; 3]) -> Result<WheelNodes> {
        let [wheel_name, suspension_name, parent_name] = &wheel.node_names;
        let wheel_id = rig.resolve("suspension", owner_field[0], wheel_name)?;
        let suspension = rig.resolve("suspension", owner_field[1], suspension_name)?;
        let parent = rig.resolve("suspension", owner_field[2], parent_name)?;
        Ok(WheelNodes {
            wheel: wheel_id,
            suspension,
            parent,
            start_position: rig.local_position(suspension),
            start_rotation: rig.local_rotation(suspension),
        })
    }

    // ------------------------------------------------------------------
    // Frame: wheel placement
    // ------------------------------------------------------------------

    fn place_wheel(
        ctx: &mut BikeContext<'_>,
        wheel: &WheelConfig,
        nodes: &WheelNodes,
        mask: u32,
        dt: f32,
    ) -> WheelContact {
        let rest_ws = ctx.rig.transform_point(nodes.parent, wheel.rest_position);
        let dir_ws = ctx.rig.transform_direction(nodes.parent, wheel.direction);
        let origin = rest_ws - dir_ws * wheel.radius;

        match ctx.host.cast_ray(origin, dir_ws, wheel.max_ray, mask) {
            Some(hit) => {
                let offset = compression_offset(wheel.radius, wheel.angle_deg, hit.distance, wheel.max_travel);
                match wheel.travel {
                    Travel::Slide => {
                        ctx.rig.set_local_position(nodes.suspension, nodes.start_position - wheel.direction * offset);
                    }
                    Travel::Swing => {
                        let pivot = ctx.rig.local_position(nodes.suspension);
                        let target = wheel.rest_position.coords - wheel.direction * offset;
                        let from = normalize_or_zero(wheel.rest_position.coords - pivot);
                        let to = normalize_or_zero(target - pivot);
                        ctx.rig.set_local_rotation(nodes.suspension, nodes.start_rotation * from_to_rotation(from, to));
                    }
                }
                WheelContact { hit: true, distance: hit.distance, point: hit.point, normal: hit.normal }
            }
            None => {
                let t = RELAX_RATE * dt;
                match wheel.travel {
                    Travel::Slide => {
                        let current = ctx.rig.local_position(nodes.suspension);
                        let relaxed = current.lerp(&nodes.start_position, t.clamp(0.0, 1.0));
                        ctx.rig.set_local_position(nodes.suspension, relaxed);
                    }
                    Travel::Swing => {
                        let current = ctx.rig.local_rotation(nodes.suspension);
                        ctx.rig.set_local_rotation(nodes.suspension, slerp(&current, &nodes.start_rotation, t));
                    }
                }
                WheelContact::default()
            }
        }
    }

    fn spin_tires(&self, ctx: &mut BikeContext<'_>, front: &WheelNodes, rear: &WheelNodes, dt: f32) {
        let s = &*ctx.state;
        let v = s.local_velocity.z;

        let front_deg = if s.applying_brake { 0.0 } else { (v / self.front.radius).to_degrees() * dt };

        let mut rear_deg = if s.applying_hand_brake || s.applying_brake {
            0.0
        } else {
            (v / self.rear.radius).to_degrees() * dt
        };
        if s.doing_burnout && v.abs() < 1.0 {
            rear_deg = (s.tunables.max_speed / self.rear.radius).to_degrees() * dt;
        }

        let front_axis = ctx.rig.transform_direction(front.suspension, self.front.rotate_axis);
        ctx.rig.rotate_world(front.wheel, front_axis, front_deg);
        let rear_axis = ctx.rig.transform_direction(rear.suspension, self.rear.rotate_axis);
        ctx.rig.rotate_world(rear.wheel, rear_axis, rear_deg);
    }

    // ------------------------------------------------------------------
    // Physics: compression, snap, force
    // ------------------------------------------------------------------

    fn update_compression(&mut self, state: &mut BikeState) {
        let fc = compression_ratio(state.front_grounded, self.front.max_ray, state.front_contact.distance);
        let rc = compression_ratio(state.rear_grounded, self.rear.max_ray, state.rear_contact.distance);
        state.total_compression = ((fc + rc) * 0.5).clamp(0.0, 1.0);

        let (cos_f, cos_r) = (self.front.cos_angle(), self.rear.cos_angle());
        let mean_max_ray = (self.front.max_ray * cos_f + self.rear.max_ray * cos_r) * 0.5;
        self.snap_metric = (fc * cos_f + rc * cos_r) * 0.5;
        self.snap_distance = mean_max_ray * (self.snap_metric - state.tunables.max_compression);
    }

    fn support_normal(state: &BikeState) -> Vec3 {
        if state.front_grounded && state.rear_grounded {
            state.ground_normal
        } else if state.rear_grounded {
            state.rear_contact.normal
        } else {
            world_up()
        }
    }

    fn apply_force(&mut self, ctx: &mut BikeContext<'_>, front: &WheelNodes, rear: &WheelNodes, dt: f32) {
        let front_ws = ctx.rig.transform_point(front.parent, self.front.rest_position);
        let rear_ws = ctx.rig.transform_point(rear.parent, self.rear.rest_position);

        let rotator = ctx.state.refs.rotator;
        let body_up = ctx.host.rotation() * world_up();
        let up_side = normalize_or_zero(world_up() * ctx.rig.up(rotator).dot(&body_up));
        let side_normal = normalize_or_zero(normalize_or_zero(front_ws - rear_ws).cross(&up_side));
        let spring_dir = normalize_or_zero(project_on_plane(Self::support_normal(ctx.state), side_normal));

        let spring_velocity = ctx.host.linear_velocity().dot(&spring_dir);
        let force = compute_suspension_force(
            ctx.state.total_compression,
            spring_velocity,
            self.spring,
            self.damper,
            self.ground_stick,
            dt,
        );

        if !ctx.state.grounded {
            return;
        }

        if self.latch.update(self.snap_metric > ctx.state.tunables.max_compression) {
            let target = ctx.host.position() + ctx.state.projected_up * self.snap_distance;
            ctx.host.move_position(target);

            let v = ctx.host.linear_velocity();
            let along_up = project(v, ctx.state.projected_up);
            ctx.host.set_linear_velocity(v - along_up * SNAP_VELOCITY_DAMPING);
            debug!(distance = self.snap_distance, metric = self.snap_metric, "ground snap");
        }

        let lean_factor = ctx.state.current_lean_angle.abs().to_radians().cos();
        ctx.host.add_force(spring_dir * force * lean_factor, ForceMode::Acceleration);
    }
}

impl BikeFeature for SuspensionFeature {
    fn initialize(&mut self, rig: &BikeRig, _state: &mut BikeState) -> Result<()> {
        self.front_nodes = Some(Self::resolve(
            rig,
            &self.front,
            ["front.wheel_node", "front.suspension_node", "front.parent_node"],
        )?);
        self.rear_nodes = Some(Self::resolve(
            rig,
            &self.rear,
            ["rear.wheel_node", "rear.suspension_node", "rear.parent_node"],
        )?);
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        let (Some(front), Some(rear)) = (self.front_nodes, self.rear_nodes) else {
            return;
        };

        let front_contact = Self::place_wheel(ctx, &self.front, &front, self.drivable_mask, dt);
        let rear_contact = Self::place_wheel(ctx, &self.rear, &rear, self.drivable_mask, dt);

        let s = &mut *ctx.state;
        s.front_grounded = front_contact.hit;
        s.front_ground_normal = front_contact.normal;
        s.front_contact = front_contact;
        s.rear_grounded = rear_contact.hit;
        s.rear_ground_normal = rear_contact.normal;
        s.rear_contact = rear_contact;

        self.spin_tires(ctx, &front, &rear, dt);
    }

    fn on_physics(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        let (Some(front), Some(rear)) = (self.front_nodes, self.rear_nodes) else {
            return;
        };
        self.update_compression(ctx.state);
        self.apply_force(ctx, &front, &rear, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::feature::testing::fixture;
    use crate::vehicle::WheelSuspensionConfig;

    fn config() -> SuspensionConfig {
        SuspensionConfig {
            spring: 100.0,
            damper: 10.0,
            ground_stick: 0.2,
            max_compression: 0.5,
            front: WheelSuspensionConfig {
                wheel_node: "front_wheel".into(),
                suspension_node: "front_suspension".into(),
                parent_node: "handlebar".into(),
                radius: 0.33,
                angle_deg: 0.0,
                rest_position: [0.0, -0.5, 0.0],
                rotate_axis: [1.0, 0.0, 0.0],
                direction: [0.0, -1.0, 0.0],
                max_compression_length: 0.2,
            },
            rear: WheelSuspensionConfig {
                wheel_node: "rear_wheel".into(),
                suspension_node: "rear_suspension".into(),
                parent_node: "chassis".into(),
                radius: 0.33,
                angle_deg: 0.0,
                rest_position: [0.0, -0.2, -0.7],
                rotate_axis: [1.0, 0.0, 0.0],
                direction: [0.0, -1.0, 0.0],
                max_compression_length: 0.2,
            },
        }
    }

    #[test]
    fn snap_latch_fires_once_per_excursion() {
        let max = 0.5;
        let mut latch = SnapLatch::default();
        let fired = [0.9, 1.1, 1.2, 1.1, 0.9, 1.3]
            .iter()
            .filter(|&&k| latch.update(k * max > max))
            .count();
        assert_eq!(fired, 2);
    }

    #[test]
    fn force_zero_below_deadband() {
        assert_eq!(compute_suspension_force(0.049, -3.0, 100.0, 10.0, 0.2, 0.02), 0.0);
        assert!(compute_suspension_force(0.2, 0.0, 100.0, 10.0, 0.2, 0.02) > 0.0);
    }

    #[test]
    fn damper_is_limited_by_spring_velocity() {
        // tiny velocity, huge damper: damper capped at |v|/dt
        let f = compute_suspension_force(0.5, 0.001, 100.0, 1e6, 0.0, 0.02);
        assert!((f - (50.0 - 0.05)).abs() < 1e-4);
    }

    #[test]
    fn ray_geometry_for_raked_fork() {
        let max = max_ray_distance(0.33, 60.0);
        assert!((max - 0.99).abs() < 1e-5);
        assert_eq!(compression_offset(0.33, 0.0, 10.0, 0.2), 0.0);
        assert_eq!(compression_offset(0.33, 0.0, 0.0, 0.2), 0.2);
        assert_eq!(compression_ratio(false, 0.66, 0.1), 0.0);
        assert!((compression_ratio(true, 0.66, 0.33) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn grounded_wheels_compress_and_publish_normals() {
        let mut fx = fixture();
        let mut feature = SuspensionFeature::new(&config(), 0b0001);
        feature.initialize(&fx.rig, &mut fx.state).unwrap();

        // wheel centers 0.4 m up, radius 0.33: just out of reach
        fx.sync();
        feature.on_frame(&mut fx.ctx(), 0.016);
        assert!(!fx.state.front_grounded && !fx.state.rear_grounded);

        fx.host.position.y = 0.5;
        fx.sync();
        feature.on_frame(&mut fx.ctx(), 0.016);
        assert!(fx.state.front_grounded && fx.state.rear_grounded);
        assert!((fx.state.front_contact.distance - 0.63).abs() < 1e-4);
        assert_eq!(fx.state.front_ground_normal, world_up());

        // lower still: the fork slides up by the clamped offset
        fx.host.position.y = 0.45;
        fx.sync();
        feature.on_frame(&mut fx.ctx(), 0.016);
        let fork = fx.rig.find("front_suspension").unwrap();
        let offset = compression_offset(0.33, 0.0, fx.state.front_contact.distance, 0.2);
        assert!((offset - 0.08).abs() < 1e-4);
        assert!((fx.rig.local_position(fork).y - offset).abs() < 1e-4);
    }

    #[test]
    fn swing_arm_rotates_the_rear_wheel_up() {
        let mut fx = fixture();
        let mut feature = SuspensionFeature::new(&config(), 0b0001);
        feature.initialize(&fx.rig, &mut fx.state).unwrap();
        fx.host.position.y = 0.45;
        fx.sync();
        feature.on_frame(&mut fx.ctx(), 0.016);

        let rear = fx.rig.find("rear_wheel").unwrap();
        let resting = 0.45 - 0.2;
        assert!(fx.rig.position(rear).y > resting + 0.05);
    }

    #[test]
    fn airborne_wheels_report_up_and_relax() {
        let mut fx = fixture();
        fx.host.set_ground(None);
        let mut feature = SuspensionFeature::new(&config(), 0b0001);
        feature.initialize(&fx.rig, &mut fx.state).unwrap();
        fx.sync();

        let fork = fx.rig.find("front_suspension").unwrap();
        fx.rig.set_local_position(fork, Vec3::new(0.0, 0.2, 0.0));
        feature.on_frame(&mut fx.ctx(), 0.025);
        assert!(!fx.state.front_grounded && !fx.state.rear_grounded);
        assert_eq!(fx.state.rear_ground_normal, world_up());
        // half way back to rest at 20/s * 0.025
        assert!((fx.rig.local_position(fork).y - 0.1).abs() < 1e-5);
    }

    #[test]
    fn physics_pushes_up_when_compressed_and_grounded() {
        let mut fx = fixture();
        let mut feature = SuspensionFeature::new(&config(), 0b0001);
        feature.initialize(&fx.rig, &mut fx.state).unwrap();
        fx.host.position.y = 0.45;
        fx.sync();
        feature.on_frame(&mut fx.ctx(), 0.016);
        fx.state.grounded = true;
        fx.state.ground_normal = world_up();

        feature.on_physics(&mut fx.ctx(), 0.02);
        assert!(fx.state.total_compression > MIN_FORCE_COMPRESSION);
        assert!(fx.host.pending_acceleration().y > 0.0);
    }

    #[test]
    fn deep_compression_snaps_once_along_up() {
        let mut fx = fixture();
        let mut feature = SuspensionFeature::new(&config(), 0b0001);
        feature.initialize(&fx.rig, &mut fx.state).unwrap();
        fx.sync();
        fx.state.front_grounded = true;
        fx.state.rear_grounded = true;
        fx.state.grounded = true;
        fx.state.front_contact.distance = 0.1;
        fx.state.rear_contact.distance = 0.1;
        fx.host.velocity = Vec3::new(0.0, -2.0, 1.0);

        // metric 0.56 / 0.66 over a 0.5 threshold: 0.66 * (0.848 - 0.5) = 0.23
        feature.on_physics(&mut fx.ctx(), 0.02);
        assert!(feature.latch.is_snapped());
        assert!((fx.host.position.y - 0.83).abs() < 1e-4);
        assert_eq!(fx.host.position.x, 0.0);
        assert_eq!(fx.host.position.z, 0.0);
        assert!((fx.host.velocity.y + 0.4).abs() < 1e-5);
        assert_eq!(fx.host.velocity.z, 1.0);

        // same excursion: no second move
        feature.on_physics(&mut fx.ctx(), 0.02);
        assert!((fx.host.position.y - 0.83).abs() < 1e-4);
        assert!((fx.host.velocity.y + 0.4).abs() < 1e-5);
    }

    #[test]
    fn missing_node_is_reported() {
        let mut fx = fixture();
        let mut cfg = config();
        cfg.rear.suspension_node = "swingarm".into();
        let mut feature = SuspensionFeature::new(&cfg, 0b0001);
        let err = feature.initialize(&fx.rig, &mut fx.state).unwrap_err();
        assert!(err.to_string().contains("rear.suspension_node"));
    }
}
