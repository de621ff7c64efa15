// ==============================================================================
// plane.rs — ANALYTIC PLANE HOST
// ------------------------------------------------------------------------------
// Analytic host: a point mass over an optional infinite ground plane.
//
// No engine, no collisions. Forces accumulate until `step` integrates them
// (semi-implicit Euler), which makes the bike core fully deterministic for
// tests and offline tuning.
// ==============================================================================

use crate::dynamics::types::{EPSILON, Pos3, Quat, Vec3, world_up};
use crate::physics::{ForceMode, PhysicsHost, RayHit};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub point: Pos3,
    pub normal: Vec3,
    pub groups: u32, // membership bits tested against the ray mask
}

impl Plane {
    /// Horizontal plane at `height`, in layer 0.
    pub fn flat(height: f32) -> Self {
        Self {
            point: Pos3::new(0.0, height, 0.0),
            normal: world_up(),
            groups: 0b0001,
        }
    }

    /// Plane through `point` with the given (normalized) normal, in layer 0.
    pub fn tilted(point: Pos3, normal: Vec3) -> Self {
        Self { point, normal: normal.normalize(), groups: 0b0001 }
    }
}

#[derive(Debug, Clone)]
pub struct PlaneWorld {
    pub position: Pos3,
    pub velocity: Vec3,
    pub mass: f32,
    ground: Option<Plane>,
    accumulated: Vec3, // m/s², cleared every step
}

impl PlaneWorld {
    pub fn new(position: Pos3, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec3::zeros(),
            mass: mass.max(EPSILON),
            ground: None,
            accumulated: Vec3::zeros(),
        }
    }

    pub fn with_ground(mut self, ground: Plane) -> Self {
        self.ground = Some(ground);
        self
    }

    pub fn set_ground(&mut self, ground: Option<Plane>) {
        self.ground = ground;
    }

    pub fn ground(&self) -> Option<&Plane> {
        self.ground.as_ref()
    }

    pub fn step(&mut self, dt: f32) {
        self.velocity += self.accumulated * dt;
        self.position += self.velocity * dt;
        self.accumulated = Vec3::zeros();
    }

    /// Sum of accelerations queued since the last step.
    pub fn pending_acceleration(&self) -> Vec3 {
        self.accumulated
    }

    fn accumulate(&mut self, force: Vec3, mode: ForceMode) {
        self.accumulated += match mode {
            ForceMode::Force => force / self.mass,
            ForceMode::Acceleration => force,
        };
    }
}

impl PhysicsHost for PlaneWorld {
    fn cast_ray(&self, origin: Pos3, direction: Vec3, max_distance: f32, mask: u32) -> Option<RayHit> {
        let plane = self.ground.as_ref().filter(|p| p.groups & mask != 0)?;
        let dir = direction.try_normalize(EPSILON)?;

        let denom = dir.dot(&plane.normal);
        if denom > -EPSILON {
            // parallel, or hitting the back face
            return None;
        }
        let distance = (plane.point - origin).dot(&plane.normal) / denom;
        if !(0.0..=max_distance).contains(&distance) {
            return None;
        }

        Some(RayHit {
            distance,
            point: origin + dir * distance,
            normal: plane.normal,
        })
    }

    fn linear_velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        self.accumulate(force, mode);
    }

    // point mass: no torque
    fn add_force_at_point(&mut self, force: Vec3, _point: Pos3, mode: ForceMode) {
        self.accumulate(force, mode);
    }

    fn move_position(&mut self, position: Pos3) {
        self.position = position;
    }

    fn position(&self) -> Pos3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        Quat::identity()
    }
}
