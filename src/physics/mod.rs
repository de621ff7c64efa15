// ==============================================================================
// physics/mod.rs — HOST RIGID BODY SEAM + RAPIER WORLD
// ------------------------------------------------------------------------------
// The bike core never touches a physics engine directly. It talks to one body
// through `PhysicsHost`:
// - ray casts against the drivable layers
// - velocity get/set
// - forces (as force or acceleration), optionally at a point
// - teleport (ground snap)
//
// Two hosts ship with the crate:
// - `RapierBody`  : one dynamic body inside a rapier3d `PhysicsWorld`
// - `PlaneWorld`  : analytic point mass over a ground plane (tests, tuning)
//
// Forces are accumulated and only turned into impulses when the world steps,
// so every feature in one physics pass sees the same velocity.
// ==============================================================================

pub mod plane;

use std::collections::HashMap;

use nalgebra::Quaternion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rapier3d::prelude::*;
use rapier3d::prelude::{Group, InteractionGroups};
use tracing::{info, warn};

use crate::dynamics::types::{Pos3, Quat, Vec3};

pub const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
pub const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    Force,        // N, scaled by 1/mass
    Acceleration, // m/s², mass independent
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Pos3,
    pub normal: Vec3,
}

pub trait PhysicsHost {
    /// Closest hit along `direction` within `max_distance`, against colliders
    /// whose membership intersects `mask`. The host body itself is ignored.
    fn cast_ray(&self, origin: Pos3, direction: Vec3, max_distance: f32, mask: u32) -> Option<RayHit>;

    fn linear_velocity(&self) -> Vec3;
    fn set_linear_velocity(&mut self, velocity: Vec3);

    fn add_force(&mut self, force: Vec3, mode: ForceMode);
    fn add_force_at_point(&mut self, force: Vec3, point: Pos3, mode: ForceMode);

    /// Teleports the body.
    fn move_position(&mut self, position: Pos3);

    fn position(&self) -> Pos3;
    fn rotation(&self) -> Quat;
}

// ----------------------------------------------------------------------------
// Conversions (rapier's nalgebra may differ from ours: go through components)
// ----------------------------------------------------------------------------

#[inline] fn to_vector(v: Vec3) -> Vector<Real> { vector![v.x, v.y, v.z] }
#[inline] fn to_point(p: Pos3) -> Point<Real> { point![p.x, p.y, p.z] }
#[inline] fn from_vector(v: &Vector<Real>) -> Vec3 { Vec3::new(v.x, v.y, v.z) }
#[inline] fn from_point(p: &Point<Real>) -> Pos3 { Pos3::new(p.x, p.y, p.z) }

// ----------------------------------------------------------------------------
// Rapier world
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct PendingForce {
    force: Vector<Real>,        // N
    point: Option<Point<Real>>, // world space
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>, // gravity vector (the bike opts out)
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline, // for raycasting
    pending: HashMap<RigidBodyHandle, Vec<PendingForce>>, // applied as impulses in step()
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, -9.81, 0.0],
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            pending: HashMap::new(),
        }
    }

    fn insert_static(&mut self, collider: Collider) {
        let body = self.bodies.insert(RigidBodyBuilder::fixed().build());
        self.colliders.insert_with_parent(collider, body, &mut self.bodies);
    }

    fn ground_collider(shape: ColliderBuilder) -> Collider {
        shape
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.2)
            .restitution(0.0)
            .build()
    }

    /// Flat ground (top surface at y = 0), a take-off ramp straight ahead and
    /// a seeded field of low bumps beside the run-up.
    pub fn build_test_track(&mut self, seed: u64) {
        // 1000 x 2 x 1000 slab, top at y = 0
        self.insert_static(Self::ground_collider(
            ColliderBuilder::cuboid(500.0, 1.0, 500.0).translation(vector![0.0, -1.0, 0.0]),
        ));

        // ramp: 4 m wide, 6 m long, pitched 15° up, lip at z ≈ 60
        let pitch = -15.0_f32.to_radians();
        self.insert_static(Self::ground_collider(
            ColliderBuilder::cuboid(2.0, 0.25, 3.0)
                .translation(vector![0.0, 0.52, 57.0])
                .rotation(vector![pitch, 0.0, 0.0]),
        ));

        let mut rng = StdRng::seed_from_u64(seed);
        let bumps = 24;
        for _ in 0..bumps {
            let x: f32 = rng.gen_range(6.0..30.0) * if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let z: f32 = rng.gen_range(-20.0..120.0);
            let radius: f32 = rng.gen_range(0.4..1.2);
            // sunk ball: only a low cap shows above y = 0
            self.insert_static(Self::ground_collider(
                ColliderBuilder::ball(radius).translation(vector![x, -radius * 0.8, z]),
            ));
        }

        self.query_pipeline.update(&self.colliders);
        info!(bodies = self.bodies.len(), colliders = self.colliders.len(), seed, "test track built");
    }

    /// Dynamic body for a bike: rotations locked (the rig carries orientation),
    /// engine gravity off (the gravity feature applies it).
    pub fn spawn_bike_body(&mut self, position: [f32; 3], mass: f32) -> RigidBodyHandle {
        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![position[0], position[1], position[2]])
            .lock_rotations()
            .gravity_scale(0.0)
            .ccd_enabled(true)
            .build();

        // bottom-out guard; wheels are ray casts
        let collider = ColliderBuilder::ball(0.25)
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND))
            .mass(mass.max(1.0))
            .friction(0.0)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        // mass is otherwise only known after the first step
        if let Some(body) = self.bodies.get_mut(handle) {
            body.recompute_mass_properties_from_colliders(&self.colliders);
        }
        self.query_pipeline.update(&self.colliders);

        info!(?handle, ?position, mass, "bike body spawned");
        handle
    }

    /// Host view of one body. `None` if the handle is stale.
    pub fn body(&mut self, handle: RigidBodyHandle) -> Option<RapierBody<'_>> {
        if self.bodies.contains(handle) {
            Some(RapierBody { world: self, handle })
        } else {
            None
        }
    }

    pub fn step(&mut self, dt: Real) {
        // 1) Pending forces -> impulses
        for (handle, forces) in self.pending.drain() {
            let Some(body) = self.bodies.get_mut(handle) else { continue };
            for f in forces {
                let impulse = f.force * dt;
                match f.point {
                    Some(p) => body.apply_impulse_at_point(impulse, p, true),
                    None => body.apply_impulse(impulse, true),
                }
            }
        }

        // 2) Step physics
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        // 3) Safety: prevent bodies from exploding to insane coordinates
        for (handle, body) in self.bodies.iter_mut() {
            let pos = *body.translation();
            let bad = !pos.x.is_finite() || !pos.y.is_finite() || !pos.z.is_finite()
                || pos.x.abs() > 1_000.0 || pos.y.abs() > 1_000.0 || pos.z.abs() > 1_000.0;

            if bad {
                let reset = vector![0.0, 1.0, 0.0];
                body.set_translation(reset, true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);
                warn!(?handle, "reset exploding body");
            }
        }
    }
}

// ----------------------------------------------------------------------------
// One rapier body as a host
// ----------------------------------------------------------------------------

pub struct RapierBody<'w> {
    world: &'w mut PhysicsWorld,
    handle: RigidBodyHandle,
}

impl RapierBody<'_> {
    fn mass(&self) -> f32 {
        self.world
            .bodies
            .get(self.handle)
            .map(|b| b.mass())
            .filter(|m| *m > 0.0)
            .unwrap_or(1.0)
    }

    fn push_force(&mut self, force: Vec3, point: Option<Pos3>, mode: ForceMode) {
        let force = match mode {
            ForceMode::Force => force,
            ForceMode::Acceleration => force * self.mass(),
        };
        self.world.pending.entry(self.handle).or_default().push(PendingForce {
            force: to_vector(force),
            point: point.map(to_point),
        });
    }
}

impl PhysicsHost for RapierBody<'_> {
    fn cast_ray(&self, origin: Pos3, direction: Vec3, max_distance: f32, mask: u32) -> Option<RayHit> {
        let ray = Ray::new(to_point(origin), to_vector(direction.normalize()));
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.handle)
            .groups(InteractionGroups::new(Group::ALL, Group::from_bits_truncate(mask)));

        let (_collider, hit) = self.world.query_pipeline.cast_ray_and_get_normal(
            &self.world.bodies,
            &self.world.colliders,
            &ray,
            max_distance,
            true,
            filter,
        )?;

        Some(RayHit {
            distance: hit.time_of_impact,
            point: from_point(&ray.point_at(hit.time_of_impact)),
            normal: from_vector(&hit.normal),
        })
    }

    fn linear_velocity(&self) -> Vec3 {
        self.world.bodies.get(self.handle).map_or_else(Vec3::zeros, |b| from_vector(b.linvel()))
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        if let Some(body) = self.world.bodies.get_mut(self.handle) {
            body.set_linvel(to_vector(velocity), true);
        }
    }

    fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        self.push_force(force, None, mode);
    }

    fn add_force_at_point(&mut self, force: Vec3, point: Pos3, mode: ForceMode) {
        self.push_force(force, Some(point), mode);
    }

    fn move_position(&mut self, position: Pos3) {
        if let Some(body) = self.world.bodies.get_mut(self.handle) {
            body.set_translation(vector![position.x, position.y, position.z], true);
        }
    }

    fn position(&self) -> Pos3 {
        self.world
            .bodies
            .get(self.handle)
            .map_or_else(Pos3::origin, |b| {
                let t = b.translation();
                Pos3::new(t.x, t.y, t.z)
            })
    }

    fn rotation(&self) -> Quat {
        self.world.bodies.get(self.handle).map_or_else(Quat::identity, |b| {
            let q = b.rotation();
            Quat::new_normalize(Quaternion::new(q.w, q.i, q.j, q.k))
        })
    }
}
