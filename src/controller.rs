// ==============================================================================
// controller.rs — BIKE CONTROLLER (FEATURE REGISTRY + SEQUENCES)
// ------------------------------------------------------------------------------
// Owns the rig, the shared state and one instance of every feature named in
// any of the three sequences. The host body is borrowed per call.
//
// Lifecycle:
//   new            validate config, build rig, resolve shared nodes,
//                  initialize features (failures -> feature inert, logged)
//   start          start sequence, once (run lazily by the first update)
//   frame_update   timers, then the frame sequence (variable dt)
//   physics_update rotator-local velocity, then the physics sequence (fixed dt)
//
// The rig root is re-synced to the host body before every pass.
// ==============================================================================

use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::dynamics::feature::{BikeContext, BikeFeature, Feature, FeatureKind};
use crate::dynamics::types::Vec3;
use crate::error::Result;
use crate::physics::PhysicsHost;
use crate::rig::BikeRig;
use crate::state::{BikeEvent, BikeInput, BikeState, BikeTelemetry, SharedRefs, gear_label};
use crate::vehicle::BikeConfig;

struct Slot {
    kind: FeatureKind,
    feature: Feature,
    enabled: bool,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Start,
    Frame,
    Physics,
}

pub struct BikeController {
    id: Uuid,
    config: BikeConfig,
    rig: BikeRig,
    state: BikeState,
    slots: Vec<Slot>,
    start_sequence: Vec<usize>, // indices into `slots`
    frame_sequence: Vec<usize>,
    physics_sequence: Vec<usize>,
    started: bool,
    tick: u64,
    velocity: Vec3, // host velocity at the last physics step
}

impl BikeController {
    pub fn new(mut config: BikeConfig) -> Result<Self> {
        config.validate()?;
        let id = Uuid::new_v4();
        let _span = info_span!("bike", %id, name = %config.name).entered();

        let rig = BikeRig::from_specs(&config.rig)?;
        let names = &config.shared;
        let refs = SharedRefs {
            body: rig.resolve("shared", "body", &names.body)?,
            rotator: rig.resolve("shared", "rotator", &names.rotator)?,
            lean: rig.resolve("shared", "lean", &names.lean)?,
            front_wheel: rig.resolve("shared", "front_wheel", &names.front_wheel)?,
            rear_wheel: rig.resolve("shared", "rear_wheel", &names.rear_wheel)?,
        };
        let mut state = BikeState::new(refs, config.shared_tunables());

        // one instance per kind, in order of first appearance
        let mut slots: Vec<Slot> = Vec::new();
        let sequences = &config.sequences;
        for &kind in sequences.start.iter().chain(&sequences.frame).chain(&sequences.physics) {
            if slots.iter().any(|s| s.kind == kind) {
                continue;
            }
            let mut feature = kind.build(&config);
            let enabled = match feature.initialize(&rig, &mut state) {
                Ok(()) => true,
                Err(e) => {
                    error!(feature = %kind, error = %e, "feature disabled");
                    false
                }
            };
            slots.push(Slot { kind, feature, enabled });
        }

        let index_of = |seq: &[FeatureKind]| -> Vec<usize> {
            seq.iter()
                .filter_map(|k| slots.iter().position(|s| s.kind == *k))
                .collect()
        };
        let start_sequence = index_of(&sequences.start);
        let frame_sequence = index_of(&sequences.frame);
        let physics_sequence = index_of(&sequences.physics);

        info!(
            features = slots.len(),
            inert = slots.iter().filter(|s| !s.enabled).count(),
            nodes = rig.len(),
            "bike controller ready"
        );

        Ok(Self {
            id,
            config,
            rig,
            state,
            slots,
            start_sequence,
            frame_sequence,
            physics_sequence,
            started: false,
            tick: 0,
            velocity: Vec3::zeros(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &BikeConfig {
        &self.config
    }

    pub fn rig(&self) -> &BikeRig {
        &self.rig
    }

    pub fn state(&self) -> &BikeState {
        &self.state
    }

    /// Features that failed to initialize and never run.
    pub fn inert_features(&self) -> Vec<FeatureKind> {
        self.slots.iter().filter(|s| !s.enabled).map(|s| s.kind).collect()
    }

    pub fn set_input(&mut self, input: BikeInput) {
        self.state.input = input.clamped();
    }

    pub fn drain_events(&mut self) -> Vec<BikeEvent> {
        self.state.drain_events()
    }

    // ------------------------------------------------------------------
    // Loop entry points
    // ------------------------------------------------------------------

    pub fn start(&mut self, host: &mut dyn PhysicsHost) {
        if self.started {
            return;
        }
        self.started = true;
        self.state.can_accelerate = true;
        self.sync_root(host);
        self.run(Phase::Start, host, 0.0);
        info!(id = %self.id, "bike started");
    }

    pub fn frame_update(&mut self, host: &mut dyn PhysicsHost, dt: f32) {
        self.start(host);
        self.sync_root(host);
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            slot.feature.advance_timers(&mut self.state, dt);
        }
        self.run(Phase::Frame, host, dt);
    }

    pub fn physics_update(&mut self, host: &mut dyn PhysicsHost, dt: f32) {
        self.start(host);
        self.sync_root(host);
        self.velocity = host.linear_velocity();
        self.state.local_velocity = self.rig.inverse_transform_direction(self.state.refs.rotator, self.velocity);
        self.run(Phase::Physics, host, dt);
        self.tick += 1;
    }

    fn sync_root(&mut self, host: &dyn PhysicsHost) {
        let body = self.state.refs.body;
        self.rig.set_local_position(body, host.position().coords);
        self.rig.set_local_rotation(body, host.rotation());
    }

    fn run(&mut self, phase: Phase, host: &mut dyn PhysicsHost, dt: f32) {
        let sequence = match phase {
            Phase::Start => &self.start_sequence,
            Phase::Frame => &self.frame_sequence,
            Phase::Physics => &self.physics_sequence,
        };
        for &i in sequence {
            let slot = &mut self.slots[i];
            if !slot.enabled {
                continue;
            }
            let mut ctx = BikeContext { state: &mut self.state, rig: &mut self.rig, host: &mut *host };
            match phase {
                Phase::Start => slot.feature.on_start(&mut ctx),
                Phase::Frame => slot.feature.on_frame(&mut ctx, dt),
                Phase::Physics => slot.feature.on_physics(&mut ctx, dt),
            }
        }
    }

    // ------------------------------------------------------------------
    // Read-outs
    // ------------------------------------------------------------------

    /// Body speed (m/s) at the last physics step.
    pub fn speed(&self) -> f32 {
        self.velocity.norm()
    }

    pub fn top_speed(&self) -> f32 {
        self.state.tunables.max_speed
    }

    pub fn current_max_speed(&self) -> f32 {
        self.state.current_max_speed
    }

    pub fn current_gear(&self) -> usize {
        self.state.current_gear
    }

    pub fn telemetry(&self) -> BikeTelemetry {
        let p = self.rig.position(self.state.refs.body);
        let s = &self.state;
        BikeTelemetry {
            id: self.id.to_string(),
            tick: self.tick,
            position: [p.x, p.y, p.z],
            speed: self.speed(),
            forward_speed: s.local_velocity.z,
            top_speed: self.top_speed(),
            current_max_speed: s.current_max_speed,
            gear: gear_label(s.current_gear),
            grounded: s.grounded,
            compression: s.total_compression,
            steer_angle: s.current_steer_angle,
            lean_angle: s.current_lean_angle,
            wheelie: s.doing_wheelie,
            stoppie: s.doing_stoppie,
            burnout: s.doing_burnout,
        }
    }
}
