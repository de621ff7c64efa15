// ==============================================================================
// state.rs — BIKE STATE (SHARED BLACKBOARD)
// ------------------------------------------------------------------------------
// The one piece of mutable state every feature reads and writes. Features never
// talk to each other directly; the suspension publishes wheel contacts, the
// aligner turns them into a ground frame, the drive feature reads that frame,
// and so on.
//
// Contents:
// - wheel contacts (overwritten every frame by the suspension)
// - derived kinematics (rotator-local velocity, ground frame, compression)
// - flags (grounded, braking, maneuvers in progress)
// - shared tunables published once from configuration
// - the clamped input snapshot
// - an outgoing event queue, drained by the controller's owner
// ==============================================================================

use serde::Serialize;

use crate::dynamics::types::{Pos3, Vec3, world_up};
use crate::rig::NodeId;

// ----------------------------------------------------------------------------
// Input
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BikeInput {
    pub accelerate: f32, // 0..1
    pub reverse: f32,    // 0..1
    pub steer: f32,      // -1 (left) .. 1 (right)
    pub gear: f32,       // -1 (down) .. 1 (up), manual gearbox only
    pub hand_brake: bool,
    pub clutch: bool,
}

impl BikeInput {
    /// Same input with every axis clamped to its valid range.
    pub fn clamped(self) -> Self {
        Self {
            accelerate: self.accelerate.clamp(0.0, 1.0),
            reverse: self.reverse.clamp(0.0, 1.0),
            steer: self.steer.clamp(-1.0, 1.0),
            gear: self.gear.clamp(-1.0, 1.0),
            hand_brake: self.hand_brake,
            clutch: self.clutch,
        }
    }
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BikeEvent {
    GearChanged(usize),
    Grounded,
    TookOff,
}

// ----------------------------------------------------------------------------
// Wheel contact
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelContact {
    pub hit: bool,
    pub distance: f32, // along the suspension ray, meters
    pub point: Pos3,
    pub normal: Vec3,
}

impl Default for WheelContact {
    fn default() -> Self {
        Self {
            hit: false,
            distance: 0.0,
            point: Pos3::origin(),
            normal: world_up(),
        }
    }
}

// ----------------------------------------------------------------------------
// Shared references and tunables
// ----------------------------------------------------------------------------

/// Rig nodes every feature may rely on. Resolved once by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedRefs {
    pub body: NodeId,
    pub rotator: NodeId,
    pub lean: NodeId,
    pub front_wheel: NodeId,
    pub rear_wheel: NodeId,
}

/// Values owned by one feature's configuration but read by several.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedTunables {
    pub max_compression: f32,       // snap / fast-align threshold, 0..1
    pub max_speed: f32,             // m/s, top speed of the bike
    pub deceleration: f32,          // m/s², braking while reversing direction
    pub align_speed_in_ground: f32, // 1/s, rotator alignment rate when grounded
}

// ----------------------------------------------------------------------------
// Blackboard
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BikeState {
    pub refs: SharedRefs,
    pub tunables: SharedTunables,

    // --- contacts ---
    pub front_contact: WheelContact,
    pub rear_contact: WheelContact,

    // --- derived kinematics ---
    pub local_velocity: Vec3, // rotator space, refreshed every physics step
    pub ground_normal: Vec3,
    pub front_ground_normal: Vec3,
    pub rear_ground_normal: Vec3,
    pub projected_forward: Vec3,
    pub projected_up: Vec3,

    // --- continuous ---
    pub total_compression: f32,   // 0..1
    pub current_steer_angle: f32, // degrees
    pub current_lean_angle: f32,  // degrees
    pub current_max_speed: f32,   // m/s, gear dependent
    pub current_gear: usize,      // 0 = neutral

    // --- flags ---
    pub front_grounded: bool,
    pub rear_grounded: bool,
    pub grounded: bool,
    pub was_grounded: bool,
    pub can_accelerate: bool,
    pub applying_brake: bool,
    pub applying_hand_brake: bool,
    pub doing_burnout: bool,
    pub doing_wheelie: bool,
    pub doing_stoppie: bool,
    pub burnout_rotating: bool,

    pub input: BikeInput,

    events: Vec<BikeEvent>,
}

impl BikeState {
    pub fn new(refs: SharedRefs, tunables: SharedTunables) -> Self {
        Self {
            refs,
            tunables,
            front_contact: WheelContact::default(),
            rear_contact: WheelContact::default(),
            local_velocity: Vec3::zeros(),
            ground_normal: world_up(),
            front_ground_normal: world_up(),
            rear_ground_normal: world_up(),
            projected_forward: Vec3::new(0.0, 0.0, 1.0),
            projected_up: world_up(),
            total_compression: 0.0,
            current_steer_angle: 0.0,
            current_lean_angle: 0.0,
            current_max_speed: tunables.max_speed,
            current_gear: 0,
            front_grounded: false,
            rear_grounded: false,
            grounded: false,
            was_grounded: false,
            can_accelerate: true,
            applying_brake: false,
            applying_hand_brake: false,
            doing_burnout: false,
            doing_wheelie: false,
            doing_stoppie: false,
            burnout_rotating: false,
            input: BikeInput::default(),
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: BikeEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<BikeEvent> {
        std::mem::take(&mut self.events)
    }
}

// ----------------------------------------------------------------------------
// Telemetry
// ----------------------------------------------------------------------------

/// Read-only snapshot for logging / UI. Gear 0 reads as "N".
#[derive(Debug, Clone, Serialize)]
pub struct BikeTelemetry {
    pub id: String,
    pub tick: u64,
    pub position: [f32; 3],
    pub speed: f32,             // m/s, magnitude of body velocity
    pub forward_speed: f32,     // m/s, rotator local z
    pub top_speed: f32,         // m/s
    pub current_max_speed: f32, // m/s
    pub gear: String,
    pub grounded: bool,
    pub compression: f32,
    pub steer_angle: f32, // degrees
    pub lean_angle: f32,  // degrees
    pub wheelie: bool,
    pub stoppie: bool,
    pub burnout: bool,
}

pub fn gear_label(gear: usize) -> String {
    if gear == 0 { "N".to_string() } else { gear.to_string() }
}
