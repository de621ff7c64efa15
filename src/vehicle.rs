// ==============================================================================
// vehicle.rs — BIKE CONFIGURATION
// ------------------------------------------------------------------------------
// Every tunable of the bike in one serde-deserializable tree:
// - rig layout (node list) + names of the shared nodes
// - feature sequences (start / frame / physics)
// - one section per feature
//
// Each section defaults independently, so a JSON file only has to mention the
// values it changes. `validate()` clamps out-of-range values (logged) and
// rejects configurations that cannot be repaired.
// ==============================================================================

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::dynamics::curve::{Curve, CurveKey, Interpolation};
use crate::dynamics::feature::FeatureKind;
use crate::error::{ConfigError, Result};
use crate::rig::NodeSpec;
use crate::state::SharedTunables;

// ----------------------------------------------------------------------------
// Shared node names
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SharedNodeNames {
    pub body: String,
    pub rotator: String,
    pub lean: String,
    pub front_wheel: String,
    pub rear_wheel: String,
}

impl Default for SharedNodeNames {
    fn default() -> Self {
        Self {
            body: "bike".into(),
            rotator: "rotator".into(),
            lean: "lean".into(),
            front_wheel: "front_wheel".into(),
            rear_wheel: "rear_wheel".into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Sequences
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub start: Vec<FeatureKind>,
    pub frame: Vec<FeatureKind>,
    pub physics: Vec<FeatureKind>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        use FeatureKind::*;
        Self {
            start: vec![Gravity, Suspension, Aligner, Drive, Steering, Lean, Wheelie, Stoppie, Burnout, Gear],
            frame: vec![Suspension, Aligner, Steering, Lean, Wheelie, Stoppie, Burnout, Gear],
            physics: vec![Gravity, Suspension, Drive, Steering, Burnout, Gear],
        }
    }
}

// ----------------------------------------------------------------------------
// Feature sections
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    pub acceleration: f32, // m/s², applied along world y
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self { acceleration: -9.81 }
    }
}

/// One wheel + the suspension that carries it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WheelSuspensionConfig {
    pub wheel_node: String,
    pub suspension_node: String,
    pub parent_node: String,       // frame for rest_position / direction
    pub radius: f32,               // m
    pub angle_deg: f32,            // between world up and the suspension travel
    pub rest_position: [f32; 3],   // wheel center, parent space
    pub rotate_axis: [f32; 3],     // wheel spin axis, suspension space
    pub direction: [f32; 3],       // suspension travel, parent space
    pub max_compression_length: f32, // m, travel from rest
}

impl Default for WheelSuspensionConfig {
    fn default() -> Self {
        Self {
            wheel_node: String::new(),
            suspension_node: String::new(),
            parent_node: String::new(),
            radius: 0.33,
            angle_deg: 0.0,
            rest_position: [0.0; 3],
            rotate_axis: [1.0, 0.0, 0.0],
            direction: [0.0, -1.0, 0.0],
            max_compression_length: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SuspensionConfig {
    pub spring: f32,             // stiffness (acceleration per unit compression)
    pub damper: f32,             // damping
    pub ground_stick: f32,       // 0..1, share of spring removed to keep contact
    pub max_compression: f32,    // 0..1, snap-to-ground threshold
    pub front: WheelSuspensionConfig,
    pub rear: WheelSuspensionConfig,
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        // front fork raked ~15.2° (direction = -steering axis)
        let front = WheelSuspensionConfig {
            wheel_node: "front_wheel".into(),
            suspension_node: "front_suspension".into(),
            parent_node: "handlebar".into(),
            radius: 0.33,
            angle_deg: 15.25,
            rest_position: [0.0, -0.55, 0.15],
            rotate_axis: [1.0, 0.0, 0.0],
            direction: [0.0, -0.965, 0.263],
            max_compression_length: 0.2,
        };
        // swing arm pivots at the chassis, wheel travels straight down
        let rear = WheelSuspensionConfig {
            wheel_node: "rear_wheel".into(),
            suspension_node: "rear_suspension".into(),
            parent_node: "chassis".into(),
            radius: 0.33,
            angle_deg: 0.0,
            rest_position: [0.0, -0.2, -0.7],
            rotate_axis: [1.0, 0.0, 0.0],
            direction: [0.0, -1.0, 0.0],
            max_compression_length: 0.15,
        };
        Self {
            spring: 100.0,
            damper: 10.0,
            ground_stick: 0.2,
            max_compression: 0.5,
            front,
            rear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    pub speed_in_ground: f32, // 1/s
    pub speed_in_air: f32,    // 1/s
    pub snap_speed: f32,      // 1/s, used while over-compressed
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self { speed_in_ground: 20.0, speed_in_air: 2.0, snap_speed: 50.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub max_speed: f32,               // m/s
    pub acceleration: f32,            // m/s²
    pub acceleration_curve: Curve,    // speed ratio -> multiplier
    pub reverse_max_speed: f32,       // m/s
    pub reverse_acceleration: f32,    // m/s²
    pub reverse_curve: Curve,
    pub deceleration: f32,            // m/s²
    pub hand_brake_deceleration: f32, // m/s²
    pub rolling_resistance: f32,      // m/s² per m/s
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_speed: 60.0,
            acceleration: 15.0,
            acceleration_curve: Curve::smooth(&[(0.0, 1.0), (0.5, 0.8), (1.0, 0.5)]),
            reverse_max_speed: 3.0,
            reverse_acceleration: 5.0,
            reverse_curve: Curve::smooth(&[(0.0, 1.0), (1.0, 0.2)]),
            deceleration: 20.0,
            hand_brake_deceleration: 5.0,
            rolling_resistance: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub max_turn_angle: f32,      // degrees
    pub use_lerp_turning: bool,
    pub turn_lerp_speed: f32,     // 1/s
    pub can_turn_in_air: bool,
    pub turn_speed_in_air: f32,   // deg/s
    pub animation_speed: f32,     // 1/s
    pub steering_curve: Curve,    // speed ratio -> angle multiplier
    pub steering_node: String,
    pub steering_axis: [f32; 3],  // steering node's parent space
    pub drift_turn_factor: f32,
    pub drift_friction_factor: f32,
    pub friction_coefficient: f32,
    pub friction_curve: Curve,    // side-speed ratio -> multiplier
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            max_turn_angle: 30.0,
            use_lerp_turning: true,
            turn_lerp_speed: 4.0,
            can_turn_in_air: true,
            turn_speed_in_air: 70.0,
            animation_speed: 4.0,
            steering_curve: Curve::smooth(&[(0.0, 1.0), (1.0, 0.3)]),
            steering_node: "handlebar".into(),
            steering_axis: [0.0, 0.965, -0.263],
            drift_turn_factor: 2.0,
            drift_friction_factor: 0.5,
            friction_coefficient: 0.5,
            friction_curve: Curve::smooth(&[(0.0, 1.0), (0.1, 0.5), (1.0, 0.1)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LeanConfig {
    pub max_lean_angle: f32,       // degrees
    pub can_lean_in_air: bool,
    pub animation_speed: f32,      // 1/s
    pub lean_curve: Curve,         // speed ratio -> multiplier
    pub max_lean_position: [f32; 3], // local offset at full lean
}

impl Default for LeanConfig {
    fn default() -> Self {
        Self {
            max_lean_angle: 45.0,
            can_lean_in_air: true,
            animation_speed: 4.0,
            lean_curve: Curve::smooth(&[(0.0, 0.2), (1.0, 1.0)]),
            max_lean_position: [0.05, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WheelieConfig {
    pub node: String,
    pub max_angle: f32,       // degrees
    pub animation_speed: f32, // 1/s
    pub curve: Curve,         // forward speed ratio -> multiplier
}

impl Default for WheelieConfig {
    fn default() -> Self {
        Self {
            node: "wheelie".into(),
            max_angle: 30.0,
            animation_speed: 3.0,
            // steep rise to full height by 10% of top speed
            curve: Curve::new(
                Interpolation::Smooth,
                vec![
                    CurveKey::with_tangents(0.0, 0.0, 10.0, 10.0),
                    CurveKey::with_tangents(0.1, 1.0, 0.0037, 0.0037),
                    CurveKey::with_tangents(1.0, 1.0, 0.0, 0.0),
                ],
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoppieConfig {
    pub node: String,
    pub max_angle: f32,       // degrees
    pub animation_speed: f32, // 1/s
    pub curve: Curve,
}

impl Default for StoppieConfig {
    fn default() -> Self {
        Self {
            node: "stoppie".into(),
            max_angle: 30.0,
            animation_speed: 3.0,
            curve: Curve::smooth(&[(0.0, 0.0), (0.5, 1.0), (1.0, 1.0)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BurnoutConfig {
    pub rotation_speed: f32, // deg/s
    pub smoothness: f32,     // 1/s, ramp of the rotation blend
}

impl Default for BurnoutConfig {
    fn default() -> Self {
        Self { rotation_speed: 60.0, smoothness: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum GearConfig {
    Manual {
        #[serde(default = "default_manual_gears")]
        gears: Vec<f32>, // max speed per gear, m/s
        #[serde(default = "default_shift_time")]
        shift_time: f32, // s, acceleration lockout
        #[serde(default = "default_half_threshold")]
        half_threshold: f32,
        #[serde(default = "default_full_threshold")]
        full_threshold: f32,
        #[serde(default)]
        initial_gear: usize,
    },
    Automatic {
        #[serde(default = "default_automatic_gears")]
        gears: Vec<f32>, // speed above which the next gear engages, m/s
        #[serde(default = "default_shift_time")]
        shift_time: f32,
        #[serde(default)]
        initial_gear: usize,
    },
}

fn default_manual_gears() -> Vec<f32> {
    vec![10.0, 20.0, 30.0, 40.0]
}
fn default_automatic_gears() -> Vec<f32> {
    vec![10.0, 20.0, 30.0, 40.0, 50.0]
}
fn default_shift_time() -> f32 {
    0.2
}
fn default_half_threshold() -> f32 {
    0.3
}
fn default_full_threshold() -> f32 {
    0.7
}

impl GearConfig {
    pub fn manual() -> Self {
        GearConfig::Manual {
            gears: default_manual_gears(),
            shift_time: default_shift_time(),
            half_threshold: default_half_threshold(),
            full_threshold: default_full_threshold(),
            initial_gear: 0,
        }
    }

    pub fn automatic() -> Self {
        GearConfig::Automatic {
            gears: default_automatic_gears(),
            shift_time: default_shift_time(),
            initial_gear: 0,
        }
    }
}

impl Default for GearConfig {
    fn default() -> Self {
        Self::manual()
    }
}

// ----------------------------------------------------------------------------
// Root
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BikeConfig {
    pub name: String,
    pub mass: f32,          // kg, host body only
    pub drivable_mask: u32, // collision groups the wheels ray-cast against
    pub rig: Vec<NodeSpec>,
    pub shared: SharedNodeNames,
    pub sequences: SequenceConfig,
    pub gravity: GravityConfig,
    pub suspension: SuspensionConfig,
    pub aligner: AlignerConfig,
    pub drive: DriveConfig,
    pub steering: SteeringConfig,
    pub lean: LeanConfig,
    pub wheelie: WheelieConfig,
    pub stoppie: StoppieConfig,
    pub burnout: BurnoutConfig,
    pub gear: GearConfig,
}

impl Default for BikeConfig {
    fn default() -> Self {
        Self::dirt_bike()
    }
}

/// Default rig: root follows the body, every pivot is expressed relative to
/// its parent. Wheelie/stoppie pivots sit at the rear/front contact patch and
/// are undone by an offset child so the chassis stays centred.
pub fn dirt_bike_rig() -> Vec<NodeSpec> {
    vec![
        NodeSpec::new("bike", None, [0.0, 0.0, 0.0]),
        NodeSpec::new("rotator", Some("bike"), [0.0, 0.0, 0.0]),
        NodeSpec::new("wheelie", Some("rotator"), [0.0, -0.53, -0.7]),
        NodeSpec::new("wheelie_offset", Some("wheelie"), [0.0, 0.53, 0.7]),
        NodeSpec::new("stoppie", Some("wheelie_offset"), [0.0, -0.53, 0.7]),
        NodeSpec::new("stoppie_offset", Some("stoppie"), [0.0, 0.53, -0.7]),
        NodeSpec::new("lean", Some("stoppie_offset"), [0.0, -0.53, 0.0]),
        NodeSpec::new("chassis", Some("lean"), [0.0, 0.53, 0.0]),
        NodeSpec::new("handlebar", Some("chassis"), [0.0, 0.35, 0.55]),
        NodeSpec::new("front_suspension", Some("handlebar"), [0.0, 0.0, 0.0]),
        NodeSpec::new("front_wheel", Some("front_suspension"), [0.0, -0.55, 0.15]),
        NodeSpec::new("rear_suspension", Some("chassis"), [0.0, 0.0, -0.1]),
        NodeSpec::new("rear_wheel", Some("rear_suspension"), [0.0, -0.2, -0.6]),
    ]
}

impl BikeConfig {
    /// Off-road bike, manual four-speed gearbox.
    pub fn dirt_bike() -> Self {
        Self {
            name: "dirt-bike".into(),
            mass: 180.0,
            drivable_mask: 0b0001,
            rig: dirt_bike_rig(),
            shared: SharedNodeNames::default(),
            sequences: SequenceConfig::default(),
            gravity: GravityConfig::default(),
            suspension: SuspensionConfig::default(),
            aligner: AlignerConfig::default(),
            drive: DriveConfig::default(),
            steering: SteeringConfig::default(),
            lean: LeanConfig::default(),
            wheelie: WheelieConfig::default(),
            stoppie: StoppieConfig::default(),
            burnout: BurnoutConfig::default(),
            gear: GearConfig::manual(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: BikeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    pub fn shared_tunables(&self) -> SharedTunables {
        SharedTunables {
            max_compression: self.suspension.max_compression,
            max_speed: self.drive.max_speed,
            deceleration: self.drive.deceleration,
            align_speed_in_ground: self.aligner.speed_in_ground,
        }
    }

    /// Clamps repairable values in place; errors on the rest.
    pub fn validate(&mut self) -> Result<()> {
        if self.rig.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rig",
                detail: "rig has no nodes".into(),
            });
        }

        for (field, wheel) in [
            ("suspension.front", &mut self.suspension.front),
            ("suspension.rear", &mut self.suspension.rear),
        ] {
            clamp_min(field, "radius", &mut wheel.radius, 0.0);
            clamp_min(field, "max_compression_length", &mut wheel.max_compression_length, 0.0);
            // cos(angle) must stay well away from zero for the ray length
            clamp_range(field, "angle_deg", &mut wheel.angle_deg, 0.0, 80.0);
            if nalgebra::Vector3::from(wheel.direction).norm() < 1e-6 {
                return Err(ConfigError::InvalidValue {
                    field: "suspension.direction",
                    detail: format!("{field} has a zero-length travel direction"),
                });
            }
        }

        clamp_range("suspension", "ground_stick", &mut self.suspension.ground_stick, 0.0, 1.0);
        clamp_range("suspension", "max_compression", &mut self.suspension.max_compression, 0.0, 1.0);
        clamp_min("drive", "max_speed", &mut self.drive.max_speed, 0.0);
        clamp_min("drive", "reverse_max_speed", &mut self.drive.reverse_max_speed, 0.0);
        clamp_min("drive", "rolling_resistance", &mut self.drive.rolling_resistance, 0.0);
        clamp_min("drive", "deceleration", &mut self.drive.deceleration, 0.0);
        clamp_min("burnout", "smoothness", &mut self.burnout.smoothness, 0.0);

        for curve in [
            &mut self.drive.acceleration_curve,
            &mut self.drive.reverse_curve,
            &mut self.steering.steering_curve,
            &mut self.steering.friction_curve,
            &mut self.lean.lean_curve,
            &mut self.wheelie.curve,
            &mut self.stoppie.curve,
        ] {
            curve.normalize();
        }

        match &mut self.gear {
            GearConfig::Manual { gears, shift_time, half_threshold, full_threshold, initial_gear } => {
                clamp_min("gear", "shift_time", shift_time, 0.0);
                clamp_range("gear", "half_threshold", half_threshold, 0.0, 1.0);
                clamp_range("gear", "full_threshold", full_threshold, 0.0, 1.0);
                if *full_threshold < *half_threshold {
                    warn!(half = *half_threshold, full = *full_threshold, "gear.full_threshold below half_threshold, swapping");
                    std::mem::swap(half_threshold, full_threshold);
                }
                clamp_gear(initial_gear, gears.len());
            }
            GearConfig::Automatic { gears, shift_time, initial_gear } => {
                clamp_min("gear", "shift_time", shift_time, 0.0);
                clamp_gear(initial_gear, gears.len());
            }
        }

        Ok(())
    }
}

fn clamp_min(section: &str, field: &str, value: &mut f32, min: f32) {
    if !(*value >= min) {
        warn!(section, field, value = *value, min, "config value below minimum, clamping");
        *value = min;
    }
}

fn clamp_range(section: &str, field: &str, value: &mut f32, min: f32, max: f32) {
    let clamped = if value.is_nan() { min } else { value.clamp(min, max) };
    if clamped != *value {
        warn!(section, field, value = *value, min, max, "config value out of range, clamping");
        *value = clamped;
    }
}

fn clamp_gear(gear: &mut usize, count: usize) {
    if *gear > count {
        warn!(gear = *gear, count, "gear.initial_gear beyond gear table, clamping");
        *gear = count;
    }
}
