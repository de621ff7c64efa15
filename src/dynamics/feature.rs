// ==============================================================================
// feature.rs — FEATURE CONTRACT + REGISTRY ENTRY TYPES
// ------------------------------------------------------------------------------
// Every behaviour of the bike (gravity, suspension, alignment, drive, steering,
// lean, wheelie, stoppie, burnout, gears) is a `BikeFeature`:
//
//   initialize   once, resolves rig nodes; an error leaves the feature inert
//   on_start     once, before the first frame
//   on_frame     variable dt: placement, orientation, animation, input edges
//   on_physics   fixed dt: forces
//
// Features never call each other. Everything they share goes through the
// `BikeContext` (blackboard + rig + host) handed to each call.
//
// The set of features is closed, so dispatch goes through the `Feature` enum
// rather than trait objects.
// ==============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dynamics::aligner::AlignerFeature;
use crate::dynamics::burnout::BurnoutFeature;
use crate::dynamics::gear::{AutomaticGearFeature, ManualGearFeature, ManualShifter};
use crate::dynamics::gravity::GravityFeature;
use crate::dynamics::lean::LeanFeature;
use crate::dynamics::longitudinal::DriveFeature;
use crate::dynamics::steering::SteeringFeature;
use crate::dynamics::stoppie::StoppieFeature;
use crate::dynamics::wheelie::WheelieFeature;
use crate::error::Result;
use crate::physics::PhysicsHost;
use crate::rig::BikeRig;
use crate::state::BikeState;
use crate::suspension_contact::SuspensionFeature;
use crate::vehicle::{BikeConfig, GearConfig};

/// Per-call view of everything a feature may touch.
pub struct BikeContext<'a> {
    pub state: &'a mut BikeState,
    pub rig: &'a mut BikeRig,
    pub host: &'a mut dyn PhysicsHost,
}

pub trait BikeFeature {
    fn initialize(&mut self, _rig: &BikeRig, _state: &mut BikeState) -> Result<()> {
        Ok(())
    }

    fn on_start(&mut self, _ctx: &mut BikeContext<'_>) {}

    fn on_frame(&mut self, _ctx: &mut BikeContext<'_>, _dt: f32) {}

    fn on_physics(&mut self, _ctx: &mut BikeContext<'_>, _dt: f32) {}

    /// Advances timers every frame, whether or not the feature is sequenced.
    fn advance_timers(&mut self, _state: &mut BikeState, _dt: f32) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Gravity,
    Suspension,
    Aligner,
    Drive,
    Steering,
    Lean,
    Wheelie,
    Stoppie,
    Burnout,
    Gear,
}

impl FeatureKind {
    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::Gravity => "gravity",
            FeatureKind::Suspension => "suspension",
            FeatureKind::Aligner => "aligner",
            FeatureKind::Drive => "drive",
            FeatureKind::Steering => "steering",
            FeatureKind::Lean => "lean",
            FeatureKind::Wheelie => "wheelie",
            FeatureKind::Stoppie => "stoppie",
            FeatureKind::Burnout => "burnout",
            FeatureKind::Gear => "gear",
        }
    }

    pub fn build(self, config: &BikeConfig) -> Feature {
        match self {
            FeatureKind::Gravity => Feature::Gravity(GravityFeature::new(&config.gravity)),
            FeatureKind::Suspension => {
                Feature::Suspension(SuspensionFeature::new(&config.suspension, config.drivable_mask))
            }
            FeatureKind::Aligner => Feature::Aligner(AlignerFeature::new(&config.aligner)),
            FeatureKind::Drive => Feature::Drive(DriveFeature::new(&config.drive)),
            FeatureKind::Steering => Feature::Steering(SteeringFeature::new(&config.steering)),
            FeatureKind::Lean => Feature::Lean(LeanFeature::new(&config.lean)),
            FeatureKind::Wheelie => Feature::Wheelie(WheelieFeature::new(&config.wheelie)),
            FeatureKind::Stoppie => Feature::Stoppie(StoppieFeature::new(&config.stoppie)),
            FeatureKind::Burnout => Feature::Burnout(BurnoutFeature::new(&config.burnout)),
            FeatureKind::Gear => match &config.gear {
                GearConfig::Manual { gears, shift_time, half_threshold, full_threshold, initial_gear } => {
                    Feature::ManualGear(ManualGearFeature::new(
                        gears.clone(),
                        *shift_time,
                        ManualShifter::new(*half_threshold, *full_threshold),
                        *initial_gear,
                    ))
                }
                GearConfig::Automatic { gears, shift_time, initial_gear } => {
                    Feature::AutomaticGear(AutomaticGearFeature::new(gears.clone(), *shift_time, *initial_gear))
                }
            },
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub enum Feature {
    Gravity(GravityFeature),
    Suspension(SuspensionFeature),
    Aligner(AlignerFeature),
    Drive(DriveFeature),
    Steering(SteeringFeature),
    Lean(LeanFeature),
    Wheelie(WheelieFeature),
    Stoppie(StoppieFeature),
    Burnout(BurnoutFeature),
    ManualGear(ManualGearFeature),
    AutomaticGear(AutomaticGearFeature),
}

macro_rules! dispatch {
    ($self:ident, $f:ident => $call:expr) => {
        match $self {
            Feature::Gravity($f) => $call,
            Feature::Suspension($f) => $call,
            Feature::Aligner($f) => $call,
            Feature::Drive($f) => $call,
            Feature::Steering($f) => $call,
            Feature::Lean($f) => $call,
            Feature::Wheelie($f) => $call,
            Feature::Stoppie($f) => $call,
            Feature::Burnout($f) => $call,
            Feature::ManualGear($f) => $call,
            Feature::AutomaticGear($f) => $call,
        }
    };
}

impl BikeFeature for Feature {
    fn initialize(&mut self, rig: &BikeRig, state: &mut BikeState) -> Result<()> {
        dispatch!(self, f => f.initialize(rig, state))
    }

    fn on_start(&mut self, ctx: &mut BikeContext<'_>) {
        dispatch!(self, f => f.on_start(ctx))
    }

    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        dispatch!(self, f => f.on_frame(ctx, dt))
    }

    fn on_physics(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        dispatch!(self, f => f.on_physics(ctx, dt))
    }

    fn advance_timers(&mut self, state: &mut BikeState, dt: f32) {
        dispatch!(self, f => f.advance_timers(state, dt))
    }
}

// ----------------------------------------------------------------------------
// Test fixture: minimal upright bike on a PlaneWorld
// ----------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use crate::dynamics::types::{Pos3, Quat, Vec3};
    use crate::physics::plane::{Plane, PlaneWorld};
    use crate::rig::BikeRig;
    use crate::state::{BikeState, SharedRefs, SharedTunables};

    pub struct Fixture {
        pub rig: BikeRig,
        pub state: BikeState,
        pub host: PlaneWorld,
    }

    impl Fixture {
        pub fn ctx(&mut self) -> super::BikeContext<'_> {
            super::BikeContext {
                state: &mut self.state,
                rig: &mut self.rig,
                host: &mut self.host,
            }
        }

        /// Moves the rig root onto the host body, as the controller does.
        pub fn sync(&mut self) {
            let body = self.state.refs.body;
            self.rig.set_local_position(body, self.host.position.coords);
            self.rig.set_local_rotation(body, Quat::identity());
        }
    }

    pub fn tunables() -> SharedTunables {
        SharedTunables {
            max_compression: 0.5,
            max_speed: 20.0,
            deceleration: 20.0,
            align_speed_in_ground: 20.0,
        }
    }

    /// bike → rotator → {wheelie, stoppie, lean → chassis → {forks, swing arm}},
    /// wheels 0.33 m in radius, 1.4 m apart, vertical travel at both ends.
    pub fn fixture() -> Fixture {
        let mut rig = BikeRig::new();
        let id = Quat::identity();
        let body = rig.add_node("bike", None, Vec3::zeros(), id);
        let rotator = rig.add_node("rotator", Some(body), Vec3::zeros(), id);
        rig.add_node("wheelie", Some(rotator), Vec3::zeros(), id);
        rig.add_node("stoppie", Some(rotator), Vec3::zeros(), id);
        let lean = rig.add_node("lean", Some(rotator), Vec3::zeros(), id);
        let chassis = rig.add_node("chassis", Some(lean), Vec3::zeros(), id);
        let handlebar = rig.add_node("handlebar", Some(chassis), Vec3::new(0.0, 0.3, 0.7), id);
        let fork = rig.add_node("front_suspension", Some(handlebar), Vec3::zeros(), id);
        let front_wheel = rig.add_node("front_wheel", Some(fork), Vec3::new(0.0, -0.5, 0.0), id);
        let arm = rig.add_node("rear_suspension", Some(chassis), Vec3::new(0.0, -0.2, -0.1), id);
        let rear_wheel = rig.add_node("rear_wheel", Some(arm), Vec3::new(0.0, 0.0, -0.6), id);

        let refs = SharedRefs { body, rotator, lean, front_wheel, rear_wheel };
        let state = BikeState::new(refs, tunables());
        let host = PlaneWorld::new(Pos3::new(0.0, 0.6, 0.0), 150.0).with_ground(Plane::flat(0.0));
        Fixture { rig, state, host }
    }
}
