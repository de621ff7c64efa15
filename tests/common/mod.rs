//! Shared harness: one controller on an analytic plane host, stepped the way
//! the server loop does (physics pass, world step, frame pass).

#![allow(dead_code)]

use bike_physics::controller::BikeController;
use bike_physics::dynamics::types::Pos3;
use bike_physics::physics::plane::{Plane, PlaneWorld};
use bike_physics::state::{BikeEvent, BikeInput};
use bike_physics::vehicle::BikeConfig;

pub const DT: f32 = 0.02;

pub struct Ride {
    pub bike: BikeController,
    pub world: PlaneWorld,
    pub events: Vec<BikeEvent>,
}

impl Ride {
    pub fn new(config: BikeConfig) -> Self {
        let world = PlaneWorld::new(Pos3::new(0.0, 0.6, 0.0), config.mass).with_ground(Plane::flat(0.0));
        let bike = BikeController::new(config).expect("valid config");
        Self { bike, world, events: Vec::new() }
    }

    pub fn dirt_bike() -> Self {
        Self::new(BikeConfig::dirt_bike())
    }

    /// Holds `input` for `seconds` of simulated time.
    pub fn hold(&mut self, input: BikeInput, seconds: f32) {
        let steps = (seconds / DT).round() as usize;
        for _ in 0..steps {
            self.bike.set_input(input);
            self.bike.physics_update(&mut self.world, DT);
            self.world.step(DT);
            self.bike.frame_update(&mut self.world, DT);
            self.events.extend(self.bike.drain_events());
        }
    }

    pub fn idle(&mut self, seconds: f32) {
        self.hold(BikeInput::default(), seconds);
    }

    /// Clutch in, knock the lever down (neutral -> first), release.
    pub fn select_first(&mut self) {
        self.idle(0.1);
        self.hold(BikeInput { clutch: true, gear: -1.0, ..BikeInput::default() }, 0.1);
        self.hold(BikeInput { clutch: true, ..BikeInput::default() }, 0.1);
    }

    pub fn forward_speed(&self) -> f32 {
        self.bike.state().local_velocity.z
    }

    pub fn count(&self, event: BikeEvent) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }
}

pub fn throttle(amount: f32) -> BikeInput {
    BikeInput { accelerate: amount, ..BikeInput::default() }
}
