// ==============================================================================
// wheelie.rs — WHEELIE (REAR-WHEEL PITCH MANEUVER)
// ------------------------------------------------------------------------------
// Wheelie: clutch + throttle on the rear wheel lifts the nose about the rear
// contact patch.
// ==============================================================================

use tracing::debug;

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::maneuver::{MIN_ENTRY_SPEED, PitchPivot, forward_speed_ratio, surface_too_steep};
use crate::error::Result;
use crate::rig::BikeRig;
use crate::state::BikeState;
use crate::vehicle::WheelieConfig;

pub struct WheelieFeature {
    config: WheelieConfig,
    pivot: PitchPivot,
}

impl WheelieFeature {
    pub fn new(config: &WheelieConfig) -> Self {
        Self { config: config.clone(), pivot: PitchPivot::default() }
    }

    /// Updates `doing_wheelie`; returns true when the wheelie was cut short by
    /// a steep surface.
    fn update_state(state: &mut BikeState) -> bool {
        let inputs = state.input.clutch && state.input.accelerate > 0.0;
        let blocked = state.doing_stoppie || state.doing_burnout;

        if inputs && !blocked && state.rear_grounded && state.local_velocity.norm() > MIN_ENTRY_SPEED {
            state.doing_wheelie = true;
        }
        if !inputs && state.front_grounded {
            state.doing_wheelie = false;
        }

        if surface_too_steep(state) {
            let forced = state.doing_wheelie;
            state.doing_wheelie = false;
            return forced;
        }
        false
    }
}

impl BikeFeature for WheelieFeature {
    fn initialize(&mut self, rig: &BikeRig, _state: &mut BikeState) -> Result<()> {
        self.pivot.resolve(rig, "wheelie", &self.config.node)
    }

    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        if !self.pivot.is_resolved() {
            return;
        }
        let was_doing = ctx.state.doing_wheelie;
        if Self::update_state(ctx.state) {
            debug!(angle = self.pivot.angle(), "wheelie cut by steep surface");
            self.pivot.begin_recovery();
        }
        if ctx.state.doing_wheelie && !was_doing {
            self.pivot.cancel_recovery();
        }

        let s = &*ctx.state;
        let holding = s.doing_wheelie && s.input.clutch && s.input.accelerate > 0.0;
        let target = if holding {
            -self.config.max_angle * self.config.curve.evaluate(forward_speed_ratio(s))
        } else {
            0.0
        };
        let recovery_rate = s.tunables.align_speed_in_ground;
        self.pivot.advance(ctx.rig, target, self.config.animation_speed, recovery_rate, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::feature::testing::fixture;
    use crate::dynamics::types::Vec3;

    fn ready() -> (crate::dynamics::feature::testing::Fixture, WheelieFeature) {
        let mut fx = fixture();
        let mut wheelie = WheelieFeature::new(&WheelieConfig::default());
        wheelie.initialize(&fx.rig, &mut fx.state).unwrap();
        fx.state.front_grounded = true;
        fx.state.rear_grounded = true;
        fx.state.local_velocity = Vec3::new(0.0, 0.0, 8.0);
        (fx, wheelie)
    }

    #[test]
    fn clutch_and_throttle_lift_the_nose() {
        let (mut fx, mut wheelie) = ready();
        fx.state.input.clutch = true;
        fx.state.input.accelerate = 1.0;
        for _ in 0..200 {
            wheelie.on_frame(&mut fx.ctx(), 0.016);
        }
        assert!(fx.state.doing_wheelie);
        assert!((wheelie.pivot.angle() + 30.0).abs() < 0.5);
        let node = fx.rig.find("wheelie").unwrap();
        assert!(fx.rig.forward(node).y > 0.4);

        // release with the front wheel down: over
        fx.state.input.clutch = false;
        wheelie.on_frame(&mut fx.ctx(), 0.016);
        assert!(!fx.state.doing_wheelie);
    }

    #[test]
    fn blocked_by_stoppie_or_burnout() {
        let (mut fx, mut wheelie) = ready();
        fx.state.input.clutch = true;
        fx.state.input.accelerate = 1.0;
        fx.state.doing_stoppie = true;
        wheelie.on_frame(&mut fx.ctx(), 0.016);
        assert!(!fx.state.doing_wheelie);

        fx.state.doing_stoppie = false;
        fx.state.doing_burnout = true;
        wheelie.on_frame(&mut fx.ctx(), 0.016);
        assert!(!fx.state.doing_wheelie);
    }

    #[test]
    fn needs_speed_to_start() {
        let (mut fx, mut wheelie) = ready();
        fx.state.local_velocity = Vec3::new(0.0, 0.0, 0.05);
        fx.state.input.clutch = true;
        fx.state.input.accelerate = 1.0;
        wheelie.on_frame(&mut fx.ctx(), 0.016);
        assert!(!fx.state.doing_wheelie);
    }

    #[test]
    fn steep_surface_forces_exit() {
        let (mut fx, mut wheelie) = ready();
        fx.state.input.clutch = true;
        fx.state.input.accelerate = 1.0;
        for _ in 0..50 {
            wheelie.on_frame(&mut fx.ctx(), 0.016);
        }
        let lifted = wheelie.pivot.angle();

        fx.state.front_ground_normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        wheelie.on_frame(&mut fx.ctx(), 0.016);
        assert!(!fx.state.doing_wheelie);
        // eased at the ground alignment rate (20/s) rather than 3/s
        assert!((wheelie.pivot.angle() - lifted * 0.68).abs() < 0.05);
    }
}
