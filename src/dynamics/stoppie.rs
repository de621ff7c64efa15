// ==============================================================================
// stoppie.rs — STOPPIE (FRONT-WHEEL PITCH MANEUVER)
// ------------------------------------------------------------------------------
// Stoppie: hand brake on the front wheel lifts the tail about the front
// contact patch.
// ==============================================================================

use tracing::debug;

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::maneuver::{MIN_ENTRY_SPEED, PitchPivot, forward_speed_ratio, surface_too_steep};
use crate::error::Result;
use crate::rig::BikeRig;
use crate::state::BikeState;
use crate::vehicle::StoppieConfig;

pub struct StoppieFeature {
    config: StoppieConfig,
    pivot: PitchPivot,
}

impl StoppieFeature {
    pub fn new(config: &StoppieConfig) -> Self {
        Self { config: config.clone(), pivot: PitchPivot::default() }
    }

    fn update_state(state: &mut BikeState) -> bool {
        let braking = state.input.hand_brake;
        let blocked = state.doing_wheelie || state.doing_burnout;

        if braking && !blocked && state.front_grounded && state.local_velocity.norm() > MIN_ENTRY_SPEED {
            state.doing_stoppie = true;
        }
        if !braking && state.rear_grounded {
            state.doing_stoppie = false;
        }

        if surface_too_steep(state) {
            let forced = state.doing_stoppie;
            state.doing_stoppie = false;
            return forced;
        }
        false
    }
}

impl BikeFeature for StoppieFeature {
    fn initialize(&mut self, rig: &BikeRig, _state: &mut BikeState) -> Result<()> {
        self.pivot.resolve(rig, "stoppie", &self.config.node)
    }

    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        if !self.pivot.is_resolved() {
            return;
        }
        let was_doing = ctx.state.doing_stoppie;
        if Self::update_state(ctx.state) {
            debug!(angle = self.pivot.angle(), "stoppie cut by steep surface");
            self.pivot.begin_recovery();
        }
        if ctx.state.doing_stoppie && !was_doing {
            self.pivot.cancel_recovery();
        }

        let s = &*ctx.state;
        let target = if s.doing_stoppie && s.input.hand_brake {
            self.config.max_angle * self.config.curve.evaluate(forward_speed_ratio(s))
        } else {
            0.0
        };
        let recovery_rate = s.tunables.align_speed_in_ground;
        self.pivot.advance(ctx.rig, target, self.config.animation_speed, recovery_rate, dt);
    }
}
