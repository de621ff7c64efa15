// ==============================================================================
// longitudinal.rs — LONGITUDINAL DRIVE MODEL
// ------------------------------------------------------------------------------
// Throttle, reverse, brakes and rolling resistance along the ground-projected
// forward axis.
//
// The force law is a pure function of a [`DriveInputs`] snapshot so it can be
// checked without a host; [`DriveFeature`] only gathers inputs, publishes the
// brake flags and applies the result as an acceleration.
// ==============================================================================

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::types::{EPSILON, approx_eq, normalize_or_zero, project_on_plane, sign};
use crate::physics::ForceMode;
use crate::vehicle::DriveConfig;

const MAX_SPEED_TOLERANCE: f32 = 0.01; // m/s over the gear limit before throttle cuts

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveInputs {
    pub forward_speed: f32, // m/s, rotator-local z
    pub speed: f32,         // m/s, magnitude
    pub accelerate: f32,
    pub reverse: f32,
    pub hand_brake: bool,
    pub clutch: bool,
    pub doing_stoppie: bool,
    pub current_max_speed: f32,
    pub dt: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveCommand {
    pub acceleration: f32,          // m/s² along forward, signed
    pub applying_brake: Option<bool>, // None: leave the flag untouched
    pub applying_hand_brake: bool,
}

/// Acceleration of up to `rate` opposing `forward_speed`, scaled down at low
/// speed; never reverses the motion in one step. Used for rolling resistance
/// and the burnout brake.
pub fn opposing_acceleration(rate: f32, forward_speed: f32, dt: f32) -> f32 {
    let mut limit = rate.min(rate * forward_speed.abs());
    if dt > EPSILON {
        limit = limit.min(forward_speed.abs() / dt);
    }
    -sign(forward_speed) * limit.max(0.0)
}

fn ratio(value: f32, max: f32) -> f32 {
    if max.abs() > EPSILON { value / max } else { 0.0 }
}

pub struct DriveFeature {
    config: DriveConfig,
}

impl DriveFeature {
    pub fn new(config: &DriveConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn command(&self, inp: &DriveInputs) -> DriveCommand {
        let cfg = &self.config;
        let v = inp.forward_speed;
        let per_step = |dv: f32| if inp.dt > EPSILON { dv / inp.dt } else { 0.0 };

        if inp.hand_brake {
            let decel = if v >= 0.0 { -cfg.hand_brake_deceleration } else { cfg.hand_brake_deceleration };
            let limit = per_step(v.abs());
            return DriveCommand {
                acceleration: decel.clamp(-limit, limit),
                applying_brake: None,
                applying_hand_brake: true,
            };
        }

        let max = inp.current_max_speed;
        let throttle_allowed = inp.accelerate > 0.0
            && !inp.doing_stoppie
            && !approx_eq(max, 0.0)
            && inp.speed <= max + MAX_SPEED_TOLERANCE
            && !inp.clutch;

        let (acceleration, braking) = if throttle_allowed {
            let push = cfg.acceleration * inp.accelerate * cfg.acceleration_curve.evaluate(ratio(inp.speed, max));
            let a = if v >= 0.0 { push.min(per_step(max - v)) } else { cfg.deceleration };
            (a, v < 0.0)
        } else if inp.reverse > 0.0 && !inp.doing_stoppie {
            let rmax = cfg.reverse_max_speed;
            let pull = -cfg.reverse_acceleration
                * inp.reverse
                * cfg.reverse_curve.evaluate(ratio(inp.speed, rmax));
            let a = if v >= 0.0 { -cfg.deceleration } else { pull.max(-per_step(rmax + v)) };
            (a, v >= 0.0)
        } else {
            (opposing_acceleration(cfg.rolling_resistance, v, inp.dt), false)
        };

        DriveCommand { acceleration, applying_brake: Some(braking), applying_hand_brake: false }
    }
}

impl BikeFeature for DriveFeature {
    fn on_physics(&mut self, ctx: &mut BikeContext<'_>, dt: f32) {
        let s = &mut *ctx.state;
        if !s.grounded || !s.can_accelerate || s.doing_burnout {
            return;
        }

        let cmd = self.command(&DriveInputs {
            forward_speed: s.local_velocity.z,
            speed: s.local_velocity.norm(),
            accelerate: s.input.accelerate,
            reverse: s.input.reverse,
            hand_brake: s.input.hand_brake,
            clutch: s.input.clutch,
            doing_stoppie: s.doing_stoppie,
            current_max_speed: s.current_max_speed,
            dt,
        });

        s.applying_hand_brake = cmd.applying_hand_brake;
        if let Some(braking) = cmd.applying_brake {
            s.applying_brake = braking;
        }

        let direction = normalize_or_zero(project_on_plane(s.projected_forward, s.ground_normal));
        ctx.host.add_force(direction * cmd.acceleration, ForceMode::Acceleration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::feature::testing::fixture;
    use crate::dynamics::types::Vec3;

    const DT: f32 = 0.02;

    fn inputs(v: f32) -> DriveInputs {
        DriveInputs {
            forward_speed: v,
            speed: v.abs(),
            current_max_speed: 20.0,
            dt: DT,
            ..DriveInputs::default()
        }
    }

    fn drive() -> DriveFeature {
        DriveFeature::new(&DriveConfig::default())
    }

    #[test]
    fn throttle_from_standstill_uses_full_curve() {
        let cmd = drive().command(&DriveInputs { accelerate: 1.0, ..inputs(0.0) });
        assert!((cmd.acceleration - 15.0).abs() < 1e-4);
        assert_eq!(cmd.applying_brake, Some(false));
    }

    #[test]
    fn throttle_never_overshoots_gear_limit() {
        let cmd = drive().command(&DriveInputs { accelerate: 1.0, ..inputs(19.99) });
        assert!(cmd.acceleration <= (20.0 - 19.99) / DT + 1e-3);
        // over the limit: coast instead
        let cmd = drive().command(&DriveInputs { accelerate: 1.0, ..inputs(20.5) });
        assert!(cmd.acceleration < 0.0);
    }

    #[test]
    fn throttle_while_rolling_back_brakes() {
        let cmd = drive().command(&DriveInputs { accelerate: 1.0, ..inputs(-2.0) });
        assert_eq!(cmd.acceleration, 20.0);
        assert_eq!(cmd.applying_brake, Some(true));
    }

    #[test]
    fn reverse_while_moving_forward_brakes() {
        let cmd = drive().command(&DriveInputs { reverse: 1.0, ..inputs(5.0) });
        assert_eq!(cmd.acceleration, -20.0);
        assert_eq!(cmd.applying_brake, Some(true));

        let cmd = drive().command(&DriveInputs { reverse: 1.0, ..inputs(-2.99) });
        assert!(cmd.acceleration >= -(3.0 - 2.99) / DT - 1e-3);
    }

    #[test]
    fn neutral_gear_or_clutch_cuts_throttle() {
        let cmd = drive().command(&DriveInputs { accelerate: 1.0, current_max_speed: 0.0, ..inputs(0.0) });
        assert_eq!(cmd.acceleration, 0.0);
        let cmd = drive().command(&DriveInputs { accelerate: 1.0, clutch: true, ..inputs(3.0) });
        assert!(cmd.acceleration < 0.0);
    }

    #[test]
    fn hand_brake_stops_without_reversing() {
        let cmd = drive().command(&DriveInputs { hand_brake: true, ..inputs(0.05) });
        assert!((cmd.acceleration + 0.05 / DT).abs() < 1e-4);
        assert!(cmd.applying_hand_brake);
        assert_eq!(cmd.applying_brake, None);

        let cmd = drive().command(&DriveInputs { hand_brake: true, ..inputs(-8.0) });
        assert_eq!(cmd.acceleration, 5.0);
    }

    #[test]
    fn rolling_resistance_is_bounded() {
        assert_eq!(opposing_acceleration(1.0, 10.0, DT), -1.0);
        assert!((opposing_acceleration(1.0, 0.5, DT) + 0.5).abs() < 1e-6);
        assert!((opposing_acceleration(1.0, -0.001, DT) - 0.001).abs() < 1e-6);
        assert_eq!(opposing_acceleration(1.0, 0.0, DT), 0.0);
    }

    #[test]
    fn skipped_when_airborne_or_locked_out() {
        let mut fx = fixture();
        let mut drive = drive();
        fx.state.input.accelerate = 1.0;
        fx.state.current_max_speed = 20.0;

        drive.on_physics(&mut fx.ctx(), DT);
        assert_eq!(fx.host.pending_acceleration(), Vec3::zeros());

        fx.state.grounded = true;
        fx.state.can_accelerate = false;
        drive.on_physics(&mut fx.ctx(), DT);
        assert_eq!(fx.host.pending_acceleration(), Vec3::zeros());

        fx.state.can_accelerate = true;
        drive.on_physics(&mut fx.ctx(), DT);
        assert!((fx.host.pending_acceleration().z - 15.0).abs() < 1e-4);
    }
}
