// ==============================================================================
// gear.rs — MANUAL + AUTOMATIC GEARBOX
// ------------------------------------------------------------------------------
// Gear 0 is neutral, gears 1..=n index the speed table.
//
// Manual: the gear axis is read against two thresholds per direction. Each
// threshold fires once and re-arms only when the axis drops below the half
// threshold (the shifter starts disarmed). A proposed gear commits only with
// the clutch held.
//
//   full up   : N -> 2, otherwise +1
//   half up   : 1 -> N
//   half down : 2 -> N
//   full down : N -> 1, 1 stays, otherwise -1
//
// Automatic: gear follows the speed table every physics step; a change is
// announced (and locks the throttle) only while driving forward on the ground.
//
// Every committed shift cuts acceleration for `shift_time` seconds. A newer
// shift restarts the lockout.
// ==============================================================================

use tracing::debug;

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::timer::DelayedAction;
use crate::dynamics::types::approx_eq;
use crate::state::{BikeEvent, BikeState};

const NEUTRAL_MAX_SPEED: f32 = 0.0;

// ----------------------------------------------------------------------------
// Shift lockout
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ShiftLockout {
    timer: DelayedAction,
    shift_time: f32,
}

impl ShiftLockout {
    pub fn new(shift_time: f32) -> Self {
        Self { timer: DelayedAction::new(), shift_time }
    }

    pub fn engage(&mut self, state: &mut BikeState) {
        if approx_eq(self.shift_time, 0.0) {
            self.timer.cancel();
            state.can_accelerate = true;
            return;
        }
        state.can_accelerate = false;
        self.timer.start(self.shift_time);
    }

    pub fn tick(&mut self, state: &mut BikeState, dt: f32) {
        if self.timer.tick(dt).is_some() {
            state.can_accelerate = true;
        }
    }
}

fn announce(state: &mut BikeState, gear: usize) {
    debug!(gear, "gear changed");
    state.current_gear = gear;
    state.emit(BikeEvent::GearChanged(gear));
}

// ----------------------------------------------------------------------------
// Manual
// ----------------------------------------------------------------------------

pub fn full_up(gear: usize, count: usize) -> usize {
    let next = if gear == 0 { 2 } else { gear + 1 };
    next.min(count)
}

pub fn half_up(gear: usize, count: usize) -> usize {
    let next = if gear == 1 { 0 } else { gear };
    next.min(count)
}

pub fn half_down(gear: usize, count: usize) -> usize {
    let next = if gear == 2 { 0 } else { gear };
    next.min(count)
}

pub fn full_down(gear: usize, count: usize) -> usize {
    let next = match gear {
        0 => 1,
        1 => 1,
        g => g - 1,
    };
    next.min(count)
}

/// Debounced two-threshold shifter.
#[derive(Debug, Clone)]
pub struct ManualShifter {
    half: f32,
    full: f32,
    can_half_up: bool,
    can_full_up: bool,
    can_half_down: bool,
    can_full_down: bool,
}

impl ManualShifter {
    pub fn new(half: f32, full: f32) -> Self {
        Self {
            half,
            full,
            can_half_up: false,
            can_full_up: false,
            can_half_down: false,
            can_full_down: false,
        }
    }

    /// Reads one frame of the gear axis and returns the proposed gear.
    pub fn update(&mut self, gear: usize, axis: f32, count: usize) -> usize {
        let up = axis.max(0.0);
        let down = (-axis).max(0.0);
        let mut next = gear;

        if up > self.full {
            if self.can_full_up {
                self.can_full_up = false;
                next = full_up(next, count);
            }
        } else if up > self.half {
            if self.can_half_up {
                self.can_half_up = false;
                next = half_up(next, count);
            }
        } else {
            self.can_full_up = true;
            self.can_half_up = true;
        }

        if down > self.full {
            if self.can_full_down {
                self.can_full_down = false;
                next = full_down(next, count);
            }
        } else if down > self.half {
            if self.can_half_down {
                self.can_half_down = false;
                next = half_down(next, count);
            }
        } else {
            self.can_full_down = true;
            self.can_half_down = true;
        }

        next
    }
}

pub struct ManualGearFeature {
    gears: Vec<f32>, // max speed per gear, m/s
    shifter: ManualShifter,
    lockout: ShiftLockout,
    gear: usize,
    max_speed_dirty: bool, // applied on the next physics step
}

impl ManualGearFeature {
    pub fn new(gears: Vec<f32>, shift_time: f32, shifter: ManualShifter, initial_gear: usize) -> Self {
        let gear = initial_gear.min(gears.len());
        Self { gears, shifter, lockout: ShiftLockout::new(shift_time), gear, max_speed_dirty: false }
    }

    pub fn gear(&self) -> usize {
        self.gear
    }

    fn max_speed(&self) -> f32 {
        match self.gear {
            0 => NEUTRAL_MAX_SPEED,
            g => self.gears.get(g - 1).copied().unwrap_or(NEUTRAL_MAX_SPEED),
        }
    }
}

impl BikeFeature for ManualGearFeature {
    fn on_start(&mut self, ctx: &mut BikeContext<'_>) {
        self.gear = self.gear.min(self.gears.len());
        ctx.state.current_max_speed = self.max_speed();
        announce(ctx.state, self.gear);
    }

    fn on_frame(&mut self, ctx: &mut BikeContext<'_>, _dt: f32) {
        let proposed = self.shifter.update(self.gear, ctx.state.input.gear, self.gears.len());
        if proposed == self.gear || !ctx.state.input.clutch {
            return;
        }
        self.gear = proposed;
        self.max_speed_dirty = true;
        announce(ctx.state, self.gear);
        self.lockout.engage(ctx.state);
    }

    fn on_physics(&mut self, ctx: &mut BikeContext<'_>, _dt: f32) {
        if self.max_speed_dirty {
            self.max_speed_dirty = false;
            ctx.state.current_max_speed = self.max_speed();
        }
    }

    fn advance_timers(&mut self, state: &mut BikeState, dt: f32) {
        self.lockout.tick(state, dt);
    }
}

// ----------------------------------------------------------------------------
// Automatic
// ----------------------------------------------------------------------------

/// Highest gear whose threshold `speed` exceeds (thresholds ascending).
pub fn gear_for_speed(gears: &[f32], speed: f32) -> usize {
    gears.iter().take_while(|&&threshold| speed > threshold).count()
}

pub struct AutomaticGearFeature {
    gears: Vec<f32>, // upshift thresholds, m/s
    lockout: ShiftLockout,
    gear: usize,
}

impl AutomaticGearFeature {
    pub fn new(gears: Vec<f32>, shift_time: f32, initial_gear: usize) -> Self {
        let gear = initial_gear.min(gears.len());
        Self { gears, lockout: ShiftLockout::new(shift_time), gear }
    }

    pub fn gear(&self) -> usize {
        self.gear
    }
}

impl BikeFeature for AutomaticGearFeature {
    fn on_start(&mut self, ctx: &mut BikeContext<'_>) {
        ctx.state.current_max_speed = ctx.state.tunables.max_speed;
        self.gear = self.gear.min(self.gears.len());
        announce(ctx.state, self.gear);
    }

    fn on_physics(&mut self, ctx: &mut BikeContext<'_>, _dt: f32) {
        let s = &mut *ctx.state;
        let next = gear_for_speed(&self.gears, s.local_velocity.norm());
        if next == self.gear {
            return;
        }
        self.gear = next;
        s.current_gear = next;
        if s.input.accelerate > 0.0 && s.local_velocity.z > 0.0 && s.grounded {
            announce(s, next);
            self.lockout.engage(s);
        }
    }

    fn advance_timers(&mut self, state: &mut BikeState, dt: f32) {
        self.lockout.tick(state, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::feature::testing::fixture;
    use crate::dynamics::types::Vec3;

    #[test]
    fn transition_table() {
        assert_eq!(full_up(0, 4), 2);
        assert_eq!(full_up(2, 4), 3);
        assert_eq!(full_up(4, 4), 4);
        assert_eq!(half_up(1, 4), 0);
        assert_eq!(half_up(3, 4), 3);
        assert_eq!(half_down(2, 4), 0);
        assert_eq!(half_down(3, 4), 3);
        assert_eq!(full_down(0, 4), 1);
        assert_eq!(full_down(1, 4), 1);
        assert_eq!(full_down(3, 4), 2);
        // single-gear box clamps the N -> 2 jump
        assert_eq!(full_up(0, 1), 1);
    }

    #[test]
    fn shifter_starts_disarmed_and_debounces() {
        let mut shifter = ManualShifter::new(0.3, 0.7);
        assert_eq!(shifter.update(0, 1.0, 4), 0);
        assert_eq!(shifter.update(0, 0.0, 4), 0);
        assert_eq!(shifter.update(0, 1.0, 4), 2);
        // held: no repeat
        assert_eq!(shifter.update(2, 1.0, 4), 2);
        // drop to half range only: still disarmed
        assert_eq!(shifter.update(2, 0.5, 4), 2);
        assert_eq!(shifter.update(2, 0.0, 4), 2);
        assert_eq!(shifter.update(2, 1.0, 4), 3);
    }

    #[test]
    fn half_push_from_first_goes_to_neutral() {
        let mut shifter = ManualShifter::new(0.3, 0.7);
        shifter.update(1, 0.0, 4);
        assert_eq!(shifter.update(1, 0.5, 4), 0);
        shifter.update(0, 0.0, 4);
        assert_eq!(shifter.update(0, -1.0, 4), 1);
    }

    fn manual() -> ManualGearFeature {
        ManualGearFeature::new(vec![10.0, 20.0, 30.0, 40.0], 0.2, ManualShifter::new(0.3, 0.7), 0)
    }

    #[test]
    fn manual_start_announces_neutral() {
        let mut fx = fixture();
        let mut gear = manual();
        gear.on_start(&mut fx.ctx());
        assert_eq!(fx.state.drain_events(), vec![BikeEvent::GearChanged(0)]);
        assert_eq!(fx.state.current_max_speed, 0.0);
    }

    #[test]
    fn manual_shift_needs_clutch_and_locks_throttle() {
        let mut fx = fixture();
        let mut gear = manual();
        gear.on_start(&mut fx.ctx());
        fx.state.drain_events();

        gear.on_frame(&mut fx.ctx(), 0.016); // arm
        fx.state.input.gear = 1.0;
        gear.on_frame(&mut fx.ctx(), 0.016);
        assert_eq!(gear.gear(), 0, "no clutch, no shift");

        fx.state.input.gear = 0.0;
        gear.on_frame(&mut fx.ctx(), 0.016);
        fx.state.input.clutch = true;
        fx.state.input.gear = 1.0;
        gear.on_frame(&mut fx.ctx(), 0.016);
        assert_eq!(gear.gear(), 2);
        assert_eq!(fx.state.drain_events(), vec![BikeEvent::GearChanged(2)]);
        assert!(!fx.state.can_accelerate);

        gear.on_physics(&mut fx.ctx(), 0.02);
        assert_eq!(fx.state.current_max_speed, 20.0);

        gear.advance_timers(&mut fx.state, 0.15);
        assert!(!fx.state.can_accelerate);
        gear.advance_timers(&mut fx.state, 0.06);
        assert!(fx.state.can_accelerate);
    }

    #[test]
    fn newer_shift_restarts_lockout() {
        let mut fx = fixture();
        let mut lockout = ShiftLockout::new(0.2);
        lockout.engage(&mut fx.state);
        lockout.tick(&mut fx.state, 0.15);
        lockout.engage(&mut fx.state);
        lockout.tick(&mut fx.state, 0.1);
        assert!(!fx.state.can_accelerate);
        lockout.tick(&mut fx.state, 0.11);
        assert!(fx.state.can_accelerate);
    }

    #[test]
    fn zero_shift_time_never_locks() {
        let mut fx = fixture();
        let mut lockout = ShiftLockout::new(0.0);
        lockout.engage(&mut fx.state);
        assert!(fx.state.can_accelerate);
    }

    #[test]
    fn automatic_follows_speed_table() {
        assert_eq!(gear_for_speed(&[10.0, 20.0, 30.0], 0.0), 0);
        assert_eq!(gear_for_speed(&[10.0, 20.0, 30.0], 10.0), 0);
        assert_eq!(gear_for_speed(&[10.0, 20.0, 30.0], 25.0), 2);
        assert_eq!(gear_for_speed(&[10.0, 20.0, 30.0], 99.0), 3);

        let mut fx = fixture();
        let mut gear = AutomaticGearFeature::new(vec![10.0, 20.0], 0.2, 0);
        gear.on_start(&mut fx.ctx());
        assert_eq!(fx.state.current_max_speed, 20.0);
        fx.state.drain_events();

        // coasting: gear tracks speed silently
        fx.state.grounded = true;
        fx.state.local_velocity = Vec3::new(0.0, 0.0, 12.0);
        gear.on_physics(&mut fx.ctx(), 0.02);
        assert_eq!(gear.gear(), 1);
        assert!(fx.state.drain_events().is_empty());
        assert!(fx.state.can_accelerate);

        fx.state.input.accelerate = 1.0;
        fx.state.local_velocity = Vec3::new(0.0, 0.0, 21.0);
        gear.on_physics(&mut fx.ctx(), 0.02);
        assert_eq!(fx.state.drain_events(), vec![BikeEvent::GearChanged(2)]);
        assert!(!fx.state.can_accelerate);
    }
}
