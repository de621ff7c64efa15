// ==============================================================================
// timer.rs — DELAYED ACTION (SHIFT LOCKOUT TIMER)
// ------------------------------------------------------------------------------
// Cancellable delayed action used for the gear-shift lockout.
//
// Starting a new delay invalidates the token of the previous one, so only the
// most recent shift ever completes.
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayToken(u64);

#[derive(Debug, Default, Clone)]
pub struct DelayedAction {
    generation: u64,
    remaining: Option<f32>,
}

impl DelayedAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the delay. Any in-flight delay is cancelled.
    pub fn start(&mut self, delay: f32) -> DelayToken {
        self.generation = self.generation.wrapping_add(1);
        self.remaining = Some(delay.max(0.0));
        DelayToken(self.generation)
    }

    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    /// Advances the delay; returns the token exactly once when it expires.
    pub fn tick(&mut self, dt: f32) -> Option<DelayToken> {
        let remaining = self.remaining.as_mut()?;
        *remaining -= dt.max(0.0);
        if *remaining <= 0.0 {
            self.remaining = None;
            Some(DelayToken(self.generation))
        } else {
            None
        }
    }
}
