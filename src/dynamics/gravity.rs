// ==============================================================================
// gravity.rs — GRAVITY
// ------------------------------------------------------------------------------
// Gravity as a feature: the host body runs with engine gravity disabled.
// ==============================================================================

use crate::dynamics::feature::{BikeContext, BikeFeature};
use crate::dynamics::types::Vec3;
use crate::physics::ForceMode;
use crate::vehicle::GravityConfig;

pub struct GravityFeature {
    acceleration: f32, // m/s², world y
}

impl GravityFeature {
    pub fn new(config: &GravityConfig) -> Self {
        Self { acceleration: config.acceleration }
    }
}

impl BikeFeature for GravityFeature {
    fn on_physics(&mut self, ctx: &mut BikeContext<'_>, _dt: f32) {
        ctx.host.add_force(Vec3::new(0.0, self.acceleration, 0.0), ForceMode::Acceleration);
    }
}
