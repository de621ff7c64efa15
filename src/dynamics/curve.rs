// ==============================================================================
// curve.rs — SAMPLED RESPONSE CURVES
// ------------------------------------------------------------------------------
// Speed → multiplier mappings used by every tunable response of the bike:
// acceleration falloff, steering sensitivity, lean, wheelie/stoppie height,
// sideways friction.
//
// A curve is an ordered list of keys plus an interpolation mode:
// - Linear:   straight segments between keys
// - Smooth:   cubic Hermite through each key using its in/out tangents
//             (zero tangents give an ease-in/ease-out shape)
// - Constant: step function, holds the value of the previous key
//
// Outside the key range the curve clamps to the first/last value.
// ==============================================================================

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Linear,
    #[default]
    Smooth,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
}

impl CurveKey {
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value, in_tangent: 0.0, out_tangent: 0.0 }
    }

    pub const fn with_tangents(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self { time, value, in_tangent, out_tangent }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Curve {
    #[serde(default)]
    pub mode: Interpolation,
    pub keys: Vec<CurveKey>,
}

impl Curve {
    pub fn new(mode: Interpolation, mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { mode, keys }
    }

    pub fn linear(points: &[(f32, f32)]) -> Self {
        Self::new(
            Interpolation::Linear,
            points.iter().map(|&(t, v)| CurveKey::new(t, v)).collect(),
        )
    }

    /// Hermite curve with flat tangents at every key.
    pub fn smooth(points: &[(f32, f32)]) -> Self {
        Self::new(
            Interpolation::Smooth,
            points.iter().map(|&(t, v)| CurveKey::new(t, v)).collect(),
        )
    }

    pub fn constant(value: f32) -> Self {
        Self::new(Interpolation::Constant, vec![CurveKey::new(0.0, value)])
    }

    /// Re-sorts keys after deserialization.
    pub(crate) fn normalize(&mut self) {
        self.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    pub fn evaluate(&self, time: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        let last = self.keys[self.keys.len() - 1];

        if time.is_nan() || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        // first key with time > `time`; guaranteed in 1..len
        let hi = self.keys.partition_point(|k| k.time <= time);
        let a = self.keys[hi - 1];
        let b = self.keys[hi];

        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        let t = (time - a.time) / span;

        match self.mode {
            Interpolation::Constant => a.value,
            Interpolation::Linear => a.value + (b.value - a.value) * t,
            Interpolation::Smooth => {
                // cubic Hermite basis
                let t2 = t * t;
                let t3 = t2 * t;
                let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
                let h10 = t3 - 2.0 * t2 + t;
                let h01 = -2.0 * t3 + 3.0 * t2;
                let h11 = t3 - t2;
                h00 * a.value + h10 * span * a.out_tangent + h01 * b.value + h11 * span * b.in_tangent
            }
        }
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::constant(1.0)
    }
}
