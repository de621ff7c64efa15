//! dynamics - engine-agnostic bike behaviour (math, curves, features)

pub mod types;
pub mod curve;
pub mod timer;
pub mod feature;
pub mod gravity;
pub mod aligner;
pub mod longitudinal;
pub mod steering;
pub mod lean;
pub mod maneuver;
pub mod wheelie;
pub mod stoppie;
pub mod burnout;
pub mod gear;

pub use feature::{BikeContext, BikeFeature, Feature, FeatureKind};
pub use types::*;
