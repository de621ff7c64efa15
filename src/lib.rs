//! Arcade motorcycle dynamics on top of a host rigid body.
//!
//! A [`controller::BikeController`] drives a hierarchy of rig nodes (body,
//! rotator, lean pivot, wheels...) from a configurable set of features. The
//! physics engine stays behind [`physics::PhysicsHost`]; the crate ships a
//! rapier3d world and an analytic plane host.

pub mod controller;
pub mod dynamics;
pub mod error;
pub mod physics;
pub mod rig;
pub mod state;
pub mod suspension_contact;
pub mod vehicle;

pub use controller::BikeController;
pub use error::{ConfigError, Result};
pub use state::{BikeEvent, BikeInput, BikeTelemetry};
pub use vehicle::BikeConfig;
