//! Shipped configuration files load, validate and drive.

mod common;

use std::path::PathBuf;

use bike_physics::controller::BikeController;
use bike_physics::vehicle::{BikeConfig, GearConfig};
use common::{Ride, throttle};

fn config_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs").join(name)
}

#[test]
fn street_bike_overrides_on_top_of_defaults() {
    let config = BikeConfig::from_file(config_path("street_bike.json")).unwrap();
    assert_eq!(config.name, "street-bike");
    assert_eq!(config.drive.max_speed, 45.0);
    // untouched field keeps the dirt bike default
    assert_eq!(config.drive.hand_brake_deceleration, BikeConfig::dirt_bike().drive.hand_brake_deceleration);
    assert_eq!(config.rig, BikeConfig::dirt_bike().rig);
    assert!(matches!(config.gear, GearConfig::Automatic { ref gears, .. } if gears.len() == 5));

    let bike = BikeController::new(config).unwrap();
    assert!(bike.inert_features().is_empty());
}

#[test]
fn street_bike_rides() {
    let config = BikeConfig::from_file(config_path("street_bike.json")).unwrap();
    let mut ride = Ride::new(config);
    ride.idle(2.0);
    ride.hold(throttle(1.0), 2.0);
    assert!(ride.forward_speed() > 8.0);
    assert!(ride.bike.current_gear() >= 1);
}
