// ==============================================================================
// main.rs — HEADLESS BIKE RUN ON THE RAPIER TEST TRACK
// ------------------------------------------------------------------------------
// Spawns one bike on the test track and drives it through a scripted input
// timeline:
//   frame pass    every tick (~60 Hz, measured dt)
//   physics pass  fixed 50 Hz, caught up from an accumulator, then world.step
//
// Events go to a logger task over a channel; telemetry is logged as JSON twice
// a second. Usage: bike-physics-server [config.json]
// ==============================================================================

use std::process::ExitCode;

use bike_physics::controller::BikeController;
use bike_physics::physics::PhysicsWorld;
use bike_physics::state::{BikeEvent, BikeInput};
use bike_physics::vehicle::BikeConfig;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, interval};
use tracing::{error, info, warn};
use uuid::Uuid;

const PHYSICS_DT: f32 = 0.02; // s
const MAX_FRAME_DT: f32 = 0.1; // s, clamp after stalls
const RUN_TIME: f32 = 20.0; // s
const TELEMETRY_EVERY: f32 = 0.5; // s
const TRACK_SEED: u64 = 7;

/// Input held at simulated time `t`. The manual box starts in neutral (1-N-2
/// pattern), so the script pulls the clutch and knocks down into first before
/// opening the throttle.
fn scripted_input(t: f32) -> BikeInput {
    let mut input = BikeInput::default();
    match t {
        t if t < 0.5 => {}                                     // settle on the springs
        t if t < 0.7 => { input.clutch = true; input.gear = -1.0; } // N -> 1
        t if t < 0.9 => input.clutch = true,
        t if t < 4.0 => input.accelerate = 1.0,
        t if t < 4.2 => { input.clutch = true; input.gear = 1.0; } // 1 -> 2
        t if t < 4.4 => input.clutch = true,
        t if t < 8.0 => input.accelerate = 1.0,
        t if t < 10.0 => { input.accelerate = 0.6; input.steer = 0.4; }
        t if t < 13.0 => {}                                    // coast
        t if t < 15.0 => input.reverse = 1.0,                  // brake
        t if t < 16.0 => input.hand_brake = true,
        _ => {}
    }
    input
}

#[tokio::main]
async fn main() -> ExitCode {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    info!("🚀 Starting bike physics run");

    let config = match std::env::args().nth(1) {
        Some(path) => match BikeConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(%path, error = %e, "cannot load bike config");
                return ExitCode::FAILURE;
            }
        },
        None => BikeConfig::dirt_bike(),
    };
    let mass = config.mass;

    let mut bike = match BikeController::new(config) {
        Ok(bike) => bike,
        Err(e) => {
            error!(error = %e, "cannot build bike");
            return ExitCode::FAILURE;
        }
    };

    let mut world = PhysicsWorld::new();
    world.build_test_track(TRACK_SEED);
    let handle = world.spawn_bike_body([0.0, 0.8, 0.0], mass);

    // Event logger
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<(Uuid, BikeEvent)>();
    let logger = tokio::spawn(async move {
        while let Some((id, event)) = events_rx.recv().await {
            match event {
                BikeEvent::GearChanged(gear) => info!(%id, gear, "gear"),
                BikeEvent::Grounded => info!(%id, "landed"),
                BikeEvent::TookOff => info!(%id, "airborne"),
            }
        }
    });

    // ~60 Hz frame clock
    let mut ticker = interval(Duration::from_millis(16));
    let mut last = Instant::now();
    let mut sim_time = 0.0_f32;
    let mut accumulator = 0.0_f32;
    let mut next_telemetry = 0.0_f32;

    while sim_time < RUN_TIME {
        ticker.tick().await;
        let now = Instant::now();
        let dt = (now - last).as_secs_f32().min(MAX_FRAME_DT);
        last = now;
        sim_time += dt;

        bike.set_input(scripted_input(sim_time));

        // Fixed-step physics
        accumulator += dt;
        while accumulator >= PHYSICS_DT {
            accumulator -= PHYSICS_DT;
            let Some(mut body) = world.body(handle) else {
                error!(?handle, "bike body vanished");
                return ExitCode::FAILURE;
            };
            bike.physics_update(&mut body, PHYSICS_DT);
            world.step(PHYSICS_DT);
        }

        // Frame pass
        let Some(mut body) = world.body(handle) else {
            error!(?handle, "bike body vanished");
            return ExitCode::FAILURE;
        };
        bike.frame_update(&mut body, dt);

        for event in bike.drain_events() {
            if events_tx.send((bike.id(), event)).is_err() {
                warn!("event logger gone");
            }
        }

        if sim_time >= next_telemetry {
            next_telemetry += TELEMETRY_EVERY;
            match serde_json::to_string(&bike.telemetry()) {
                Ok(json) => info!(target: "telemetry", "{json}"),
                Err(e) => warn!(error = %e, "telemetry encode failed"),
            }
        }
    }

    drop(events_tx);
    if let Err(e) = logger.await {
        warn!(error = %e, "event logger panicked");
    }

    info!(
        top_speed = bike.top_speed(),
        speed = bike.speed(),
        gear = bike.current_gear(),
        "run finished"
    );
    ExitCode::SUCCESS
}
