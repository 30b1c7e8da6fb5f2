//! Wave Arena headless driver
//!
//! Usage: `wave-arena [settings.json] [frames]`
//!
//! Runs the simulation at 60 Hz with a scripted circular walk, picks offered
//! upgrades in rotation, logs events, and prints the final snapshot as JSON.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::path::Path;
    use std::rc::Rc;

    use glam::Vec2;
    use wave_arena::Settings;
    use wave_arena::consts::*;
    use wave_arena::polar_to_cartesian;
    use wave_arena::sim::{Command, GameEvent, Simulation, TickInput};

    const FRAME_DT: f32 = 1.0 / 60.0;
    /// Corner rocks block spawns this close to a world corner
    const ROCK_RADIUS: f32 = 220.0;

    env_logger::init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => Settings::load(Path::new(&path)),
        None => Settings::default(),
    };
    let frames: u64 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60 * 180);
    log::info!("Wave Arena (headless) starting, {} frames", frames);

    let mut sim = Simulation::from_settings(settings);
    sim.set_obstruction(Some(Rc::new(|x, y| {
        let corners = [
            Vec2::ZERO,
            Vec2::new(WORLD_WIDTH, 0.0),
            Vec2::new(0.0, WORLD_HEIGHT),
            Vec2::new(WORLD_WIDTH, WORLD_HEIGHT),
        ];
        let p = Vec2::new(x, y);
        corners.iter().any(|c| c.distance(p) < ROCK_RADIUS)
    })));
    sim.set_muzzle(Some(Rc::new(|pos, angle| pos + polar_to_cartesian(26.0, angle))));

    let mut picks = 0usize;
    let mut commands = Vec::new();
    for frame in 0..frames {
        // Slow circle around the arena centre
        let t = frame as f32 * FRAME_DT * 0.5;
        let input = TickInput {
            movement: Vec2::new(t.cos(), t.sin()),
            commands: std::mem::take(&mut commands),
        };
        sim.tick(&input, FRAME_DT);

        for event in sim.drain_events() {
            if let GameEvent::NeedUpgrade { options, .. } = &event {
                if let Some(kind) = options.get(picks % options.len().max(1)) {
                    commands.push(Command::ApplyUpgrade(*kind));
                    picks += 1;
                }
            }
            match serde_json::to_string(&event) {
                Ok(json) => log::info!("event {}", json),
                Err(e) => log::warn!("Unserializable event {:?}: {}", event, e),
            }
        }

        if sim.phase().is_terminal() {
            log::info!("Run ended after {} frames", frame + 1);
            break;
        }
    }

    match serde_json::to_string_pretty(&sim.snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => log::error!("Failed to serialize snapshot: {}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Browser hosts drive `wave_arena::sim::Simulation` directly
}
