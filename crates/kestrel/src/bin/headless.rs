//! # Kestrel Headless
//!
//! Runs a sample world for a fixed number of frames. No window.
//!
//! ```bash
//! kestrel_headless                       # defaults, 600 frames
//! kestrel_headless kestrel.toml 1200     # config file, 1200 frames
//! RUST_LOG=debug kestrel_headless        # verbose
//! ```
//!
//! Every entity moves each frame and ages out after a few frames; the
//! respawn system keeps the population at `POPULATION`.

use std::process::ExitCode;

use kestrel::core::{Component, EcsResult, FnSystem, Phase, World};
use kestrel::{init_logging, GameLoop, GameLoopConfig, LoopError};

const POPULATION: u32 = 1_000;
const DEFAULT_FRAMES: u64 = 600;

#[derive(Clone, Copy, Debug, Default)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

/// Frames left to live.
#[derive(Clone, Copy, Debug)]
struct Lifetime(u32);
impl Component for Lifetime {}

fn spawn(world: &mut World, seed: u32) -> EcsResult<()> {
    let entity = world.create_entity()?;
    world.add_component(entity, Position::default())?;
    world.add_component(
        entity,
        Velocity {
            dx: (seed % 7) as f32 - 3.0,
            dy: (seed % 5) as f32 - 2.0,
        },
    )?;
    world.add_component(entity, Lifetime(30 + seed % 90))?;
    Ok(())
}

fn aging(world: &mut World) -> EcsResult<()> {
    world.collect::<(Lifetime,)>().for_each_entity(|entity, lifetime| {
        lifetime.0 = lifetime.0.saturating_sub(1);
        if lifetime.0 == 0 {
            world.defer().destroy(entity);
        }
    })?;
    Ok(())
}

fn movement(world: &mut World) -> EcsResult<()> {
    world.collect::<(Position, Velocity)>().for_each(|position, velocity| {
        position.x += velocity.dx;
        position.y += velocity.dy;
    })?;
    Ok(())
}

fn respawn(world: &mut World) -> EcsResult<()> {
    let live = u32::try_from(world.entity_count()).unwrap_or(u32::MAX);
    let target = POPULATION.min(world.capacity());
    for seed in live..target {
        spawn(world, seed)?;
    }
    Ok(())
}

fn run(config_path: Option<&str>, frames: u64) -> Result<(), LoopError> {
    let config = match config_path {
        Some(path) => GameLoopConfig::load(path)?,
        None => GameLoopConfig::default(),
    };
    init_logging(&config.log_filter)?;
    tracing::info!("Kestrel headless: {} frames, capacity {}", frames, config.world.max_entities);

    let mut game_loop = GameLoop::new(config)?;
    game_loop.register_system(
        FnSystem::new("aging", Phase::EarlyUpdate, aging).with_components::<(Lifetime,)>(),
    )?;
    game_loop.register_system(
        FnSystem::new("movement", Phase::Update, movement)
            .with_components::<(Position, Velocity)>()
            .critical(),
    )?;
    game_loop.register_system(
        FnSystem::new("respawn", Phase::LateUpdate, respawn)
            .with_components::<(Position, Velocity, Lifetime)>(),
    )?;

    for info in game_loop.scheduler().systems() {
        tracing::debug!("{} '{}' ({:?}) on {:?}", info.id, info.name, info.kind, info.phases);
    }

    game_loop.with_world_mut(respawn)?;
    let completed = game_loop.run(frames)?;

    game_loop.stats().log_summary();
    tracing::info!(
        "Done after {} frames, {} live entities",
        completed,
        game_loop.world().entity_count()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = args.first().map(String::as_str);
    let frames = match args.get(1).map(|raw| raw.parse::<u64>()) {
        None => DEFAULT_FRAMES,
        Some(Ok(frames)) => frames,
        Some(Err(error)) => {
            eprintln!("invalid frame count: {error}");
            return ExitCode::FAILURE;
        }
    };

    match run(config_path, frames) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("kestrel_headless failed: {}", error);
            eprintln!("kestrel_headless failed: {error}");
            ExitCode::FAILURE
        }
    }
}
