//! # Kestrel Game Loop
//!
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. EARLY UPDATE   input, lifecycle                                  │
//! │ 2. UPDATE         gameplay                                          │
//! │ 3. LATE UPDATE    follow-up work                                    │
//! │ 4. CLEANUP        deferred commands, destruction sweep              │
//! │ 5. END FRAME      record timing, pace to target FPS                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 1-4 are [`Scheduler::run_frame`]. A failing system aborts the
//! frame, and the loop stops: the world may be half-updated and is not
//! stepped again.

use std::time::{Duration, Instant};

use kestrel_core::{EcsResult, FrameStats, Scheduler, System, SystemId, World};

use crate::config::GameLoopConfig;
use crate::error::LoopError;

/// The main loop orchestrator.
///
/// Owns the world and the scheduler, runs frames, and keeps timing
/// statistics.
pub struct GameLoop {
    world: World,
    scheduler: Scheduler,
    config: GameLoopConfig,
    last_frame_time: Instant,
    stats: FrameStatsAccumulator,
    halted: bool,
}

impl GameLoop {
    /// Creates a loop around a world built from `config.world`.
    ///
    /// # Errors
    ///
    /// [`LoopError::Config`] if the configuration fails validation.
    pub fn new(config: GameLoopConfig) -> Result<Self, LoopError> {
        config.validate()?;
        let world = World::from_config(&config.world);
        Ok(Self::with_world(config, world))
    }

    /// Creates a loop around an existing world, e.g. one built with
    /// [`World::with_manifest`].
    #[must_use]
    pub fn with_world(config: GameLoopConfig, world: World) -> Self {
        Self {
            world,
            scheduler: Scheduler::new(),
            config,
            last_frame_time: Instant::now(),
            stats: FrameStatsAccumulator::new(),
            halted: false,
        }
    }

    /// Registers a system with the scheduler.
    ///
    /// # Errors
    ///
    /// Whatever [`Scheduler::register_system`] reports.
    pub fn register_system<S: System + 'static>(
        &mut self,
        system: S,
    ) -> Result<SystemId, LoopError> {
        Ok(self.scheduler.register_system(&mut self.world, system)?)
    }

    /// Runs one frame and records its timing.
    ///
    /// # Errors
    ///
    /// [`LoopError::Ecs`] with the failing system. The loop is halted
    /// afterwards and every further call fails the same way.
    pub fn tick(&mut self) -> Result<FrameStats, LoopError> {
        if self.halted {
            return Err(LoopError::Halted);
        }

        let now = Instant::now();
        self.last_frame_time = now;

        let stats = match self.scheduler.run_frame(&mut self.world) {
            Ok(stats) => stats,
            Err(error) => {
                self.halted = true;
                tracing::error!("Frame {} aborted: {}", self.scheduler.frame(), error);
                return Err(error.into());
            }
        };
        self.end_frame(stats);
        Ok(stats)
    }

    /// Runs `frames` frames, pacing to the target FPS.
    ///
    /// Returns the number of frames completed.
    ///
    /// # Errors
    ///
    /// Stops at the first failed frame; see [`GameLoop::tick`].
    pub fn run(&mut self, frames: u64) -> Result<u64, LoopError> {
        let target = self.config.target_frame_time();
        tracing::info!(
            "Running {} frames ({})",
            frames,
            target.map_or_else(|| "unpaced".to_string(), |t| format!("{:.2}ms per frame", ms(t)))
        );

        for _ in 0..frames {
            let start = Instant::now();
            self.tick()?;
            if let Some(target) = target {
                let spent = start.elapsed();
                if spent < target {
                    std::thread::sleep(target - spent);
                }
            }
        }
        Ok(frames)
    }

    fn end_frame(&mut self, stats: FrameStats) {
        self.stats.record(stats, self.config.frame_budget());

        let elapsed = Duration::from_micros(stats.elapsed_us);
        if self.config.enable_timing_logs && elapsed > self.config.frame_budget() {
            tracing::warn!(
                "Frame {} exceeded budget: {:.2}ms (budget: {:.2}ms)",
                stats.frame,
                ms(elapsed),
                ms(self.config.frame_budget())
            );
        }
    }

    /// Whether a failed frame stopped the loop.
    #[inline]
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Returns the number of completed frames.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.scheduler.frame()
    }

    /// Start time of the most recent frame.
    #[inline]
    #[must_use]
    pub fn last_frame_time(&self) -> Instant {
        self.last_frame_time
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably. Use between frames to spawn or inspect entities.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The scheduler, for inspection and reordering.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    /// The loop configuration.
    #[must_use]
    pub fn config(&self) -> &GameLoopConfig {
        &self.config
    }

    /// Applies `f` to the world between frames.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub fn with_world_mut<T>(
        &mut self,
        f: impl FnOnce(&mut World) -> EcsResult<T>,
    ) -> Result<T, LoopError> {
        Ok(f(&mut self.world)?)
    }
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of frame times.
    pub total_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded the budget.
    pub frames_over_budget: u64,
    /// System invocations.
    pub systems_run: u64,
    /// Entities freed by cleanup sweeps.
    pub destroyed: u64,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            systems_run: 0,
            destroyed: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats, budget: Duration) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.elapsed_us;
        self.min_frame_us = self.min_frame_us.min(stats.elapsed_us);
        self.max_frame_us = self.max_frame_us.max(stats.elapsed_us);
        self.systems_run += u64::from(stats.systems_run);
        self.destroyed += stats.destroyed as u64;

        if stats.elapsed_us > budget.as_micros() as u64 {
            self.frames_over_budget += 1;
        }
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Logs a summary of the statistics at `info` level.
    pub fn log_summary(&self) {
        if self.frames_recorded == 0 {
            tracing::info!("No frames recorded");
            return;
        }
        tracing::info!(
            "Frames: {} | avg {:.3}ms | min {:.3}ms | max {:.3}ms",
            self.frames_recorded,
            self.avg_frame_ms(),
            self.min_frame_us as f64 / 1000.0,
            self.max_frame_us as f64 / 1000.0
        );
        tracing::info!(
            "Over budget: {} ({:.1}%) | systems run: {} | entities destroyed: {}",
            self.frames_over_budget,
            self.over_budget_ratio() * 100.0,
            self.systems_run,
            self.destroyed
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
