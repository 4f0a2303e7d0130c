//! # System Scheduler
//!
//! Drives registered systems through a fixed frame:
//!
//! ```text
//! EarlyUpdate -> Update -> LateUpdate -> Cleanup
//! ```
//!
//! - Each scheduled phase keeps its own ordered list of systems. Tooling may
//!   reorder a list at runtime, but a system never moves to another phase.
//! - Commands a system defers are applied right after it returns, so later
//!   systems see its structural changes.
//! - `Cleanup` belongs to the scheduler: it applies leftover commands and
//!   sweeps entities marked for destruction. Nothing vanishes before it.
//! - The first failing system aborts the frame. Remaining systems and the
//!   sweep do not run.

use std::time::Instant;

use super::error::{EcsError, EcsResult};
use super::system::{Phase, System, SystemId, SystemInfo};
use super::world::World;

/// Counters for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at 0.
    pub frame: u64,
    /// System invocations across all phases.
    pub systems_run: u32,
    /// Deferred commands applied.
    pub commands_applied: usize,
    /// Entities freed by the cleanup sweep.
    pub destroyed: usize,
    /// Wall time of the frame in microseconds.
    pub elapsed_us: u64,
}

struct Slot {
    system: Box<dyn System>,
    info: SystemInfo,
}

/// Ordered per-phase system lists and the frame driver.
pub struct Scheduler {
    /// Registration order.
    slots: Vec<Slot>,
    /// Execution order per scheduled phase, indexed by `Phase::slot`.
    order: [Vec<SystemId>; 3],
    next_id: u32,
    frame: u64,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            order: [Vec::new(), Vec::new(), Vec::new()],
            next_id: 0,
            frame: 0,
        }
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no system is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of frames completed.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Registers a system at the end of each phase it declares.
    ///
    /// [`System::on_register`] runs first; if it fails nothing is scheduled.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ReservedPhase`] if the system declares [`Phase::Cleanup`]
    /// - Whatever `on_register` returns
    pub fn register_system<S: System + 'static>(
        &mut self,
        world: &mut World,
        system: S,
    ) -> EcsResult<SystemId> {
        self.register_boxed(world, Box::new(system))
    }

    /// Boxed variant of [`Scheduler::register_system`].
    ///
    /// # Errors
    ///
    /// See [`Scheduler::register_system`].
    pub fn register_boxed(
        &mut self,
        world: &mut World,
        mut system: Box<dyn System>,
    ) -> EcsResult<SystemId> {
        if let Some(&phase) = system.phases().iter().find(|phase| phase.is_reserved()) {
            return Err(EcsError::ReservedPhase {
                system: system.name().to_owned(),
                phase,
            });
        }
        system.on_register(world)?;

        let id = SystemId::new(self.next_id);
        self.next_id += 1;

        let mut phases = Vec::new();
        for &phase in system.phases() {
            if phases.contains(&phase) {
                continue;
            }
            phases.push(phase);
            if let Some(list) = self.order.get_mut(phase.slot()) {
                list.push(id);
            }
        }
        if phases.is_empty() {
            tracing::warn!("System `{}` declares no phase and will never run", system.name());
        }

        let info = SystemInfo {
            id,
            name: system.name().to_owned(),
            kind: system.kind(),
            phases,
            components: system.components(),
        };
        tracing::info!("Registered {} `{}` in {:?}", id, info.name, info.phases);

        self.slots.push(Slot { system, info });
        Ok(id)
    }

    /// Unregisters a system from every phase and returns it.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownSystem`] if the id is not registered.
    pub fn remove_system(&mut self, id: SystemId) -> EcsResult<Box<dyn System>> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.info.id == id)
            .ok_or(EcsError::UnknownSystem(id))?;
        for list in &mut self.order {
            list.retain(|&other| other != id);
        }
        let slot = self.slots.remove(index);
        tracing::info!("Removed {} `{}`", id, slot.info.name);
        Ok(slot.system)
    }

    /// Registration records, in registration order.
    pub fn systems(&self) -> impl Iterator<Item = &SystemInfo> {
        self.slots.iter().map(|slot| &slot.info)
    }

    /// Registration record of one system.
    #[must_use]
    pub fn info(&self, id: SystemId) -> Option<&SystemInfo> {
        self.slots.iter().find(|slot| slot.info.id == id).map(|slot| &slot.info)
    }

    /// Current execution order of a phase. Always empty for `Cleanup`.
    #[must_use]
    pub fn order(&self, phase: Phase) -> &[SystemId] {
        self.order.get(phase.slot()).map_or(&[], Vec::as_slice)
    }

    /// Swaps a system with its predecessor in `phase`.
    ///
    /// Returns `false` if it was already first.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownSystem`] if the system is not scheduled in `phase`.
    pub fn move_up(&mut self, phase: Phase, id: SystemId) -> EcsResult<bool> {
        let (list, position) = self.locate(phase, id)?;
        if position == 0 {
            return Ok(false);
        }
        list.swap(position, position - 1);
        Ok(true)
    }

    /// Swaps a system with its successor in `phase`.
    ///
    /// Returns `false` if it was already last.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownSystem`] if the system is not scheduled in `phase`.
    pub fn move_down(&mut self, phase: Phase, id: SystemId) -> EcsResult<bool> {
        let (list, position) = self.locate(phase, id)?;
        if position + 1 >= list.len() {
            return Ok(false);
        }
        list.swap(position, position + 1);
        Ok(true)
    }

    /// Moves a system to `position` within `phase`, clamped to the end.
    ///
    /// Returns the position it ended up at.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownSystem`] if the system is not scheduled in `phase`.
    pub fn set_order(&mut self, phase: Phase, id: SystemId, position: usize) -> EcsResult<usize> {
        let (list, current) = self.locate(phase, id)?;
        list.remove(current);
        let target = position.min(list.len());
        list.insert(target, id);
        Ok(target)
    }

    /// Runs one frame: the three update phases, then cleanup.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemFailed`] wrapping the first system failure. The
    /// frame counter does not advance on failure, and commands deferred
    /// during the failed frame are discarded.
    pub fn run_frame(&mut self, world: &mut World) -> EcsResult<FrameStats> {
        let start = Instant::now();
        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };

        let outcome = Phase::SCHEDULED
            .into_iter()
            .chain([Phase::Cleanup])
            .try_for_each(|phase| self.run_phase(phase, world, &mut stats));
        if let Err(error) = outcome {
            let dropped = world.discard_deferred();
            if dropped > 0 {
                tracing::warn!("Discarded {} deferred commands of aborted frame", dropped);
            }
            return Err(error);
        }

        stats.elapsed_us = start.elapsed().as_micros() as u64;
        self.frame += 1;
        tracing::trace!(
            "Frame {} done: {} systems, {} commands, {} destroyed, {}us",
            stats.frame,
            stats.systems_run,
            stats.commands_applied,
            stats.destroyed,
            stats.elapsed_us
        );
        Ok(stats)
    }

    fn run_phase(
        &mut self,
        phase: Phase,
        world: &mut World,
        stats: &mut FrameStats,
    ) -> EcsResult<()> {
        if phase.is_reserved() {
            stats.commands_applied += world.apply_deferred()?;
            stats.destroyed += world.sweep_destroyed()?;
            return Ok(());
        }

        let Some(order) = self.order.get(phase.slot()) else {
            return Ok(());
        };
        for &id in order {
            let Some(slot) = self.slots.iter_mut().find(|slot| slot.info.id == id) else {
                continue;
            };

            let outcome = slot
                .system
                .run(phase, world)
                .and_then(|()| world.apply_deferred());
            match outcome {
                Ok(applied) => {
                    stats.systems_run += 1;
                    stats.commands_applied += applied;
                }
                Err(source) => {
                    tracing::error!(
                        "System `{}` failed during {}: {}",
                        slot.info.name,
                        phase,
                        source
                    );
                    return Err(EcsError::SystemFailed {
                        system: slot.info.name.clone(),
                        phase,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(())
    }

    fn locate(&mut self, phase: Phase, id: SystemId) -> EcsResult<(&mut Vec<SystemId>, usize)> {
        let list = self
            .order
            .get_mut(phase.slot())
            .ok_or(EcsError::UnknownSystem(id))?;
        let position = list
            .iter()
            .position(|&other| other == id)
            .ok_or(EcsError::UnknownSystem(id))?;
        Ok((list, position))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
