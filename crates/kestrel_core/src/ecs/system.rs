//! # Systems
//!
//! A system is a unit of per-frame logic. It declares the phases it runs in
//! and, for tooling, the component types it reads or writes. The scheduler
//! calls [`System::run`] once per declared phase per frame.

use std::fmt;

use super::component::ComponentSet;
use super::error::EcsResult;
use super::world::World;

/// Frame phases, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Input processing, entity lifecycle management.
    EarlyUpdate = 0,
    /// Game logic.
    Update = 1,
    /// Follow-up work that needs the results of `Update`.
    LateUpdate = 2,
    /// Deferred commands and the destruction sweep. Owned by the scheduler.
    Cleanup = 3,
}

impl Phase {
    /// The phases systems may register for, in execution order.
    pub const SCHEDULED: [Self; 3] = [Self::EarlyUpdate, Self::Update, Self::LateUpdate];

    /// Whether only the scheduler may run in this phase.
    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::Cleanup)
    }

    /// Index of this phase in the scheduler's order table.
    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EarlyUpdate => "early-update",
            Self::Update => "update",
            Self::LateUpdate => "late-update",
            Self::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Classification shown by debug tooling.
///
/// Carries no scheduling semantics: critical systems run in the same order
/// and with the same failure handling as standard ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SystemKind {
    /// Regular gameplay system.
    #[default]
    Standard,
    /// System the game cannot run without (physics, transforms, ...).
    Critical,
}

/// Handle of a registered system, unique for the scheduler's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(u32);

impl SystemId {
    #[inline]
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system #{}", self.0)
    }
}

/// Registration record of a system, for inspectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemInfo {
    /// Scheduler handle.
    pub id: SystemId,
    /// Display name.
    pub name: String,
    /// Tooling classification.
    pub kind: SystemKind,
    /// Phases the system is scheduled in.
    pub phases: Vec<Phase>,
    /// Component types the system declared.
    pub components: Vec<&'static str>,
}

/// A unit of per-frame logic.
///
/// # Example
///
/// ```rust
/// use kestrel_core::{Component, EcsResult, Phase, System, World};
///
/// struct Health(i32);
/// impl Component for Health {}
///
/// struct Regeneration;
///
/// impl System for Regeneration {
///     fn name(&self) -> &str {
///         "regeneration"
///     }
///
///     fn phases(&self) -> &[Phase] {
///         &[Phase::Update]
///     }
///
///     fn run(&mut self, _phase: Phase, world: &mut World) -> EcsResult<()> {
///         world.collect::<(Health,)>().for_each(|health| health.0 += 1)?;
///         Ok(())
///     }
/// }
/// ```
pub trait System {
    /// Display name, used in logs and errors.
    fn name(&self) -> &str;

    /// Phases to run in. [`Phase::Cleanup`] is rejected at registration.
    fn phases(&self) -> &[Phase];

    /// Tooling classification.
    fn kind(&self) -> SystemKind {
        SystemKind::Standard
    }

    /// Component types this system works on, for inspectors.
    fn components(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Called once when the system is registered.
    ///
    /// # Errors
    ///
    /// A failure aborts the registration.
    fn on_register(&mut self, _world: &mut World) -> EcsResult<()> {
        Ok(())
    }

    /// Runs the system for one phase of one frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the frame.
    fn run(&mut self, phase: Phase, world: &mut World) -> EcsResult<()>;
}

/// A single-phase system backed by a closure.
///
/// ```rust
/// use kestrel_core::{Component, FnSystem, Phase, World};
///
/// struct Velocity(f32);
/// impl Component for Velocity {}
///
/// let damping = FnSystem::new("damping", Phase::LateUpdate, |world: &mut World| {
///     world.collect::<(Velocity,)>().for_each(|v| v.0 *= 0.9)?;
///     Ok(())
/// })
/// .with_components::<(Velocity,)>();
/// ```
pub struct FnSystem<F> {
    name: String,
    phases: [Phase; 1],
    kind: SystemKind,
    components: Vec<&'static str>,
    register: Option<fn(&mut World) -> EcsResult<()>>,
    body: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut World) -> EcsResult<()>,
{
    /// Wraps `body` as a system running in `phase`.
    pub fn new(name: impl Into<String>, phase: Phase, body: F) -> Self {
        Self {
            name: name.into(),
            phases: [phase],
            kind: SystemKind::Standard,
            components: Vec::new(),
            register: None,
            body,
        }
    }

    /// Declares the component types of this system.
    ///
    /// They are registered with the world when the system is, so a frozen
    /// registry rejects the system up front instead of mid-frame.
    #[must_use]
    pub fn with_components<S: ComponentSet>(mut self) -> Self {
        self.components = S::names();
        self.register = Some(S::register);
        self
    }

    /// Marks the system as critical for tooling.
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.kind = SystemKind::Critical;
        self
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut World) -> EcsResult<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn phases(&self) -> &[Phase] {
        &self.phases
    }

    fn kind(&self) -> SystemKind {
        self.kind
    }

    fn components(&self) -> Vec<&'static str> {
        self.components.clone()
    }

    fn on_register(&mut self, world: &mut World) -> EcsResult<()> {
        match self.register {
            Some(register) => register(world),
            None => Ok(()),
        }
    }

    fn run(&mut self, _phase: Phase, world: &mut World) -> EcsResult<()> {
        (self.body)(world)
    }
}
