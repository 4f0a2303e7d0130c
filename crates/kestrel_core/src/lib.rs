//! # Kestrel Core Engine
//!
//! Sparse-set Entity Component System (ECS) runtime for the Kestrel engine:
//! - Fixed entity universe with FIFO id recycling
//! - One sparse-set pool per component type, behind a type-erased table
//! - AND-queries over up to six component types
//! - Three-phase system scheduler with an explicit cleanup phase
//!
//! ## Architecture Rules
//!
//! 1. **One world, passed explicitly** - No global state; tests build their own
//! 2. **Structural changes need `&mut World`** - Queries only borrow it shared
//! 3. **Destruction is deferred** - Entities vanish at `Cleanup`, not before
//!
//! ## Example
//!
//! ```rust
//! use kestrel_core::{Component, FnSystem, Phase, Scheduler, World};
//!
//! struct Health(i32);
//! impl Component for Health {}
//!
//! let mut world = World::new(64_000);
//! let mut scheduler = Scheduler::new();
//!
//! scheduler
//!     .register_system(
//!         &mut world,
//!         FnSystem::new("bleed", Phase::Update, |world: &mut World| {
//!             world.collect::<(Health,)>().for_each_entity(|entity, health| {
//!                 health.0 -= 1;
//!                 if health.0 <= 0 {
//!                     world.defer().destroy(entity);
//!                 }
//!             })?;
//!             Ok(())
//!         }),
//!     )
//!     .unwrap();
//!
//! let e = world.create_entity().unwrap();
//! world.add_component(e, Health(1)).unwrap();
//!
//! let stats = scheduler.run_frame(&mut world).unwrap();
//! assert_eq!(stats.destroyed, 1);
//! assert!(!world.exists(e));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;

pub use config::{ConfigError, WorldConfig};
pub use ecs::{
    Bundle, Collect, Command, Commands, Component, ComponentId, ComponentSet, EcsError, EcsResult,
    Entity, EntityRegistry, ErasedPool, FnSystem, FrameStats, Phase, PendingDestruction,
    PoolReport, PoolUsage, Scheduler, SparseSet, System, SystemId, SystemInfo, SystemKind,
    TypeRegistry, World, DEFAULT_MAX_ENTITIES,
};
