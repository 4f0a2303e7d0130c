//! # Entity Component System
//!
//! A sparse-set ECS for a single-threaded frame loop.
//!
//! ## Design Philosophy
//!
//! - One sparse set per component type: O(1) add, remove, and lookup
//! - Components are stored in dense arrays for cache efficiency
//! - Entity IDs are indices with generation counters
//! - Structural changes during iteration are deferred, never immediate
//! - Destruction is a two-step protocol: mark now, sweep at cleanup

mod commands;
mod component;
mod entity;
mod error;
mod query;
mod registry;
mod scheduler;
mod storage;
mod system;
mod world;

pub use commands::{Command, Commands};
pub use component::{Component, ComponentSet, PendingDestruction};
pub use entity::{Entity, EntityRegistry, DEFAULT_MAX_ENTITIES};
pub use error::{EcsError, EcsResult};
pub use query::{Bundle, Collect};
pub use registry::{ComponentId, TypeRegistry};
pub use scheduler::{FrameStats, Scheduler};
pub use storage::{ErasedPool, PoolUsage, SparseSet};
pub use system::{FnSystem, Phase, System, SystemId, SystemInfo, SystemKind};
pub use world::{PoolReport, World};
