//! # ECS Error Types
//!
//! Every error in this module is a programmer error: a system queried or
//! mutated the world incorrectly. None of them is transient, and none of them
//! should ever be retried or ignored. The scheduler aborts the current frame
//! on the first one it sees.

use thiserror::Error;

use super::entity::Entity;
use super::registry::ComponentId;
use super::system::{Phase, SystemId};

/// Errors that can occur inside the ECS core.
#[derive(Error, Debug)]
pub enum EcsError {
    /// No free entity ids are left.
    #[error("entity capacity exhausted: all {capacity} ids are in use")]
    CapacityExhausted {
        /// The fixed entity ceiling of the world.
        capacity: u32,
    },

    /// Attempted to add a component the entity already has.
    #[error("{entity} already has component {component}")]
    DuplicateComponent {
        /// The target entity.
        entity: Entity,
        /// Name of the component type.
        component: &'static str,
    },

    /// Attempted to read or remove a component the entity does not have.
    #[error("{entity} has no component {component}")]
    MissingComponent {
        /// The target entity.
        entity: Entity,
        /// Name of the component type.
        component: &'static str,
    },

    /// The entity was never created, or its id has already been freed.
    #[error("invalid entity: {0}")]
    InvalidEntity(Entity),

    /// A pool was accessed while another borrow of it was still live.
    ///
    /// Typical causes are a query naming the same component twice, or a
    /// read of a pool that the enclosing query iterates mutably.
    #[error("component pool {component} is already borrowed")]
    PoolBorrowed {
        /// Name of the component type.
        component: &'static str,
    },

    /// A component id does not index a pool in the pool table.
    #[error("component id {0} has no pool")]
    UnknownComponentId(ComponentId),

    /// A component type was first referenced after the registry was frozen.
    #[error("component {component} was not registered before the registry was frozen")]
    RegistryFrozen {
        /// Name of the component type.
        component: &'static str,
    },

    /// A scheduler operation named a system that is not registered.
    #[error("unknown system: {0}")]
    UnknownSystem(SystemId),

    /// A system asked to run in a phase only the scheduler may use.
    #[error("system `{system}` cannot run in {phase:?}")]
    ReservedPhase {
        /// Name of the rejected system.
        system: String,
        /// The reserved phase.
        phase: Phase,
    },

    /// A system failed while running. The frame was aborted.
    #[error("system `{system}` failed during {phase:?}: {source}")]
    SystemFailed {
        /// Name of the failing system.
        system: String,
        /// Phase the system was running in.
        phase: Phase,
        /// The underlying failure.
        #[source]
        source: Box<EcsError>,
    },
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
