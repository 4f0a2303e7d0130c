//! # Deferred Commands
//!
//! Structural mutations recorded while pools are borrowed by a query, and
//! applied later by [`World::apply_deferred`] in recording order.
//!
//! A query callback only sees component references, so it cannot touch the
//! pool table directly. It records its intent here instead:
//!
//! ```rust
//! use kestrel_core::{Component, World};
//!
//! struct Health(i32);
//! impl Component for Health {}
//!
//! let mut world = World::new(16);
//! let e = world.create_entity().unwrap();
//! world.add_component(e, Health(0)).unwrap();
//!
//! world
//!     .collect::<(Health,)>()
//!     .for_each_entity(|entity, health| {
//!         if health.0 <= 0 {
//!             world.defer().destroy(entity);
//!         }
//!     })
//!     .unwrap();
//!
//! world.apply_deferred().unwrap();
//! assert!(world.is_pending_destruction(e));
//! ```

use super::component::Component;
use super::entity::Entity;
use super::error::EcsResult;
use super::world::World;

type Apply = Box<dyn FnOnce(&mut World) -> EcsResult<()>>;

/// A recorded structural mutation.
pub enum Command {
    /// Marks the entity for destruction at the next cleanup sweep.
    Destroy(Entity),
    /// Adds a component.
    Insert {
        /// Target entity.
        entity: Entity,
        /// Name of the component type.
        component: &'static str,
        /// Performs the insert.
        apply: Apply,
    },
    /// Removes a component.
    Remove {
        /// Target entity.
        entity: Entity,
        /// Name of the component type.
        component: &'static str,
        /// Performs the removal.
        apply: Apply,
    },
}

impl Command {
    /// The entity this command targets.
    #[must_use]
    pub fn entity(&self) -> Entity {
        match self {
            Self::Destroy(entity)
            | Self::Insert { entity, .. }
            | Self::Remove { entity, .. } => *entity,
        }
    }

    pub(crate) fn apply(self, world: &mut World) -> EcsResult<()> {
        match self {
            Self::Destroy(entity) => world.destroy_entity(entity),
            Self::Insert { apply, .. } | Self::Remove { apply, .. } => apply(world),
        }
    }
}

/// Queue of deferred structural mutations.
#[derive(Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a deferred `destroy_entity`.
    pub fn destroy(&mut self, entity: Entity) {
        self.queue.push(Command::Destroy(entity));
    }

    /// Records a deferred `add_component`.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) {
        self.queue.push(Command::Insert {
            entity,
            component: T::name(),
            apply: Box::new(move |world: &mut World| {
                world.add_component(entity, value).map(|_| ())
            }),
        });
    }

    /// Records a deferred `remove_component`. The removed value is dropped.
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        self.queue.push(Command::Remove {
            entity,
            component: T::name(),
            apply: Box::new(move |world: &mut World| {
                world.remove_component::<T>(entity).map(|_| ())
            }),
        });
    }

    /// Number of recorded commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Recorded commands, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.queue.iter()
    }

    /// Drops every recorded command without applying it.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub(crate) fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.queue)
    }
}
