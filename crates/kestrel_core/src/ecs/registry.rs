//! # Component Type Registry
//!
//! Maps each component type to a dense [`ComponentId`] that indexes the
//! world's pool table. Ids are assigned by a monotonically increasing counter
//! in registration order, so registering a fixed manifest at startup gives
//! the same ids on every run.
//!
//! [`PendingDestruction`] is always id 0, ahead of every manifest type.
//!
//! Ids are only meaningful inside one process. Anything that crosses a
//! process boundary (saves, network packets) must map through its own stable
//! type tag instead.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use super::component::{Component, PendingDestruction};
use super::error::{EcsError, EcsResult};

/// Process-local identifier of a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Id of the [`PendingDestruction`] marker.
    pub const PENDING_DESTRUCTION: Self = Self(0);

    /// Index of this id in the pool table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Assigns component ids and remembers their names.
pub struct TypeRegistry {
    ids: HashMap<TypeId, ComponentId>,
    names: Vec<&'static str>,
    frozen: bool,
}

impl TypeRegistry {
    /// Creates an unfrozen registry holding only the destruction marker.
    #[must_use]
    pub fn new() -> Self {
        let mut ids = HashMap::new();
        ids.insert(TypeId::of::<PendingDestruction>(), ComponentId::PENDING_DESTRUCTION);
        Self {
            ids,
            names: vec![PendingDestruction::name()],
            frozen: false,
        }
    }

    /// Returns the id of `T`, assigning the next one on first use.
    ///
    /// The boolean is `true` when the id was assigned by this call.
    ///
    /// # Errors
    ///
    /// [`EcsError::RegistryFrozen`] if `T` is new and the registry is frozen.
    pub fn register<T: Component>(&mut self) -> EcsResult<(ComponentId, bool)> {
        if let Some(&id) = self.ids.get(&TypeId::of::<T>()) {
            return Ok((id, false));
        }
        if self.frozen {
            return Err(EcsError::RegistryFrozen {
                component: T::name(),
            });
        }

        let id = ComponentId(self.names.len() as u32);
        self.ids.insert(TypeId::of::<T>(), id);
        self.names.push(T::name());
        tracing::debug!("Registered component {} as {}", T::name(), id);
        Ok((id, true))
    }

    /// Looks up the id of `T` without assigning one.
    #[inline]
    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    /// Name of a registered component.
    #[must_use]
    pub fn name(&self, id: ComponentId) -> Option<&'static str> {
        self.names.get(id.index()).copied()
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Rejects every type that is not registered yet.
    pub fn freeze(&mut self) {
        self.frozen = true;
        tracing::debug!("Component registry frozen with {} types", self.names.len());
    }

    /// Whether [`TypeRegistry::freeze`] has been called.
    #[inline]
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Registered ids in ascending order, with their names.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &'static str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, &name)| (ComponentId(i as u32), name))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
