//! # ECS World
//!
//! The central container for all entities and components.
//!
//! The world owns:
//! - The [`EntityRegistry`] (id universe, free list, generations)
//! - The [`TypeRegistry`] (component type -> pool index)
//! - One type-erased pool per registered component type
//! - The deferred [`Commands`] queue
//!
//! Every pool sits in its own `RefCell`, so a query can hold several pools
//! mutably at once while the world itself is only shared. Structural changes
//! (creating entities, adding or removing components) need `&mut World`, which
//! statically rules them out while any query is running.
//!
//! Next to every pool the world keeps a membership bitset outside the
//! `RefCell`. Membership tests read only the bitset, so they give the right
//! answer even for a type whose pool a running query holds.

use std::cell::{Ref, RefCell, RefMut};

use super::commands::Commands;
use super::component::{Component, ComponentSet, PendingDestruction};
use super::entity::{Entity, EntityRegistry};
use super::error::{EcsError, EcsResult};
use super::registry::{ComponentId, TypeRegistry};
use super::storage::{ErasedPool, Membership, SparseSet};
use crate::config::WorldConfig;

type PoolCell = RefCell<Box<dyn ErasedPool>>;

/// Snapshot of one pool, as returned by [`World::report_usage`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolReport {
    /// Id of the component type.
    pub id: ComponentId,
    /// Name of the component type.
    pub component: &'static str,
    /// Entities holding the component, in dense order.
    pub entities: Vec<Entity>,
}

/// The ECS World - container for all game state.
///
/// # Capacity
///
/// The world has a fixed entity ceiling set at creation. Every pool's sparse
/// array is sized to it, so lookups never hash and never grow.
///
/// # Example
///
/// ```rust
/// use kestrel_core::{Component, World};
///
/// struct Position(f32, f32);
/// impl Component for Position {}
///
/// let mut world = World::new(1_000);
/// let entity = world.create_entity().unwrap();
/// world.add_component(entity, Position(1.0, 2.0)).unwrap();
/// assert!(world.has_component::<Position>(entity));
/// ```
pub struct World {
    entities: EntityRegistry,
    registry: TypeRegistry,
    /// Indexed by `ComponentId`.
    pools: Vec<PoolCell>,
    /// Parallel to `pools`.
    members: Vec<Membership>,
    /// Entities holding `PendingDestruction`, in marking order.
    marked: Vec<Entity>,
    commands: RefCell<Commands>,
}

impl World {
    /// Creates a world able to hold `capacity` live entities.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of entities (e.g. `64_000`)
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        let entities = EntityRegistry::new(capacity);
        let marker: Box<dyn ErasedPool> = Box::new(SparseSet::<PendingDestruction>::new(capacity));

        tracing::debug!("Created world with capacity {}", capacity);

        Self {
            entities,
            registry: TypeRegistry::new(),
            pools: vec![RefCell::new(marker)],
            members: vec![Membership::new(capacity)],
            marked: Vec::new(),
            commands: RefCell::new(Commands::new()),
        }
    }

    /// Creates a world from a validated configuration.
    ///
    /// With `strict_registration` set the registry is frozen immediately, so
    /// only [`PendingDestruction`] is known; use [`World::with_manifest`] to
    /// register the game's types first.
    ///
    /// # Panics
    ///
    /// Panics if `config.max_entities` is zero. [`WorldConfig::validate`]
    /// rejects that value.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        let mut world = Self::new(config.max_entities);
        if config.strict_registration {
            world.freeze_components();
        }
        world
    }

    /// Creates a world and registers the manifest `M` in tuple order.
    ///
    /// Ids are assigned deterministically by manifest position. The registry
    /// is frozen afterwards when the configuration asks for strict
    /// registration.
    ///
    /// # Errors
    ///
    /// Propagates registration failures.
    pub fn with_manifest<M: ComponentSet>(config: &WorldConfig) -> EcsResult<Self> {
        let mut world = Self::new(config.max_entities);
        M::register(&mut world)?;
        if config.strict_registration {
            world.freeze_components();
        }
        tracing::info!(
            "World ready: {} component types, {} entity ids",
            world.registry.len(),
            config.max_entities
        );
        Ok(world)
    }

    // =========================================================================
    // Type registry
    // =========================================================================

    /// Registers `T` and allocates its pool, if not done already.
    ///
    /// # Errors
    ///
    /// [`EcsError::RegistryFrozen`] if `T` is new and the registry is frozen.
    pub fn register<T: Component>(&mut self) -> EcsResult<ComponentId> {
        let (id, fresh) = self.registry.register::<T>()?;
        if fresh {
            let pool: Box<dyn ErasedPool> = Box::new(SparseSet::<T>::new(self.entities.capacity()));
            self.pools.push(RefCell::new(pool));
            self.members.push(Membership::new(self.entities.capacity()));
        }
        Ok(id)
    }

    /// Rejects registration of any further component type.
    pub fn freeze_components(&mut self) {
        self.registry.freeze();
    }

    /// Id of `T`, if registered.
    #[inline]
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.registry.id_of::<T>()
    }

    /// The type registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Returns the entity ceiling.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.entities.capacity()
    }

    /// Number of live entities, including those pending destruction.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities in creation order.
    #[inline]
    #[must_use]
    pub fn alive_entities(&self) -> &[Entity] {
        self.entities.alive()
    }

    /// Creates a new entity with no components.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExhausted`] when every id is in use.
    #[inline]
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        self.entities.create()
    }

    /// Whether the handle refers to a live entity.
    ///
    /// Stays `true` after [`World::destroy_entity`] until the sweep.
    #[inline]
    #[must_use]
    pub fn exists(&self, entity: Entity) -> bool {
        self.entities.exists(entity)
    }

    /// Marks an entity for destruction at the next cleanup sweep.
    ///
    /// The entity keeps all its components and stays visible to queries
    /// until [`World::sweep_destroyed`] runs. Marking twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if the entity is not live.
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<()> {
        self.check_live(entity)?;
        let id = ComponentId::PENDING_DESTRUCTION;
        let marker = typed_pool::<PendingDestruction>(&mut self.pools, id)?;
        if !marker.contains(entity) {
            marker.insert(entity, PendingDestruction)?;
            self.mark(id, entity);
            self.marked.push(entity);
            tracing::trace!("Marked {} for destruction", entity);
        }
        Ok(())
    }

    /// Whether the entity is waiting for the cleanup sweep.
    #[inline]
    #[must_use]
    pub fn is_pending_destruction(&self, entity: Entity) -> bool {
        self.has_component::<PendingDestruction>(entity)
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches a component and returns a reference to it.
    ///
    /// The pool for `T` is created on first use. The reference is invalidated
    /// by the next add or remove of `T`; the borrow checker enforces that.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] if the entity is not live
    /// - [`EcsError::DuplicateComponent`] if it already has a `T`
    /// - [`EcsError::RegistryFrozen`] if `T` is unknown to a frozen registry
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<&mut T> {
        self.check_live(entity)?;
        let id = self.register::<T>()?;
        let value = typed_pool::<T>(&mut self.pools, id)?.insert(entity, value)?;
        if let Some(members) = self.members.get_mut(id.index()) {
            members.set(entity);
        }
        if id == ComponentId::PENDING_DESTRUCTION {
            self.marked.push(entity);
        }
        Ok(value)
    }

    /// Detaches and returns a component.
    ///
    /// The last component of the pool moves into the vacated dense slot.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] if the entity is not live
    /// - [`EcsError::MissingComponent`] if it has no `T`
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> EcsResult<T> {
        self.check_live(entity)?;
        let Some(id) = self.registry.id_of::<T>() else {
            return Err(missing::<T>(entity));
        };
        let value = typed_pool::<T>(&mut self.pools, id)?.remove(entity)?;
        if let Some(members) = self.members.get_mut(id.index()) {
            members.unset(entity);
        }
        if id == ComponentId::PENDING_DESTRUCTION {
            self.marked.retain(|&marked| marked != entity);
        }
        Ok(value)
    }

    /// Whether the entity has a `T`.
    ///
    /// `false` only for dead handles, unregistered types, and entities
    /// without a `T`. Safe to call from inside any query, including one over
    /// `T` itself.
    #[inline]
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.exists(entity)
            && self
                .registry
                .id_of::<T>()
                .and_then(|id| self.members.get(id.index()))
                .is_some_and(|members| members.contains(entity))
    }

    /// Whether the entity has every component in `S`.
    #[must_use]
    pub fn has_all<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::has_all(self, entity)
    }

    /// Whether the entity has at least one component in `S`.
    #[must_use]
    pub fn has_any<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::has_any(self, entity)
    }

    /// Borrows the entity's component.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] if the entity is not live
    /// - [`EcsError::MissingComponent`] if it has no `T`
    /// - [`EcsError::PoolBorrowed`] if the pool is mutably borrowed
    pub fn get_component<T: Component>(&self, entity: Entity) -> EcsResult<Ref<'_, T>> {
        self.check_live(entity)?;
        let Some(pool) = self.pool::<T>()? else {
            return Err(missing::<T>(entity));
        };
        Ref::filter_map(pool, |pool| pool.get(entity)).map_err(|_| missing::<T>(entity))
    }

    /// Mutably borrows the entity's component.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] if the entity is not live
    /// - [`EcsError::MissingComponent`] if it has no `T`
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.check_live(entity)?;
        self.typed_pool_mut::<T>()?
            .and_then(|pool| pool.get_mut(entity))
            .ok_or_else(|| missing::<T>(entity))
    }

    /// Like [`World::get_component`], with absence as `None`.
    ///
    /// `Ok(None)` for dead handles and entities without a `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolBorrowed`] if the entity has a `T` but its pool is
    /// mutably borrowed.
    pub fn try_get_component<T: Component>(
        &self,
        entity: Entity,
    ) -> EcsResult<Option<Ref<'_, T>>> {
        if !self.has_component::<T>(entity) {
            return Ok(None);
        }
        self.get_component(entity).map(Some)
    }

    /// Non-failing variant of [`World::get_component_mut`].
    pub fn try_get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.get_component_mut(entity).ok()
    }

    /// Shared borrow of the whole pool for `T`, or `None` if `T` was never
    /// registered.
    ///
    /// Useful for read-only sweeps over the dense arrays.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolBorrowed`] if the pool is mutably borrowed.
    pub fn pool<T: Component>(&self) -> EcsResult<Option<Ref<'_, SparseSet<T>>>> {
        let Some((id, cell)) = self.cell::<T>()? else {
            return Ok(None);
        };
        let pool = cell
            .try_borrow()
            .map_err(|_| EcsError::PoolBorrowed { component: T::name() })?;
        Ref::filter_map(pool, |pool| (**pool).as_any().downcast_ref::<SparseSet<T>>())
            .map(Some)
            .map_err(|_| EcsError::UnknownComponentId(id))
    }

    /// Exclusive borrow of the pool for `T` through a shared world.
    pub(crate) fn pool_mut<T: Component>(&self) -> EcsResult<Option<RefMut<'_, SparseSet<T>>>> {
        let Some((id, cell)) = self.cell::<T>()? else {
            return Ok(None);
        };
        let pool = cell
            .try_borrow_mut()
            .map_err(|_| EcsError::PoolBorrowed { component: T::name() })?;
        RefMut::filter_map(pool, |pool| (**pool).as_any_mut().downcast_mut::<SparseSet<T>>())
            .map(Some)
            .map_err(|_| EcsError::UnknownComponentId(id))
    }

    // =========================================================================
    // Deferred work and cleanup
    // =========================================================================

    /// The deferred command queue.
    ///
    /// Query callbacks only hold `&World`; they record structural changes
    /// here and [`World::apply_deferred`] performs them afterwards.
    ///
    /// # Panics
    ///
    /// Panics if the queue is already borrowed, i.e. a previous guard is
    /// still alive.
    #[inline]
    pub fn defer(&self) -> RefMut<'_, Commands> {
        self.commands.borrow_mut()
    }

    /// Applies every recorded command in recording order.
    ///
    /// Returns the number of commands applied. On failure the remaining
    /// commands are dropped.
    ///
    /// # Errors
    ///
    /// The first error returned by a command.
    pub fn apply_deferred(&mut self) -> EcsResult<usize> {
        let commands = self.commands.get_mut().take();
        let count = commands.len();
        for command in commands {
            command.apply(self)?;
        }
        if count > 0 {
            tracing::trace!("Applied {} deferred commands", count);
        }
        Ok(count)
    }

    /// Drops every recorded command without applying it.
    ///
    /// Returns the number of commands dropped.
    pub fn discard_deferred(&mut self) -> usize {
        let commands = self.commands.get_mut();
        let count = commands.len();
        commands.clear();
        count
    }

    /// Frees every entity marked by [`World::destroy_entity`].
    ///
    /// Each marked entity loses every component in every pool, leaves the
    /// live set, and its id goes to the back of the free list in marking
    /// order. Removing the marker before the sweep cancels the destruction
    /// without disturbing the order of the others. Returns the number of
    /// entities freed.
    ///
    /// # Errors
    ///
    /// Fails only if the pool table is corrupt.
    pub fn sweep_destroyed(&mut self) -> EcsResult<usize> {
        let id = ComponentId::PENDING_DESTRUCTION;
        let marker = typed_pool::<PendingDestruction>(&mut self.pools, id)?;
        debug_assert_eq!(marker.len(), self.marked.len());
        let doomed = std::mem::take(&mut self.marked);
        if doomed.is_empty() {
            return Ok(0);
        }

        for (cell, members) in self.pools.iter_mut().zip(&mut self.members) {
            let pool = cell.get_mut();
            for &entity in &doomed {
                pool.remove_entity(entity);
                members.unset(entity);
            }
        }

        let released = self.entities.release(&doomed);
        tracing::debug!("Swept {} destroyed entities", released);
        Ok(released)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Lists every pool with the entities holding its component.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolBorrowed`] if called while a query holds a pool.
    pub fn report_usage(&self) -> EcsResult<Vec<PoolReport>> {
        self.registry
            .iter()
            .map(|(id, component)| -> EcsResult<PoolReport> {
                let cell = self.pools.get(id.index()).ok_or(EcsError::UnknownComponentId(id))?;
                let pool = cell.try_borrow().map_err(|_| EcsError::PoolBorrowed { component })?;
                Ok(PoolReport {
                    id,
                    component,
                    entities: pool.report_usage().entities.to_vec(),
                })
            })
            .collect()
    }

    /// Entities holding a `T`, in dense order. Empty if `T` was never
    /// registered.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolBorrowed`] if the pool is mutably borrowed.
    pub fn report_usage_of<T: Component>(&self) -> EcsResult<Vec<Entity>> {
        Ok(self
            .pool::<T>()?
            .map(|pool| pool.entities().to_vec())
            .unwrap_or_default())
    }

    /// Drops every entity, component, and pending command.
    ///
    /// Registered types and their ids are kept. Outstanding handles go stale.
    pub fn reset(&mut self) {
        for cell in &mut self.pools {
            cell.get_mut().clear();
        }
        for members in &mut self.members {
            members.clear();
        }
        self.marked.clear();
        self.entities.reset();
        self.commands.get_mut().clear();
        tracing::debug!("World reset");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_live(&self, entity: Entity) -> EcsResult<()> {
        if self.entities.exists(entity) {
            Ok(())
        } else {
            Err(EcsError::InvalidEntity(entity))
        }
    }

    fn cell<T: Component>(&self) -> EcsResult<Option<(ComponentId, &PoolCell)>> {
        let Some(id) = self.registry.id_of::<T>() else {
            return Ok(None);
        };
        let cell = self.pools.get(id.index()).ok_or(EcsError::UnknownComponentId(id))?;
        Ok(Some((id, cell)))
    }

    fn mark(&mut self, id: ComponentId, entity: Entity) {
        if let Some(members) = self.members.get_mut(id.index()) {
            members.set(entity);
        }
    }

    fn typed_pool_mut<T: Component>(&mut self) -> EcsResult<Option<&mut SparseSet<T>>> {
        match self.registry.id_of::<T>() {
            Some(id) => typed_pool::<T>(&mut self.pools, id).map(Some),
            None => Ok(None),
        }
    }
}

/// Typed view of one pool. Takes the table rather than the world so the
/// membership bitsets stay borrowable next to it.
fn typed_pool<T: Component>(
    pools: &mut [PoolCell],
    id: ComponentId,
) -> EcsResult<&mut SparseSet<T>> {
    pools
        .get_mut(id.index())
        .and_then(|cell| (**cell.get_mut()).as_any_mut().downcast_mut::<SparseSet<T>>())
        .ok_or(EcsError::UnknownComponentId(id))
}

fn missing<T: Component>(entity: Entity) -> EcsError {
    EcsError::MissingComponent {
        entity,
        component: T::name(),
    }
}
