//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the sparse arrays of every component pool
//! - A generation counter that detects handles held across a recycle
//!
//! The [`EntityRegistry`] owns the id universe `[0, capacity)`. Ids are handed
//! out from a FIFO free list, so the oldest freed index is reused first.

use std::collections::VecDeque;
use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::error::{EcsError, EcsResult};

/// Default entity ceiling for a world.
pub const DEFAULT_MAX_ENTITIES: u32 = 64_000;

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the sparse arrays
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Null/invalid entity.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates a new entity handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the raw 64-bit representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`Entity::to_bits`].
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Checks if this handle is the null entity.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "entity(null)")
        } else {
            write!(f, "entity {}v{}", self.index(), self.generation())
        }
    }
}

/// Owns the set of live entities and the free list of recyclable ids.
///
/// An id is live from [`EntityRegistry::create`] until [`EntityRegistry::release`].
/// Release is only ever called by the world's destruction sweep, never
/// directly by gameplay code.
pub struct EntityRegistry {
    /// Current generation per index. The live handle for index `i` is
    /// `Entity::new(i, generations[i])` while `live[i]` is set.
    generations: Box<[u32]>,
    /// Liveness per index.
    live: Box<[bool]>,
    /// Live entities in creation order.
    alive: Vec<Entity>,
    /// Indices available for reuse, oldest-freed first.
    free: VecDeque<u32>,
    capacity: u32,
}

impl EntityRegistry {
    /// Creates a registry with every id in `[0, capacity)` on the free list.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            generations: vec![0; capacity as usize].into_boxed_slice(),
            live: vec![false; capacity as usize].into_boxed_slice(),
            alive: Vec::with_capacity(capacity as usize),
            free: (0..capacity).collect(),
            capacity,
        }
    }

    /// Returns the entity ceiling.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of ids not on the free list.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.alive.len()
    }

    /// Whether no entity is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Pops the oldest free id and marks it live.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExhausted`] when the free list is empty.
    pub fn create(&mut self) -> EcsResult<Entity> {
        let Some(index) = self.free.pop_front() else {
            tracing::warn!("Entity capacity exhausted ({} ids)", self.capacity);
            return Err(EcsError::CapacityExhausted {
                capacity: self.capacity,
            });
        };

        let slot = index as usize;
        self.live[slot] = true;
        let entity = Entity::new(index, self.generations[slot]);
        self.alive.push(entity);
        Ok(entity)
    }

    /// Checks that a handle refers to a live entity of the current generation.
    #[inline]
    #[must_use]
    pub fn exists(&self, entity: Entity) -> bool {
        let slot = entity.index() as usize;
        !entity.is_null()
            && slot < self.live.len()
            && self.live[slot]
            && self.generations[slot] == entity.generation()
    }

    /// Releases a batch of entities back to the free list, in the given order.
    ///
    /// Each released index gets a new generation, so handles to it go stale.
    /// Returns the number of entities actually released; handles that were
    /// not live are skipped.
    pub fn release(&mut self, entities: &[Entity]) -> usize {
        let mut released = 0;
        for &entity in entities {
            if !self.exists(entity) {
                continue;
            }
            let slot = entity.index() as usize;
            self.live[slot] = false;
            self.generations[slot] = self.generations[slot].wrapping_add(1);
            self.free.push_back(entity.index());
            released += 1;
        }

        if released > 0 {
            let live = &self.live;
            let generations = &self.generations;
            self.alive.retain(|e| {
                let slot = e.index() as usize;
                live[slot] && generations[slot] == e.generation()
            });
        }
        released
    }

    /// Live entities in creation order.
    #[inline]
    #[must_use]
    pub fn alive(&self) -> &[Entity] {
        &self.alive
    }

    /// Returns every id to the free list in ascending order.
    ///
    /// Generations of previously live ids are bumped so outstanding handles
    /// become stale.
    pub fn reset(&mut self) {
        for entity in self.alive.drain(..) {
            let slot = entity.index() as usize;
            self.generations[slot] = self.generations[slot].wrapping_add(1);
        }
        self.live.fill(false);
        self.free.clear();
        self.free.extend(0..self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_roundtrip() {
        let entity = Entity::new(12345, 67890);
        assert_eq!(entity.index(), 12345);
        assert_eq!(entity.generation(), 67890);
        assert_eq!(Entity::from_bits(entity.to_bits()), entity);
        assert!(Entity::default().is_null());
    }

    #[test]
    fn test_create_is_fifo() {
        let mut registry = EntityRegistry::new(4);
        let ids: Vec<u32> = (0..4).map(|_| registry.create().unwrap().index()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_capacity_exhausted() {
        let mut registry = EntityRegistry::new(2);
        registry.create().unwrap();
        registry.create().unwrap();
        assert!(matches!(
            registry.create(),
            Err(EcsError::CapacityExhausted { capacity: 2 })
        ));
    }

    #[test]
    fn test_release_bumps_generation() {
        let mut registry = EntityRegistry::new(2);
        let a = registry.create().unwrap();
        let b = registry.create().unwrap();

        assert_eq!(registry.release(&[a]), 1);
        assert!(!registry.exists(a));
        assert!(registry.exists(b));
        assert_eq!(registry.alive(), &[b]);

        let c = registry.create().unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert!(!registry.exists(a));

        // Stale handles are skipped.
        assert_eq!(registry.release(&[a]), 0);
    }

    #[test]
    fn test_reset_restores_every_id() {
        let mut registry = EntityRegistry::new(3);
        let a = registry.create().unwrap();
        registry.create().unwrap();
        registry.reset();

        assert!(registry.is_empty());
        assert!(!registry.exists(a));
        let ids: Vec<u32> = (0..3).map(|_| registry.create().unwrap().index()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_range_does_not_exist() {
        let registry = EntityRegistry::new(2);
        assert!(!registry.exists(Entity::new(7, 0)));
        assert!(!registry.exists(Entity::NULL));
    }
}
