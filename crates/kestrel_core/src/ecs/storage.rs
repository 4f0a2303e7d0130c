//! # Component Storage
//!
//! One sparse set per component type:
//!
//! ```text
//! sparse: [ -, 2, -, 0, -, 1, ... ]   <- indexed by entity index, sized to capacity
//! dense:  [ e3, e5, e1 ]              <- live owners, packed
//! values: [ c3, c5, c1 ]              <- index-aligned with dense
//! ```
//!
//! - Add / remove / lookup are O(1)
//! - Iteration walks two contiguous arrays
//! - Removal swaps the last pair into the hole, so iteration order is not
//!   stable across mutations

use std::any::Any;

use super::component::Component;
use super::entity::Entity;
use super::error::{EcsError, EcsResult};

/// Sparse slot value meaning "no component".
const EMPTY: u32 = u32::MAX;

/// Sparse-set storage for a single component type.
///
/// Invariants, for every entity `e` stored here:
/// - `sparse[e.index()] < dense.len()` and `dense[sparse[e.index()]] == e`
/// - `values[i]` belongs to `dense[i]`
///
/// # Example
///
/// ```rust
/// use kestrel_core::{Component, Entity, SparseSet};
///
/// struct Health(f32);
/// impl Component for Health {}
///
/// let mut pool: SparseSet<Health> = SparseSet::new(1_000);
/// let e = Entity::new(42, 0);
/// pool.insert(e, Health(100.0)).unwrap();
/// assert!(pool.contains(e));
/// ```
pub struct SparseSet<T> {
    /// Entity index -> dense index, `EMPTY` when absent.
    sparse: Box<[u32]>,
    /// Owners, in insertion order modulo swap-removes.
    dense: Vec<Entity>,
    /// Component values, index-aligned with `dense`.
    values: Vec<T>,
}

impl<T: Component> SparseSet<T> {
    /// Creates an empty pool able to hold entity indices `[0, capacity)`.
    ///
    /// The sparse array is allocated up front; dense storage grows on demand.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            sparse: vec![EMPTY; capacity as usize].into_boxed_slice(),
            dense: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Largest entity index this pool can hold, plus one.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sparse.len()
    }

    /// Number of components stored.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the pool holds no component.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Dense slot of the entity's component, if it has one.
    ///
    /// A handle whose generation differs from the stored owner is treated as
    /// absent.
    #[inline]
    #[must_use]
    pub fn dense_index(&self, entity: Entity) -> Option<usize> {
        let slot = *self.sparse.get(entity.index() as usize)?;
        if slot == EMPTY {
            return None;
        }
        let slot = slot as usize;
        (self.dense.get(slot) == Some(&entity)).then_some(slot)
    }

    /// O(1) membership test.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.dense_index(entity).is_some()
    }

    /// Appends a component for `entity` and returns a reference to it.
    ///
    /// The reference is only valid until the next insert or remove on this
    /// pool; the borrow checker enforces that.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponent`] if the entity already has one
    /// - [`EcsError::InvalidEntity`] if the index is outside the pool
    pub fn insert(&mut self, entity: Entity, value: T) -> EcsResult<&mut T> {
        let index = entity.index() as usize;
        if entity.is_null() || index >= self.sparse.len() {
            return Err(EcsError::InvalidEntity(entity));
        }
        if self.sparse[index] != EMPTY {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: T::name(),
            });
        }

        let position = self.dense.len();
        self.dense.push(entity);
        self.values.push(value);
        self.sparse[index] = position as u32;
        Ok(&mut self.values[position])
    }

    /// Removes and returns the entity's component.
    ///
    /// The last dense pair moves into the vacated slot.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if the entity has no component here.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<T> {
        let Some(position) = self.dense_index(entity) else {
            return Err(EcsError::MissingComponent {
                entity,
                component: T::name(),
            });
        };

        self.dense.swap_remove(position);
        let value = self.values.swap_remove(position);
        if let Some(&moved) = self.dense.get(position) {
            self.sparse[moved.index() as usize] = position as u32;
        }
        self.sparse[entity.index() as usize] = EMPTY;
        Ok(value)
    }

    /// Gets the entity's component.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.dense_index(entity).map(|i| &self.values[i])
    }

    /// Gets the entity's component mutably.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.dense_index(entity).map(|i| &mut self.values[i])
    }

    /// Owner of the component in dense slot `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position >= len()`.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, position: usize) -> Entity {
        self.dense[position]
    }

    /// The dense entity array.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.dense
    }

    /// The dense entity array as raw 64-bit handles.
    #[inline]
    #[must_use]
    pub fn entity_bits(&self) -> &[u64] {
        bytemuck::cast_slice(&self.dense)
    }

    /// The dense value array.
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// The dense value array, mutably. Values can change, membership cannot.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Iterates over `(owner, component)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.dense.iter().copied().zip(self.values.iter())
    }

    /// Iterates mutably over `(owner, component)` pairs in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.dense.iter().copied().zip(self.values.iter_mut())
    }

    /// Drops every component. The sparse array keeps its size.
    pub fn clear(&mut self) {
        for entity in self.dense.drain(..) {
            self.sparse[entity.index() as usize] = EMPTY;
        }
        self.values.clear();
    }
}

/// Bit per entity index telling whether a pool holds that index.
///
/// The world keeps one next to every pool, outside the pool's `RefCell`.
/// Membership only changes through `&mut World`, so it stays readable while
/// a query holds the pool itself.
#[derive(Clone, Debug)]
pub(crate) struct Membership {
    words: Box<[u64]>,
}

impl Membership {
    pub(crate) fn new(capacity: u32) -> Self {
        let words = (capacity as usize).div_ceil(64);
        Self {
            words: vec![0; words].into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn contains(&self, entity: Entity) -> bool {
        let index = entity.index() as usize;
        self.words
            .get(index / 64)
            .is_some_and(|word| word & (1_u64 << (index % 64)) != 0)
    }

    #[inline]
    pub(crate) fn set(&mut self, entity: Entity) {
        let index = entity.index() as usize;
        if let Some(word) = self.words.get_mut(index / 64) {
            *word |= 1 << (index % 64);
        }
    }

    #[inline]
    pub(crate) fn unset(&mut self, entity: Entity) {
        let index = entity.index() as usize;
        if let Some(word) = self.words.get_mut(index / 64) {
            *word &= !(1_u64 << (index % 64));
        }
    }

    pub(crate) fn clear(&mut self) {
        self.words.fill(0);
    }
}

/// Snapshot of which entities hold a component type.
#[derive(Clone, Copy, Debug)]
pub struct PoolUsage<'a> {
    /// Name of the component type.
    pub component: &'static str,
    /// Current owners, in dense order.
    pub entities: &'a [Entity],
}

/// Type-erased view of a pool, used by the world's pool table.
///
/// This is the closed set of operations the world needs without knowing the
/// component type: destruction sweeps, diagnostics, and downcasting back to
/// the typed pool.
pub trait ErasedPool: Any {
    /// Name of the stored component type.
    fn component_name(&self) -> &'static str;

    /// Number of components stored.
    fn len(&self) -> usize;

    /// Whether the pool is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test by handle.
    fn contains_entity(&self, entity: Entity) -> bool;

    /// Removes the entity's component if present; returns whether it was.
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Entities holding this component, with the type name.
    fn report_usage(&self) -> PoolUsage<'_>;

    /// Drops every component.
    fn clear(&mut self);

    /// Upcast for downcasting to `SparseSet<T>`.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to `SparseSet<T>`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedPool for SparseSet<T> {
    fn component_name(&self) -> &'static str {
        T::name()
    }

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn contains_entity(&self, entity: Entity) -> bool {
        self.contains(entity)
    }

    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_ok()
    }

    fn report_usage(&self) -> PoolUsage<'_> {
        PoolUsage {
            component: T::name(),
            entities: &self.dense,
        }
    }

    fn clear(&mut self) {
        SparseSet::clear(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    fn e(index: u32) -> Entity {
        Entity::new(index, 0)
    }

    #[test]
    fn test_insert_get_remove() {
        let mut pool: SparseSet<Health> = SparseSet::new(16);
        pool.insert(e(3), Health(10)).unwrap();

        assert!(pool.contains(e(3)));
        assert_eq!(pool.get(e(3)), Some(&Health(10)));

        assert_eq!(pool.remove(e(3)).unwrap(), Health(10));
        assert!(!pool.contains(e(3)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_membership_bits() {
        let mut members = Membership::new(130);
        members.set(e(0));
        members.set(e(129));
        assert!(members.contains(e(0)));
        assert!(members.contains(e(129)));
        assert!(!members.contains(e(64)));
        assert!(!members.contains(e(500)));

        members.unset(e(0));
        assert!(!members.contains(e(0)));
        members.clear();
        assert!(!members.contains(e(129)));
    }

    #[test]
    fn test_duplicate_and_missing() {
        let mut pool: SparseSet<Health> = SparseSet::new(16);
        pool.insert(e(1), Health(1)).unwrap();

        assert!(matches!(
            pool.insert(e(1), Health(2)),
            Err(EcsError::DuplicateComponent { component: "Health", .. })
        ));
        assert!(matches!(
            pool.remove(e(2)),
            Err(EcsError::MissingComponent { .. })
        ));
        assert!(matches!(
            pool.insert(e(16), Health(3)),
            Err(EcsError::InvalidEntity(_))
        ));
    }

    #[test]
    fn test_swap_remove_keeps_invariants() {
        let mut pool: SparseSet<Health> = SparseSet::new(16);
        pool.insert(e(1), Health(1)).unwrap();
        pool.insert(e(2), Health(2)).unwrap();
        pool.insert(e(3), Health(3)).unwrap();

        pool.remove(e(2)).unwrap();

        assert_eq!(pool.entities(), &[e(1), e(3)]);
        assert_eq!(pool.dense_index(e(3)), Some(1));
        assert_eq!(pool.get(e(3)), Some(&Health(3)));
        let hp: Vec<i32> = pool.values().iter().map(|h| h.0).collect();
        assert_eq!(hp, vec![1, 3]);
        for (position, &owner) in pool.entities().iter().enumerate() {
            assert_eq!(pool.dense_index(owner), Some(position));
        }
    }

    #[test]
    fn test_remove_last_needs_no_swap() {
        let mut pool: SparseSet<Health> = SparseSet::new(8);
        pool.insert(e(1), Health(1)).unwrap();
        pool.insert(e(2), Health(2)).unwrap();

        pool.remove(e(2)).unwrap();
        assert_eq!(pool.entities(), &[e(1)]);
        assert_eq!(pool.dense_index(e(1)), Some(0));
    }

    #[test]
    fn test_stale_generation_is_absent() {
        let mut pool: SparseSet<Health> = SparseSet::new(8);
        pool.insert(Entity::new(4, 1), Health(4)).unwrap();

        assert!(!pool.contains(Entity::new(4, 0)));
        assert!(pool.get_mut(Entity::new(4, 2)).is_none());
    }

    #[test]
    fn test_entity_bits_match_handles() {
        let mut pool: SparseSet<Health> = SparseSet::new(8);
        pool.insert(Entity::new(5, 2), Health(0)).unwrap();
        assert_eq!(pool.entity_bits(), &[Entity::new(5, 2).to_bits()]);
    }

    #[test]
    fn test_erased_report_and_clear() {
        let mut pool: SparseSet<Health> = SparseSet::new(8);
        pool.insert(e(0), Health(0)).unwrap();
        pool.insert(e(6), Health(6)).unwrap();

        let erased: &mut dyn ErasedPool = &mut pool;
        let usage = erased.report_usage();
        assert_eq!(usage.component, "Health");
        assert_eq!(usage.entities, &[e(0), e(6)]);

        assert!(erased.remove_entity(e(0)));
        assert!(!erased.remove_entity(e(0)));
        erased.clear();
        assert!(erased.is_empty());
        assert!(pool.insert(e(6), Health(7)).is_ok());
    }
}
