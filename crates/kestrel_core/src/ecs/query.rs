//! # Queries
//!
//! [`Collect`] and [`Bundle`] visit every entity that has **all** of the
//! requested component types, exactly once.
//!
//! ## Iteration strategy
//!
//! 1. Borrow every requested pool (mutably for `Collect`, shared for `Bundle`)
//! 2. Pick the smallest pool as the driver
//! 3. Walk the driver's dense array from the back, probing the other pools
//!    through their sparse arrays
//!
//! The matching set is computed fresh on every call. Iteration order follows
//! the driver's dense array, which swap-removes reorder.
//!
//! ## Mutation during iteration
//!
//! A query only borrows the world shared, so the callback cannot add or
//! remove components or entities. Record such changes with
//! [`World::defer`] and apply them after the query returns.
//!
//! ```rust
//! use kestrel_core::{Component, World};
//!
//! struct Position(f32);
//! struct Velocity(f32);
//! impl Component for Position {}
//! impl Component for Velocity {}
//!
//! let mut world = World::new(64);
//! let e = world.create_entity().unwrap();
//! world.add_component(e, Position(0.0)).unwrap();
//! world.add_component(e, Velocity(2.0)).unwrap();
//!
//! let moved = world
//!     .collect::<(Position, Velocity)>()
//!     .for_each(|position, velocity| position.0 += velocity.0)
//!     .unwrap();
//!
//! assert_eq!(moved, 1);
//! assert_eq!(world.get_component::<Position>(e).unwrap().0, 2.0);
//! ```

use std::marker::PhantomData;

use super::component::{Component, ComponentSet};
use super::entity::Entity;
use super::error::EcsResult;
use super::world::World;

/// Exclusion test registered by `without`.
type Filter = fn(&World, Entity) -> bool;

/// Mutable query over the component tuple `Q`.
///
/// Created by [`World::collect`]. Running it consumes the handle.
#[must_use = "a query does nothing until for_each or for_each_entity is called"]
pub struct Collect<'w, Q> {
    world: &'w World,
    without: Vec<Filter>,
    _marker: PhantomData<fn() -> Q>,
}

/// Read-only query over the component tuple `Q`.
///
/// Same matching rules as [`Collect`], but hands out shared references, so
/// several bundles over the same types may run nested.
#[must_use = "a query does nothing until for_each or for_each_entity is called"]
pub struct Bundle<'w, Q> {
    world: &'w World,
    without: Vec<Filter>,
    _marker: PhantomData<fn() -> Q>,
}

impl World {
    /// Starts a mutable query over every entity holding all of `Q`.
    #[inline]
    pub fn collect<Q: ComponentSet>(&self) -> Collect<'_, Q> {
        Collect {
            world: self,
            without: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Starts a read-only query over every entity holding all of `Q`.
    #[inline]
    pub fn bundle<Q: ComponentSet>(&self) -> Bundle<'_, Q> {
        Bundle {
            world: self,
            without: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<Q> Collect<'_, Q> {
    /// Skips entities that hold a `T`.
    pub fn without<T: Component>(mut self) -> Self {
        self.without.push(World::has_component::<T>);
        self
    }
}

impl<Q> Bundle<'_, Q> {
    /// Skips entities that hold a `T`.
    pub fn without<T: Component>(mut self) -> Self {
        self.without.push(World::has_component::<T>);
        self
    }
}

fn excluded(world: &World, filters: &[Filter], entity: Entity) -> bool {
    filters.iter().any(|filter| filter(world, entity))
}

/// Slot and length of the smallest pool. Ties go to the earliest slot.
fn smallest(lens: &[usize]) -> (usize, usize) {
    lens.iter()
        .copied()
        .enumerate()
        .min_by_key(|&(_, len)| len)
        .unwrap_or((0, 0))
}

macro_rules! impl_query {
    ($(($T:ident, $pool:ident, $slot:tt)),+) => {
        impl<'w, $($T: Component),+> Collect<'w, ($($T,)+)> {
            /// Calls `visit` with mutable references to the components of every
            /// matching entity. Returns the number of entities visited.
            ///
            /// # Errors
            ///
            /// `PoolBorrowed` if a requested pool is already borrowed, for
            /// instance because a type is listed twice.
            pub fn for_each<Func>(self, mut visit: Func) -> EcsResult<usize>
            where
                Func: FnMut($(&mut $T),+),
            {
                self.for_each_entity(|_, $($pool),+| visit($($pool),+))
            }

            /// Like [`Collect::for_each`], with the entity passed first.
            ///
            /// # Errors
            ///
            /// `PoolBorrowed` if a requested pool is already borrowed.
            pub fn for_each_entity<Func>(self, mut visit: Func) -> EcsResult<usize>
            where
                Func: FnMut(Entity, $(&mut $T),+),
            {
                let world = self.world;
                $(
                    let Some(mut $pool) = world.pool_mut::<$T>()? else {
                        return Ok(0);
                    };
                )+

                let (driver, len) = smallest(&[$($pool.len()),+]);
                let mut visited = 0;
                for position in (0..len).rev() {
                    let mut entity = Entity::NULL;
                    $( if driver == $slot { entity = $pool.entity_at(position); } )+

                    if excluded(world, &self.without, entity) {
                        continue;
                    }
                    if let ($(Some($pool),)+) = ($($pool.get_mut(entity),)+) {
                        visit(entity, $($pool),+);
                        visited += 1;
                    }
                }
                Ok(visited)
            }
        }

        impl<'w, $($T: Component),+> Bundle<'w, ($($T,)+)> {
            /// Calls `visit` with shared references to the components of every
            /// matching entity. Returns the number of entities visited.
            ///
            /// # Errors
            ///
            /// `PoolBorrowed` if a requested pool is mutably borrowed.
            pub fn for_each<Func>(self, mut visit: Func) -> EcsResult<usize>
            where
                Func: FnMut($(&$T),+),
            {
                self.for_each_entity(|_, $($pool),+| visit($($pool),+))
            }

            /// Like [`Bundle::for_each`], with the entity passed first.
            ///
            /// # Errors
            ///
            /// `PoolBorrowed` if a requested pool is mutably borrowed.
            pub fn for_each_entity<Func>(self, mut visit: Func) -> EcsResult<usize>
            where
                Func: FnMut(Entity, $(&$T),+),
            {
                let world = self.world;
                $(
                    let Some($pool) = world.pool::<$T>()? else {
                        return Ok(0);
                    };
                )+

                let (driver, len) = smallest(&[$($pool.len()),+]);
                let mut visited = 0;
                for position in (0..len).rev() {
                    let mut entity = Entity::NULL;
                    $( if driver == $slot { entity = $pool.entity_at(position); } )+

                    if excluded(world, &self.without, entity) {
                        continue;
                    }
                    if let ($(Some($pool),)+) = ($($pool.get(entity),)+) {
                        visit(entity, $($pool),+);
                        visited += 1;
                    }
                }
                Ok(visited)
            }

            /// The matching entities, in visiting order.
            ///
            /// # Errors
            ///
            /// `PoolBorrowed` if a requested pool is mutably borrowed.
            pub fn entities(self) -> EcsResult<Vec<Entity>> {
                let mut matched = Vec::new();
                self.for_each_entity(|entity, $(_: &$T),+| matched.push(entity))?;
                Ok(matched)
            }
        }
    };
}

impl_query!((A, pa, 0));
impl_query!((A, pa, 0), (B, pb, 1));
impl_query!((A, pa, 0), (B, pb, 1), (C, pc, 2));
impl_query!((A, pa, 0), (B, pb, 1), (C, pc, 2), (D, pd, 3));
impl_query!((A, pa, 0), (B, pb, 1), (C, pc, 2), (D, pd, 3), (E, pe, 4));
impl_query!((A, pa, 0), (B, pb, 1), (C, pc, 2), (D, pd, 3), (E, pe, 4), (F, pf, 5));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::error::EcsError;

    #[derive(Debug, PartialEq)]
    struct A(u32);
    impl Component for A {}

    #[derive(Debug, PartialEq)]
    struct B(u32);
    impl Component for B {}

    #[allow(dead_code)]
    struct Never;
    impl Component for Never {}

    fn world_with_abc() -> (World, [Entity; 3]) {
        let mut world = World::new(16);
        let e1 = world.create_entity().unwrap();
        let e2 = world.create_entity().unwrap();
        let e3 = world.create_entity().unwrap();
        world.add_component(e1, A(1)).unwrap();
        world.add_component(e2, A(2)).unwrap();
        world.add_component(e2, B(2)).unwrap();
        world.add_component(e3, B(3)).unwrap();
        (world, [e1, e2, e3])
    }

    #[test]
    fn test_and_semantics() {
        let (world, [_, e2, _]) = world_with_abc();
        let mut seen = Vec::new();
        let visited = world
            .collect::<(A, B)>()
            .for_each_entity(|entity, a, b| seen.push((entity, a.0, b.0)))
            .unwrap();

        assert_eq!(visited, 1);
        assert_eq!(seen, vec![(e2, 2, 2)]);
    }

    #[test]
    fn test_single_pool_walks_dense_in_reverse() {
        let (world, [e1, e2, _]) = world_with_abc();
        let order = world.bundle::<(A,)>().entities().unwrap();
        assert_eq!(order, vec![e2, e1]);
    }

    #[test]
    fn test_mutation_is_visible_afterwards() {
        let (world, [e1, e2, _]) = world_with_abc();
        world.collect::<(A,)>().for_each(|a| a.0 *= 10).unwrap();

        assert_eq!(world.get_component::<A>(e1).unwrap().0, 10);
        assert_eq!(world.get_component::<A>(e2).unwrap().0, 20);
    }

    #[test]
    fn test_unregistered_type_matches_nothing() {
        let (world, _) = world_with_abc();
        let visited = world.collect::<(A, Never)>().for_each(|_, _| {}).unwrap();
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_without_filters_entities() {
        let (world, [e1, _, _]) = world_with_abc();
        let matched = world.bundle::<(A,)>().without::<B>().entities().unwrap();
        assert_eq!(matched, vec![e1]);
    }

    #[test]
    fn test_membership_of_others_inside_a_query() {
        let (world, [e1, e2, e3]) = world_with_abc();
        let mut answers = Vec::new();
        world
            .collect::<(A, B)>()
            .for_each_entity(|_, _, _| {
                answers.push((
                    world.has_component::<A>(e1),
                    world.has_component::<B>(e3),
                    world.has_all::<(A, B)>(e2),
                    world.has_any::<(B,)>(e1),
                ));
            })
            .unwrap();
        assert_eq!(answers, vec![(true, true, true, false)]);

        let mut seen = Vec::new();
        world
            .collect::<(A,)>()
            .for_each_entity(|entity, _| {
                let other = if entity == e1 { e2 } else { e1 };
                seen.push(world.has_component::<A>(other));
            })
            .unwrap();
        assert_eq!(seen, vec![true, true]);
    }

    #[test]
    fn test_without_a_queried_type_excludes_everything() {
        let (world, _) = world_with_abc();
        let visited = world.collect::<(A,)>().without::<A>().for_each(|_| {}).unwrap();
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_duplicate_type_is_a_borrow_error() {
        let (world, _) = world_with_abc();
        let result = world.collect::<(A, A)>().for_each(|_, _| {});
        assert!(matches!(result, Err(EcsError::PoolBorrowed { component: "A" })));
    }

    #[test]
    fn test_nested_bundles_share_pools() {
        let (world, _) = world_with_abc();
        let mut pairs = 0;
        world
            .bundle::<(A,)>()
            .for_each(|_| {
                pairs += world.bundle::<(A,)>().for_each(|_| {}).unwrap();
            })
            .unwrap();
        assert_eq!(pairs, 4);
    }

    #[test]
    fn test_destroy_from_inside_a_query() {
        let (mut world, [e1, e2, _]) = world_with_abc();
        world
            .collect::<(A,)>()
            .for_each_entity(|entity, a| {
                if a.0 == 1 {
                    world.defer().destroy(entity);
                }
            })
            .unwrap();
        world.apply_deferred().unwrap();

        assert!(world.is_pending_destruction(e1));
        assert!(!world.is_pending_destruction(e2));
    }

    #[test]
    fn test_smallest_prefers_first_on_ties() {
        assert_eq!(smallest(&[3, 1, 1]), (1, 1));
        assert_eq!(smallest(&[0]), (0, 0));
    }
}
