//! # Component System
//!
//! Components are plain data records owned by at most one entity each,
//! stored in a per-type sparse-set pool. The core never interprets component
//! contents; it only stores, finds, and iterates them.

use super::entity::Entity;
use super::error::EcsResult;
use super::world::World;

/// Marker trait for ECS components.
///
/// Any `'static` type can be a component once it opts in:
///
/// ```rust
/// use kestrel_core::Component;
///
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {}
/// ```
pub trait Component: 'static {
    /// Human-readable type name, used by diagnostics and error messages.
    #[must_use]
    fn name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Tag attached by `World::destroy_entity`.
///
/// An entity carrying this tag is still live and queryable. The cleanup
/// sweep at the end of the frame removes it together with all its components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingDestruction;

impl Component for PendingDestruction {}

/// Strips the module path from a type name, keeping generic arguments.
fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}

/// A tuple of component types, used for registration manifests and
/// all-of / any-of membership tests.
pub trait ComponentSet: 'static {
    /// Names of the member types, in tuple order.
    fn names() -> Vec<&'static str>;

    /// Registers every member type with the world, in tuple order.
    ///
    /// # Errors
    ///
    /// Fails if the world's type registry is frozen and a member is new.
    fn register(world: &mut World) -> EcsResult<()>;

    /// Whether the entity has every member component.
    fn has_all(world: &World, entity: Entity) -> bool;

    /// Whether the entity has at least one member component.
    fn has_any(world: &World, entity: Entity) -> bool;
}

macro_rules! impl_component_set {
    ($($T:ident),+) => {
        impl<$($T: Component),+> ComponentSet for ($($T,)+) {
            fn names() -> Vec<&'static str> {
                vec![$($T::name()),+]
            }

            fn register(world: &mut World) -> EcsResult<()> {
                $( world.register::<$T>()?; )+
                Ok(())
            }

            fn has_all(world: &World, entity: Entity) -> bool {
                $( world.has_component::<$T>(entity) )&&+
            }

            fn has_any(world: &World, entity: Entity) -> bool {
                $( world.has_component::<$T>(entity) )||+
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
