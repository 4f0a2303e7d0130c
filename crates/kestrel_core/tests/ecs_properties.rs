//! # ECS Property Verification
//!
//! End-to-end checks of the world, pools, queries, and scheduler through the
//! public API only:
//!
//! 1. **Storage**: round-trip, isolation, swap-remove layout
//! 2. **Entities**: capacity ceiling, FIFO recycling, stale handles
//! 3. **Queries**: AND semantics, exactly-once visits
//! 4. **Destruction**: deferred until the cleanup sweep
//! 5. **Scheduling**: phase order, reordering inside a phase
//!
//! Run with: cargo test -p kestrel_core --test ecs_properties

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use kestrel_core::{
    Component, EcsError, Entity, FnSystem, Phase, Scheduler, World, WorldConfig,
    DEFAULT_MAX_ENTITIES,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(i32);
impl Component for Health {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Armor(u8);
impl Component for Armor {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct A;
impl Component for A {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct B;
impl Component for B {}

// ============================================================================
// STORAGE
// ============================================================================

#[test]
fn verify_add_remove_round_trip() {
    let mut world = World::new(32);
    let entities: Vec<Entity> = (0..8).map(|_| world.create_entity().unwrap()).collect();

    for (i, &e) in entities.iter().enumerate() {
        world.add_component(e, Health(i as i32)).unwrap();
        assert!(world.has_component::<Health>(e));
    }
    for &e in &entities {
        world.remove_component::<Health>(e).unwrap();
        assert!(!world.has_component::<Health>(e));
    }
}

#[test]
fn verify_component_isolation() {
    let mut world = World::new(8);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    world.add_component(e1, Health(10)).unwrap();
    world.add_component(e2, Health(20)).unwrap();

    world.get_component_mut::<Health>(e1).unwrap().0 = 99;

    assert_eq!(world.get_component::<Health>(e1).unwrap().0, 99);
    assert_eq!(world.get_component::<Health>(e2).unwrap().0, 20);
}

#[test]
fn verify_swap_remove_layout() {
    let mut world = World::new(8);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    let e3 = world.create_entity().unwrap();
    for e in [e1, e2, e3] {
        world.add_component(e, Health(0)).unwrap();
    }

    world.remove_component::<Health>(e2).unwrap();

    let pool = world.pool::<Health>().unwrap().unwrap();
    assert_eq!(pool.entities(), &[e1, e3]);
    assert_eq!(pool.dense_index(e3), Some(1));
}

#[test]
fn verify_access_errors_are_typed() {
    let mut world = World::new(4);
    let e = world.create_entity().unwrap();

    assert!(matches!(
        world.get_component::<Armor>(e),
        Err(EcsError::MissingComponent { component: "Armor", .. })
    ));
    world.add_component(e, Armor(1)).unwrap();
    assert!(matches!(
        world.add_component(e, Armor(2)),
        Err(EcsError::DuplicateComponent { component: "Armor", .. })
    ));
    assert_eq!(world.get_component::<Armor>(e).unwrap().0, 1);
    assert!(world.try_get_component::<Health>(e).unwrap().is_none());
}

// ============================================================================
// ENTITIES
// ============================================================================

#[test]
fn verify_capacity_ceiling() {
    let mut world = World::new(DEFAULT_MAX_ENTITIES);
    for _ in 0..DEFAULT_MAX_ENTITIES {
        world.create_entity().unwrap();
    }

    assert_eq!(world.entity_count(), DEFAULT_MAX_ENTITIES as usize);
    assert!(matches!(
        world.create_entity(),
        Err(EcsError::CapacityExhausted { capacity: DEFAULT_MAX_ENTITIES })
    ));
}

#[test]
fn verify_fifo_recycling() {
    let mut world = World::new(10);
    let entities: Vec<Entity> = (0..10).map(|_| world.create_entity().unwrap()).collect();

    world.destroy_entity(entities[3]).unwrap();
    world.destroy_entity(entities[7]).unwrap();
    assert_eq!(world.sweep_destroyed().unwrap(), 2);

    let first = world.create_entity().unwrap();
    let second = world.create_entity().unwrap();
    assert_eq!(first.index(), 3);
    assert_eq!(second.index(), 7);
}

#[test]
fn verify_stale_handles_are_detected() {
    let mut world = World::new(1);
    let old = world.create_entity().unwrap();
    world.add_component(old, Health(1)).unwrap();
    world.destroy_entity(old).unwrap();
    world.sweep_destroyed().unwrap();

    let new = world.create_entity().unwrap();
    assert_eq!(new.index(), old.index());
    assert_ne!(new, old);

    assert!(!world.exists(old));
    assert!(!world.has_component::<Health>(old));
    assert!(matches!(
        world.add_component(old, Health(2)),
        Err(EcsError::InvalidEntity(e)) if e == old
    ));
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn verify_query_and_semantics() {
    let mut world = World::new(8);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    let e3 = world.create_entity().unwrap();
    world.add_component(e1, A).unwrap();
    world.add_component(e2, A).unwrap();
    world.add_component(e2, B).unwrap();
    world.add_component(e3, B).unwrap();

    let mut visited = Vec::new();
    let count = world
        .collect::<(A, B)>()
        .for_each_entity(|entity, _, _| visited.push(entity))
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(visited, vec![e2]);
    assert_eq!(world.bundle::<(B, A)>().entities().unwrap(), vec![e2]);
}

#[test]
fn verify_query_visits_each_entity_once() {
    let mut world = World::new(256);
    for i in 0..200 {
        let e = world.create_entity().unwrap();
        world.add_component(e, Health(i)).unwrap();
        if i % 3 == 0 {
            world.add_component(e, Armor(1)).unwrap();
        }
    }
    // Reorder the dense arrays.
    for &e in world.alive_entities().to_vec().iter().step_by(7) {
        world.remove_component::<Health>(e).unwrap();
    }

    let mut seen = HashSet::new();
    let count = world
        .bundle::<(Health, Armor)>()
        .for_each_entity(|entity, _, _| assert!(seen.insert(entity)))
        .unwrap();

    let expected = world
        .alive_entities()
        .iter()
        .filter(|&&e| world.has_all::<(Health, Armor)>(e))
        .count();
    assert_eq!(count, expected);
    assert_eq!(seen.len(), expected);
}

// ============================================================================
// DESTRUCTION
// ============================================================================

#[test]
fn verify_destruction_is_deferred() {
    let mut world = World::new(8);
    let e = world.create_entity().unwrap();
    world.add_component(e, Health(5)).unwrap();
    world.add_component(e, Armor(2)).unwrap();

    world.destroy_entity(e).unwrap();

    assert!(world.exists(e));
    assert_eq!(world.bundle::<(Health, Armor)>().entities().unwrap(), vec![e]);
    assert_eq!(world.get_component::<Armor>(e).unwrap().0, 2);

    world.sweep_destroyed().unwrap();

    assert!(!world.exists(e));
    assert!(!world.has_component::<Health>(e));
    assert!(!world.has_component::<Armor>(e));
    assert!(world.report_usage().unwrap().iter().all(|pool| pool.entities.is_empty()));
}

#[test]
fn verify_queries_can_skip_pending_entities() {
    let mut world = World::new(8);
    let keep = world.create_entity().unwrap();
    let doomed = world.create_entity().unwrap();
    world.add_component(keep, Health(1)).unwrap();
    world.add_component(doomed, Health(1)).unwrap();
    world.destroy_entity(doomed).unwrap();

    let live = world
        .bundle::<(Health,)>()
        .without::<kestrel_core::PendingDestruction>()
        .entities()
        .unwrap();
    assert_eq!(live, vec![keep]);
}

// ============================================================================
// SCHEDULING
// ============================================================================

#[test]
fn verify_health_system_scenario() {
    let mut world = World::new(DEFAULT_MAX_ENTITIES);
    let mut scheduler = Scheduler::new();
    let calls = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&calls);
    scheduler
        .register_system(
            &mut world,
            FnSystem::new("health", Phase::Update, move |world: &mut World| {
                world.collect::<(Health,)>().for_each_entity(|entity, health| {
                    health.0 -= 1;
                    log.borrow_mut().push(entity);
                })?;
                Ok(())
            })
            .with_components::<(Health,)>(),
        )
        .unwrap();

    for i in 0..100 {
        let e = world.create_entity().unwrap();
        world.add_component(e, Health(i)).unwrap();
    }
    let dense = world.report_usage_of::<Health>().unwrap();

    let stats = scheduler.run_frame(&mut world).unwrap();

    let calls = calls.borrow();
    assert_eq!(stats.systems_run, 1);
    assert_eq!(calls.len(), 100);
    assert_eq!(calls.iter().collect::<HashSet<_>>().len(), 100);
    // Visiting order is the dense order, walked from the back.
    let reversed: Vec<Entity> = dense.iter().rev().copied().collect();
    assert_eq!(*calls, reversed);
}

#[test]
fn verify_sweep_runs_after_late_update() {
    let mut world = World::new(16);
    let mut scheduler = Scheduler::new();
    let observed = Rc::new(RefCell::new(Vec::new()));

    scheduler
        .register_system(
            &mut world,
            FnSystem::new("reaper", Phase::EarlyUpdate, |world: &mut World| {
                world.collect::<(Health,)>().for_each_entity(|entity, health| {
                    if health.0 <= 0 {
                        world.defer().destroy(entity);
                    }
                })?;
                Ok(())
            }),
        )
        .unwrap();

    let log = Rc::clone(&observed);
    scheduler
        .register_system(
            &mut world,
            FnSystem::new("observer", Phase::LateUpdate, move |world: &mut World| {
                let pending = world
                    .alive_entities()
                    .iter()
                    .filter(|&&e| world.is_pending_destruction(e))
                    .count();
                log.borrow_mut().push(pending);
                Ok(())
            }),
        )
        .unwrap();

    let dead = world.create_entity().unwrap();
    world.add_component(dead, Health(0)).unwrap();
    let alive = world.create_entity().unwrap();
    world.add_component(alive, Health(3)).unwrap();

    let stats = scheduler.run_frame(&mut world).unwrap();

    assert_eq!(*observed.borrow(), vec![1]);
    assert_eq!(stats.destroyed, 1);
    assert_eq!(stats.commands_applied, 1);
    assert!(!world.exists(dead));
    assert!(world.exists(alive));
}

#[test]
fn verify_reordering_never_crosses_phases() {
    let mut world = World::new(4);
    let mut scheduler = Scheduler::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let mut ids = Vec::new();
    for (name, phase) in [
        ("e1", Phase::EarlyUpdate),
        ("e2", Phase::EarlyUpdate),
        ("u1", Phase::Update),
        ("l1", Phase::LateUpdate),
    ] {
        let log = Rc::clone(&order);
        let id = scheduler
            .register_system(
                &mut world,
                FnSystem::new(name, phase, move |_: &mut World| {
                    log.borrow_mut().push(name);
                    Ok(())
                }),
            )
            .unwrap();
        ids.push(id);
    }
    let (e1, e2, u1, l1) = (ids[0], ids[1], ids[2], ids[3]);

    // Moving past either end of a phase is a no-op.
    assert!(!scheduler.move_down(Phase::EarlyUpdate, e2).unwrap());
    assert!(!scheduler.move_up(Phase::Update, u1).unwrap());
    assert!(!scheduler.move_down(Phase::Update, u1).unwrap());
    assert_eq!(scheduler.set_order(Phase::LateUpdate, l1, 0).unwrap(), 0);

    // A system cannot be addressed through a phase it is not in.
    assert!(matches!(
        scheduler.move_up(Phase::Update, l1),
        Err(EcsError::UnknownSystem(_))
    ));
    assert!(scheduler.set_order(Phase::LateUpdate, e1, 0).is_err());

    scheduler.move_up(Phase::EarlyUpdate, e2).unwrap();
    scheduler.run_frame(&mut world).unwrap();

    assert_eq!(*order.borrow(), vec!["e2", "e1", "u1", "l1"]);
    assert_eq!(scheduler.order(Phase::EarlyUpdate), &[e2, e1]);
    assert_eq!(scheduler.order(Phase::Update), &[u1]);
    assert_eq!(scheduler.order(Phase::LateUpdate), &[l1]);
}

#[test]
fn verify_system_inventory() {
    let mut world = World::new(4);
    let mut scheduler = Scheduler::new();
    scheduler
        .register_system(
            &mut world,
            FnSystem::new("physics", Phase::Update, |_: &mut World| Ok(()))
                .with_components::<(Health, Armor)>()
                .critical(),
        )
        .unwrap();

    let systems: Vec<_> = scheduler.systems().collect();
    assert_eq!(systems.len(), 1);
    assert_eq!(systems[0].name, "physics");
    assert_eq!(systems[0].components, vec!["Health", "Armor"]);
    assert_eq!(systems[0].kind, kestrel_core::SystemKind::Critical);
    assert_eq!(systems[0].phases, vec![Phase::Update]);
    assert!(world.component_id::<Armor>().is_some());
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn verify_world_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kestrel.toml");
    std::fs::write(&path, "[world]\nmax_entities = 3\nstrict_registration = true\n").unwrap();

    let config = WorldConfig::load(&path).unwrap();
    let mut world = World::with_manifest::<(Health,)>(&config).unwrap();

    assert_eq!(world.capacity(), 3);
    let e = world.create_entity().unwrap();
    assert!(world.add_component(e, Health(1)).is_ok());
    assert!(matches!(
        world.add_component(e, Armor(1)),
        Err(EcsError::RegistryFrozen { .. })
    ));
}

#[test]
fn verify_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = WorldConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(kestrel_core::ConfigError::Io(_))));
}
