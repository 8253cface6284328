//! # Lifecycle Tests
//!
//! Id allocation, add/remove/dispose, the frame-end queue, the
//! structural-mutation guard and halting on errors.

mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use common::{basic_rules, entries, log, recorder_info, spawn_marker, world_with, Faulty};
use phalanx_core::{
    Capabilities, Capability, Command, EntityId, EntityInfo, EntityInit, Footprint, KernelError, KernelResult, Order,
    Player, PlayerId, Ruleset, Trait, TraitInfo, World, WorldEvent,
};
use phalanx_shared::{CPos, WPos};

#[test]
fn test_ids_strictly_increase_and_are_never_reused() {
    let mut world = world_with(1, basic_rules());
    let a = spawn_marker(&mut world, 1);
    let b = spawn_marker(&mut world, 2);
    assert!(a < b);

    world.remove(b).unwrap();
    world.dispose_entity(a);
    world.dispose_entity(b);
    world.tick().unwrap();
    assert!(world.entity(a).is_none());
    assert!(world.entity(b).is_none());

    let c = spawn_marker(&mut world, 3);
    let d = world.create_entity("marker", EntityInit::new(), false).unwrap();
    assert!(b < c && c < d);
    assert!(!world.is_live(d));
}

#[test]
fn test_add_remove_cycle() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(EntityInfo::new("thing").with_trait(recorder_info(
            "R",
            [Capability::Created, Capability::AddedToWorld, Capability::RemovedFromWorld]
                .into_iter()
                .collect(),
            &hooks,
        )))
        .unwrap();
    let mut world = world_with(1, rules);
    let events = world.subscribe();

    let id = world.create_entity("thing", EntityInit::new(), false).unwrap();
    assert!(!world.is_live(id));
    world.add(id).unwrap();
    assert!(world.is_live(id));
    world.remove(id).unwrap();
    world.add(id).unwrap();

    let n = id.value();
    assert_eq!(
        entries(&hooks),
        vec![format!("R:created:{n}"), format!("R:added:{n}"), format!("R:removed:{n}"), format!("R:added:{n}")]
    );
    assert_eq!(
        events.drain(),
        vec![
            WorldEvent::EntityAdded { entity: id, tick: 0 },
            WorldEvent::EntityRemoved { entity: id, tick: 0 },
            WorldEvent::EntityAdded { entity: id, tick: 0 },
        ]
    );
}

#[test]
fn test_removing_non_live_entity_halts() {
    let mut world = world_with(1, basic_rules());
    let id = world.create_entity("marker", EntityInit::new(), false).unwrap();
    assert_eq!(world.remove(id), Err(KernelError::EntityNotInWorld(id)));
    assert!(world.halted().is_some());
    assert!(matches!(world.tick(), Err(KernelError::SimulationHalted(_))));
}

#[test]
fn test_adding_twice_halts() {
    let mut world = world_with(1, basic_rules());
    let id = spawn_marker(&mut world, 1);
    assert_eq!(world.add(id), Err(KernelError::EntityAlreadyInWorld(id)));
    assert!(world.halted().is_some());
}

#[test]
fn test_unknown_type_and_entity_are_plain_errors() {
    let mut world = world_with(1, basic_rules());
    assert!(matches!(
        world.create_entity("nope", EntityInit::new(), true),
        Err(KernelError::UnknownEntityType(_))
    ));
    assert_eq!(world.add(EntityId::new(99)), Err(KernelError::UnknownEntity(EntityId::new(99))));
    assert!(world.halted().is_none());
}

#[test]
fn test_players_are_fixed_once() {
    let mut world = world_with(1, basic_rules());
    let p1 = PlayerId::new(1);
    let p2 = PlayerId::new(2);
    world
        .set_players(vec![Player::new(p1, "one"), Player::new(p2, "two")], Some(p1))
        .unwrap();
    assert_eq!(world.local_player(), Some(p1));
    assert_eq!(world.render_player(), Some(p1));
    assert!(world.player(p1).unwrap().has_stance(p2));

    assert_eq!(world.set_players(vec![], None), Err(KernelError::PlayersAlreadySet));
    assert!(world.halted().is_some());
}

#[test]
fn test_local_player_must_be_in_session() {
    let mut world = world_with(1, basic_rules());
    let result = world.set_players(vec![Player::new(PlayerId::new(1), "one")], Some(PlayerId::new(5)));
    assert_eq!(result, Err(KernelError::LocalPlayerNotInSession(PlayerId::new(5))));
}

#[test]
fn test_owner_must_be_a_player_once_players_are_set() {
    let mut world = world_with(1, basic_rules());
    world.set_players(vec![Player::new(PlayerId::new(1), "one")], None).unwrap();
    let result = world.create_entity("marker", EntityInit::new().owner(PlayerId::new(2)), true);
    assert_eq!(result, Err(KernelError::UnknownPlayer(PlayerId::new(2))));
}

#[test]
fn test_frame_end_actions_drain_fifo_including_nested() {
    let mut world = world_with(1, basic_rules());
    let order = Rc::new(std::cell::RefCell::new(Vec::new()));

    let o = Rc::clone(&order);
    world.run_at_frame_end(move |w| {
        o.borrow_mut().push(1);
        let nested = Rc::clone(&o);
        w.run_at_frame_end(move |_| {
            nested.borrow_mut().push(3);
            Ok(())
        });
        Ok(())
    });
    let o = Rc::clone(&order);
    world.run_at_frame_end(move |_| {
        o.borrow_mut().push(2);
        Ok(())
    });

    assert_eq!(world.pending_frame_end_actions(), 2);
    world.tick().unwrap();
    assert_eq!(*order.borrow(), vec![1, 2, 3]);
    assert_eq!(world.pending_frame_end_actions(), 0);
    assert_eq!(world.last_frame_timings().frame_end_actions, 3);
}

#[test]
fn test_failing_frame_end_action_halts() {
    let mut world = world_with(1, basic_rules());
    world.run_at_frame_end(|_| Err(KernelError::InvalidConfig("bad".into())));
    assert!(world.tick().is_err());
    assert!(matches!(world.tick(), Err(KernelError::SimulationHalted(reason)) if reason.contains("bad")));
}

/// Tries to spawn during its tick, then defers the spawn.
struct Spawner {
    rejected: Rc<Cell<bool>>,
}

impl Trait for Spawner {
    fn name(&self) -> &'static str {
        "Spawner"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Tick)
    }

    fn tick(&mut self, _entity: EntityId, world: &mut World) -> KernelResult<()> {
        if let Err(KernelError::StructuralMutationDuringDispatch { operation }) =
            world.create_entity("marker", EntityInit::new(), true)
        {
            assert_eq!(operation, "create_entity");
            self.rejected.set(true);
        }
        world.run_at_frame_end(|w| w.create_entity("marker", EntityInit::new(), true).map(|_| ()));
        Ok(())
    }
}

#[test]
fn test_structural_mutation_is_rejected_during_dispatch() {
    thread_local! {
        static REJECTED: Rc<Cell<bool>> = Rc::new(Cell::new(false));
    }
    let rules = basic_rules()
        .with(EntityInfo::new("spawner").with_trait(TraitInfo::new("Spawner", |_| {
            Box::new(Spawner {
                rejected: REJECTED.with(Rc::clone),
            })
        })))
        .unwrap();
    let mut world = world_with(1, rules);
    let spawner = world.create_entity("spawner", EntityInit::new(), true).unwrap();

    world.tick().unwrap();
    assert!(REJECTED.with(|r| r.get()));
    let live: Vec<_> = world.live_entities().map(|e| e.id()).collect();
    assert_eq!(live, vec![world.world_entity(), spawner, EntityId::new(spawner.value() + 1)]);
}

#[test]
fn test_tick_error_halts_world() {
    let rules = basic_rules()
        .with(EntityInfo::new("faulty").with_trait(TraitInfo::new("Faulty", |_| Box::new(Faulty))))
        .unwrap();
    let mut world = world_with(1, rules);
    let id = world.create_entity("faulty", EntityInit::new(), true).unwrap();

    let err = world.tick().unwrap_err();
    assert!(matches!(err, KernelError::TraitFailed { entity, .. } if entity == id));
    assert!(world.halted().is_some_and(|r| r.contains("boom")));
    assert!(matches!(world.tick(), Err(KernelError::SimulationHalted(_))));
    assert!(matches!(world.process_orders(&[]), Err(KernelError::SimulationHalted(_))));
}

#[test]
fn test_dispose_entity_is_deferred_to_frame_end() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(EntityInfo::new("thing").with_trait(recorder_info(
            "R",
            [Capability::RemovedFromWorld, Capability::Disposing].into_iter().collect(),
            &hooks,
        )))
        .unwrap();
    let mut world = world_with(1, rules);
    let id = world.create_entity("thing", EntityInit::new(), true).unwrap();

    world.dispose_entity(id);
    assert!(world.is_live(id));
    world.tick().unwrap();
    assert!(world.entity(id).is_none());
    assert!(world.traits().all_traits_of(id).is_empty());
    let n = id.value();
    assert_eq!(entries(&hooks), vec![format!("R:removed:{n}"), format!("R:disposing:{n}")]);

    // Disposing twice is harmless.
    world.dispose_entity(id);
    world.tick().unwrap();
}

#[test]
fn test_world_dispose_order_newest_first_world_last() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(EntityInfo::new("World").with_trait(recorder_info("W", Capabilities::of(Capability::Disposing), &hooks)))
        .and_then(|r| {
            r.with(EntityInfo::new("thing").with_trait(recorder_info("T", Capabilities::of(Capability::Disposing), &hooks)))
        })
        .unwrap();
    let mut world = world_with(1, rules);
    let a = world.create_entity("thing", EntityInit::new(), true).unwrap();
    let b = world.create_entity("thing", EntityInit::new(), false).unwrap();
    let c = world.create_entity("thing", EntityInit::new(), true).unwrap();
    world.run_at_frame_end(|_| panic!("pending actions are discarded on dispose"));

    world.dispose().unwrap();
    assert!(world.is_disposed());
    assert_eq!(
        entries(&hooks),
        vec![
            format!("T:disposing:{}", c.value()),
            format!("T:disposing:{}", b.value()),
            format!("T:disposing:{}", a.value()),
            "W:disposing:0".to_string(),
        ]
    );
    assert_eq!(world.tick(), Err(KernelError::WorldDisposed));
    assert_eq!(
        world.create_entity("thing", EntityInit::new(), true),
        Err(KernelError::WorldDisposed)
    );
}

#[test]
fn test_change_owner_readds_entity() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(EntityInfo::new("thing").with_trait(recorder_info(
            "R",
            [Capability::AddedToWorld, Capability::RemovedFromWorld].into_iter().collect(),
            &hooks,
        )))
        .unwrap();
    let mut world = world_with(1, rules);
    let p1 = PlayerId::new(1);
    let p2 = PlayerId::new(2);
    world
        .set_players(vec![Player::new(p1, "one"), Player::new(p2, "two")], Some(p1))
        .unwrap();
    let id = world.create_entity("thing", EntityInit::new().owner(p1), true).unwrap();

    world.change_owner(id, Some(p2));
    assert_eq!(world.entity(id).and_then(|e| e.owner()), Some(p1));
    world.tick().unwrap();
    assert_eq!(world.entity(id).and_then(|e| e.owner()), Some(p2));
    let n = id.value();
    assert_eq!(
        entries(&hooks),
        vec![format!("R:added:{n}"), format!("R:removed:{n}"), format!("R:added:{n}")]
    );
}

#[test]
fn test_end_game_and_load_complete_run_once() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(EntityInfo::new("World").with_trait(recorder_info(
            "W",
            [Capability::GameOver, Capability::WorldLoaded].into_iter().collect(),
            &hooks,
        )))
        .unwrap();
    let mut world = world_with(1, rules);
    let events = world.subscribe();

    world.load_complete().unwrap();
    world.load_complete().unwrap();
    world.end_game().unwrap();
    world.end_game().unwrap();

    assert!(world.is_loaded());
    assert!(world.is_game_over());
    assert_eq!(entries(&hooks), vec!["W:loaded:0".to_string(), "W:game_over:0".to_string()]);
    assert_eq!(events.drain(), vec![WorldEvent::GameOver { tick: 0 }]);
}

type Results = Arc<Mutex<Vec<KernelResult<()>>>>;

/// A building that tries to take itself off the map from its own order
/// hook, or to tear the whole world down.
struct Shop {
    position: WPos,
    results: Results,
}

impl Trait for Shop {
    fn name(&self) -> &'static str {
        "Shop"
    }

    fn capabilities(&self) -> Capabilities {
        [Capability::ResolveOrder, Capability::RemovedFromWorld, Capability::OccupySpace]
            .into_iter()
            .collect()
    }

    fn footprint(&self, _entity: EntityId, _world: &World) -> Option<Footprint> {
        Some(Footprint::at(self.position))
    }

    fn resolve_order(
        &mut self,
        entity: EntityId,
        _issuer: PlayerId,
        command: &Command,
        world: &mut World,
    ) -> KernelResult<()> {
        let result = match command.name.as_str() {
            "sell" => world.remove(entity),
            "close" => world.dispose(),
            "scrap" => {
                world.dispose_entity(entity);
                Ok(())
            }
            _ => Ok(()),
        };
        self.results.lock().unwrap().push(result);
        Ok(())
    }
}

fn shop_world(results: &Results) -> (World, EntityId, CPos) {
    let shared = Arc::clone(results);
    let rules = basic_rules()
        .with(EntityInfo::new("shop").with_trait(TraitInfo::new("Shop", move |init: &EntityInit| {
            Box::new(Shop {
                position: init.resolved_center(),
                results: Arc::clone(&shared),
            })
        })))
        .unwrap();
    let mut world = world_with(1, rules);
    let cell = CPos::new(2, 2);
    let shop = world
        .create_entity("shop", EntityInit::new().location(cell), true)
        .unwrap();
    (world, shop, cell)
}

fn command(world: &mut World, subject: EntityId, name: &str) {
    world
        .process_orders(&[(PlayerId::new(1), Order::Command(Command::new(subject, name)))])
        .unwrap();
}

#[test]
fn test_removing_self_from_own_hook_is_rejected_untouched() {
    let results = Results::default();
    let (mut world, shop, cell) = shop_world(&results);
    let events = world.subscribe();

    command(&mut world, shop, "sell");
    assert_eq!(
        *results.lock().unwrap(),
        vec![Err(KernelError::TraitInUse {
            entity: shop,
            trait_name: "Shop"
        })]
    );
    assert!(world.is_live(shop));
    assert_eq!(world.occupancy().entities_at(cell), &[shop]);
    assert!(world.screen_map().contains(shop));
    assert!(world.halted().is_none());
    assert!(events.drain().is_empty());

    // The deferred route works from the same hook.
    command(&mut world, shop, "scrap");
    world.tick().unwrap();
    assert!(world.entity(shop).is_none());
    assert!(!world.occupancy().is_occupied(cell));
    assert_eq!(events.drain(), vec![WorldEvent::EntityRemoved { entity: shop, tick: 1 }]);
}

/// Tears the world down from inside its tick.
struct Demolisher {
    results: Results,
}

impl Trait for Demolisher {
    fn name(&self) -> &'static str {
        "Demolisher"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Tick)
    }

    fn tick(&mut self, _entity: EntityId, world: &mut World) -> KernelResult<()> {
        let result = world.dispose();
        self.results.lock().unwrap().push(result);
        Ok(())
    }
}

#[test]
fn test_dispose_from_a_hook_leaves_world_running() {
    let results = Results::default();
    let shared = Arc::clone(&results);
    let rules = basic_rules()
        .with(EntityInfo::new("demolisher").with_trait(TraitInfo::new("Demolisher", move |_: &EntityInit| {
            Box::new(Demolisher {
                results: Arc::clone(&shared),
            })
        })))
        .unwrap();
    let mut world = world_with(1, rules);
    world.create_entity("demolisher", EntityInit::new(), true).unwrap();
    spawn_marker(&mut world, 3);
    let live = world.live_entities().count();

    world.tick().unwrap();
    assert_eq!(
        *results.lock().unwrap(),
        vec![Err(KernelError::StructuralMutationDuringDispatch { operation: "dispose" })]
    );
    assert!(!world.is_disposing());
    assert!(!world.is_disposed());
    assert_eq!(world.live_entities().count(), live);

    // Same from an order hook outside dispatch.
    let shop_results = Results::default();
    let (mut market, shop, _) = shop_world(&shop_results);
    command(&mut market, shop, "close");
    assert!(matches!(
        shop_results.lock().unwrap().as_slice(),
        [Err(KernelError::TraitInUse { trait_name: "Shop", .. })]
    ));
    assert!(!market.is_disposing());
    assert!(market.is_live(shop));

    world.dispose().unwrap();
    assert!(world.is_disposed());
    assert_eq!(world.live_entities().count(), 0);
}

#[test]
fn test_frame_end_actions_dropped_after_dispose() {
    let mut world = world_with(1, basic_rules());
    spawn_marker(&mut world, 1);
    world.dispose().unwrap();

    world.run_at_frame_end(|_| Ok(()));
    world.dispose_entity(EntityId::new(1));
    assert_eq!(world.pending_frame_end_actions(), 0);
}
