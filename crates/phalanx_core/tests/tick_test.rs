//! # Tick Scheduler Tests
//!
//! Dispatch order, idle notification, activities, effects, pause and
//! order intake.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{basic_rules, entries, log, recorder_info, world_with, Counter};
use phalanx_core::{
    Activity, ActivityStep, Capabilities, Capability, Command, Effect, EntityId, EntityInfo, EntityInit,
    KernelConfig, KernelResult, Order, Player, PlayerId, Ruleset, Session, World, WorldKind,
};

fn tick_caps() -> Capabilities {
    Capabilities::of(Capability::Tick)
}

#[test]
fn test_traits_yielded_in_construction_order() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(
            EntityInfo::new("abc")
                .with_trait(recorder_info("A", tick_caps(), &hooks))
                .with_trait(recorder_info("B", tick_caps(), &hooks))
                .with_trait(recorder_info("C", tick_caps(), &hooks)),
        )
        .unwrap();
    let mut world = world_with(1, rules);
    let first = world.create_entity("abc", EntityInit::new(), true).unwrap();
    let second = world.create_entity("abc", EntityInit::new(), true).unwrap();

    for _ in 0..3 {
        let names: Vec<_> = world
            .traits_of(first, Capability::Tick)
            .iter()
            .filter_map(|p| world.traits().name(p.handle))
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    world.tick().unwrap();
    let (f, s) = (first.value(), second.value());
    assert_eq!(
        entries(&hooks),
        vec![
            format!("A:tick:{f}"),
            format!("B:tick:{f}"),
            format!("C:tick:{f}"),
            format!("A:tick:{s}"),
            format!("B:tick:{s}"),
            format!("C:tick:{s}"),
        ]
    );
}

#[test]
fn test_entities_having_is_ascending_and_deduplicated() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(
            EntityInfo::new("double")
                .with_trait(recorder_info("A", tick_caps(), &hooks))
                .with_trait(recorder_info("B", tick_caps(), &hooks)),
        )
        .unwrap();
    let mut world = world_with(1, rules);
    let a = world.create_entity("double", EntityInit::new(), true).unwrap();
    let b = world.create_entity("double", EntityInit::new(), true).unwrap();
    assert_eq!(world.entities_having(Capability::Tick).collect::<Vec<_>>(), vec![a, b]);
}

/// Runs for `remaining` ticks, counting each.
struct Wait {
    remaining: u32,
    ticks: Rc<Cell<u32>>,
}

impl Activity for Wait {
    fn name(&self) -> &'static str {
        "Wait"
    }

    fn tick(&mut self, _entity: EntityId, _world: &mut World) -> KernelResult<ActivityStep> {
        self.ticks.set(self.ticks.get() + 1);
        self.remaining = self.remaining.saturating_sub(1);
        Ok(if self.remaining == 0 {
            ActivityStep::Done
        } else {
            ActivityStep::Continue
        })
    }
}

#[test]
fn test_idle_notified_only_without_activity() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(EntityInfo::new("unit").with_trait(recorder_info("I", Capabilities::of(Capability::Idle), &hooks)))
        .unwrap();
    let mut world = world_with(1, rules);
    let unit = world.create_entity("unit", EntityInit::new(), true).unwrap();
    let ticks = Rc::new(Cell::new(0));

    assert!(world.queue_activity(
        unit,
        Box::new(Wait {
            remaining: 2,
            ticks: Rc::clone(&ticks),
        })
    ));
    assert_eq!(world.entity(unit).and_then(|e| e.current_activity()), Some("Wait"));

    world.tick().unwrap();
    world.tick().unwrap();
    assert!(entries(&hooks).is_empty());
    assert_eq!(ticks.get(), 2);
    assert!(world.entity(unit).is_some_and(|e| e.is_idle()));

    world.tick().unwrap();
    assert_eq!(entries(&hooks), vec![format!("I:idle:{}", unit.value())]);
    assert!(!world.queue_activity(EntityId::new(999), Box::new(Wait { remaining: 1, ticks })));
}

#[test]
fn test_cancel_activities() {
    let mut world = world_with(1, basic_rules());
    let unit = world.create_entity("marker", EntityInit::new(), true).unwrap();
    let ticks = Rc::new(Cell::new(0));
    world.queue_activity(
        unit,
        Box::new(Wait {
            remaining: 10,
            ticks: Rc::clone(&ticks),
        }),
    );
    world.tick().unwrap();
    world.cancel_activities(unit);
    world.tick().unwrap();
    assert_eq!(ticks.get(), 1);
}

/// Effect that counts its ticks.
struct Flash {
    ticks: Rc<Cell<u32>>,
    hashed: bool,
}

impl Effect for Flash {
    fn name(&self) -> &'static str {
        "Flash"
    }

    fn tick(&mut self, _world: &mut World) -> KernelResult<()> {
        self.ticks.set(self.ticks.get() + 1);
        Ok(())
    }

    fn sync_hash(&self) -> Option<i32> {
        self.hashed.then_some(1000)
    }
}

#[test]
fn test_effects_tick_and_opt_into_hash() {
    let mut world = world_with(1, Ruleset::new());
    let base = world.sync_hash();
    let ticks = Rc::new(Cell::new(0));
    let visual = world.add_effect(Box::new(Flash {
        ticks: Rc::clone(&ticks),
        hashed: false,
    }));
    assert_eq!(world.sync_hash(), base);

    world.add_effect(Box::new(Flash {
        ticks: Rc::clone(&ticks),
        hashed: true,
    }));
    // The world entity took n = 0, so the effect is the second term.
    assert_eq!(world.sync_hash(), base.wrapping_add(1000));

    world.tick().unwrap();
    assert_eq!(ticks.get(), 2);
    world.remove_effect(visual);
    assert_eq!(world.effect_count(), 1);
    world.tick().unwrap();
    assert_eq!(ticks.get(), 3);
}

#[test]
fn test_pause_freezes_gameplay_but_drains_frame_end() {
    let mut world = world_with(1, basic_rules());
    let counter = world.create_entity("counter", EntityInit::new(), true).unwrap();
    let ticks = Rc::new(Cell::new(0));
    world.queue_activity(
        counter,
        Box::new(Wait {
            remaining: 100,
            ticks: Rc::clone(&ticks),
        }),
    );
    let effect_ticks = Rc::new(Cell::new(0));
    world.add_effect(Box::new(Flash {
        ticks: Rc::clone(&effect_ticks),
        hashed: false,
    }));

    world.tick().unwrap();
    world
        .process_orders(&[(PlayerId::new(1), Order::PauseGame { paused: true })])
        .unwrap();
    assert!(world.is_paused());

    let hash = world.sync_hash();
    let world_tick = world.world_tick();
    let drained = Rc::new(Cell::new(0));
    for frame in 0..5 {
        let d = Rc::clone(&drained);
        world.run_at_frame_end(move |_| {
            d.set(d.get() + 1);
            Ok(())
        });
        world.tick().unwrap();
        assert_eq!(drained.get(), frame + 1);
        assert!(!world.last_frame_timings().simulated);
    }

    assert_eq!(world.sync_hash(), hash);
    assert_eq!(world.world_tick(), world_tick);
    assert_eq!(world.tick_counter(), 6);
    assert_eq!(ticks.get(), 1);
    assert_eq!(effect_ticks.get(), 1);
    assert_eq!(world.trait_of::<Counter>(counter).map(|c| c.ticks), Some(1));

    world
        .process_orders(&[(PlayerId::new(1), Order::PauseGame { paused: false })])
        .unwrap();
    world.tick().unwrap();
    assert_eq!(world.trait_of::<Counter>(counter).map(|c| c.ticks), Some(2));
}

#[test]
fn test_pause_lock_and_local_pause() {
    let mut world = world_with(1, basic_rules());
    world.set_pause_state_locked(true);
    world
        .process_orders(&[(PlayerId::new(1), Order::PauseGame { paused: true })])
        .unwrap();
    assert!(!world.is_paused());

    world.set_pause_state_locked(false);
    world.set_local_pause_state(true);
    assert!(world.is_locally_paused());
    world.tick().unwrap();
    assert_eq!(world.world_tick(), 1);

    world.set_pause_state(true);
    assert!(world.predicted_paused());
    assert!(!world.is_paused());
    let orders = world.take_issued_orders();
    assert_eq!(orders, vec![Order::PauseGame { paused: true }]);
}

#[test]
fn test_pause_request_ignored_while_locked() {
    let mut world = world_with(1, basic_rules());
    world.set_pause_state_locked(true);
    world.set_pause_state(true);
    assert!(!world.predicted_paused());
    assert!(world.take_issued_orders().is_empty());

    // A stray order from another peer is dropped the same way.
    world
        .process_orders(&[(PlayerId::new(2), Order::PauseGame { paused: true })])
        .unwrap();
    world.tick().unwrap();
    assert!(!world.is_paused());
    assert!(!world.predicted_paused());
    assert_eq!(world.world_tick(), 1);

    world.set_pause_state_locked(false);
    world.set_pause_state(true);
    let orders = world.take_issued_orders();
    world.process_orders(&orders.into_iter().map(|o| (PlayerId::new(1), o)).collect::<Vec<_>>()).unwrap();
    assert!(world.is_paused());
    assert_eq!(world.is_paused(), world.predicted_paused());
}

#[test]
fn test_shellmap_ticks_only_when_shown() {
    let config = KernelConfig {
        world_kind: WorldKind::Shellmap,
        ..KernelConfig::with_seed(1)
    };
    let mut hidden = World::new(Session::new(config.clone(), basic_rules())).unwrap();
    assert!(!hidden.should_tick());
    hidden.tick().unwrap();
    assert_eq!((hidden.tick_counter(), hidden.world_tick()), (1, 0));

    let shown = KernelConfig {
        show_shellmap: true,
        ..config
    };
    let mut visible = World::new(Session::new(shown, basic_rules())).unwrap();
    visible.tick().unwrap();
    assert_eq!(visible.world_tick(), 1);
}

#[test]
fn test_commands_reach_resolve_order_traits() {
    let hooks = log();
    let rules = Ruleset::new()
        .with(EntityInfo::new("unit").with_trait(recorder_info(
            "R",
            Capabilities::of(Capability::ResolveOrder),
            &hooks,
        )))
        .unwrap();
    let mut world = world_with(1, rules);
    let p1 = PlayerId::new(1);
    world.set_players(vec![Player::new(p1, "one")], Some(p1)).unwrap();
    let unit = world.create_entity("unit", EntityInit::new().owner(p1), true).unwrap();

    world
        .process_orders(&[
            (p1, Order::Command(Command::new(unit, "stop"))),
            // Unknown issuer: skipped.
            (PlayerId::new(9), Order::Command(Command::new(unit, "attack"))),
            // Absent subject: ignored.
            (p1, Order::Command(Command::new(EntityId::new(77), "stop"))),
            (p1, Order::Command(Command::new(unit, "move").queued())),
        ])
        .unwrap();

    let n = unit.value();
    assert_eq!(entries(&hooks), vec![format!("R:order(stop):{n}"), format!("R:order(move):{n}")]);
    assert!(world.halted().is_none());
}

#[test]
fn test_frame_timings_recorded() {
    let mut world = world_with(1, basic_rules());
    world.create_entity("counter", EntityInit::new(), true).unwrap();
    world.tick().unwrap();
    let timings = world.last_frame_timings();
    assert_eq!(timings.tick, 1);
    assert!(timings.simulated);
}
