//! Test traits and session builders shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use phalanx_core::{
    Capabilities, Capability, Command, EntityId, EntityInfo, EntityInit, Footprint, KernelConfig, KernelError,
    KernelResult, Ruleset, Session, SyncHashes, Target, Trait, TraitInfo, World,
};
use phalanx_shared::{Size, WPos, WVec};

/// Shared hook log: `"<trait>:<hook>:<entity>"` entries in call order.
pub type Log = Arc<Mutex<Vec<String>>>;

/// Creates an empty log.
pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of a log.
pub fn entries(log: &Log) -> Vec<String> {
    log.lock().map(|l| l.clone()).unwrap_or_default()
}

fn record(log: &Log, line: String) {
    if let Ok(mut l) = log.lock() {
        l.push(line);
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// Contributes a fixed value to the sync hash.
pub struct Constant {
    /// Contributed value.
    pub value: i32,
}

impl Trait for Constant {
    fn name(&self) -> &'static str {
        "Constant"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Sync)
    }

    fn sync_hashes(&self, hashes: &mut SyncHashes) {
        hashes.add("value", self.value);
    }
}

/// Counts its ticks and hashes the count.
#[derive(Default)]
pub struct Counter {
    /// Ticks seen.
    pub ticks: i32,
}

impl Trait for Counter {
    fn name(&self) -> &'static str {
        "Counter"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Tick).with(Capability::Sync)
    }

    fn tick(&mut self, _entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.ticks += 1;
        Ok(())
    }

    fn sync_hashes(&self, hashes: &mut SyncHashes) {
        hashes.add("ticks", self.ticks);
    }
}

/// Logs every hook it receives under its name.
pub struct Recorder {
    /// Name reported to the dictionary.
    pub name: &'static str,
    /// Capabilities reported to the dictionary.
    pub capabilities: Capabilities,
    /// Destination.
    pub log: Log,
}

impl Recorder {
    fn note(&self, hook: &str, entity: EntityId) {
        record(&self.log, format!("{}:{hook}:{}", self.name, entity.value()));
    }
}

impl Trait for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn created(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.note("created", entity);
        Ok(())
    }

    fn added_to_world(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.note("added", entity);
        Ok(())
    }

    fn removed_from_world(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.note("removed", entity);
        Ok(())
    }

    fn tick_idle(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.note("idle", entity);
        Ok(())
    }

    fn tick(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.note("tick", entity);
        Ok(())
    }

    fn resolve_order(
        &mut self,
        entity: EntityId,
        _issuer: phalanx_core::PlayerId,
        command: &Command,
        _world: &mut World,
    ) -> KernelResult<()> {
        self.note(&format!("order({})", command.name), entity);
        Ok(())
    }

    fn disposing(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.note("disposing", entity);
        Ok(())
    }

    fn game_over(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.note("game_over", entity);
        Ok(())
    }

    fn world_loaded(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        self.note("loaded", entity);
        Ok(())
    }
}

/// Fails its first tick.
pub struct Faulty;

impl Trait for Faulty {
    fn name(&self) -> &'static str {
        "Faulty"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Tick)
    }

    fn tick(&mut self, entity: EntityId, _world: &mut World) -> KernelResult<()> {
        Err(KernelError::TraitFailed {
            entity,
            trait_name: "Faulty",
            reason: "boom".into(),
        })
    }
}

/// Occupies the cell under the entity and drifts along the x axis by a
/// random amount each tick, moving on `"move"` commands.
pub struct Walker {
    /// Current position.
    pub position: WPos,
}

impl Trait for Walker {
    fn name(&self) -> &'static str {
        "Walker"
    }

    fn capabilities(&self) -> Capabilities {
        [Capability::Tick, Capability::Sync, Capability::OccupySpace, Capability::ResolveOrder]
            .into_iter()
            .collect()
    }

    fn tick(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        let step = world.shared_random_mut().next_range(0, 64);
        self.position = self.position + WVec::new(step, 0, 0);
        world.update_maps(entity, Footprint::at(self.position));
        Ok(())
    }

    fn sync_hashes(&self, hashes: &mut SyncHashes) {
        hashes.add("position", self.position);
    }

    fn footprint(&self, _entity: EntityId, _world: &World) -> Option<Footprint> {
        Some(Footprint::at(self.position))
    }

    fn resolve_order(
        &mut self,
        entity: EntityId,
        _issuer: phalanx_core::PlayerId,
        command: &Command,
        world: &mut World,
    ) -> KernelResult<()> {
        if command.name == "move" {
            if let Target::Position(to) = command.target {
                self.position = to;
                world.update_maps(entity, Footprint::at(to));
            }
        }
        Ok(())
    }
}

// =============================================================================
// RULES AND SESSIONS
// =============================================================================

/// Trait info building a [`Constant`] from the `"value"` init entry.
pub fn constant_info() -> TraitInfo {
    TraitInfo::new("Constant", |init: &EntityInit| {
        let value = init.get_int("value").and_then(|v| i32::try_from(v).ok()).unwrap_or(0);
        Box::new(Constant { value })
    })
}

/// Trait info building a [`Recorder`].
pub fn recorder_info(name: &'static str, capabilities: Capabilities, log: &Log) -> TraitInfo {
    let log = Arc::clone(log);
    TraitInfo::new(name, move |_: &EntityInit| {
        Box::new(Recorder {
            name,
            capabilities,
            log: Arc::clone(&log),
        })
    })
}

/// Ruleset with `marker` (Constant), `counter` (Counter) and `walker`
/// (Walker) types.
pub fn basic_rules() -> Ruleset {
    Ruleset::new()
        .with(EntityInfo::new("marker").with_trait(constant_info()))
        .and_then(|r| r.with(EntityInfo::new("counter").with_trait(TraitInfo::new("Counter", |_| Box::new(Counter::default())))))
        .and_then(|r| {
            r.with(
                EntityInfo::new("walker")
                    .render_size(Size::new(24, 24))
                    .with_trait(TraitInfo::new("Walker", |init: &EntityInit| {
                        Box::new(Walker {
                            position: init.resolved_center(),
                        })
                    })),
            )
        })
        .expect("basic rules are valid")
}

/// World over `rules` with seed `seed`.
pub fn world_with(seed: u64, rules: Ruleset) -> World {
    World::new(Session::new(KernelConfig::with_seed(seed), rules)).expect("world builds")
}

/// Creates a live `marker` entity contributing `value`.
pub fn spawn_marker(world: &mut World, value: i64) -> EntityId {
    world
        .create_entity("marker", EntityInit::new().value("value", phalanx_core::InitValue::Int(value)), true)
        .expect("marker spawns")
}
