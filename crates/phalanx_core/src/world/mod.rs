//! # World
//!
//! One simulation session: entities, their traits, the spatial indexes,
//! players, effects and the deferred frame-end queue.
//!
//! ```text
//! network layer                World                          renderer / UI
//! ─────────────                ─────                          ─────────────
//! process_orders(batch) ──▶ ┌───────────────────────────┐
//! tick()                ──▶ │ 1. tick counters          │
//!                           │ 2. idle notifications     │
//!                           │ 3. activities (by id)     │
//!                           │ 4. Tick traits            │
//!                           │ 5. effects                │
//!                           │ 6. drain frame-end queue  │
//!                           └───────────────────────────┘
//! sync_hash()           ◀── fingerprint          live_entities(), fog ──▶
//! ```
//!
//! ## Rules
//!
//! - Single-threaded. A tick runs to completion, frame-end queue included,
//!   before anything outside observes the world again.
//! - While steps 2–5 iterate, creating, adding or removing entities is
//!   rejected. Trait code defers such work with [`World::run_at_frame_end`].
//! - The first error a tick returns halts the world. Every later tick
//!   reports `SimulationHalted` with the original diagnostic.
//! - Nothing in here reads wall-clock time into simulation state. Timings
//!   are measured for diagnostics only.

mod fog;
mod lifecycle;
mod orders;
mod players;
mod tick;

pub use tick::FrameTimings;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{error, info};

use crate::config::{KernelConfig, WorldKind};
use crate::effect::{Effect, EffectId, EffectList};
use crate::entity::{Entity, EntityId, EntityRegistry};
use crate::error::{KernelError, KernelResult};
use crate::events::{EventBus, EventReceiver, WorldEvent};
use crate::order::Order;
use crate::player::{Player, PlayerId};
use crate::random::SharedRandom;
use crate::rules::{EntityInit, Ruleset};
use crate::spatial::{OccupancyMap, ScreenMap};
use crate::traits::{downcast_mut, downcast_ref, Capability, Trait, TraitDictionary, TraitPair};

/// Work deferred to the end of the current frame.
pub type FrameEndAction = Box<dyn FnOnce(&mut World) -> KernelResult<()>>;

/// Everything a world is constructed from. Passed in explicitly; the
/// kernel reads no global state.
#[derive(Clone, Debug)]
pub struct Session {
    /// Session configuration.
    pub config: KernelConfig,
    /// Entity type definitions.
    pub rules: Arc<Ruleset>,
}

impl Session {
    /// Bundles a config and a ruleset.
    #[must_use]
    pub fn new(config: KernelConfig, rules: Ruleset) -> Self {
        Self {
            config,
            rules: Arc::new(rules),
        }
    }
}

/// The simulation state of one session.
pub struct World {
    config: KernelConfig,
    rules: Arc<Ruleset>,

    registry: EntityRegistry,
    traits: TraitDictionary,
    occupancy: OccupancyMap,
    screen: ScreenMap,
    effects: EffectList,
    shared_random: SharedRandom,

    players: BTreeMap<PlayerId, Player>,
    players_set: bool,
    local_player: Option<PlayerId>,
    render_player: Option<PlayerId>,
    world_entity: EntityId,

    frame_end: VecDeque<FrameEndAction>,
    issued_orders: Vec<Order>,
    events: EventBus,

    /// Accepted `tick()` calls, paused or not.
    tick_counter: u64,
    /// Unpaused ticks.
    world_tick: u64,
    paused: bool,
    predicted_paused: bool,
    pause_state_locked: bool,
    local_paused: bool,

    /// Steps 2–5 are iterating the registry and trait buckets.
    dispatching: bool,
    game_over: bool,
    loaded: bool,
    disposing: bool,
    disposed: bool,
    halted: Option<String>,

    timings: FrameTimings,
    /// Reused id buffer for step 3.
    scratch_ids: Vec<EntityId>,
}

impl World {
    /// Builds the world for `session`.
    ///
    /// Creates the world entity first (id 0), then lets its
    /// `CreatePlayers` traits set up the session's players.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a bad config, `UnknownEntityType` if the
    /// ruleset has no world entity type, or whatever a world trait
    /// reports during construction.
    pub fn new(session: Session) -> KernelResult<Self> {
        let Session { config, rules } = session;
        config.validate()?;

        let mut world = Self {
            occupancy: OccupancyMap::new(config.map.position_bin_size),
            screen: ScreenMap::new(config.screen.bin_size),
            shared_random: SharedRandom::new(config.random_seed),
            events: EventBus::new(config.event_capacity),
            config,
            rules,
            registry: EntityRegistry::new(),
            traits: TraitDictionary::new(),
            effects: EffectList::default(),
            players: BTreeMap::new(),
            players_set: false,
            local_player: None,
            render_player: None,
            world_entity: EntityId::new(0),
            frame_end: VecDeque::new(),
            issued_orders: Vec::new(),
            tick_counter: 0,
            world_tick: 0,
            paused: false,
            predicted_paused: false,
            pause_state_locked: false,
            local_paused: false,
            dispatching: false,
            game_over: false,
            loaded: false,
            disposing: false,
            disposed: false,
            halted: None,
            timings: FrameTimings::default(),
            scratch_ids: Vec::new(),
        };

        let world_type = world.config.world_kind.world_entity_type();
        world.world_entity = world.create_entity(world_type, EntityInit::new(), true)?;
        let world_entity = world.world_entity;
        world.notify(world_entity, Capability::CreatePlayers, |t, e, w| t.create_players(e, w))?;

        info!(
            seed = world.config.random_seed,
            kind = ?world.config.world_kind,
            map = %world.config.map.title,
            "world constructed"
        );
        Ok(world)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Entity type definitions.
    #[must_use]
    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    /// Kind of world.
    #[must_use]
    pub const fn kind(&self) -> WorldKind {
        self.config.world_kind
    }

    /// The entity registry.
    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// The trait dictionary.
    #[must_use]
    pub const fn traits(&self) -> &TraitDictionary {
        &self.traits
    }

    /// The cell occupancy map.
    #[must_use]
    pub const fn occupancy(&self) -> &OccupancyMap {
        &self.occupancy
    }

    /// The screen-bounds index.
    #[must_use]
    pub const fn screen_map(&self) -> &ScreenMap {
        &self.screen
    }

    /// The shared random stream.
    #[must_use]
    pub const fn shared_random(&self) -> &SharedRandom {
        &self.shared_random
    }

    /// The shared random stream, for drawing samples.
    pub fn shared_random_mut(&mut self) -> &mut SharedRandom {
        &mut self.shared_random
    }

    /// The world entity.
    #[must_use]
    pub const fn world_entity(&self) -> EntityId {
        self.world_entity
    }

    /// Looks up an entity (live or not).
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.registry.get(id)
    }

    /// Whether `id` is in the world.
    #[must_use]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.registry.is_live(id)
    }

    /// Live entities in ascending id order.
    pub fn live_entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.registry.live()
    }

    /// Effects in tick order.
    pub fn effects(&self) -> impl Iterator<Item = (EffectId, &dyn Effect)> + '_ {
        self.effects.iter()
    }

    /// Number of effects.
    #[must_use]
    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Frame number: accepted `tick()` calls, paused ones included.
    #[must_use]
    pub const fn tick_counter(&self) -> u64 {
        self.tick_counter
    }

    /// Gameplay tick: only advances while unpaused.
    #[must_use]
    pub const fn world_tick(&self) -> u64 {
        self.world_tick
    }

    /// Synchronized pause state.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause state this client expects once its pending pause order lands.
    #[must_use]
    pub const fn predicted_paused(&self) -> bool {
        self.predicted_paused
    }

    /// Local (presentation-only) pause state.
    #[must_use]
    pub const fn is_locally_paused(&self) -> bool {
        self.local_paused
    }

    /// Whether pause orders are currently ignored.
    #[must_use]
    pub const fn is_pause_state_locked(&self) -> bool {
        self.pause_state_locked
    }

    /// Whether `end_game` has run.
    #[must_use]
    pub const fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Whether `load_complete` has run.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether disposal has begun.
    #[must_use]
    pub const fn is_disposing(&self) -> bool {
        self.disposing
    }

    /// Whether disposal has finished.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Diagnostic of the error that halted the world, if any.
    #[must_use]
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Timings of the last completed tick.
    #[must_use]
    pub const fn last_frame_timings(&self) -> &FrameTimings {
        &self.timings
    }

    /// Number of frame-end actions waiting.
    #[must_use]
    pub fn pending_frame_end_actions(&self) -> usize {
        self.frame_end.len()
    }

    /// Registers an observer for world events.
    pub fn subscribe(&mut self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Fingerprint of the current state. Pure.
    #[must_use]
    pub fn sync_hash(&self) -> i32 {
        crate::sync::compute(self)
    }

    // =========================================================================
    // Trait access
    // =========================================================================

    /// Traits of `entity` implementing `capability`, in construction order.
    #[must_use]
    pub fn traits_of(&self, entity: EntityId, capability: Capability) -> &[TraitPair] {
        self.traits.traits_of(entity, capability)
    }

    /// First trait of `entity` with concrete type `T`.
    #[must_use]
    pub fn trait_of<T: Trait>(&self, entity: EntityId) -> Option<&T> {
        self.traits.trait_of_type::<T>(entity)
    }

    /// First trait of `entity` with concrete type `T`, mutably.
    ///
    /// `None` while that trait is running.
    pub fn trait_of_mut<T: Trait>(&mut self, entity: EntityId) -> Option<&mut T> {
        let handle = self
            .traits
            .all_traits_of(entity)
            .iter()
            .copied()
            .find(|h| self.traits.get(*h).and_then(downcast_ref::<T>).is_some())?;
        self.traits.get_mut(handle).and_then(downcast_mut::<T>)
    }

    /// Entities with at least one trait implementing `capability`,
    /// ascending.
    pub fn entities_having(&self, capability: Capability) -> impl Iterator<Item = EntityId> + '_ {
        self.traits.entities_having(capability)
    }

    // =========================================================================
    // Internals shared by the submodules
    // =========================================================================

    fn ensure_not_dispatching(&self, operation: &'static str) -> KernelResult<()> {
        if self.dispatching {
            return Err(KernelError::StructuralMutationDuringDispatch { operation });
        }
        Ok(())
    }

    /// Rejects an operation whose `capability` hooks on `entity` would
    /// reach a trait that is running right now. Checked before anything is
    /// mutated.
    fn ensure_hooks_idle(&self, entity: EntityId, capability: Capability) -> KernelResult<()> {
        match self.traits.running_trait(entity, capability) {
            Some(trait_name) => Err(KernelError::TraitInUse { entity, trait_name }),
            None => Ok(()),
        }
    }

    fn ensure_running(&self) -> KernelResult<()> {
        if let Some(reason) = &self.halted {
            return Err(KernelError::SimulationHalted(reason.clone()));
        }
        if self.disposing {
            return Err(KernelError::WorldDisposed);
        }
        Ok(())
    }

    /// Records the first failure; the world stops ticking from then on.
    fn halt(&mut self, err: &KernelError) {
        if self.halted.is_none() {
            error!(tick = self.world_tick, error = %err, "simulation halted");
            self.halted = Some(err.to_string());
        }
    }

    /// Reports a contract violation: halts the world and hands the error
    /// back for returning.
    fn contract_violation(&mut self, err: KernelError) -> KernelError {
        self.halt(&err);
        err
    }

    fn publish(&mut self, event: &WorldEvent) {
        self.events.publish(event);
    }

    /// Runs one hook on the trait behind `pair.handle` with the instance
    /// checked out of the dictionary.
    fn call_trait<F>(&mut self, pair: TraitPair, hook: F) -> KernelResult<()>
    where
        F: FnOnce(&mut Box<dyn Trait>, EntityId, &mut World) -> KernelResult<()>,
    {
        let mut instance = self.traits.checkout(pair.handle)?;
        let result = hook(&mut instance, pair.entity, self);
        self.traits.checkin(pair.handle, instance);
        result
    }

    /// Runs `hook` on every trait of `entity` implementing `capability`,
    /// in construction order.
    fn notify<F>(&mut self, entity: EntityId, capability: Capability, mut hook: F) -> KernelResult<()>
    where
        F: FnMut(&mut Box<dyn Trait>, EntityId, &mut World) -> KernelResult<()>,
    {
        let pairs: Vec<TraitPair> = self.traits.traits_of(entity, capability).to_vec();
        for pair in pairs {
            self.call_trait(pair, &mut hook)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("kind", &self.config.world_kind)
            .field("tick_counter", &self.tick_counter)
            .field("world_tick", &self.world_tick)
            .field("paused", &self.paused)
            .field("entities", &self.registry.live_count())
            .field("effects", &self.effects.len())
            .finish_non_exhaustive()
    }
}
