//! # Demo Ruleset
//!
//! Just enough gameplay to exercise every kernel path from a scripted
//! session:
//!
//! | Trait             | Capabilities                              |
//! |-------------------|-------------------------------------------|
//! | `SkirmishPlayers` | CreatePlayers                             |
//! | `MissionTimer`    | Tick                                      |
//! | `Mobile`          | Tick, Sync, OccupySpace, ResolveOrder     |
//! | `Health`          | Sync, ResolveOrder                        |
//! | `Vision`          | AddedToWorld, RemovedFromWorld, Tick      |
//!
//! Commands understood: `move` (cell or position target), `stop`,
//! `beacon` (cell target), `damage`, `repair`, `scrap`.

use std::collections::BTreeMap;

use phalanx_core::sync::hash_ints;
use phalanx_core::{
    Capabilities, Capability, Command, Effect, EffectId, Entity, EntityId, EntityInfo, EntityInit, Footprint, KernelResult,
    Outcome, Player, PlayerId, Ruleset, Stance, SyncHashes, Target, Trait, TraitInfo, World,
};
use phalanx_shared::{CPos, Size, WPos, WORLD_ENTITY_TYPE};

/// Infantry type name.
pub const RIFLEMAN: &str = "rifleman";
/// Fast, fragile recon type name.
pub const SCOUT: &str = "scout";

/// Ticks a beacon stays up.
pub const BEACON_TICKS: u64 = 25;

/// Damage taken per `damage` command.
const DAMAGE_PER_HIT: i32 = 25;

// =============================================================================
// WORLD TRAITS
// =============================================================================

/// Creates `count` mutually hostile players.
pub struct SkirmishPlayers {
    count: u32,
    local: Option<PlayerId>,
}

impl Trait for SkirmishPlayers {
    fn name(&self) -> &'static str {
        "SkirmishPlayers"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::CreatePlayers)
    }

    fn create_players(&mut self, _entity: EntityId, world: &mut World) -> KernelResult<()> {
        let ids: Vec<PlayerId> = (1..=self.count).map(PlayerId::new).collect();
        let players = ids
            .iter()
            .map(|id| {
                let mut player = Player::new(*id, format!("Player {}", id.value()));
                for other in ids.iter().filter(|o| *o != id) {
                    player.set_stance(*other, Stance::Enemy);
                }
                player
            })
            .collect();
        world.set_players(players, self.local)
    }
}

/// Ends the mission after a fixed number of ticks. The player with the
/// most units left wins; ties share the win.
pub struct MissionTimer {
    limit: u64,
    ended: bool,
}

impl Trait for MissionTimer {
    fn name(&self) -> &'static str {
        "MissionTimer"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Tick)
    }

    fn tick(&mut self, _entity: EntityId, world: &mut World) -> KernelResult<()> {
        if self.ended || self.limit == 0 || world.world_tick() < self.limit {
            return Ok(());
        }
        self.ended = true;
        world.run_at_frame_end(decide_outcomes);
        Ok(())
    }
}

fn decide_outcomes(world: &mut World) -> KernelResult<()> {
    let mut units: BTreeMap<PlayerId, usize> = world.players().map(|p| (p.id(), 0)).collect();
    for entity in world.live_entities() {
        if let Some(count) = entity.owner().and_then(|owner| units.get_mut(&owner)) {
            *count += 1;
        }
    }
    let best = units.values().copied().max().unwrap_or(0);
    for (player, count) in units {
        let outcome = if best > 0 && count == best {
            Outcome::Won
        } else {
            Outcome::Lost
        };
        world.set_player_outcome(player, outcome)?;
    }
    world.end_game()
}

// =============================================================================
// UNIT TRAITS
// =============================================================================

/// Moves towards a destination at a fixed speed plus a small random
/// jitter drawn from the shared stream.
pub struct Mobile {
    position: WPos,
    destination: Option<WPos>,
    speed: i32,
    beacon: Option<(EffectId, u64)>,
}

impl Mobile {
    /// Unit standing at `position`, moving `speed` world units per tick.
    #[must_use]
    pub const fn new(position: WPos, speed: i32) -> Self {
        Self {
            position,
            destination: None,
            speed,
            beacon: None,
        }
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> WPos {
        self.position
    }

    /// Where the unit is heading.
    #[must_use]
    pub const fn destination(&self) -> Option<WPos> {
        self.destination
    }
}

fn approach(from: i32, to: i32, step: i32) -> i32 {
    let delta = i64::from(to) - i64::from(from);
    if delta.abs() <= i64::from(step) {
        to
    } else if delta > 0 {
        from.saturating_add(step)
    } else {
        from.saturating_sub(step)
    }
}

impl Trait for Mobile {
    fn name(&self) -> &'static str {
        "Mobile"
    }

    fn capabilities(&self) -> Capabilities {
        [
            Capability::Tick,
            Capability::Sync,
            Capability::OccupySpace,
            Capability::ResolveOrder,
        ]
        .into_iter()
        .collect()
    }

    fn tick(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        if let Some((beacon, expires)) = self.beacon {
            if world.world_tick() >= expires {
                world.remove_effect(beacon);
                self.beacon = None;
            }
        }

        let Some(destination) = self.destination else {
            return Ok(());
        };
        let step = self.speed + world.shared_random_mut().next_range(0, 3);
        self.position = WPos::new(
            approach(self.position.x, destination.x, step),
            approach(self.position.y, destination.y, step),
            destination.z,
        );
        if self.position == destination {
            self.destination = None;
        }
        world.update_maps(entity, Footprint::at(self.position));
        Ok(())
    }

    fn sync_hashes(&self, hashes: &mut SyncHashes) {
        hashes.add("position", self.position);
        hashes.add("destination", self.destination);
    }

    fn footprint(&self, _entity: EntityId, _world: &World) -> Option<Footprint> {
        Some(Footprint::at(self.position))
    }

    fn resolve_order(
        &mut self,
        _entity: EntityId,
        _issuer: PlayerId,
        command: &Command,
        world: &mut World,
    ) -> KernelResult<()> {
        match command.name.as_str() {
            "move" => {
                self.destination = match command.target {
                    Target::Cell(cell) => Some(cell.center()),
                    Target::Position(position) => Some(position),
                    Target::None | Target::Entity(_) => self.destination,
                };
            }
            "stop" => self.destination = None,
            "beacon" => {
                if let Target::Cell(cell) = command.target {
                    if let Some((old, _)) = self.beacon.take() {
                        world.remove_effect(old);
                    }
                    let id = world.add_effect(Box::new(Beacon { cell, age: 0 }));
                    self.beacon = Some((id, world.world_tick() + BEACON_TICKS));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Hit points. Disposes its entity when they run out.
pub struct Health {
    hp: i32,
    max_hp: i32,
    dying: bool,
}

impl Health {
    /// Full health at `max_hp`.
    #[must_use]
    pub const fn new(max_hp: i32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            dying: false,
        }
    }

    /// Remaining hit points.
    #[must_use]
    pub const fn hp(&self) -> i32 {
        self.hp
    }
}

impl Trait for Health {
    fn name(&self) -> &'static str {
        "Health"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Sync).with(Capability::ResolveOrder)
    }

    fn sync_hashes(&self, hashes: &mut SyncHashes) {
        hashes.add("hp", self.hp);
    }

    fn resolve_order(
        &mut self,
        entity: EntityId,
        _issuer: PlayerId,
        command: &Command,
        world: &mut World,
    ) -> KernelResult<()> {
        match command.name.as_str() {
            "damage" => self.hp = self.hp.saturating_sub(DAMAGE_PER_HIT).max(0),
            "repair" => self.hp = self.max_hp,
            "scrap" => self.hp = 0,
            _ => return Ok(()),
        }
        if self.hp == 0 && !self.dying {
            self.dying = true;
            world.dispose_entity(entity);
        }
        Ok(())
    }
}

/// Reveals a disc of cells around its entity to the owner.
pub struct Vision {
    range: i32,
}

impl Vision {
    fn reveal(&self, entity: EntityId, world: &mut World) {
        let Some((owner, center)) = world
            .entity(entity)
            .and_then(|e| Some((e.owner()?, e.center_position().to_cell())))
        else {
            return;
        };
        let r = self.range;
        let cells: Vec<CPos> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
            .map(|(dx, dy)| center.offset(dx, dy))
            .collect();
        if let Some(player) = world.player_mut(owner) {
            player.shroud_mut().add_visibility(entity, &cells);
        }
    }
}

impl Trait for Vision {
    fn name(&self) -> &'static str {
        "Vision"
    }

    fn capabilities(&self) -> Capabilities {
        [Capability::AddedToWorld, Capability::RemovedFromWorld, Capability::Tick]
            .into_iter()
            .collect()
    }

    fn added_to_world(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        self.reveal(entity, world);
        Ok(())
    }

    fn tick(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        self.reveal(entity, world);
        Ok(())
    }

    fn removed_from_world(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        let owner = world.entity(entity).and_then(Entity::owner);
        if let Some(player) = owner.and_then(|o| world.player_mut(o)) {
            player.shroud_mut().remove_visibility(entity);
        }
        Ok(())
    }
}

// =============================================================================
// EFFECTS
// =============================================================================

/// A map marker. Counts as simulation state, so it is hashed.
pub struct Beacon {
    cell: CPos,
    age: i32,
}

impl Effect for Beacon {
    fn name(&self) -> &'static str {
        "Beacon"
    }

    fn tick(&mut self, _world: &mut World) -> KernelResult<()> {
        self.age = self.age.wrapping_add(1);
        Ok(())
    }

    fn sync_hash(&self) -> Option<i32> {
        Some(hash_ints(&[self.cell.x, self.cell.y, self.age]))
    }
}

// =============================================================================
// RULESET
// =============================================================================

fn hp_from(init: &EntityInit, default: i32) -> i32 {
    init.get_int("hp")
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(default)
}

fn unit(name: &str, speed: i32, max_hp: i32, vision: i32, priority: i32) -> EntityInfo {
    EntityInfo::new(name)
        .render_size(Size::new(24, 24))
        .selection_priority(priority)
        .with_trait(TraitInfo::new("Vision", move |_: &EntityInit| Box::new(Vision { range: vision })).requires("Mobile"))
        .with_trait(TraitInfo::new("Mobile", move |init: &EntityInit| {
            Box::new(Mobile::new(init.resolved_center(), speed))
        }))
        .with_trait(TraitInfo::new("Health", move |init: &EntityInit| {
            Box::new(Health::new(hp_from(init, max_hp)))
        }))
}

/// Demo ruleset for a session of `players` players, seen from `local`.
/// `mission_ticks` of zero disables the mission timer.
///
/// # Errors
///
/// Never for the built-in definitions; the `Result` comes from
/// [`Ruleset::with`].
pub fn ruleset(players: u32, mission_ticks: u64, local: Option<PlayerId>) -> KernelResult<Ruleset> {
    let world = EntityInfo::new(WORLD_ENTITY_TYPE)
        .with_trait(TraitInfo::new("SkirmishPlayers", move |_: &EntityInit| {
            Box::new(SkirmishPlayers { count: players, local })
        }))
        .with_trait(TraitInfo::new("MissionTimer", move |_: &EntityInit| {
            Box::new(MissionTimer {
                limit: mission_ticks,
                ended: false,
            })
        }));

    Ruleset::new()
        .with(world)?
        .with(unit(RIFLEMAN, 64, 100, 4, 10))?
        .with(unit(SCOUT, 160, 50, 7, 5))
}
