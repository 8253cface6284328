//! Entity lifecycle, spatial hooks, activities, effects and the
//! frame-end queue.

use std::sync::Arc;

use tracing::{debug, info};

use super::World;
use crate::effect::{Effect, EffectId};
use crate::entity::{Activity, Entity, EntityId};
use crate::error::{KernelError, KernelResult};
use crate::events::WorldEvent;
use crate::player::PlayerId;
use crate::rules::EntityInit;
use crate::spatial::{world_to_screen, Footprint};
use crate::traits::Capability;

impl World {
    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity of `type_name` and optionally adds it to the world.
    ///
    /// Allocates the next id, builds the type's traits in construction
    /// order, runs their `created` hooks, then calls [`add`](Self::add) if
    /// `add_to_world` is set.
    ///
    /// # Errors
    ///
    /// - `StructuralMutationDuringDispatch` while the scheduler iterates
    /// - `WorldDisposed` once disposal has begun
    /// - `UnknownEntityType` if the ruleset has no such type
    /// - `UnknownPlayer` if the owner is not in the session
    /// - `EntityIdsExhausted` once every id was used (halts the world)
    /// - any error from a `created` or `added_to_world` hook
    pub fn create_entity(&mut self, type_name: &str, init: EntityInit, add_to_world: bool) -> KernelResult<EntityId> {
        self.ensure_not_dispatching("create_entity")?;
        if self.disposing {
            return Err(KernelError::WorldDisposed);
        }
        if let Some(owner) = init.owner {
            if self.players_set && !self.players.contains_key(&owner) {
                return Err(KernelError::UnknownPlayer(owner));
            }
        }

        let rules = Arc::clone(&self.rules);
        let info = rules
            .get(type_name)
            .ok_or_else(|| KernelError::UnknownEntityType(type_name.to_string()))?;

        let Some(id) = self.registry.allocate_id() else {
            return Err(self.contract_violation(KernelError::EntityIdsExhausted));
        };
        self.registry.insert(Entity::new(
            id,
            info.name().to_string(),
            init.owner,
            init.resolved_center(),
            info.size(),
            info.priority(),
        ));

        for trait_info in info.traits() {
            let instance = trait_info.create(&init);
            let (handle, capabilities) = self.traits.register(id, instance);
            if let Some(entity) = self.registry.get_mut(id) {
                entity.push_trait(handle, capabilities);
            }
        }

        if let Err(err) = self.notify(id, Capability::Created, |t, e, w| t.created(e, w)) {
            self.traits.unregister_entity(id);
            self.registry.dispose(id);
            return Err(err);
        }
        debug!(entity = %id, type_name, "entity created");

        if add_to_world {
            self.add(id)?;
        }
        Ok(id)
    }

    /// Puts an entity into the world.
    ///
    /// Marks it live, indexes it spatially, runs `added_to_world` hooks and
    /// publishes [`WorldEvent::EntityAdded`].
    ///
    /// # Errors
    ///
    /// `UnknownEntity`, `EntityAlreadyInWorld` (halts the world),
    /// `StructuralMutationDuringDispatch`, `WorldDisposed`, `TraitInUse`
    /// when called from one of the entity's own `added_to_world` traits,
    /// or a hook error.
    pub fn add(&mut self, id: EntityId) -> KernelResult<()> {
        self.ensure_not_dispatching("add")?;
        if self.disposing {
            return Err(KernelError::WorldDisposed);
        }
        if !self.registry.contains(id) {
            return Err(KernelError::UnknownEntity(id));
        }
        self.ensure_hooks_idle(id, Capability::AddedToWorld)?;
        if !self.registry.mark_live(id) {
            return Err(self.contract_violation(KernelError::EntityAlreadyInWorld(id)));
        }

        self.index_entity(id);
        self.notify(id, Capability::AddedToWorld, |t, e, w| t.added_to_world(e, w))?;
        self.publish(&WorldEvent::EntityAdded {
            entity: id,
            tick: self.world_tick,
        });
        debug!(entity = %id, tick = self.world_tick, "entity added");
        Ok(())
    }

    /// Takes an entity out of the world without disposing it.
    ///
    /// # Errors
    ///
    /// `EntityNotInWorld` if it is not live (halts the world),
    /// `StructuralMutationDuringDispatch`, `TraitInUse` when called from
    /// one of the entity's own `removed_from_world` traits (use
    /// [`dispose_entity`](Self::dispose_entity) or
    /// [`run_at_frame_end`](Self::run_at_frame_end) there), or a hook error.
    pub fn remove(&mut self, id: EntityId) -> KernelResult<()> {
        self.ensure_not_dispatching("remove")?;
        self.ensure_hooks_idle(id, Capability::RemovedFromWorld)?;
        if !self.registry.mark_removed(id) {
            return Err(self.contract_violation(KernelError::EntityNotInWorld(id)));
        }

        self.occupancy.remove(id);
        self.screen.remove(id);
        self.notify(id, Capability::RemovedFromWorld, |t, e, w| t.removed_from_world(e, w))?;
        self.publish(&WorldEvent::EntityRemoved {
            entity: id,
            tick: self.world_tick,
        });
        debug!(entity = %id, tick = self.world_tick, "entity removed");
        Ok(())
    }

    /// Schedules `id` for disposal at the end of the frame.
    ///
    /// At frame end the entity is removed from the world if live, its
    /// `disposing` hooks run, its traits are unregistered and it is
    /// dropped. Its id is never handed out again. Disposing an entity twice
    /// is harmless.
    pub fn dispose_entity(&mut self, id: EntityId) {
        self.run_at_frame_end(move |w| w.dispose_now(id));
    }

    fn dispose_now(&mut self, id: EntityId) -> KernelResult<()> {
        if !self.registry.contains(id) {
            return Ok(());
        }
        if self.registry.is_live(id) {
            self.remove(id)?;
        }
        if let Some(entity) = self.registry.get_mut(id) {
            entity.activities.cancel();
        }
        self.notify(id, Capability::Disposing, |t, e, w| t.disposing(e, w))?;

        self.traits.unregister_entity(id);
        self.registry.dispose(id);
        self.screen.purge_frozen(id);
        for player in self.players.values_mut() {
            player.shroud_mut().remove_visibility(id);
        }
        debug!(entity = %id, "entity disposed");
        Ok(())
    }

    /// Changes the owner of `id` at the end of the frame. A live entity is
    /// removed and re-added around the change so owner-dependent traits
    /// see it leave and come back.
    pub fn change_owner(&mut self, id: EntityId, owner: Option<PlayerId>) {
        self.run_at_frame_end(move |w| w.change_owner_now(id, owner));
    }

    fn change_owner_now(&mut self, id: EntityId, owner: Option<PlayerId>) -> KernelResult<()> {
        if let Some(owner) = owner {
            if self.players_set && !self.players.contains_key(&owner) {
                return Err(KernelError::UnknownPlayer(owner));
            }
        }
        if !self.registry.contains(id) {
            return Ok(());
        }
        let live = self.registry.is_live(id);
        if live {
            self.remove(id)?;
        }
        if let Some(entity) = self.registry.get_mut(id) {
            entity.set_owner(owner);
        }
        if live {
            self.add(id)?;
        }
        Ok(())
    }

    /// Disposes the whole world: pending frame-end actions are discarded,
    /// entities are disposed newest first with the world entity last, and
    /// the actions that disposal itself queues are drained.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDuringDispatch` from inside a tick and
    /// `TraitInUse` from inside any other hook; the world is untouched in
    /// both cases. Otherwise the first error raised by a hook or frame-end
    /// action. Disposal stops there; the world still counts as disposing.
    pub fn dispose(&mut self) -> KernelResult<()> {
        if self.disposing {
            return Ok(());
        }
        self.ensure_not_dispatching("dispose")?;
        if let Some((entity, trait_name)) = self.traits.any_running() {
            return Err(KernelError::TraitInUse { entity, trait_name });
        }
        self.disposing = true;
        self.frame_end.clear();

        let world_entity = self.world_entity;
        let order: Vec<EntityId> = self
            .registry
            .all_ids()
            .rev()
            .filter(|id| *id != world_entity)
            .chain(std::iter::once(world_entity))
            .collect();
        for id in order {
            self.dispose_now(id)?;
        }
        self.drain_frame_end()?;

        self.effects.clear();
        self.disposed = true;
        info!(ticks = self.world_tick, "world disposed");
        Ok(())
    }

    // =========================================================================
    // Frame-end queue
    // =========================================================================

    /// Queues `action` to run after the current tick's dispatch.
    ///
    /// Actions run in FIFO order; an action may queue further actions,
    /// which run in the same drain. Once the world is disposed actions are
    /// dropped.
    pub fn run_at_frame_end<F>(&mut self, action: F)
    where
        F: FnOnce(&mut World) -> KernelResult<()> + 'static,
    {
        if self.disposed {
            debug!("frame-end action dropped, world disposed");
            return;
        }
        self.frame_end.push_back(Box::new(action));
    }

    /// Runs queued actions until the queue is empty.
    pub(super) fn drain_frame_end(&mut self) -> KernelResult<usize> {
        let mut ran = 0;
        while let Some(action) = self.frame_end.pop_front() {
            action(self)?;
            ran += 1;
        }
        Ok(ran)
    }

    // =========================================================================
    // Spatial hooks
    // =========================================================================

    /// Footprint reported by the entity's first `OccupySpace` trait.
    fn occupancy_footprint(&self, id: EntityId) -> Option<Footprint> {
        let pair = self.traits.traits_of(id, Capability::OccupySpace).first()?;
        self.traits.get(pair.handle)?.footprint(id, self)
    }

    /// Indexes a newly live entity in both spatial indexes.
    fn index_entity(&mut self, id: EntityId) {
        let footprint = self.occupancy_footprint(id);
        if let Some(footprint) = footprint {
            self.add_to_maps(id, footprint);
        } else {
            self.index_screen(id);
        }
    }

    fn index_screen(&mut self, id: EntityId) {
        let tile_size = self.config.screen.tile_size;
        if let Some(entity) = self.registry.get(id) {
            let center = world_to_screen(entity.center_position(), tile_size);
            self.screen
                .add(id, center, entity.render_size(), entity.selection_priority());
        }
    }

    /// Indexes `id` at `footprint`. Ignored unless the entity is live.
    pub fn add_to_maps(&mut self, id: EntityId, footprint: Footprint) {
        if !self.registry.is_live(id) {
            return;
        }
        if let Some(entity) = self.registry.get_mut(id) {
            entity.set_center_position(footprint.center);
        }
        self.occupancy.add(id, footprint);
        self.index_screen(id);
    }

    /// Moves `id` to `footprint` in both indexes. Does nothing for an entity
    /// that is not live or not indexed.
    pub fn update_maps(&mut self, id: EntityId, footprint: Footprint) {
        if !self.registry.is_live(id) {
            return;
        }
        let center = footprint.center;
        if let Some(entity) = self.registry.get_mut(id) {
            entity.set_center_position(center);
        }
        self.occupancy.update(id, footprint);
        self.screen
            .update(id, world_to_screen(center, self.config.screen.tile_size));
    }

    /// Drops `id` from both indexes. Does nothing if it is not indexed.
    pub fn remove_from_maps(&mut self, id: EntityId) {
        self.occupancy.remove(id);
        self.screen.remove(id);
    }

    // =========================================================================
    // Activities
    // =========================================================================

    /// Appends an activity to `id`'s queue. Returns `false` if the entity
    /// does not exist.
    pub fn queue_activity(&mut self, id: EntityId, activity: Box<dyn Activity>) -> bool {
        let Some(entity) = self.registry.get_mut(id) else {
            return false;
        };
        entity.activities.queue(activity);
        true
    }

    /// Cancels the current and all queued activities of `id`.
    pub fn cancel_activities(&mut self, id: EntityId) {
        if let Some(entity) = self.registry.get_mut(id) {
            entity.activities.cancel();
        }
    }

    // =========================================================================
    // Effects
    // =========================================================================

    /// Adds a transient effect. Added after the current effect pass if
    /// effects are ticking.
    pub fn add_effect(&mut self, effect: Box<dyn Effect>) -> EffectId {
        self.effects.add(effect)
    }

    /// Removes an effect. Removed after the current effect pass if effects
    /// are ticking.
    pub fn remove_effect(&mut self, id: EffectId) {
        self.effects.remove(id);
    }
}
