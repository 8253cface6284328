//! # Entity Registry
//!
//! Owns every constructed entity and the ordered set of live ones.
//!
//! Unlike a slot allocator with generation counters, ids here are never
//! recycled: the counter only moves forward for the whole session, which
//! makes id order a total order over creation history.

use std::collections::{BTreeMap, BTreeSet};

use super::{Entity, EntityId};

/// Container for all entities of a session.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// Next id to hand out.
    next_id: u32,
    /// All constructed, not yet disposed entities.
    entities: BTreeMap<EntityId, Entity>,
    /// Ids of entities currently in the world, ascending.
    live: BTreeSet<EntityId>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next id. Never returns the same id twice.
    ///
    /// `None` once the 32-bit id space is used up.
    pub fn allocate_id(&mut self) -> Option<EntityId> {
        let id = EntityId::new(self.next_id);
        self.next_id = self.next_id.checked_add(1)?;
        Some(id)
    }

    /// The id the next `allocate_id` call will return.
    #[inline]
    #[must_use]
    pub const fn peek_next_id(&self) -> EntityId {
        EntityId::new(self.next_id)
    }

    /// Stores a freshly constructed entity (not yet live).
    pub(crate) fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id(), entity);
    }

    /// Drops an entity for good. Returns it if it existed.
    pub(crate) fn dispose(&mut self, id: EntityId) -> Option<Entity> {
        self.live.remove(&id);
        self.entities.remove(&id)
    }

    /// Marks an entity live. Returns `false` if it does not exist or is
    /// already live.
    pub(crate) fn mark_live(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if entity.is_in_world() {
            return false;
        }
        entity.set_in_world(true);
        self.live.insert(id)
    }

    /// Marks an entity not live. Returns `false` if it was not live.
    pub(crate) fn mark_removed(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.is_in_world() {
            return false;
        }
        entity.set_in_world(false);
        self.live.remove(&id)
    }

    /// Looks up an entity (live or not).
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Looks up an entity mutably.
    #[inline]
    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether the entity exists (constructed and not disposed).
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Whether the entity is in the world.
    #[inline]
    #[must_use]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.live.contains(&id)
    }

    /// Live entity ids in ascending order.
    pub fn live_ids(&self) -> impl DoubleEndedIterator<Item = EntityId> + '_ {
        self.live.iter().copied()
    }

    /// Live entities in ascending id order.
    pub fn live(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.live.iter().filter_map(|id| self.entities.get(id))
    }

    /// All constructed entity ids in ascending order.
    pub fn all_ids(&self) -> impl DoubleEndedIterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of constructed, not disposed entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when no entity exists.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phalanx_shared::{Size, WPos};

    fn entity(registry: &mut EntityRegistry) -> EntityId {
        let id = registry.allocate_id().unwrap();
        registry.insert(Entity::new(id, "unit".into(), None, WPos::ZERO, Size::EMPTY, 0));
        id
    }

    #[test]
    fn test_ids_strictly_increase_and_are_not_reused() {
        let mut registry = EntityRegistry::new();
        let a = entity(&mut registry);
        let b = entity(&mut registry);
        assert!(a < b);

        registry.mark_live(a);
        registry.mark_removed(a);
        registry.dispose(a);

        let c = entity(&mut registry);
        assert!(c > b);
        assert!(!registry.contains(a));
    }

    #[test]
    fn test_exhausted_id_space_reports_none() {
        let mut registry = EntityRegistry::new();
        registry.next_id = u32::MAX - 1;
        assert_eq!(registry.allocate_id(), Some(EntityId::new(u32::MAX - 1)));
        assert_eq!(registry.allocate_id(), None);
        assert_eq!(registry.allocate_id(), None);
    }

    #[test]
    fn test_live_iteration_is_ascending() {
        let mut registry = EntityRegistry::new();
        let ids: Vec<_> = (0..5).map(|_| entity(&mut registry)).collect();
        for id in ids.iter().rev() {
            assert!(registry.mark_live(*id));
        }
        assert!(!registry.mark_live(ids[0]));

        let live: Vec<_> = registry.live_ids().collect();
        assert_eq!(live, ids);
    }

    #[test]
    fn test_remove_not_live_is_rejected() {
        let mut registry = EntityRegistry::new();
        let a = entity(&mut registry);
        assert!(!registry.mark_removed(a));
        assert!(!registry.mark_removed(EntityId::new(99)));
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.len(), 1);
    }
}
