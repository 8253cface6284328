//! # Trait Dictionary
//!
//! Storage for every trait instance plus one dispatch bucket per
//! capability.
//!
//! ## Layout
//!
//! ```text
//! slots:    [ T0 | T1 | -- | T3 | ... ]   free list: [2]
//! buckets:
//!   Tick  → (#1,T0) (#1,T3) (#4,T7) ...   sorted by entity id,
//!   Sync  → (#1,T3) (#2,T5) ...           then construction order
//! ```
//!
//! Every bucket is sorted by entity id, and within one entity by
//! registration order. New pairs go in at the upper bound of their
//! entity, so registering never reorders existing pairs and the order is
//! the same on every machine that saw the same creation history.
//!
//! Slots are recycled through a free list. The generation in a
//! [`TraitHandle`] keeps old handles from resolving to a new tenant.

use std::collections::BTreeMap;

use super::{downcast_ref, Capabilities, Capability, Trait, TraitHandle};
use crate::entity::EntityId;
use crate::error::{KernelError, KernelResult};

/// One entry of a capability bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraitPair {
    /// Owning entity.
    pub entity: EntityId,
    /// The trait instance.
    pub handle: TraitHandle,
}

struct TraitEntry {
    owner: EntityId,
    name: &'static str,
    capabilities: Capabilities,
    /// `None` while the instance is checked out for a hook call.
    instance: Option<Box<dyn Trait>>,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    entry: Option<TraitEntry>,
}

/// Trait instances indexed by entity and by capability.
pub struct TraitDictionary {
    slots: Vec<Slot>,
    free: Vec<u32>,
    buckets: [Vec<TraitPair>; Capability::COUNT],
    by_entity: BTreeMap<EntityId, Vec<TraitHandle>>,
}

impl Default for TraitDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl TraitDictionary {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            buckets: std::array::from_fn(|_| Vec::new()),
            by_entity: BTreeMap::new(),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a trait instance for `entity`.
    ///
    /// The instance is appended after every trait already registered for
    /// the entity, in each of its capability buckets.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` trait slots are ever needed.
    pub fn register(&mut self, entity: EntityId, instance: Box<dyn Trait>) -> (TraitHandle, Capabilities) {
        let capabilities = instance.capabilities();
        let entry = TraitEntry {
            owner: entity,
            name: instance.name(),
            capabilities,
            instance: Some(instance),
        };

        let handle = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            TraitHandle::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| panic!("trait slot space exhausted"));
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            TraitHandle::new(index, 0)
        };

        for capability in capabilities.iter() {
            let bucket = &mut self.buckets[capability.index()];
            let at = bucket.partition_point(|p| p.entity <= entity);
            bucket.insert(at, TraitPair { entity, handle });
        }
        self.by_entity.entry(entity).or_default().push(handle);

        (handle, capabilities)
    }

    /// Removes every trait of `entity`, returning the instances in
    /// construction order. Checked-out instances are not returned.
    pub fn unregister_entity(&mut self, entity: EntityId) -> Vec<Box<dyn Trait>> {
        let Some(handles) = self.by_entity.remove(&entity) else {
            return Vec::new();
        };

        for bucket in &mut self.buckets {
            let start = bucket.partition_point(|p| p.entity < entity);
            let end = bucket.partition_point(|p| p.entity <= entity);
            bucket.drain(start..end);
        }

        let mut instances = Vec::with_capacity(handles.len());
        for handle in handles {
            let slot = &mut self.slots[handle.index() as usize];
            if let Some(entry) = slot.entry.take() {
                instances.extend(entry.instance);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.index());
        }
        instances
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    fn entry(&self, handle: TraitHandle) -> Option<&TraitEntry> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, handle: TraitHandle) -> Option<&mut TraitEntry> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.entry.as_mut()
    }

    /// The trait instance behind `handle`. `None` if the handle is stale or
    /// the instance is currently running.
    #[must_use]
    pub fn get(&self, handle: TraitHandle) -> Option<&(dyn Trait + 'static)> {
        self.entry(handle)?.instance.as_deref()
    }

    /// Mutable access to the trait instance behind `handle`.
    pub fn get_mut(&mut self, handle: TraitHandle) -> Option<&mut (dyn Trait + 'static)> {
        self.entry_mut(handle)?.instance.as_deref_mut()
    }

    /// Name of the trait behind `handle`.
    #[must_use]
    pub fn name(&self, handle: TraitHandle) -> Option<&'static str> {
        self.entry(handle).map(|e| e.name)
    }

    /// Owning entity of the trait behind `handle`.
    #[must_use]
    pub fn owner(&self, handle: TraitHandle) -> Option<EntityId> {
        self.entry(handle).map(|e| e.owner)
    }

    /// Capabilities of the trait behind `handle`.
    #[must_use]
    pub fn capabilities(&self, handle: TraitHandle) -> Option<Capabilities> {
        self.entry(handle).map(|e| e.capabilities)
    }

    /// All traits of `entity` in construction order.
    #[must_use]
    pub fn all_traits_of(&self, entity: EntityId) -> &[TraitHandle] {
        self.by_entity.get(&entity).map_or(&[], Vec::as_slice)
    }

    /// Traits of `entity` implementing `capability`, in construction order.
    #[must_use]
    pub fn traits_of(&self, entity: EntityId, capability: Capability) -> &[TraitPair] {
        let bucket = &self.buckets[capability.index()];
        let start = bucket.partition_point(|p| p.entity < entity);
        let end = bucket.partition_point(|p| p.entity <= entity);
        &bucket[start..end]
    }

    /// Whether `entity` has at least one trait implementing `capability`.
    #[must_use]
    pub fn has(&self, entity: EntityId, capability: Capability) -> bool {
        !self.traits_of(entity, capability).is_empty()
    }

    /// Every (entity, trait) pair implementing `capability`, in dispatch
    /// order.
    #[must_use]
    pub fn entities_with(&self, capability: Capability) -> &[TraitPair] {
        &self.buckets[capability.index()]
    }

    /// Entities with at least one trait implementing `capability`,
    /// ascending, each once.
    pub fn entities_having(&self, capability: Capability) -> impl Iterator<Item = EntityId> + '_ {
        let bucket = &self.buckets[capability.index()];
        bucket
            .iter()
            .enumerate()
            .filter(|(i, p)| *i == 0 || bucket[i - 1].entity != p.entity)
            .map(|(_, p)| p.entity)
    }

    /// Entities with at least one trait implementing `capability` for
    /// which `predicate` holds, ascending, each once.
    pub fn entities_having_where<'a, F>(
        &'a self,
        capability: Capability,
        mut predicate: F,
    ) -> impl Iterator<Item = EntityId> + 'a
    where
        F: FnMut(EntityId, &(dyn Trait + 'static)) -> bool + 'a,
    {
        let mut last = None;
        self.buckets[capability.index()].iter().filter_map(move |pair| {
            if last == Some(pair.entity) {
                return None;
            }
            let instance = self.get(pair.handle)?;
            if predicate(pair.entity, instance) {
                last = Some(pair.entity);
                Some(pair.entity)
            } else {
                None
            }
        })
    }

    /// Traits of `entity` with concrete type `T`, in construction order.
    pub fn traits_of_type<T: Trait>(&self, entity: EntityId) -> impl Iterator<Item = &T> + '_ {
        self.all_traits_of(entity)
            .iter()
            .filter_map(|h| self.get(*h).and_then(downcast_ref::<T>))
    }

    /// First trait of `entity` with concrete type `T`.
    #[must_use]
    pub fn trait_of_type<T: Trait>(&self, entity: EntityId) -> Option<&T> {
        self.traits_of_type::<T>(entity).next()
    }

    /// Number of registered trait instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pair `index` of the `capability` bucket. Used by the scheduler,
    /// which walks buckets by position so hooks can borrow the world.
    #[inline]
    pub(crate) fn pair_at(&self, capability: Capability, index: usize) -> Option<TraitPair> {
        self.buckets[capability.index()].get(index).copied()
    }

    // =========================================================================
    // Check-out / check-in
    // =========================================================================

    /// Takes the instance out of its slot so a hook can run with
    /// `&mut World`.
    pub(crate) fn checkout(&mut self, handle: TraitHandle) -> KernelResult<Box<dyn Trait>> {
        let entry = self.entry_mut(handle).ok_or(KernelError::StaleTraitHandle)?;
        let owner = entry.owner;
        let name = entry.name;
        entry.instance.take().ok_or(KernelError::TraitInUse {
            entity: owner,
            trait_name: name,
        })
    }

    /// Name of the first trait of `entity` implementing `capability` that
    /// is currently checked out.
    pub(crate) fn running_trait(&self, entity: EntityId, capability: Capability) -> Option<&'static str> {
        self.traits_of(entity, capability)
            .iter()
            .filter_map(|pair| self.entry(pair.handle))
            .find(|entry| entry.instance.is_none())
            .map(|entry| entry.name)
    }

    /// Owner and name of any trait that is currently checked out.
    pub(crate) fn any_running(&self) -> Option<(EntityId, &'static str)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .find(|entry| entry.instance.is_none())
            .map(|entry| (entry.owner, entry.name))
    }

    /// Puts a checked-out instance back. Dropped if the slot was retired
    /// in the meantime.
    pub(crate) fn checkin(&mut self, handle: TraitHandle, instance: Box<dyn Trait>) {
        if let Some(entry) = self.entry_mut(handle) {
            entry.instance = Some(instance);
        }
    }
}
