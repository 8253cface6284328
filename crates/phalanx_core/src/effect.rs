//! # Transient Effects
//!
//! Short-lived world objects that are not entities (projectiles in
//! flight, explosions, beacons). Effects are ticked in list order after
//! all trait ticks. Additions and removals requested while the list is
//! being ticked are held back and applied once the pass is over.
//!
//! Removal swaps the last effect into the freed slot, so list order is a
//! deterministic function of the add/remove history rather than of
//! creation order alone.

use crate::error::KernelResult;
use crate::world::World;

/// A transient world object.
pub trait Effect {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Advances the effect by one tick.
    ///
    /// # Errors
    ///
    /// Any error halts the simulation.
    fn tick(&mut self, world: &mut World) -> KernelResult<()>;

    /// Digest of simulation-relevant state, or `None` for purely visual
    /// effects.
    fn sync_hash(&self) -> Option<i32> {
        None
    }
}

/// Identifier of an effect in the world's effect list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectId(u64);

impl EffectId {
    /// Raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// The world's effects plus changes requested while they were ticking.
#[derive(Default)]
pub(crate) struct EffectList {
    next_id: u64,
    items: Vec<(EffectId, Box<dyn Effect>)>,
    pending_add: Vec<(EffectId, Box<dyn Effect>)>,
    pending_remove: Vec<EffectId>,
    ticking: bool,
}

impl EffectList {
    pub(crate) fn add(&mut self, effect: Box<dyn Effect>) -> EffectId {
        let id = EffectId(self.next_id);
        self.next_id += 1;
        if self.ticking {
            self.pending_add.push((id, effect));
        } else {
            self.items.push((id, effect));
        }
        id
    }

    pub(crate) fn remove(&mut self, id: EffectId) {
        if self.ticking {
            self.pending_remove.push(id);
        } else {
            self.remove_now(id);
        }
    }

    fn remove_now(&mut self, id: EffectId) -> bool {
        let Some(at) = self.items.iter().position(|(e, _)| *e == id) else {
            return false;
        };
        self.items.swap_remove(at);
        true
    }

    /// Starts a tick pass: hands out the list and routes further changes
    /// to the pending queues.
    pub(crate) fn begin_tick(&mut self) -> Vec<(EffectId, Box<dyn Effect>)> {
        self.ticking = true;
        std::mem::take(&mut self.items)
    }

    /// Ends a tick pass: takes the list back and applies pending changes,
    /// additions first.
    pub(crate) fn end_tick(&mut self, items: Vec<(EffectId, Box<dyn Effect>)>) {
        self.ticking = false;
        self.items = items;
        self.items.append(&mut self.pending_add);
        for id in std::mem::take(&mut self.pending_remove) {
            self.remove_now(id);
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EffectId, &dyn Effect)> + '_ {
        self.items.iter().map(|(id, e)| (*id, e.as_ref()))
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.pending_add.clear();
        self.pending_remove.clear();
    }
}
