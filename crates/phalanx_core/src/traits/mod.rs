//! # Traits and Capabilities
//!
//! A trait is a behaviour object attached to an entity. Which scheduler
//! lists it enters is decided by the [`Capabilities`] it reports when it
//! is registered; the set is fixed from then on.
//!
//! ```text
//! ┌──────────────┐   capabilities()   ┌──────────────────────────────┐
//! │ Box<dyn Trait>│ ─────────────────▶ │ bucket[Tick]  (e, t), (e, t) │
//! └──────────────┘                    │ bucket[Sync]  (e, t)         │
//!                                      │ bucket[Idle]  ...            │
//!                                      └──────────────────────────────┘
//! ```
//!
//! Hooks receive the owning entity's id and the world. A trait never holds
//! a reference to either.

mod dictionary;

pub use dictionary::{TraitDictionary, TraitPair};

use std::any::Any;

use crate::entity::EntityId;
use crate::error::KernelResult;
use crate::order::Command;
use crate::player::PlayerId;
use crate::spatial::Footprint;
use crate::sync::SyncHashes;
use crate::world::World;

/// A behavioural contract a trait can opt into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Capability {
    /// `created` runs once after the entity is constructed.
    Created = 0,
    /// `added_to_world` runs when the entity becomes live.
    AddedToWorld = 1,
    /// `removed_from_world` runs when the entity stops being live.
    RemovedFromWorld = 2,
    /// `tick_idle` runs on ticks where the entity has no activity.
    Idle = 3,
    /// `tick` runs every unpaused tick.
    Tick = 4,
    /// `sync_hashes` feeds the sync hash.
    Sync = 5,
    /// `footprint` places the entity in the occupancy map.
    OccupySpace = 6,
    /// `resolve_order` receives commands for the entity.
    ResolveOrder = 7,
    /// `disposing` runs before the entity is dropped.
    Disposing = 8,
    /// `game_over` runs when the game ends (world entity only).
    GameOver = 9,
    /// `create_players` runs during world construction (world entity only).
    CreatePlayers = 10,
    /// `world_loaded` runs once loading completes.
    WorldLoaded = 11,
}

impl Capability {
    /// Number of capabilities.
    pub const COUNT: usize = 12;

    /// Every capability, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Created,
        Self::AddedToWorld,
        Self::RemovedFromWorld,
        Self::Idle,
        Self::Tick,
        Self::Sync,
        Self::OccupySpace,
        Self::ResolveOrder,
        Self::Disposing,
        Self::GameOver,
        Self::CreatePlayers,
        Self::WorldLoaded,
    ];

    /// Index of this capability's dispatch bucket.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Bitmask of capabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Capabilities(u16);

impl Capabilities {
    /// No capabilities.
    pub const NONE: Self = Self(0);

    /// Set with a single capability.
    #[inline]
    #[must_use]
    pub const fn of(capability: Capability) -> Self {
        Self(capability.bit())
    }

    /// Adds a capability.
    #[inline]
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether the set contains `capability`.
    #[inline]
    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// True for the empty set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Capabilities in the set, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

/// Handle to a trait instance in the [`TraitDictionary`].
///
/// Split like a generational id: the slot index plus a generation that
/// changes whenever the slot is reused, so a stale handle never resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraitHandle {
    index: u32,
    generation: u32,
}

impl TraitHandle {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// Upcast helper so trait objects can be downcast to their concrete type.
pub trait AsAny: Any {
    /// `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behaviour attached to an entity.
///
/// Only the hooks for capabilities the trait reports are ever called.
/// All hooks default to doing nothing.
#[allow(unused_variables)]
pub trait Trait: AsAny {
    /// Name used in diagnostics and for requirement resolution.
    fn name(&self) -> &'static str;

    /// Capabilities this instance implements. Read once at registration.
    fn capabilities(&self) -> Capabilities;

    /// Entity constructed; runs before it is added to the world.
    ///
    /// # Errors
    ///
    /// Any error aborts the creation.
    fn created(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }

    /// Entity became live.
    ///
    /// # Errors
    ///
    /// Propagated to the caller of `add`.
    fn added_to_world(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }

    /// Entity left the world.
    ///
    /// # Errors
    ///
    /// Propagated to the caller of `remove`.
    fn removed_from_world(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }

    /// Entity has no activity this tick.
    ///
    /// # Errors
    ///
    /// Halts the simulation.
    fn tick_idle(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }

    /// Per-tick update.
    ///
    /// # Errors
    ///
    /// Halts the simulation.
    fn tick(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }

    /// Named contributions to the sync hash. Must be a pure function of
    /// simulation state.
    fn sync_hashes(&self, hashes: &mut SyncHashes) {}

    /// Cells and centre the entity occupies. `None` means no space.
    fn footprint(&self, entity: EntityId, world: &World) -> Option<Footprint> {
        None
    }

    /// A command addressed to the entity.
    ///
    /// # Errors
    ///
    /// Halts the simulation.
    fn resolve_order(
        &mut self,
        entity: EntityId,
        issuer: PlayerId,
        command: &Command,
        world: &mut World,
    ) -> KernelResult<()> {
        Ok(())
    }

    /// Entity is about to be dropped.
    ///
    /// # Errors
    ///
    /// Propagated out of the frame-end drain.
    fn disposing(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }

    /// The game ended.
    ///
    /// # Errors
    ///
    /// Propagated to the caller of `end_game`.
    fn game_over(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }

    /// World construction: set up the session's players.
    ///
    /// # Errors
    ///
    /// Aborts world construction.
    fn create_players(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }

    /// Loading finished.
    ///
    /// # Errors
    ///
    /// Propagated to the caller of `load_complete`.
    fn world_loaded(&mut self, entity: EntityId, world: &mut World) -> KernelResult<()> {
        Ok(())
    }
}

/// Downcasts a trait object to its concrete type.
#[inline]
#[must_use]
pub fn downcast_ref<'a, T: Trait>(instance: &'a (dyn Trait + 'static)) -> Option<&'a T> {
    <dyn Trait as AsAny>::as_any(instance).downcast_ref::<T>()
}

/// Downcasts a trait object to its concrete type, mutably.
#[inline]
#[must_use]
pub fn downcast_mut<'a, T: Trait>(instance: &'a mut (dyn Trait + 'static)) -> Option<&'a mut T> {
    <dyn Trait as AsAny>::as_any_mut(instance).downcast_mut::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl Trait for Marker {
        fn name(&self) -> &'static str {
            "Marker"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::of(Capability::Tick).with(Capability::Sync)
        }
    }

    #[test]
    fn test_capability_set_ops() {
        let caps: Capabilities = [Capability::Idle, Capability::Sync].into_iter().collect();
        assert!(caps.contains(Capability::Idle));
        assert!(!caps.contains(Capability::Tick));
        assert_eq!(caps.iter().collect::<Vec<_>>(), vec![Capability::Idle, Capability::Sync]);
        assert!(Capabilities::NONE.is_empty());
        assert_eq!(Capability::ALL.len(), Capability::COUNT);
        for (i, cap) in Capability::ALL.iter().enumerate() {
            assert_eq!(cap.index(), i);
        }
    }

    #[test]
    fn test_downcast_through_trait_object() {
        let boxed: Box<dyn Trait> = Box::new(Marker);
        assert!(downcast_ref::<Marker>(&*boxed).is_some());
        assert!(boxed.capabilities().contains(Capability::Sync));
    }
}
