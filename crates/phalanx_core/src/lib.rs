//! # PHALANX Core Kernel
//!
//! Deterministic lockstep simulation kernel:
//! - Entities with monotonic, never-reused ids
//! - Behaviour composed from traits, dispatched per capability in a fixed
//!   order
//! - Cell occupancy and screen-bounds spatial indexes
//! - A fixed-step tick and a per-tick sync hash for desync detection
//!
//! ## Architecture Rules
//!
//! 1. **Same inputs, same state** - seed + order stream reproduce every tick
//! 2. **Ordered iteration only** - ids and construction order, never
//!    addresses or hash-table order
//! 3. **Integers only in synced state** - all hash arithmetic wraps
//! 4. **No globals** - everything a world needs arrives in a [`Session`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use phalanx_core::{KernelConfig, Ruleset, Session, World};
//!
//! let mut world = World::new(Session::new(KernelConfig::with_seed(42), Ruleset::new()))?;
//! world.process_orders(&orders)?;
//! world.tick()?;
//! let hash = world.sync_hash();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod effect;
pub mod entity;
pub mod error;
pub mod events;
pub mod order;
pub mod player;
pub mod random;
pub mod rules;
pub mod spatial;
pub mod sync;
pub mod traits;
pub mod world;

pub use config::{KernelConfig, MapConfig, ScreenConfig, ViewpointPolicy, WorldKind};
pub use effect::{Effect, EffectId};
pub use entity::{Activity, ActivityQueue, ActivityStep, Entity, EntityId, EntityRegistry};
pub use error::{KernelError, KernelResult};
pub use events::{EventBus, EventReceiver, WorldEvent};
pub use order::{Command, Order, Target};
pub use player::{Outcome, Player, PlayerId, Shroud, Stance};
pub use random::SharedRandom;
pub use rules::{EntityInfo, EntityInit, InitValue, Ruleset, TraitFactory, TraitInfo};
pub use spatial::{world_to_screen, Footprint, OccupancyMap, ScreenEntry, ScreenMap};
pub use sync::{SyncHash, SyncHashes, SyncValue};
pub use traits::{
    downcast_mut, downcast_ref, AsAny, Capabilities, Capability, Trait, TraitDictionary, TraitHandle, TraitPair,
};
pub use world::{FrameEndAction, FrameTimings, Session, World};
