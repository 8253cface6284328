//! # Entities
//!
//! An entity is an identifier plus the ordered list of trait instances
//! attached to it.
//!
//! ## Design Philosophy
//!
//! - Ids come from a counter that only moves forward. They are never reused,
//!   so id order is creation order on every machine.
//! - Everything else refers to an entity by id. Traits and activities never
//!   hold pointers back to their owner or to the world.

mod activity;
mod registry;

pub use activity::{Activity, ActivityQueue, ActivityStep};
pub use registry::EntityRegistry;

use std::fmt;

use phalanx_shared::{Size, WPos};
use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::traits::{Capabilities, TraitHandle};

/// Unique identifier for an entity.
///
/// Allocated from a strictly increasing per-session counter. The world
/// entity always receives id 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an entity id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A composable game object.
///
/// Owned exclusively by the [`EntityRegistry`]. Trait instances live in the
/// trait dictionary and are listed here by handle in construction order.
pub struct Entity {
    /// The unique identifier for this entity.
    id: EntityId,
    /// Type name this entity was constructed from.
    type_name: String,
    /// Owning player, if any.
    owner: Option<PlayerId>,
    /// Whether this entity is currently in the world.
    in_world: bool,
    /// Last centre position reported through the spatial hooks.
    center_position: WPos,
    /// Size of the render bounds (empty = not hit-testable).
    render_size: Size,
    /// Tie-break priority for screen hit tests.
    selection_priority: i32,
    /// Trait handles in construction order.
    traits: Vec<TraitHandle>,
    /// Union of the capabilities of all traits.
    capabilities: Capabilities,
    /// Current and queued activities.
    pub(crate) activities: ActivityQueue,
}

impl Entity {
    /// Creates a new, not yet live entity.
    pub(crate) fn new(
        id: EntityId,
        type_name: String,
        owner: Option<PlayerId>,
        center_position: WPos,
        render_size: Size,
        selection_priority: i32,
    ) -> Self {
        Self {
            id,
            type_name,
            owner,
            in_world: false,
            center_position,
            render_size,
            selection_priority,
            traits: Vec::new(),
            capabilities: Capabilities::NONE,
            activities: ActivityQueue::new(),
        }
    }

    /// The entity's id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// The type name this entity was constructed from.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Owning player.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> Option<PlayerId> {
        self.owner
    }

    /// Changes the owning player.
    pub(crate) fn set_owner(&mut self, owner: Option<PlayerId>) {
        self.owner = owner;
    }

    /// Whether the entity is currently in the world.
    #[inline]
    #[must_use]
    pub const fn is_in_world(&self) -> bool {
        self.in_world
    }

    pub(crate) fn set_in_world(&mut self, in_world: bool) {
        self.in_world = in_world;
    }

    /// Centre position last reported through the spatial hooks.
    #[inline]
    #[must_use]
    pub const fn center_position(&self) -> WPos {
        self.center_position
    }

    pub(crate) fn set_center_position(&mut self, position: WPos) {
        self.center_position = position;
    }

    /// Size of the render bounds.
    #[inline]
    #[must_use]
    pub const fn render_size(&self) -> Size {
        self.render_size
    }

    /// Tie-break priority for screen hit tests.
    #[inline]
    #[must_use]
    pub const fn selection_priority(&self) -> i32 {
        self.selection_priority
    }

    /// Trait handles in construction order.
    #[must_use]
    pub fn traits(&self) -> &[TraitHandle] {
        &self.traits
    }

    pub(crate) fn push_trait(&mut self, handle: TraitHandle, capabilities: Capabilities) {
        self.traits.push(handle);
        self.capabilities = self.capabilities.union(capabilities);
    }

    /// Union of the capabilities of all attached traits.
    #[inline]
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// True when the entity has no current activity.
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.activities.is_idle()
    }

    /// Name of the current activity, if any.
    #[must_use]
    pub fn current_activity(&self) -> Option<&'static str> {
        self.activities.current_name()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("owner", &self.owner)
            .field("in_world", &self.in_world)
            .field("center_position", &self.center_position)
            .field("traits", &self.traits.len())
            .finish_non_exhaustive()
    }
}
