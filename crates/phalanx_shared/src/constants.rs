//! # Session Constants
//!
//! Values every peer in a lockstep session must agree on.
//!
//! **CRITICAL:** Changing any of these changes the sync hash of every
//! recorded session. Bump the protocol version alongside.

// =============================================================================
// SIMULATION
// =============================================================================

/// Default simulation timestep in milliseconds (25 ticks per second).
pub const DEFAULT_TIMESTEP_MS: u32 = 40;

/// World units along one cell edge.
pub const UNITS_PER_CELL: i32 = 1024;

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Type name of the world entity in regular and shellmap worlds.
pub const WORLD_ENTITY_TYPE: &str = "World";

/// Type name of the world entity in editor worlds.
pub const EDITOR_WORLD_ENTITY_TYPE: &str = "EditorWorld";

// =============================================================================
// PRESENTATION
// =============================================================================

/// Default screen pixels along one cell edge.
pub const DEFAULT_TILE_SIZE: i32 = 24;
