//! # PHALANX Shared
//!
//! Coordinate types used by the simulation kernel and by its hosts
//! (network layer, renderer, tools).
//!
//! ## CRITICAL RULE
//!
//! Everything in here that can end up in synced state is integer-only.
//! Floating point values differ across CPUs and compilers and must never
//! reach the sync hash.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{DEFAULT_TIMESTEP_MS, UNITS_PER_CELL, DEFAULT_TILE_SIZE, WORLD_ENTITY_TYPE, EDITOR_WORLD_ENTITY_TYPE};
pub use math::{CPos, Int2, Rect, Size, WPos, WVec};
