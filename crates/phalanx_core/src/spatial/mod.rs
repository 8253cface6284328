//! # Spatial Indexes
//!
//! Two indexes kept current with entity movement inside the same tick:
//!
//! - [`OccupancyMap`]: which entities occupy or influence a cell, plus
//!   coarse position bins for proximity queries.
//! - [`ScreenMap`]: which render bounds contain a screen point, ordered
//!   for cursor hit tests, plus per-player frozen snapshots.
//!
//! Both are keyed by ordered maps and return ids sorted, so query results
//! never depend on insertion history or memory layout.
//!
//! `add`, `update` and `remove` are idempotent: updating an entity that
//! was never added and removing an absent entity do nothing.

mod occupancy;
mod screen;

pub use occupancy::OccupancyMap;
pub use screen::{world_to_screen, ScreenEntry, ScreenMap};

use phalanx_shared::{CPos, WPos};

/// Where an entity sits in the occupancy map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Footprint {
    /// Centre position.
    pub center: WPos,
    /// Cells occupied or influenced. Empty means the entity takes no space.
    pub cells: Vec<CPos>,
}

impl Footprint {
    /// Footprint covering the single cell under `center`.
    #[must_use]
    pub fn at(center: WPos) -> Self {
        Self {
            center,
            cells: vec![center.to_cell()],
        }
    }

    /// Footprint with explicit cells. Duplicates are removed and the cells
    /// sorted.
    #[must_use]
    pub fn with_cells(center: WPos, mut cells: Vec<CPos>) -> Self {
        cells.sort_unstable();
        cells.dedup();
        Self { center, cells }
    }

    /// True when the footprint occupies no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
