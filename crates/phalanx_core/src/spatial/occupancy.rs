//! # Occupancy Map
//!
//! Cell → entities, and a reverse entity → footprint lookup so moves and
//! removals only touch the cells the entity actually held.
//!
//! Proximity queries go through position bins: square blocks of
//! `bin_size` cells keyed by the bin of the entity's centre. A radius
//! query only visits the bins overlapping the query box.

use std::collections::BTreeMap;

use phalanx_shared::{CPos, WPos};

use super::Footprint;
use crate::entity::EntityId;

/// Insert `id` into a sorted id list, keeping it sorted and unique.
fn insert_sorted(ids: &mut Vec<EntityId>, id: EntityId) {
    if let Err(at) = ids.binary_search(&id) {
        ids.insert(at, id);
    }
}

/// Remove `id` from a sorted id list. Returns whether the list is now empty.
fn remove_sorted(ids: &mut Vec<EntityId>, id: EntityId) -> bool {
    if let Ok(at) = ids.binary_search(&id) {
        ids.remove(at);
    }
    ids.is_empty()
}

/// Cell occupancy / influence index.
#[derive(Debug)]
pub struct OccupancyMap {
    /// Edge length of a position bin in cells.
    bin_size: i32,
    /// Occupants per cell, ascending id.
    cells: BTreeMap<CPos, Vec<EntityId>>,
    /// Entities per position bin, ascending id.
    bins: BTreeMap<(i32, i32), Vec<EntityId>>,
    /// Reverse lookup.
    footprints: BTreeMap<EntityId, Footprint>,
}

impl OccupancyMap {
    /// Creates an empty map with the given bin size (in cells, min 1).
    #[must_use]
    pub fn new(bin_size: i32) -> Self {
        Self {
            bin_size: bin_size.max(1),
            cells: BTreeMap::new(),
            bins: BTreeMap::new(),
            footprints: BTreeMap::new(),
        }
    }

    #[inline]
    fn bin_of(&self, cell: CPos) -> (i32, i32) {
        (cell.x.div_euclid(self.bin_size), cell.y.div_euclid(self.bin_size))
    }

    fn insert(&mut self, entity: EntityId, footprint: Footprint) {
        for cell in &footprint.cells {
            insert_sorted(self.cells.entry(*cell).or_default(), entity);
        }
        let bin = self.bin_of(footprint.center.to_cell());
        insert_sorted(self.bins.entry(bin).or_default(), entity);
        self.footprints.insert(entity, footprint);
    }

    fn evict(&mut self, entity: EntityId) -> Option<Footprint> {
        let footprint = self.footprints.remove(&entity)?;
        for cell in &footprint.cells {
            if let Some(ids) = self.cells.get_mut(cell) {
                if remove_sorted(ids, entity) {
                    self.cells.remove(cell);
                }
            }
        }
        let bin = self.bin_of(footprint.center.to_cell());
        if let Some(ids) = self.bins.get_mut(&bin) {
            if remove_sorted(ids, entity) {
                self.bins.remove(&bin);
            }
        }
        Some(footprint)
    }

    /// Indexes `entity` at `footprint`, replacing any previous entry.
    /// An empty footprint leaves the entity unindexed.
    pub fn add(&mut self, entity: EntityId, footprint: Footprint) {
        self.evict(entity);
        if !footprint.is_empty() {
            self.insert(entity, footprint);
        }
    }

    /// Moves an indexed entity. Does nothing if `entity` is not indexed.
    /// Returns whether anything changed.
    pub fn update(&mut self, entity: EntityId, footprint: Footprint) -> bool {
        match self.footprints.get(&entity) {
            None => false,
            Some(current) if *current == footprint => false,
            Some(_) => {
                self.evict(entity);
                if !footprint.is_empty() {
                    self.insert(entity, footprint);
                }
                true
            }
        }
    }

    /// Drops `entity` from the index. Returns whether it was indexed.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        self.evict(entity).is_some()
    }

    /// Entities occupying `cell`, ascending id.
    #[must_use]
    pub fn entities_at(&self, cell: CPos) -> &[EntityId] {
        self.cells.get(&cell).map_or(&[], Vec::as_slice)
    }

    /// Whether anything occupies `cell`.
    #[must_use]
    pub fn is_occupied(&self, cell: CPos) -> bool {
        self.cells.contains_key(&cell)
    }

    /// The indexed footprint of `entity`.
    #[must_use]
    pub fn footprint(&self, entity: EntityId) -> Option<&Footprint> {
        self.footprints.get(&entity)
    }

    /// Whether `entity` is indexed.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.footprints.contains_key(&entity)
    }

    /// Entities whose centre lies in the box spanned by `a` and `b`
    /// (inclusive, height ignored), ascending id.
    #[must_use]
    pub fn entities_in_box(&self, a: WPos, b: WPos) -> Vec<EntityId> {
        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
        let lo = self.bin_of(WPos::new(min_x, min_y, 0).to_cell());
        let hi = self.bin_of(WPos::new(max_x, max_y, 0).to_cell());

        let mut found = Vec::new();
        for bx in lo.0..=hi.0 {
            for (_, ids) in self.bins.range((bx, lo.1)..=(bx, hi.1)) {
                for id in ids {
                    let Some(footprint) = self.footprints.get(id) else {
                        continue;
                    };
                    let c = footprint.center;
                    if (min_x..=max_x).contains(&c.x) && (min_y..=max_y).contains(&c.y) {
                        found.push(*id);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    /// Entities whose centre lies within `radius` world units of `center`
    /// (horizontal distance), ascending id.
    #[must_use]
    pub fn entities_in_radius(&self, center: WPos, radius: i32) -> Vec<EntityId> {
        let radius = radius.max(0);
        let lo = WPos::new(center.x.saturating_sub(radius), center.y.saturating_sub(radius), 0);
        let hi = WPos::new(center.x.saturating_add(radius), center.y.saturating_add(radius), 0);
        let mut found = self.entities_in_box(lo, hi);
        let limit = i64::from(radius) * i64::from(radius);
        found.retain(|id| {
            self.footprints
                .get(id)
                .is_some_and(|f| (f.center - center).horizontal_length_squared() <= limit)
        });
        found
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    /// True when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }
}
