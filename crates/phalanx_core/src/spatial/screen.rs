//! # Screen Map
//!
//! Render bounds in screen pixels, binned for point and box queries.
//!
//! Hit-test order under a point: selection priority (highest first), then
//! distance from the bounds centre to the point (closest first), then id.
//! Every key in that order is an integer, so two machines always pick the
//! same entity under the cursor.
//!
//! Frozen entries are per-player snapshots of entities last seen under
//! fog. They live in their own layer per player and never mix with live
//! entries.

use std::collections::BTreeMap;

use phalanx_shared::{Int2, Rect, Size, WPos, UNITS_PER_CELL};

use crate::entity::EntityId;
use crate::player::PlayerId;

/// Projects a world position to screen pixels. Height lifts the point up
/// the screen.
#[inline]
#[must_use]
pub fn world_to_screen(position: WPos, tile_size: i32) -> Int2 {
    let scale = |v: i32| {
        let scaled = i64::from(v) * i64::from(tile_size) / i64::from(UNITS_PER_CELL);
        i32::try_from(scaled).unwrap_or(if scaled < 0 { i32::MIN } else { i32::MAX })
    };
    Int2::new(scale(position.x), scale(position.y).saturating_sub(scale(position.z)))
}

/// One indexed render bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenEntry {
    /// Indexed entity.
    pub entity: EntityId,
    /// Bounds in screen pixels.
    pub bounds: Rect,
    /// Selection priority.
    pub priority: i32,
}

/// One set of binned entries.
#[derive(Debug, Default)]
struct ScreenLayer {
    entries: BTreeMap<EntityId, ScreenEntry>,
    bins: BTreeMap<(i32, i32), Vec<EntityId>>,
}

impl ScreenLayer {
    fn bin_range(bounds: Rect, bin_size: i32) -> ((i32, i32), (i32, i32)) {
        let lo = (bounds.x.div_euclid(bin_size), bounds.y.div_euclid(bin_size));
        let hi = (
            (bounds.right() - 1).div_euclid(bin_size),
            (bounds.bottom() - 1).div_euclid(bin_size),
        );
        (lo, hi)
    }

    fn insert(&mut self, entry: ScreenEntry, bin_size: i32) {
        let (lo, hi) = Self::bin_range(entry.bounds, bin_size);
        for bx in lo.0..=hi.0 {
            for by in lo.1..=hi.1 {
                let ids = self.bins.entry((bx, by)).or_default();
                if let Err(at) = ids.binary_search(&entry.entity) {
                    ids.insert(at, entry.entity);
                }
            }
        }
        self.entries.insert(entry.entity, entry);
    }

    fn evict(&mut self, entity: EntityId, bin_size: i32) -> Option<ScreenEntry> {
        let entry = self.entries.remove(&entity)?;
        let (lo, hi) = Self::bin_range(entry.bounds, bin_size);
        for bx in lo.0..=hi.0 {
            for by in lo.1..=hi.1 {
                if let Some(ids) = self.bins.get_mut(&(bx, by)) {
                    if let Ok(at) = ids.binary_search(&entity) {
                        ids.remove(at);
                    }
                    if ids.is_empty() {
                        self.bins.remove(&(bx, by));
                    }
                }
            }
        }
        Some(entry)
    }

    fn at(&self, point: Int2, bin_size: i32) -> Vec<EntityId> {
        let bin = (point.x.div_euclid(bin_size), point.y.div_euclid(bin_size));
        let Some(ids) = self.bins.get(&bin) else {
            return Vec::new();
        };
        let mut hits: Vec<&ScreenEntry> = ids
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.bounds.contains(point))
            .collect();
        hits.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.bounds.center().distance_squared(point).cmp(&b.bounds.center().distance_squared(point)))
                .then_with(|| a.entity.cmp(&b.entity))
        });
        hits.into_iter().map(|e| e.entity).collect()
    }

    fn in_box(&self, area: Rect, bin_size: i32) -> Vec<EntityId> {
        if area.is_empty() {
            return Vec::new();
        }
        let (lo, hi) = Self::bin_range(area, bin_size);
        let mut found = Vec::new();
        for bx in lo.0..=hi.0 {
            for (_, ids) in self.bins.range((bx, lo.1)..=(bx, hi.1)) {
                found.extend(
                    ids.iter()
                        .filter(|id| self.entries.get(*id).is_some_and(|e| e.bounds.intersects(area))),
                );
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }
}

/// Screen-space index of render bounds.
#[derive(Debug)]
pub struct ScreenMap {
    bin_size: i32,
    live: ScreenLayer,
    frozen: BTreeMap<PlayerId, ScreenLayer>,
}

impl ScreenMap {
    /// Creates an empty index with the given bin edge in pixels (min 1).
    #[must_use]
    pub fn new(bin_size: i32) -> Self {
        Self {
            bin_size: bin_size.max(1),
            live: ScreenLayer::default(),
            frozen: BTreeMap::new(),
        }
    }

    /// Indexes `entity` with the given render `size` centred on `center`,
    /// replacing any previous entry. Empty bounds leave it unindexed.
    pub fn add(&mut self, entity: EntityId, center: Int2, size: Size, priority: i32) {
        self.live.evict(entity, self.bin_size);
        let bounds = Rect::centered(center, size);
        if !bounds.is_empty() {
            self.live.insert(ScreenEntry { entity, bounds, priority }, self.bin_size);
        }
    }

    /// Recentres an indexed entity. Does nothing if `entity` is not indexed.
    /// Returns whether anything changed.
    pub fn update(&mut self, entity: EntityId, center: Int2) -> bool {
        let Some(current) = self.live.entries.get(&entity).copied() else {
            return false;
        };
        let bounds = Rect::centered(center, Size::new(current.bounds.width, current.bounds.height));
        if bounds == current.bounds {
            return false;
        }
        self.live.evict(entity, self.bin_size);
        self.live.insert(ScreenEntry { bounds, ..current }, self.bin_size);
        true
    }

    /// Drops `entity`. Returns whether it was indexed.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        self.live.evict(entity, self.bin_size).is_some()
    }

    /// The indexed entry of `entity`.
    #[must_use]
    pub fn entry(&self, entity: EntityId) -> Option<&ScreenEntry> {
        self.live.entries.get(&entity)
    }

    /// Whether `entity` is indexed.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.live.entries.contains_key(&entity)
    }

    /// Entities whose bounds contain `point`, in hit-test order.
    #[must_use]
    pub fn entities_at(&self, point: Int2) -> Vec<EntityId> {
        self.live.at(point, self.bin_size)
    }

    /// The entity a click at `point` selects.
    #[must_use]
    pub fn entity_at(&self, point: Int2) -> Option<EntityId> {
        self.entities_at(point).into_iter().next()
    }

    /// Entities whose bounds intersect `area`, ascending id.
    #[must_use]
    pub fn entities_in_box(&self, area: Rect) -> Vec<EntityId> {
        self.live.in_box(area, self.bin_size)
    }

    /// Records a frozen snapshot of `entity` for `player`.
    pub fn add_frozen(&mut self, player: PlayerId, entity: EntityId, center: Int2, size: Size, priority: i32) {
        let bin_size = self.bin_size;
        let layer = self.frozen.entry(player).or_default();
        layer.evict(entity, bin_size);
        let bounds = Rect::centered(center, size);
        if !bounds.is_empty() {
            layer.insert(ScreenEntry { entity, bounds, priority }, bin_size);
        }
    }

    /// Drops the frozen snapshot of `entity` for `player`.
    pub fn remove_frozen(&mut self, player: PlayerId, entity: EntityId) -> bool {
        let bin_size = self.bin_size;
        self.frozen
            .get_mut(&player)
            .is_some_and(|layer| layer.evict(entity, bin_size).is_some())
    }

    /// Drops every frozen snapshot of `entity`, for all players.
    pub fn purge_frozen(&mut self, entity: EntityId) {
        let bin_size = self.bin_size;
        for layer in self.frozen.values_mut() {
            layer.evict(entity, bin_size);
        }
    }

    /// Frozen snapshots of `player` under `point`, in hit-test order.
    #[must_use]
    pub fn frozen_at(&self, player: PlayerId, point: Int2) -> Vec<EntityId> {
        self.frozen
            .get(&player)
            .map_or_else(Vec::new, |layer| layer.at(point, self.bin_size))
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.entries.len()
    }

    /// True when no live entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> EntityId {
        EntityId::new(n)
    }

    #[test]
    fn test_hit_order_priority_then_distance_then_id() {
        let mut map = ScreenMap::new(64);
        map.add(id(1), Int2::new(100, 100), Size::new(40, 40), 0);
        map.add(id(2), Int2::new(104, 100), Size::new(40, 40), 0);
        map.add(id(3), Int2::new(110, 100), Size::new(40, 40), 5);
        map.add(id(4), Int2::new(100, 100), Size::new(40, 40), 0);

        let hits = map.entities_at(Int2::new(100, 100));
        assert_eq!(hits, vec![id(3), id(1), id(4), id(2)]);
        assert_eq!(map.entity_at(Int2::new(100, 100)), Some(id(3)));
    }

    #[test]
    fn test_bounds_spanning_bins_are_found_everywhere() {
        let mut map = ScreenMap::new(16);
        map.add(id(1), Int2::new(32, 32), Size::new(40, 40), 0);
        assert_eq!(map.entities_at(Int2::new(13, 13)), vec![id(1)]);
        assert_eq!(map.entities_at(Int2::new(51, 51)), vec![id(1)]);
        assert!(map.entities_at(Int2::new(52, 52)).is_empty());
    }

    #[test]
    fn test_update_and_remove_are_idempotent() {
        let mut map = ScreenMap::new(32);
        assert!(!map.update(id(1), Int2::new(5, 5)));
        assert!(!map.remove(id(1)));
        assert!(map.is_empty());

        map.add(id(1), Int2::new(10, 10), Size::new(8, 8), 0);
        assert!(map.update(id(1), Int2::new(100, 10)));
        assert!(map.entities_at(Int2::new(10, 10)).is_empty());
        assert_eq!(map.entities_at(Int2::new(100, 10)), vec![id(1)]);
    }

    #[test]
    fn test_empty_bounds_are_not_indexed() {
        let mut map = ScreenMap::new(32);
        map.add(id(1), Int2::new(10, 10), Size::EMPTY, 0);
        assert!(!map.contains(id(1)));
    }

    #[test]
    fn test_frozen_layers_are_per_player() {
        let mut map = ScreenMap::new(32);
        let p1 = PlayerId::new(1);
        let p2 = PlayerId::new(2);
        map.add_frozen(p1, id(9), Int2::new(10, 10), Size::new(8, 8), 0);

        assert_eq!(map.frozen_at(p1, Int2::new(10, 10)), vec![id(9)]);
        assert!(map.frozen_at(p2, Int2::new(10, 10)).is_empty());
        assert!(map.entities_at(Int2::new(10, 10)).is_empty());

        assert!(map.remove_frozen(p1, id(9)));
        assert!(map.frozen_at(p1, Int2::new(10, 10)).is_empty());
    }

    #[test]
    fn test_box_query() {
        let mut map = ScreenMap::new(32);
        map.add(id(2), Int2::new(10, 10), Size::new(8, 8), 0);
        map.add(id(1), Int2::new(70, 70), Size::new(8, 8), 0);
        assert_eq!(map.entities_in_box(Rect::new(0, 0, 100, 100)), vec![id(1), id(2)]);
        assert_eq!(map.entities_in_box(Rect::new(0, 0, 20, 20)), vec![id(2)]);
    }

    #[test]
    fn test_projection() {
        assert_eq!(world_to_screen(WPos::new(1024, 2048, 0), 24), Int2::new(24, 48));
        assert_eq!(world_to_screen(WPos::new(1024, 2048, 512), 24), Int2::new(24, 36));
    }
}
