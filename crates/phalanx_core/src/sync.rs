//! # Synchronization Hash
//!
//! Per-tick fingerprint of the simulation, compared across peers by the
//! network layer to detect divergence.
//!
//! ## Formula
//!
//! ```text
//! n = 0, acc = 0                               (i32, wrapping)
//! for entity in live entities, ascending id:
//!     acc += n++ * (1 + id) * hash_entity(id)
//! for (entity, trait) in Sync bucket (dictionary order):
//!     for value in trait.sync_hashes():
//!         acc += n++ * (1 + id) * value
//! for effect in effects (list order), if it opts in:
//!     acc += n++ * effect.sync_hash()
//! acc += shared_random.last()
//! ```
//!
//! `n` is shared by all three phases, so the result depends on the order
//! items were visited, not just on which items exist.
//!
//! **CRITICAL:** integer-only, explicit wrapping arithmetic. Nothing in
//! here may read floats, wall-clock time, or hash-map iteration order.

use phalanx_shared::{CPos, WPos};

use crate::entity::EntityId;
use crate::player::{Outcome, PlayerId, Stance};
use crate::traits::Capability;
use crate::world::World;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over the little-endian bytes of `values`.
#[must_use]
pub fn hash_ints(values: &[i32]) -> i32 {
    let mut hash = FNV_OFFSET;
    for value in values {
        for byte in value.to_le_bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash as i32
}

/// FNV-1a over the UTF-8 bytes of `text`.
#[must_use]
pub fn hash_str(text: &str) -> i32 {
    let mut hash = FNV_OFFSET;
    for byte in text.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i32
}

/// Digest of an entity: its id shifted into the high half.
#[inline]
#[must_use]
pub const fn hash_entity(id: EntityId) -> i32 {
    (id.value() << 16) as i32
}

/// A value that can be folded into a sync hash.
pub trait SyncValue {
    /// Deterministic 32-bit digest.
    fn sync_hash(&self) -> i32;
}

impl SyncValue for i32 {
    fn sync_hash(&self) -> i32 {
        *self
    }
}

impl SyncValue for u32 {
    fn sync_hash(&self) -> i32 {
        *self as i32
    }
}

impl SyncValue for i16 {
    fn sync_hash(&self) -> i32 {
        i32::from(*self)
    }
}

impl SyncValue for u16 {
    fn sync_hash(&self) -> i32 {
        i32::from(*self)
    }
}

impl SyncValue for u8 {
    fn sync_hash(&self) -> i32 {
        i32::from(*self)
    }
}

impl SyncValue for i64 {
    fn sync_hash(&self) -> i32 {
        (*self as i32) ^ ((*self >> 32) as i32)
    }
}

impl SyncValue for u64 {
    fn sync_hash(&self) -> i32 {
        (*self as i32) ^ ((*self >> 32) as i32)
    }
}

impl SyncValue for bool {
    fn sync_hash(&self) -> i32 {
        if *self {
            0xaaa
        } else {
            0x555
        }
    }
}

impl SyncValue for EntityId {
    fn sync_hash(&self) -> i32 {
        hash_entity(*self)
    }
}

impl SyncValue for PlayerId {
    fn sync_hash(&self) -> i32 {
        self.value() as i32
    }
}

impl SyncValue for WPos {
    fn sync_hash(&self) -> i32 {
        hash_ints(&[self.x, self.y, self.z])
    }
}

impl SyncValue for CPos {
    fn sync_hash(&self) -> i32 {
        hash_ints(&[self.x, self.y])
    }
}

impl SyncValue for Stance {
    fn sync_hash(&self) -> i32 {
        *self as i32
    }
}

impl SyncValue for Outcome {
    fn sync_hash(&self) -> i32 {
        *self as i32
    }
}

impl<T: SyncValue> SyncValue for Option<T> {
    fn sync_hash(&self) -> i32 {
        self.as_ref().map_or(0, SyncValue::sync_hash)
    }
}

/// One named contribution of a trait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncHash {
    /// Field name, for desync reports.
    pub name: &'static str,
    /// Digest.
    pub hash: i32,
}

/// Sink collecting a trait's named contributions, in push order.
#[derive(Clone, Debug, Default)]
pub struct SyncHashes {
    entries: Vec<SyncHash>,
}

impl SyncHashes {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` under `name`.
    pub fn add(&mut self, name: &'static str, value: impl SyncValue) {
        self.entries.push(SyncHash {
            name,
            hash: value.sync_hash(),
        });
    }

    /// Recorded contributions.
    #[must_use]
    pub fn entries(&self) -> &[SyncHash] {
        &self.entries
    }

    /// Number of contributions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all contributions, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Running accumulator of the formula above.
#[derive(Clone, Copy, Debug, Default)]
struct Accumulator {
    acc: i32,
    n: i32,
}

impl Accumulator {
    #[inline]
    fn add(&mut self, term: i32) {
        self.acc = self.acc.wrapping_add(self.n.wrapping_mul(term));
        self.n = self.n.wrapping_add(1);
    }
}

#[inline]
fn id_factor(id: EntityId) -> i32 {
    (id.value() as i32).wrapping_add(1)
}

/// Computes the sync hash of `world`. Pure: reads state only.
#[must_use]
pub fn compute(world: &World) -> i32 {
    let mut sum = Accumulator::default();

    for id in world.registry().live_ids() {
        sum.add(id_factor(id).wrapping_mul(hash_entity(id)));
    }

    let traits = world.traits();
    let mut sink = SyncHashes::new();
    for pair in traits.entities_with(Capability::Sync) {
        let Some(instance) = traits.get(pair.handle) else {
            continue;
        };
        sink.clear();
        instance.sync_hashes(&mut sink);
        for entry in sink.entries() {
            sum.add(id_factor(pair.entity).wrapping_mul(entry.hash));
        }
    }

    for (_, effect) in world.effects() {
        if let Some(hash) = effect.sync_hash() {
            sum.add(hash);
        }
    }

    sum.acc.wrapping_add(world.shared_random().last())
}

/// Named contributions of every sync trait of `entity`, for desync
/// reports.
#[must_use]
pub fn entity_report(world: &World, entity: EntityId) -> Vec<(&'static str, SyncHash)> {
    let traits = world.traits();
    let mut report = Vec::new();
    let mut sink = SyncHashes::new();
    for pair in traits.traits_of(entity, Capability::Sync) {
        let (Some(instance), Some(trait_name)) = (traits.get(pair.handle), traits.name(pair.handle)) else {
            continue;
        };
        sink.clear();
        instance.sync_hashes(&mut sink);
        report.extend(sink.entries().iter().map(|e| (trait_name, *e)));
    }
    report
}
