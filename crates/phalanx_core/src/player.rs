//! # Players
//!
//! Session participants, their diplomatic stances and their shroud.
//!
//! Players are fixed once per session with `World::set_players`. Shroud is
//! per player: cells are *visible* while at least one source reveals them
//! and stay *explored* once they have been seen.

use std::collections::BTreeMap;
use std::fmt;

use phalanx_shared::CPos;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Identifier of a player within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PlayerId(u32);

impl PlayerId {
    /// Creates a player id.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Diplomatic stance of one player towards another.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    /// Hostile.
    Enemy,
    /// Neither hostile nor allied.
    #[default]
    Neutral,
    /// Allied.
    Ally,
}

/// How the game ended for a player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Still playing.
    #[default]
    Undecided,
    /// Won.
    Won,
    /// Lost.
    Lost,
}

impl Outcome {
    /// True for `Won` and `Lost`.
    #[inline]
    #[must_use]
    pub const fn is_decided(self) -> bool {
        !matches!(self, Self::Undecided)
    }
}

// =============================================================================
// SHROUD
// =============================================================================

/// Per-player visibility over the map.
#[derive(Clone, Debug, Default)]
pub struct Shroud {
    width: i32,
    height: i32,
    /// Number of sources revealing each cell.
    visible: Vec<u16>,
    /// Whether each cell has ever been seen.
    explored: Vec<bool>,
    /// Cells revealed by each source.
    sources: BTreeMap<EntityId, Vec<CPos>>,
    /// Everything counts as explored.
    all_explored: bool,
}

impl Shroud {
    /// Fully shrouded map of `width` × `height` cells.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let cells = usize::try_from(i64::from(width) * i64::from(height)).unwrap_or(0);
        Self {
            width,
            height,
            visible: vec![0; cells],
            explored: vec![false; cells],
            sources: BTreeMap::new(),
            all_explored: false,
        }
    }

    fn index(&self, cell: CPos) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width || cell.y >= self.height {
            return None;
        }
        usize::try_from(cell.y * self.width + cell.x).ok()
    }

    /// Whether `cell` lies on the map.
    #[must_use]
    pub fn contains(&self, cell: CPos) -> bool {
        self.index(cell).is_some()
    }

    /// Reveals `cells` on behalf of `source`, replacing whatever that
    /// source revealed before. Off-map cells are ignored.
    pub fn add_visibility(&mut self, source: EntityId, cells: &[CPos]) {
        self.remove_visibility(source);
        let mut kept = Vec::with_capacity(cells.len());
        for cell in cells {
            if let Some(i) = self.index(*cell) {
                self.visible[i] = self.visible[i].saturating_add(1);
                self.explored[i] = true;
                kept.push(*cell);
            }
        }
        self.sources.insert(source, kept);
    }

    /// Withdraws everything `source` revealed. Returns whether it had
    /// revealed anything.
    pub fn remove_visibility(&mut self, source: EntityId) -> bool {
        let Some(cells) = self.sources.remove(&source) else {
            return false;
        };
        for cell in cells {
            if let Some(i) = self.index(cell) {
                self.visible[i] = self.visible[i].saturating_sub(1);
            }
        }
        true
    }

    /// Marks `cells` explored without making them visible.
    pub fn explore(&mut self, cells: &[CPos]) {
        for cell in cells {
            if let Some(i) = self.index(*cell) {
                self.explored[i] = true;
            }
        }
    }

    /// Marks the whole map explored.
    pub fn explore_all(&mut self) {
        self.all_explored = true;
    }

    /// Whether at least one source currently reveals `cell`.
    #[must_use]
    pub fn is_visible(&self, cell: CPos) -> bool {
        self.index(cell).is_some_and(|i| self.visible[i] > 0)
    }

    /// Whether `cell` has ever been seen.
    #[must_use]
    pub fn is_explored(&self, cell: CPos) -> bool {
        self.index(cell)
            .is_some_and(|i| self.all_explored || self.explored[i])
    }

    /// Whether the whole map was explored with [`explore_all`](Self::explore_all).
    #[must_use]
    pub const fn is_all_explored(&self) -> bool {
        self.all_explored
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A session participant.
#[derive(Clone, Debug)]
pub struct Player {
    id: PlayerId,
    name: String,
    playable: bool,
    outcome: Outcome,
    /// World tick the outcome was decided on.
    outcome_tick: Option<u64>,
    stances: BTreeMap<PlayerId, Stance>,
    shroud: Shroud,
}

impl Player {
    /// Creates a playable player.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            playable: true,
            outcome: Outcome::Undecided,
            outcome_tick: None,
            stances: BTreeMap::new(),
            shroud: Shroud::default(),
        }
    }

    /// Creates a non-playable player (neutral owner, spectator slot, ...).
    #[must_use]
    pub fn non_playable(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            playable: false,
            ..Self::new(id, name)
        }
    }

    /// Player id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a human or bot controls this player.
    #[must_use]
    pub const fn is_playable(&self) -> bool {
        self.playable
    }

    /// Current outcome.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// World tick the outcome was decided on.
    #[must_use]
    pub const fn outcome_tick(&self) -> Option<u64> {
        self.outcome_tick
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome, tick: u64) {
        self.outcome = outcome;
        self.outcome_tick = outcome.is_decided().then_some(tick);
    }

    /// Stance towards `other`. A player is always its own ally.
    #[must_use]
    pub fn stance_towards(&self, other: PlayerId) -> Stance {
        if other == self.id {
            return Stance::Ally;
        }
        self.stances.get(&other).copied().unwrap_or_default()
    }

    /// Whether a stance towards `other` was set explicitly.
    #[must_use]
    pub fn has_stance(&self, other: PlayerId) -> bool {
        self.stances.contains_key(&other)
    }

    /// Sets the stance towards `other`.
    pub fn set_stance(&mut self, other: PlayerId, stance: Stance) {
        self.stances.insert(other, stance);
    }

    /// Whether `other` is an ally (or this player).
    #[must_use]
    pub fn is_allied_with(&self, other: PlayerId) -> bool {
        self.stance_towards(other) == Stance::Ally
    }

    /// This player's shroud.
    #[must_use]
    pub const fn shroud(&self) -> &Shroud {
        &self.shroud
    }

    /// This player's shroud, mutably.
    pub fn shroud_mut(&mut self) -> &mut Shroud {
        &mut self.shroud
    }

    pub(crate) fn reset_shroud(&mut self, width: i32, height: i32) {
        self.shroud = Shroud::new(width, height);
    }
}
