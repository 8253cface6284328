//! Fog, shroud and screen lookups from the render viewpoint.
//!
//! Presentation-side queries. They read simulation state but never feed
//! back into it, and all of them treat "no render viewpoint" as "reveal
//! everything".

use phalanx_shared::{CPos, Int2, Size, WPos};

use super::World;
use crate::entity::EntityId;
use crate::error::{KernelError, KernelResult};
use crate::player::{Player, PlayerId};

impl World {
    fn viewer(&self) -> Option<&Player> {
        self.render_player().and_then(|id| self.players.get(&id))
    }

    /// Whether `cell` is not currently visible to the render viewpoint.
    #[must_use]
    pub fn fog_obscures_cell(&self, cell: CPos) -> bool {
        self.viewer().is_some_and(|p| !p.shroud().is_visible(cell))
    }

    /// [`fog_obscures_cell`](Self::fog_obscures_cell) for the cell under
    /// `position`.
    #[must_use]
    pub fn fog_obscures_position(&self, position: WPos) -> bool {
        self.fog_obscures_cell(position.to_cell())
    }

    /// Whether the render viewpoint cannot see `entity`.
    ///
    /// Entities owned by the viewer or its allies are never obscured.
    /// Others are visible when any cell of their footprint is, or the cell
    /// under their centre for entities without one. Unknown entities are
    /// obscured.
    #[must_use]
    pub fn fog_obscures_entity(&self, entity: EntityId) -> bool {
        let Some(viewer) = self.viewer() else {
            return false;
        };
        let Some(target) = self.registry.get(entity) else {
            return true;
        };
        if target.owner().is_some_and(|owner| viewer.is_allied_with(owner)) {
            return false;
        }
        let shroud = viewer.shroud();
        match self.occupancy.footprint(entity) {
            Some(footprint) if !footprint.is_empty() => !footprint.cells.iter().any(|c| shroud.is_visible(*c)),
            _ => !shroud.is_visible(target.center_position().to_cell()),
        }
    }

    /// Whether `cell` has never been explored by the render viewpoint.
    #[must_use]
    pub fn shroud_obscures_cell(&self, cell: CPos) -> bool {
        self.viewer().is_some_and(|p| !p.shroud().is_explored(cell))
    }

    /// [`shroud_obscures_cell`](Self::shroud_obscures_cell) for the cell
    /// under `position`.
    #[must_use]
    pub fn shroud_obscures_position(&self, position: WPos) -> bool {
        self.shroud_obscures_cell(position.to_cell())
    }

    /// Whether the render viewpoint has explored `cell`.
    #[must_use]
    pub fn is_explored_at(&self, cell: CPos) -> bool {
        !self.shroud_obscures_cell(cell)
    }

    /// Entities whose render bounds contain `point`, best hit first.
    #[must_use]
    pub fn entities_at_screen(&self, point: Int2) -> Vec<EntityId> {
        self.screen.entities_at(point)
    }

    /// Best hit at `point`.
    #[must_use]
    pub fn entity_at_screen(&self, point: Int2) -> Option<EntityId> {
        self.screen.entity_at(point)
    }

    /// Frozen snapshots the render viewpoint sees at `point`, best hit
    /// first. Empty without a viewpoint.
    #[must_use]
    pub fn frozen_at_screen(&self, point: Int2) -> Vec<EntityId> {
        self.render_player()
            .map_or_else(Vec::new, |player| self.screen.frozen_at(player, point))
    }

    /// Records a frozen snapshot of `entity` at its current screen bounds
    /// for `player`. Returns `false` if the entity has no screen bounds.
    ///
    /// # Errors
    ///
    /// `UnknownPlayer` if `player` is not in the session.
    pub fn freeze_entity(&mut self, player: PlayerId, entity: EntityId) -> KernelResult<bool> {
        if !self.players.contains_key(&player) {
            return Err(KernelError::UnknownPlayer(player));
        }
        let Some(entry) = self.screen.entry(entity).copied() else {
            return Ok(false);
        };
        let size = Size::new(entry.bounds.width, entry.bounds.height);
        self.screen
            .add_frozen(player, entity, entry.bounds.center(), size, entry.priority);
        Ok(true)
    }

    /// Drops `player`'s frozen snapshot of `entity`. Returns whether there
    /// was one.
    pub fn unfreeze_entity(&mut self, player: PlayerId, entity: EntityId) -> bool {
        self.screen.remove_frozen(player, entity)
    }
}
