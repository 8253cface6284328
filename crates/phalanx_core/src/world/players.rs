//! Players, outcomes and session milestones.

use tracing::{debug, info};

use super::World;
use crate::config::ViewpointPolicy;
use crate::error::{KernelError, KernelResult};
use crate::events::WorldEvent;
use crate::player::{Outcome, Player, PlayerId, Stance};
use crate::traits::{Capability, TraitPair};

impl World {
    /// Fixes the session's players.
    ///
    /// Stances nobody set explicitly become [`Stance::Neutral`]. Every
    /// shroud is sized to the map, and fully explored when the session runs
    /// without shroud. The render viewpoint starts at the local player.
    ///
    /// # Errors
    ///
    /// `PlayersAlreadySet` on a second call and `LocalPlayerNotInSession`
    /// if `local` is not among `players`. Both halt the world.
    pub fn set_players(&mut self, players: Vec<Player>, local: Option<PlayerId>) -> KernelResult<()> {
        if self.players_set {
            return Err(self.contract_violation(KernelError::PlayersAlreadySet));
        }
        if let Some(local) = local {
            if !players.iter().any(|p| p.id() == local) {
                return Err(self.contract_violation(KernelError::LocalPlayerNotInSession(local)));
            }
        }

        let ids: Vec<PlayerId> = players.iter().map(Player::id).collect();
        let (width, height) = (self.config.map.width, self.config.map.height);
        let explore_all = !self.config.shroud_enabled;
        for mut player in players {
            for other in &ids {
                if *other != player.id() && !player.has_stance(*other) {
                    player.set_stance(*other, Stance::Neutral);
                }
            }
            player.reset_shroud(width, height);
            if explore_all {
                player.shroud_mut().explore_all();
            }
            self.players.insert(player.id(), player);
        }

        self.players_set = true;
        self.local_player = local;
        self.render_player = local;
        info!(players = self.players.len(), local = ?local, "players set");
        Ok(())
    }

    /// Whether [`set_players`](Self::set_players) has run.
    #[must_use]
    pub const fn players_set(&self) -> bool {
        self.players_set
    }

    /// All players in ascending id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> + '_ {
        self.players.values()
    }

    /// Looks up a player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Looks up a player mutably (stances, shroud).
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// The player this client controls.
    #[must_use]
    pub const fn local_player(&self) -> Option<PlayerId> {
        self.local_player
    }

    /// The player whose perspective is rendered, after applying the
    /// configured [`ViewpointPolicy`]. `None` renders everything.
    #[must_use]
    pub fn render_player(&self) -> Option<PlayerId> {
        let id = self.render_player?;
        match self.config.viewpoint_policy {
            ViewpointPolicy::Persist => Some(id),
            ViewpointPolicy::ClearWhenOutcomeDecided => {
                let decided = self.players.get(&id).is_some_and(|p| p.outcome().is_decided());
                (!decided).then_some(id)
            }
        }
    }

    /// Changes the render viewpoint. Presentation only.
    ///
    /// # Errors
    ///
    /// `UnknownPlayer` if `player` is not in the session.
    pub fn set_render_player(&mut self, player: Option<PlayerId>) -> KernelResult<()> {
        if let Some(id) = player {
            if !self.players.contains_key(&id) {
                return Err(KernelError::UnknownPlayer(id));
            }
        }
        self.render_player = player;
        debug!(player = ?player, "render viewpoint changed");
        Ok(())
    }

    /// Records `outcome` for `player` at the current world tick and
    /// publishes [`WorldEvent::PlayerOutcome`].
    ///
    /// # Errors
    ///
    /// `UnknownPlayer` if `player` is not in the session.
    pub fn set_player_outcome(&mut self, player: PlayerId, outcome: Outcome) -> KernelResult<()> {
        let tick = self.world_tick;
        let entry = self.players.get_mut(&player).ok_or(KernelError::UnknownPlayer(player))?;
        if entry.outcome() == outcome {
            return Ok(());
        }
        entry.set_outcome(outcome, tick);
        self.publish(&WorldEvent::PlayerOutcome { player, outcome, tick });
        info!(%player, ?outcome, tick, "player outcome");
        Ok(())
    }

    /// Ends the game: runs the world entity's `GameOver` traits and
    /// publishes [`WorldEvent::GameOver`]. Later calls do nothing.
    ///
    /// # Errors
    ///
    /// `TraitInUse` when called from one of the world entity's own
    /// `game_over` traits, otherwise whatever a `game_over` hook reports.
    pub fn end_game(&mut self) -> KernelResult<()> {
        if self.game_over {
            return Ok(());
        }
        let world_entity = self.world_entity;
        self.ensure_hooks_idle(world_entity, Capability::GameOver)?;
        self.game_over = true;
        self.notify(world_entity, Capability::GameOver, |t, e, w| t.game_over(e, w))?;
        self.publish(&WorldEvent::GameOver { tick: self.world_tick });
        info!(tick = self.world_tick, "game over");
        Ok(())
    }

    /// Signals that map loading finished: runs every `WorldLoaded` trait
    /// in capability-index order. Later calls do nothing.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDuringDispatch` from inside a tick, or whatever
    /// a `world_loaded` hook reports.
    pub fn load_complete(&mut self) -> KernelResult<()> {
        self.ensure_not_dispatching("load_complete")?;
        if self.loaded {
            return Ok(());
        }
        self.loaded = true;
        let pairs: Vec<TraitPair> = self.traits.entities_with(Capability::WorldLoaded).to_vec();
        for pair in pairs {
            self.call_trait(pair, |t, e, w| t.world_loaded(e, w))?;
        }
        info!(entities = self.registry.live_count(), "world loaded");
        Ok(())
    }
}
