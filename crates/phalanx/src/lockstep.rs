//! # Lockstep Pair
//!
//! Two kernels fed the same order batches, compared after every tick.
//!
//! ```text
//!   frame n batch ──┬──► peer 0 (local P1) ── tick ── sync_hash ──┐
//!                   │                                             ├─► equal?
//!                   └──► peer 1 (local P2) ── tick ── sync_hash ──┘
//! ```
//!
//! The peers differ only in their local player, which must never reach
//! the simulation. When the hashes do disagree, the per-entity reports
//! narrow the divergence down to the entities whose synced state differs.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use phalanx_core::sync::entity_report;
use phalanx_core::{EntityId, Order, Outcome, PlayerId, Session, World};

use crate::demo;
use crate::error::HarnessResult;
use crate::session::SessionFile;

/// Number of peers in a pair.
pub const PEERS: usize = 2;

/// First frame on which the peers disagreed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Desync {
    /// Frame reached by the tick that diverged.
    pub frame: u64,
    /// Sync hash of each peer.
    pub hashes: [i32; PEERS],
    /// Entities whose synced state or liveness differs between peers.
    pub entities: Vec<EntityId>,
}

/// Result of a scripted run.
#[derive(Clone, Debug)]
pub struct Report {
    /// Frames completed.
    pub frames: u64,
    /// Sync hash of peer 0 after each frame.
    pub hashes: Vec<i32>,
    /// The first desync, if any. The run stops there.
    pub desync: Option<Desync>,
    /// Whether the game ended.
    pub game_over: bool,
    /// Final outcome of each player.
    pub outcomes: Vec<(PlayerId, Outcome)>,
}

impl Report {
    /// Hash after the last completed frame.
    #[must_use]
    pub fn final_hash(&self) -> Option<i32> {
        self.hashes.last().copied()
    }
}

/// Two peers running the same session.
pub struct Lockstep {
    peers: [World; PEERS],
    frame: u64,
}

impl Lockstep {
    /// Builds both peers, spawns the session's units on each and
    /// completes loading.
    ///
    /// # Errors
    ///
    /// Propagates kernel errors from world construction or spawning.
    pub fn new(session: &SessionFile) -> HarnessResult<Self> {
        Ok(Self {
            peers: [Self::build_peer(session, 1)?, Self::build_peer(session, 2)?],
            frame: 0,
        })
    }

    fn build_peer(session: &SessionFile, local: u32) -> HarnessResult<World> {
        let local = (local <= session.players).then(|| PlayerId::new(local));
        let rules = demo::ruleset(session.players, session.mission_ticks, local)?;
        let mut world = World::new(Session::new(session.kernel.clone(), rules))?;
        for spawn in &session.spawns {
            let id = spawn.spawn(&mut world)?;
            debug!(entity = %id, kind = %spawn.type_name, "spawned");
        }
        world.load_complete()?;
        Ok(world)
    }

    /// Frames completed so far.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// One peer.
    #[must_use]
    pub fn peer(&self, index: usize) -> Option<&World> {
        self.peers.get(index)
    }

    /// One peer, mutably. Meant for fault injection in tests.
    pub fn peer_mut(&mut self, index: usize) -> Option<&mut World> {
        self.peers.get_mut(index)
    }

    /// Applies `orders` to both peers, ticks them, and compares hashes.
    ///
    /// # Errors
    ///
    /// Propagates the first kernel error of either peer.
    pub fn step(&mut self, orders: &[(PlayerId, Order)]) -> HarnessResult<Option<Desync>> {
        for peer in &mut self.peers {
            peer.process_orders(orders)?;
            peer.tick()?;
        }
        self.frame += 1;

        let hashes = [self.peers[0].sync_hash(), self.peers[1].sync_hash()];
        if hashes[0] == hashes[1] {
            debug!(frame = self.frame, hash = hashes[0], "in sync");
            return Ok(None);
        }

        let entities = self.diverging_entities();
        warn!(frame = self.frame, ?hashes, ?entities, "desync");
        Ok(Some(Desync {
            frame: self.frame,
            hashes,
            entities,
        }))
    }

    /// Entities live on either peer whose reports differ.
    fn diverging_entities(&self) -> Vec<EntityId> {
        let [a, b] = &self.peers;
        let ids: BTreeSet<EntityId> = a.live_entities().chain(b.live_entities()).map(|e| e.id()).collect();
        ids.into_iter()
            .filter(|&id| a.is_live(id) != b.is_live(id) || entity_report(a, id) != entity_report(b, id))
            .collect()
    }
}

/// Runs `session` on a fresh pair until its tick count or the first
/// desync.
///
/// # Errors
///
/// Propagates kernel errors from either peer.
pub fn run(session: &SessionFile) -> HarnessResult<Report> {
    let mut pair = Lockstep::new(session)?;
    let capacity = usize::try_from(session.ticks).unwrap_or(0);
    let mut hashes = Vec::with_capacity(capacity);
    let mut desync = None;

    for frame in 0..session.ticks {
        let orders = session.orders_at(frame);
        let outcome = pair.step(&orders)?;
        hashes.push(pair.peers[0].sync_hash());
        if outcome.is_some() {
            desync = outcome;
            break;
        }
    }

    let world = &pair.peers[0];
    let report = Report {
        frames: pair.frame,
        hashes,
        desync,
        game_over: world.is_game_over(),
        outcomes: world.players().map(|p| (p.id(), p.outcome())).collect(),
    };
    info!(
        frames = report.frames,
        hash = ?report.final_hash(),
        game_over = report.game_over,
        desync = report.desync.is_some(),
        "session finished"
    );
    Ok(report)
}
