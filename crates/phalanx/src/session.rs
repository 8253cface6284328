//! # Session Files
//!
//! A session file is a TOML description of one scripted match: the kernel
//! configuration both peers share, the units on the map at load time, and
//! the orders each player issues on which frame.
//!
//! ```toml
//! ticks = 120
//! players = 2
//! mission_ticks = 100
//!
//! [kernel]
//! random_seed = 7
//!
//! [[spawns]]
//! type = "rifleman"
//! owner = 1
//! cell = { x = 2, y = 2 }
//!
//! [[orders]]
//! frame = 3
//! player = 1
//! order = { type = "command", subject = 1, name = "move", target = { Cell = { x = 9, y = 4 } } }
//! ```
//!
//! Orders scheduled for frame `n` are processed right before the tick
//! that advances the world from frame `n` to `n + 1`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use phalanx_core::{EntityId, EntityInit, InitValue, KernelConfig, Order, PlayerId, World};
use phalanx_shared::CPos;

use crate::error::{HarnessError, HarnessResult};

/// The built-in demo session, used when no file is given.
pub const DEMO_SESSION: &str = r#"
ticks = 150
players = 2
mission_ticks = 120

[kernel]
random_seed = 1337

[kernel.map]
title = "Twin Ridges"
width = 48
height = 48

[[spawns]]
type = "rifleman"
owner = 1
cell = { x = 4, y = 4 }

[[spawns]]
type = "rifleman"
owner = 1
cell = { x = 5, y = 4 }

[[spawns]]
type = "scout"
owner = 1
cell = { x = 4, y = 6 }

[[spawns]]
type = "rifleman"
owner = 2
cell = { x = 40, y = 40 }

[[spawns]]
type = "scout"
owner = 2
cell = { x = 41, y = 42 }
hp = 30

[[orders]]
frame = 0
player = 1
order = { type = "command", subject = 1, name = "move", target = { Cell = { x = 20, y = 20 } } }

[[orders]]
frame = 0
player = 2
order = { type = "command", subject = 4, name = "move", target = { Cell = { x = 24, y = 22 } } }

[[orders]]
frame = 10
player = 1
order = { type = "command", subject = 3, name = "beacon", target = { Cell = { x = 30, y = 30 } } }

[[orders]]
frame = 12
player = 2
order = { type = "command", subject = 5, name = "move", target = { Cell = { x = 10, y = 8 } } }

[[orders]]
frame = 30
player = 1
order = { type = "pause_game", paused = true }

[[orders]]
frame = 35
player = 1
order = { type = "pause_game", paused = false }

[[orders]]
frame = 60
player = 1
order = { type = "command", subject = 5, name = "damage" }

[[orders]]
frame = 61
player = 1
order = { type = "command", subject = 5, name = "damage" }
"#;

/// A unit placed on the map before the session starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnSpec {
    /// Entity type name from the demo ruleset.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Owning player, if any.
    #[serde(default)]
    pub owner: Option<u32>,
    /// Starting cell.
    pub cell: CPos,
    /// Hit point override.
    #[serde(default)]
    pub hp: Option<i64>,
}

impl SpawnSpec {
    /// Creates the unit in `world` and adds it.
    ///
    /// # Errors
    ///
    /// Propagates kernel errors (unknown type, unknown owner, hook
    /// failures).
    pub fn spawn(&self, world: &mut World) -> HarnessResult<EntityId> {
        let mut init = EntityInit::new().location(self.cell);
        if let Some(owner) = self.owner {
            init = init.owner(PlayerId::new(owner));
        }
        if let Some(hp) = self.hp {
            init = init.value("hp", InitValue::Int(hp));
        }
        Ok(world.create_entity(&self.type_name, init, true)?)
    }
}

/// One order in the script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedOrder {
    /// Frame the order is processed on.
    pub frame: u64,
    /// Issuing player.
    pub player: u32,
    /// The order itself.
    pub order: Order,
}

/// A complete scripted session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFile {
    /// Number of ticks to run.
    pub ticks: u64,
    /// Number of players.
    pub players: u32,
    /// World tick the mission ends on. Zero runs without a timer.
    pub mission_ticks: u64,
    /// Kernel configuration shared by both peers.
    pub kernel: KernelConfig,
    /// Units present at load time, created in this order.
    pub spawns: Vec<SpawnSpec>,
    /// Scripted orders.
    pub orders: Vec<ScriptedOrder>,
}

impl Default for SessionFile {
    fn default() -> Self {
        Self {
            ticks: 100,
            players: 2,
            mission_ticks: 0,
            kernel: KernelConfig::default(),
            spawns: Vec::new(),
            orders: Vec::new(),
        }
    }
}

impl SessionFile {
    /// The built-in demo session.
    ///
    /// # Errors
    ///
    /// Only if [`DEMO_SESSION`] itself is broken.
    pub fn demo() -> HarnessResult<Self> {
        Self::from_toml_str(DEMO_SESSION)
    }

    /// Parses and validates a session document.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Parse` for malformed TOML and
    /// `HarnessError::Session` or `HarnessError::Kernel` for inconsistent
    /// content.
    pub fn from_toml_str(source: &str) -> HarnessResult<Self> {
        let session: Self = toml::from_str(source).map_err(|e| HarnessError::Parse(e.to_string()))?;
        session.validate()?;
        Ok(session)
    }

    /// Reads and validates a session file.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks that every player reference is within the session.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Session` naming the first bad reference.
    pub fn validate(&self) -> HarnessResult<()> {
        self.kernel.validate()?;
        if self.players == 0 {
            return Err(HarnessError::Session("a session needs at least one player".into()));
        }
        let in_session = |player: u32| (1..=self.players).contains(&player);
        if let Some(spawn) = self.spawns.iter().find(|s| s.owner.is_some_and(|o| !in_session(o))) {
            return Err(HarnessError::Session(format!(
                "spawn of {} is owned by unknown player {:?}",
                spawn.type_name, spawn.owner
            )));
        }
        if let Some(order) = self.orders.iter().find(|o| !in_session(o.player)) {
            return Err(HarnessError::Session(format!(
                "order on frame {} comes from unknown player {}",
                order.frame, order.player
            )));
        }
        Ok(())
    }

    /// Orders scheduled for `frame`, in file order.
    #[must_use]
    pub fn orders_at(&self, frame: u64) -> Vec<(PlayerId, Order)> {
        self.orders
            .iter()
            .filter(|o| o.frame == frame)
            .map(|o| (PlayerId::new(o.player), o.order.clone()))
            .collect()
    }
}
