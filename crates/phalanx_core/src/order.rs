//! # Orders
//!
//! The only way input enters the simulation. Locally issued orders are
//! buffered until the network layer collects them; the network layer hands
//! back each frame's agreed batch, which every peer applies before the
//! tick in the same order.

use phalanx_shared::{CPos, WPos};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// What a command is aimed at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// No target.
    #[default]
    None,
    /// Another entity.
    Entity(EntityId),
    /// A cell.
    Cell(CPos),
    /// An exact world position.
    Position(WPos),
}

/// A gameplay command addressed to one entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Entity the command is for.
    pub subject: EntityId,
    /// Command name, interpreted by the subject's traits.
    pub name: String,
    /// Command target.
    #[serde(default)]
    pub target: Target,
    /// Append to the current activities instead of replacing them.
    #[serde(default)]
    pub queued: bool,
}

impl Command {
    /// Untargeted, unqueued command.
    #[must_use]
    pub fn new(subject: EntityId, name: impl Into<String>) -> Self {
        Self {
            subject,
            name: name.into(),
            target: Target::None,
            queued: false,
        }
    }

    /// Sets the target.
    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Marks the command as queued.
    #[must_use]
    pub fn queued(mut self) -> Self {
        self.queued = true;
        self
    }
}

/// A session order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Order {
    /// Change the synchronized pause state.
    PauseGame {
        /// Requested pause state.
        paused: bool,
    },
    /// Gameplay command.
    Command(Command),
}

impl Order {
    /// Short name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PauseGame { .. } => "PauseGame",
            Self::Command(_) => "Command",
        }
    }
}
