//! # World Events
//!
//! Notifications for observers outside the simulation (UI, replay
//! recorder, network stats).
//!
//! ```text
//! ┌─────────┐  try_send  ┌──────────────┐     ┌──────────┐
//! │  World  │──────────> │ bounded chan │───> │ observer │
//! └─────────┘     │      └──────────────┘     └──────────┘
//!                 │      ┌──────────────┐     ┌──────────┐
//!                 └────> │ bounded chan │───> │ observer │
//!                        └──────────────┘     └──────────┘
//! ```
//!
//! Publishing never blocks the tick. A full channel drops the event; a
//! dropped receiver is pruned on the next publish. Nothing an observer
//! does can feed back into simulation state.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::entity::EntityId;
use crate::player::{Outcome, PlayerId};

/// Something observable happened in the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorldEvent {
    /// An entity entered the world.
    EntityAdded {
        /// The entity.
        entity: EntityId,
        /// World tick it happened on.
        tick: u64,
    },
    /// An entity left the world.
    EntityRemoved {
        /// The entity.
        entity: EntityId,
        /// World tick it happened on.
        tick: u64,
    },
    /// A player's outcome was decided.
    PlayerOutcome {
        /// The player.
        player: PlayerId,
        /// The outcome.
        outcome: Outcome,
        /// World tick it happened on.
        tick: u64,
    },
    /// The game ended.
    GameOver {
        /// World tick it happened on.
        tick: u64,
    },
}

/// Receiving end handed to an observer.
pub struct EventReceiver {
    receiver: Receiver<WorldEvent>,
}

impl EventReceiver {
    /// Drains all pending events (non-blocking).
    #[inline]
    pub fn drain(&self) -> Vec<WorldEvent> {
        self.receiver.try_iter().collect()
    }

    /// Receives one event (non-blocking).
    #[inline]
    pub fn try_recv(&self) -> Option<WorldEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

/// Fan-out of world events to observers.
pub struct EventBus {
    capacity: usize,
    subscribers: Vec<Sender<WorldEvent>>,
    dropped: u64,
}

impl EventBus {
    /// Creates a bus whose channels hold up to `capacity` events each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Vec::new(),
            dropped: 0,
        }
    }

    /// Registers a new observer.
    #[must_use]
    pub fn subscribe(&mut self) -> EventReceiver {
        let (sender, receiver) = bounded(self.capacity);
        self.subscribers.push(sender);
        EventReceiver { receiver }
    }

    /// Publishes `event` to every observer without blocking.
    pub fn publish(&mut self, event: &WorldEvent) {
        let mut dropped = 0;
        self.subscribers.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        if dropped > 0 {
            self.dropped += dropped;
            warn!(?event, observers = dropped, "observer channel full, event dropped");
        }
    }

    /// Number of live observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total events dropped because a channel was full.
    #[must_use]
    pub const fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
