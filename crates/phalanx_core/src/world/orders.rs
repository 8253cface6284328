//! Order intake and pause control.

use tracing::{debug, trace, warn};

use super::World;
use crate::error::KernelResult;
use crate::order::{Command, Order};
use crate::player::PlayerId;
use crate::traits::Capability;

impl World {
    /// Queues an order for the network layer to send.
    pub fn issue_order(&mut self, order: Order) {
        trace!(kind = order.kind(), "order issued");
        self.issued_orders.push(order);
    }

    /// Hands over every order issued since the last call.
    pub fn take_issued_orders(&mut self) -> Vec<Order> {
        std::mem::take(&mut self.issued_orders)
    }

    /// Applies one frame's agreed orders, in the given order.
    ///
    /// Orders from players outside the session and commands for entities
    /// that are not in the world are skipped.
    ///
    /// # Errors
    ///
    /// `SimulationHalted` or `WorldDisposed` if the world no longer runs,
    /// `StructuralMutationDuringDispatch` from inside a tick, or the first
    /// error a `resolve_order` hook reports, which also halts the world.
    pub fn process_orders(&mut self, orders: &[(PlayerId, Order)]) -> KernelResult<()> {
        self.ensure_running()?;
        self.ensure_not_dispatching("process_orders")?;
        for (issuer, order) in orders {
            if self.players_set && !self.players.contains_key(issuer) {
                warn!(player = %issuer, kind = order.kind(), "order from unknown player skipped");
                continue;
            }
            let result = match order {
                Order::PauseGame { paused } => {
                    self.set_paused(*paused, *issuer);
                    Ok(())
                }
                Order::Command(command) => self.resolve_command(*issuer, command),
            };
            if let Err(err) = result {
                self.halt(&err);
                return Err(err);
            }
        }
        Ok(())
    }

    fn resolve_command(&mut self, issuer: PlayerId, command: &Command) -> KernelResult<()> {
        if !self.registry.is_live(command.subject) {
            debug!(entity = %command.subject, name = %command.name, "command for absent entity ignored");
            return Ok(());
        }
        self.notify(command.subject, Capability::ResolveOrder, |t, e, w| {
            t.resolve_order(e, issuer, command, w)
        })
    }

    fn set_paused(&mut self, paused: bool, issuer: PlayerId) {
        if self.pause_state_locked {
            debug!(player = %issuer, paused, "pause order ignored, pause state locked");
            return;
        }
        self.predicted_paused = paused;
        if self.paused != paused {
            self.paused = paused;
            debug!(player = %issuer, paused, tick = self.world_tick, "pause state changed");
        }
    }

    /// Requests a synchronized pause change. Sends a `PauseGame` order and
    /// predicts the result; the world itself pauses when the order comes
    /// back through [`process_orders`](Self::process_orders). Does nothing
    /// while the pause state is locked.
    pub fn set_pause_state(&mut self, paused: bool) {
        if self.pause_state_locked {
            return;
        }
        self.issue_order(Order::PauseGame { paused });
        self.predicted_paused = paused;
    }

    /// Pauses presentation on this client only.
    pub fn set_local_pause_state(&mut self, paused: bool) {
        self.local_paused = paused;
    }

    /// Locks or unlocks the synchronized pause state. Every peer must do
    /// this at the same tick.
    pub fn set_pause_state_locked(&mut self, locked: bool) {
        self.pause_state_locked = locked;
    }
}
