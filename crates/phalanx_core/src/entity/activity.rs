//! # Activities
//!
//! Each entity runs at most one activity at a time, with further activities
//! queued behind it. The scheduler advances the current activity exactly
//! once per entity per tick.

use std::collections::VecDeque;

use crate::entity::EntityId;
use crate::error::KernelResult;
use crate::world::World;

/// What the scheduler does with an activity after ticking it.
pub enum ActivityStep {
    /// Keep running this activity next tick.
    Continue,
    /// This activity finished; the next queued one starts next tick.
    Done,
    /// Swap this activity for another one.
    Replace(Box<dyn Activity>),
    /// Run a child activity first, then resume this one.
    Interrupt(Box<dyn Activity>),
}

/// A unit of per-entity work spanning one or more ticks.
pub trait Activity {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Advances the activity by one tick.
    ///
    /// # Errors
    ///
    /// Any error halts the simulation.
    fn tick(&mut self, entity: EntityId, world: &mut World) -> KernelResult<ActivityStep>;

    /// Called when the activity is cancelled before finishing.
    fn cancel(&mut self) {}
}

/// Current activity (front) and the ones queued behind it.
#[derive(Default)]
pub struct ActivityQueue {
    /// Front is the current activity.
    queue: VecDeque<Box<dyn Activity>>,
    /// The current activity is checked out and running.
    running: bool,
    /// Name of the running activity while it is checked out.
    running_name: Option<&'static str>,
    /// Cancel was requested while the current activity was running.
    cancelled: bool,
}

impl ActivityQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing is running or queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.running && self.queue.is_empty()
    }

    /// Number of activities, including a running one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len() + usize::from(self.running)
    }

    /// True when [`len`](Self::len) is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the current activity.
    #[must_use]
    pub fn current_name(&self) -> Option<&'static str> {
        if self.running {
            return self.running_name;
        }
        self.queue.front().map(|a| a.name())
    }

    /// Appends an activity behind everything already queued.
    pub fn queue(&mut self, activity: Box<dyn Activity>) {
        self.queue.push_back(activity);
    }

    /// Cancels the current activity and everything queued.
    pub fn cancel(&mut self) {
        for activity in &mut self.queue {
            activity.cancel();
        }
        self.queue.clear();
        if self.running {
            self.cancelled = true;
        }
    }

    /// Checks out the current activity for ticking.
    pub(crate) fn begin_tick(&mut self) -> Option<Box<dyn Activity>> {
        let current = self.queue.pop_front()?;
        self.running = true;
        self.running_name = Some(current.name());
        self.cancelled = false;
        Some(current)
    }

    /// Returns the ticked activity along with what it asked for.
    pub(crate) fn end_tick(&mut self, mut current: Box<dyn Activity>, step: ActivityStep) {
        self.running = false;
        self.running_name = None;
        if std::mem::take(&mut self.cancelled) {
            current.cancel();
            return;
        }
        match step {
            ActivityStep::Continue => self.queue.push_front(current),
            ActivityStep::Done => {}
            ActivityStep::Replace(next) => self.queue.push_front(next),
            ActivityStep::Interrupt(child) => {
                self.queue.push_front(current);
                self.queue.push_front(child);
            }
        }
    }

    /// Puts a checked-out activity back unchanged after a failed tick.
    pub(crate) fn abort_tick(&mut self, current: Box<dyn Activity>) {
        self.running = false;
        self.running_name = None;
        self.cancelled = false;
        self.queue.push_front(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Activity for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn tick(&mut self, _entity: EntityId, _world: &mut World) -> KernelResult<ActivityStep> {
            Ok(ActivityStep::Done)
        }
    }

    #[test]
    fn test_interrupt_runs_child_first() {
        let mut queue = ActivityQueue::new();
        queue.queue(Box::new(Named("move")));
        queue.queue(Box::new(Named("attack")));

        let current = queue.begin_tick().unwrap();
        assert_eq!(queue.current_name(), Some("move"));
        queue.end_tick(current, ActivityStep::Interrupt(Box::new(Named("turn"))));

        assert_eq!(queue.current_name(), Some("turn"));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_cancel_while_running_drops_current() {
        let mut queue = ActivityQueue::new();
        queue.queue(Box::new(Named("move")));
        let current = queue.begin_tick().unwrap();
        queue.queue(Box::new(Named("later")));
        queue.cancel();
        queue.end_tick(current, ActivityStep::Continue);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_done_advances_to_next() {
        let mut queue = ActivityQueue::new();
        queue.queue(Box::new(Named("a")));
        queue.queue(Box::new(Named("b")));
        let current = queue.begin_tick().unwrap();
        queue.end_tick(current, ActivityStep::Done);
        assert_eq!(queue.current_name(), Some("b"));
    }
}
