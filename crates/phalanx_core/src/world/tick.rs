//! The fixed-step tick.

use std::time::Instant;

use tracing::{debug, trace, warn};

use super::World;
use crate::config::WorldKind;
use crate::entity::{Entity, EntityId};
use crate::error::KernelResult;
use crate::traits::Capability;

/// Per-tick timing breakdown in microseconds.
///
/// Diagnostics only. Never read back into simulation state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTimings {
    /// Frame number these timings belong to.
    pub tick: u64,
    /// Whether the gameplay steps ran (false while paused).
    pub simulated: bool,
    /// Idle notifications.
    pub idle_us: u64,
    /// Activities.
    pub activities_us: u64,
    /// Tick traits.
    pub traits_us: u64,
    /// Effects.
    pub effects_us: u64,
    /// Frame-end drain.
    pub frame_end_us: u64,
    /// Frame-end actions run.
    pub frame_end_actions: usize,
}

impl FrameTimings {
    /// Total time in microseconds.
    #[must_use]
    pub const fn total_us(&self) -> u64 {
        self.idle_us + self.activities_us + self.traits_us + self.effects_us + self.frame_end_us
    }
}

#[inline]
fn elapsed_us(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

impl World {
    /// Whether this world advances at all. A shellmap only ticks when the
    /// session shows it.
    #[must_use]
    pub fn should_tick(&self) -> bool {
        self.config.world_kind != WorldKind::Shellmap || self.config.show_shellmap
    }

    /// Advances the world by one frame.
    ///
    /// Unless paused: bump the world tick, notify idle entities, advance
    /// activities, run `Tick` traits, tick effects. Always: drain the
    /// frame-end queue.
    ///
    /// # Errors
    ///
    /// `SimulationHalted` after an earlier failure, `WorldDisposed` once
    /// disposal has begun, or the first error raised during the frame,
    /// which also halts the world.
    pub fn tick(&mut self) -> KernelResult<()> {
        self.ensure_running()?;
        let result = self.run_frame();
        if let Err(err) = &result {
            self.halt(err);
        }
        result
    }

    fn run_frame(&mut self) -> KernelResult<()> {
        self.tick_counter += 1;
        let mut timings = FrameTimings {
            tick: self.tick_counter,
            ..FrameTimings::default()
        };

        if !self.paused && self.should_tick() {
            self.world_tick += 1;
            timings.simulated = true;
            self.dispatching = true;
            let result = self.run_dispatch(&mut timings);
            self.dispatching = false;
            result?;
        }

        let start = Instant::now();
        timings.frame_end_actions = self.drain_frame_end()?;
        timings.frame_end_us = elapsed_us(start);

        trace!(
            tick = self.tick_counter,
            world_tick = self.world_tick,
            total_us = timings.total_us(),
            "tick complete"
        );
        self.timings = timings;
        Ok(())
    }

    /// Steps 2–5.
    fn run_dispatch(&mut self, timings: &mut FrameTimings) -> KernelResult<()> {
        let start = Instant::now();
        self.dispatch_idle()?;
        timings.idle_us = elapsed_us(start);

        let start = Instant::now();
        self.dispatch_activities()?;
        timings.activities_us = elapsed_us(start);

        let start = Instant::now();
        self.dispatch_tick_traits()?;
        timings.traits_us = elapsed_us(start);

        let start = Instant::now();
        self.dispatch_effects()?;
        timings.effects_us = elapsed_us(start);
        Ok(())
    }

    fn dispatch_idle(&mut self) -> KernelResult<()> {
        let mut index = 0;
        while let Some(pair) = self.traits.pair_at(Capability::Idle, index) {
            index += 1;
            if self.registry.get(pair.entity).is_some_and(Entity::is_idle) {
                self.call_trait(pair, |t, e, w| t.tick_idle(e, w))?;
            }
        }
        Ok(())
    }

    fn dispatch_activities(&mut self) -> KernelResult<()> {
        let mut ids = std::mem::take(&mut self.scratch_ids);
        ids.clear();
        ids.extend(self.registry.live_ids());
        let result = ids.iter().try_for_each(|id| self.tick_activity(*id));
        self.scratch_ids = ids;
        result
    }

    fn tick_activity(&mut self, id: EntityId) -> KernelResult<()> {
        let Some(mut current) = self.registry.get_mut(id).and_then(|e| e.activities.begin_tick()) else {
            return Ok(());
        };
        match current.tick(id, self) {
            Ok(step) => {
                if let Some(entity) = self.registry.get_mut(id) {
                    entity.activities.end_tick(current, step);
                }
                Ok(())
            }
            Err(err) => {
                if let Some(entity) = self.registry.get_mut(id) {
                    entity.activities.abort_tick(current);
                }
                Err(err)
            }
        }
    }

    fn dispatch_tick_traits(&mut self) -> KernelResult<()> {
        let threshold = self.config.slow_dispatch_threshold_us;
        let mut index = 0;
        while let Some(pair) = self.traits.pair_at(Capability::Tick, index) {
            index += 1;
            if threshold == 0 {
                self.call_trait(pair, |t, e, w| t.tick(e, w))?;
                continue;
            }
            let start = Instant::now();
            self.call_trait(pair, |t, e, w| t.tick(e, w))?;
            let took = elapsed_us(start);
            if took > threshold {
                warn!(
                    entity = %pair.entity,
                    trait_name = self.traits.name(pair.handle).unwrap_or("?"),
                    took_us = took,
                    threshold_us = threshold,
                    "slow trait tick"
                );
            }
        }
        Ok(())
    }

    fn dispatch_effects(&mut self) -> KernelResult<()> {
        let mut items = self.effects.begin_tick();
        let mut result = Ok(());
        for (_, effect) in &mut items {
            if let Err(err) = effect.tick(self) {
                debug!(effect = effect.name(), error = %err, "effect failed");
                result = Err(err);
                break;
            }
        }
        self.effects.end_tick(items);
        result
    }
}

