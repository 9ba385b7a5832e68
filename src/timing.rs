// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timing orchestrator (C7): cadence timers and the two liveness state
//! machines from Table A-2 (point data-loss, component module-interest).
//!
//! This crate is sans-io: nothing here spawns a thread or owns a clock.
//! Engines call [`Cadence::poll`] / the state-machine `advance` methods
//! once per driver tick with a caller-supplied `Instant`, the same
//! tick-driven shape the sibling writer-side engine uses for its
//! heartbeat and lease-duration timers.

use crate::config;
use std::time::{Duration, Instant};

/// A recurring timer: fires at most once per `interval`, and reports
/// whether it's due without mutating state (`is_due`) versus consuming
/// the due state (`poll`).
#[derive(Clone, Debug)]
pub struct Cadence {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_fired: None }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// If due, mark as fired at `now` and return `true`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }
}

/// Liveness of a single point's data, driven by its `last_seen` time
/// against `TRANSFORM_DATA_LOSS_TIMEOUT`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PointLiveness {
    Fresh,
    Stale,
    Removed,
}

impl PointLiveness {
    /// Compute liveness from elapsed idle time since the point's last
    /// Transform frame.
    pub fn from_idle(idle: Duration) -> Self {
        if idle >= config::TRANSFORM_DATA_LOSS_TIMEOUT * 2 {
            PointLiveness::Removed
        } else if idle >= config::TRANSFORM_DATA_LOSS_TIMEOUT {
            PointLiveness::Stale
        } else {
            PointLiveness::Fresh
        }
    }
}

/// Liveness of a component's advertised module-interest list, driven by
/// its `last_seen` time against `ADVERTISEMENT_TIMEOUT`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ModuleInterest {
    Active,
    Expired,
}

impl ModuleInterest {
    pub fn from_idle(idle: Duration) -> Self {
        if idle >= config::ADVERTISEMENT_TIMEOUT {
            ModuleInterest::Expired
        } else {
            ModuleInterest::Active
        }
    }
}

/// The named cadence timers a Producer or Consumer engine drives every
/// tick, bundled so engines don't re-declare the same five timers.
#[derive(Clone, Debug)]
pub struct EngineTimers {
    pub transform: Cadence,
    pub transform_keepalive: Cadence,
    pub advertisement: Cadence,
    started_at: Instant,
}

impl EngineTimers {
    pub fn new(now: Instant, transform_interval: Duration) -> Self {
        Self {
            transform: Cadence::new(transform_interval),
            transform_keepalive: Cadence::new(config::TRANSFORM_KEEPALIVE_TIMING_MIN),
            advertisement: Cadence::new(config::ADVERTISEMENT_TIMING),
            started_at: now,
        }
    }

    /// Whether `ADVERTISEMENT_STARTUP_WAIT` has elapsed since the engine
    /// started; no Transform or Advertisement traffic is sent before this.
    pub fn startup_complete(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= config::ADVERTISEMENT_STARTUP_WAIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_is_due_immediately_then_waits_for_interval() {
        let mut c = Cadence::new(Duration::from_millis(50));
        let t0 = Instant::now();
        assert!(c.poll(t0));
        assert!(!c.poll(t0 + Duration::from_millis(10)));
        assert!(c.poll(t0 + Duration::from_millis(60)));
    }

    #[test]
    fn point_liveness_transitions_at_timeout_boundaries() {
        assert_eq!(PointLiveness::from_idle(Duration::from_millis(0)), PointLiveness::Fresh);
        assert_eq!(
            PointLiveness::from_idle(config::TRANSFORM_DATA_LOSS_TIMEOUT),
            PointLiveness::Stale
        );
        assert_eq!(
            PointLiveness::from_idle(config::TRANSFORM_DATA_LOSS_TIMEOUT * 2),
            PointLiveness::Removed
        );
    }

    #[test]
    fn module_interest_expires_after_advertisement_timeout() {
        assert_eq!(ModuleInterest::from_idle(Duration::from_secs(1)), ModuleInterest::Active);
        assert_eq!(
            ModuleInterest::from_idle(config::ADVERTISEMENT_TIMEOUT),
            ModuleInterest::Expired
        );
    }

    #[test]
    fn startup_wait_gates_engine_timers() {
        let t0 = Instant::now();
        let timers = EngineTimers::new(t0, config::TRANSFORM_TIMING_DEFAULT);
        assert!(!timers.startup_complete(t0));
        assert!(timers.startup_complete(t0 + config::ADVERTISEMENT_STARTUP_WAIT));
    }
}
