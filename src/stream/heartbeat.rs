//! Keepalive monitor for silently-dead connections.
//!
//! The monitor only sends: dead-peer detection is left to transport close and
//! error events, and inbound heartbeats are recorded as a liveness signal
//! without changing connection state.

use std::time::Duration;

use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

use crate::stream::proto::ControlFrame;

/// Default keepalive send interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Periodic keepalive schedule for one connection.
#[derive(Clone, Debug)]
pub struct Heartbeat {
    /// Time between keepalive probes while the transport is open.
    pub interval: Duration,
    last_reply: Option<Instant>,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_reply: None,
        }
    }

    /// Builds the tick source the connected loop selects on.
    ///
    /// The first tick fires after one full interval, not immediately, so a
    /// fresh connection does not begin with a probe.
    pub fn timer(&self) -> Interval {
        // tokio panics on a zero-period interval; treat zero as "disabled".
        let period = if self.interval.is_zero() {
            Duration::from_secs(86_400)
        } else {
            self.interval
        };
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.reset();
        timer
    }

    /// The keepalive frame sent on each tick.
    pub fn frame() -> ControlFrame {
        ControlFrame::Heartbeat
    }

    /// Records receipt of a reciprocal heartbeat.
    pub fn observe_reply(&mut self) {
        self.last_reply = Some(Instant::now());
    }

    /// Instant of the most recent inbound heartbeat, if any was seen.
    pub fn last_reply(&self) -> Option<Instant> {
        self.last_reply
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}
